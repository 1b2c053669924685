// 该文件是 AI Vision 项目的一部分。
// src/element.rs - 图像元素定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::str::FromStr;

use crate::model::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementSize {
  pub width: u32,
  pub height: u32,
}

impl ElementSize {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

pub trait ImageElement {
  /// 图像的原始像素尺寸
  fn natural_size(&self) -> ElementSize;
  /// 当前布局下的显示尺寸
  fn rendered_size(&self) -> ElementSize;
}

/// 由页面中的标识符定位图像元素
pub trait ElementResolver {
  type Element: ImageElement;

  fn resolve(&self, id: &str) -> Option<Self::Element>;
}

/// 坐标归一化所用的参考尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizeBasis {
  Natural,
  #[default]
  Rendered,
}

impl NormalizeBasis {
  /// 选择参考尺寸；首选尺寸为零时退回到另一种，两者都为零则返回 `None`
  pub fn reference_size<E: ImageElement>(&self, element: &E) -> Option<ElementSize> {
    let (preferred, fallback) = match self {
      NormalizeBasis::Natural => (element.natural_size(), element.rendered_size()),
      NormalizeBasis::Rendered => (element.rendered_size(), element.natural_size()),
    };
    [preferred, fallback].into_iter().find(|size| !size.is_empty())
  }
}

impl FromStr for NormalizeBasis {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "natural" => Ok(NormalizeBasis::Natural),
      "rendered" | "display" => Ok(NormalizeBasis::Rendered),
      _ => Err(ConfigError::invalid("basis", s)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Scaled {
    natural: ElementSize,
    rendered: ElementSize,
  }

  impl ImageElement for Scaled {
    fn natural_size(&self) -> ElementSize {
      self.natural
    }

    fn rendered_size(&self) -> ElementSize {
      self.rendered
    }
  }

  #[test]
  fn basis_picks_preferred_size() {
    let img = Scaled {
      natural: ElementSize::new(1280, 960),
      rendered: ElementSize::new(640, 480),
    };
    assert_eq!(
      NormalizeBasis::Natural.reference_size(&img),
      Some(ElementSize::new(1280, 960))
    );
    assert_eq!(
      NormalizeBasis::Rendered.reference_size(&img),
      Some(ElementSize::new(640, 480))
    );
  }

  #[test]
  fn basis_falls_back_when_preferred_is_empty() {
    // 图片尚未解码时 naturalWidth 为 0
    let img = Scaled {
      natural: ElementSize::new(0, 0),
      rendered: ElementSize::new(320, 240),
    };
    assert_eq!(
      NormalizeBasis::Natural.reference_size(&img),
      Some(ElementSize::new(320, 240))
    );

    let hidden = Scaled {
      natural: ElementSize::new(0, 0),
      rendered: ElementSize::new(320, 0),
    };
    assert_eq!(NormalizeBasis::Rendered.reference_size(&hidden), None);
  }

  #[test]
  fn basis_from_str() {
    assert_eq!("natural".parse::<NormalizeBasis>(), Ok(NormalizeBasis::Natural));
    assert_eq!("display".parse::<NormalizeBasis>(), Ok(NormalizeBasis::Rendered));
    assert!("css".parse::<NormalizeBasis>().is_err());
  }
}
