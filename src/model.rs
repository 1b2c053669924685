// 该文件是 AI Vision 项目的一部分。
// src/model.rs - 模型配置与推理后端
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

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, element::ImageElement, pose::Pose};

/// poseDetection.SupportedModels.MoveNet
pub const MOVENET_MODEL_NAME: &str = "MoveNet";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("URI scheme mismatch: expected '{expected}', found '{found}'")]
  SchemeMismatch {
    expected: &'static str,
    found: String,
  },
  #[error("未知的模型类型: {0}")]
  UnknownVariant(String),
  #[error("参数 {key} 的值无效: {value}")]
  InvalidParameter { key: String, value: String },
}

impl ConfigError {
  pub fn invalid(key: &str, value: &str) -> Self {
    ConfigError::InvalidParameter {
      key: key.to_string(),
      value: value.to_string(),
    }
  }
}

/// MoveNet 模型类型，在推理速度与精度之间取舍
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ModelVariant {
  /// 速度优先
  #[serde(rename = "SinglePose.Lightning")]
  Lightning,
  /// 精度优先
  #[default]
  #[serde(rename = "SinglePose.Thunder")]
  Thunder,
  #[serde(rename = "MultiPose.Lightning")]
  MultiPoseLightning,
}

impl ModelVariant {
  pub fn model_type(&self) -> &'static str {
    match self {
      ModelVariant::Lightning => "SinglePose.Lightning",
      ModelVariant::Thunder => "SinglePose.Thunder",
      ModelVariant::MultiPoseLightning => "MultiPose.Lightning",
    }
  }
}

impl FromStr for ModelVariant {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "lightning" | "singlepose.lightning" => Ok(ModelVariant::Lightning),
      "thunder" | "singlepose.thunder" => Ok(ModelVariant::Thunder),
      "multipose" | "multipose.lightning" => Ok(ModelVariant::MultiPoseLightning),
      _ => Err(ConfigError::UnknownVariant(s.to_string())),
    }
  }
}

/// 检测器构造参数，序列化后即为 `poseDetection.createDetector` 的配置对象
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorConfig {
  pub model_type: ModelVariant,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub model_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub min_pose_score: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub enable_smoothing: Option<bool>,
}

impl DetectorConfig {
  pub fn new(model_type: ModelVariant) -> Self {
    Self {
      model_type,
      ..Default::default()
    }
  }

  pub fn model_url(mut self, model_url: impl Into<String>) -> Self {
    self.model_url = Some(model_url.into());
    self
  }

  pub fn min_pose_score(mut self, score: f64) -> Self {
    self.min_pose_score = Some(score);
    self
  }

  pub fn enable_smoothing(mut self, enable: bool) -> Self {
    self.enable_smoothing = Some(enable);
    self
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(self)
  }
}

const MOVENET_SCHEME: &str = "movenet";

impl FromUrlWithScheme for DetectorConfig {
  const SCHEME: &'static str = MOVENET_SCHEME;
}

/// 从 `movenet:thunder?min_pose_score=0.3&enable_smoothing=true` 形式的 URL 构造
impl FromUrl for DetectorConfig {
  type Error = ConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != MOVENET_SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        MOVENET_SCHEME,
        url.scheme()
      );
      return Err(ConfigError::SchemeMismatch {
        expected: MOVENET_SCHEME,
        found: url.scheme().to_string(),
      });
    }

    // `movenet:thunder` 与 `movenet://thunder` 两种写法都接受
    let variant = match url.path().trim_matches('/') {
      "" => url.host_str().unwrap_or_default(),
      path => path,
    };
    let mut config = if variant.is_empty() {
      DetectorConfig::default()
    } else {
      DetectorConfig::new(variant.parse()?)
    };

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "model_url" => config.model_url = Some(value.into_owned()),
        "min_pose_score" => {
          let score = value
            .parse::<f64>()
            .map_err(|_| ConfigError::invalid(&key, &value))?;
          config.min_pose_score = Some(score);
        }
        "enable_smoothing" => {
          let enable = value
            .parse::<bool>()
            .map_err(|_| ConfigError::invalid(&key, &value))?;
          config.enable_smoothing = Some(enable);
        }
        _ => {}
      }
    }

    Ok(config)
  }
}

/// `estimatePoses` 的推理选项
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateOptions {
  pub max_poses: u32,
  pub flip_horizontal: bool,
}

impl Default for EstimateOptions {
  fn default() -> Self {
    Self {
      max_poses: 1,
      flip_horizontal: false,
    }
  }
}

/// 外部姿态估计库的能力集合
///
/// 模型加载与推理都可能挂起；浏览器中的 Promise 不是 `Send`，
/// 因此 trait 采用 `?Send` 的异步形式。
#[async_trait(?Send)]
pub trait PoseBackend {
  /// 推理库接受的图像载体，同时提供归一化所需的尺寸
  type Image: ImageElement;
  /// 已加载的检测器句柄
  type Detector;

  async fn create_detector(&self, config: &DetectorConfig) -> anyhow::Result<Self::Detector>;

  async fn estimate_poses(
    &self,
    detector: &Self::Detector,
    image: &Self::Image,
    options: &EstimateOptions,
  ) -> anyhow::Result<Vec<Pose>>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detector_config_serializes_to_movenet_shape() {
    let config = DetectorConfig::new(ModelVariant::Lightning).enable_smoothing(true);
    assert_eq!(
      config.to_json().unwrap(),
      r#"{"modelType":"SinglePose.Lightning","enableSmoothing":true}"#
    );
  }

  #[test]
  fn estimate_options_default_to_single_unmirrored_pose() {
    let options = EstimateOptions::default();
    assert_eq!(
      serde_json::to_string(&options).unwrap(),
      r#"{"maxPoses":1,"flipHorizontal":false}"#
    );
  }

  #[test]
  fn config_from_url() {
    let url = Url::parse("movenet:lightning?min_pose_score=0.3&enable_smoothing=false").unwrap();
    let config = DetectorConfig::from_url(&url).unwrap();
    assert_eq!(config.model_type, ModelVariant::Lightning);
    assert_eq!(config.min_pose_score, Some(0.3));
    assert_eq!(config.enable_smoothing, Some(false));

    let url = Url::parse("movenet://thunder").unwrap();
    assert_eq!(
      DetectorConfig::from_url(&url).unwrap().model_type,
      ModelVariant::Thunder
    );
  }

  #[test]
  fn config_from_url_rejects_bad_input() {
    let url = Url::parse("yolo26:/models/a.rknn").unwrap();
    assert!(matches!(
      DetectorConfig::from_url(&url),
      Err(ConfigError::SchemeMismatch { .. })
    ));

    let url = Url::parse("movenet:blazing").unwrap();
    assert_eq!(
      DetectorConfig::from_url(&url),
      Err(ConfigError::UnknownVariant("blazing".to_string()))
    );

    let url = Url::parse("movenet:thunder?min_pose_score=high").unwrap();
    assert_eq!(
      DetectorConfig::from_url(&url),
      Err(ConfigError::invalid("min_pose_score", "high"))
    );
  }
}
