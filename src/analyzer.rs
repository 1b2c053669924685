// 该文件是 AI Vision 项目的一部分。
// src/analyzer.rs - 图像姿态分析
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

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  element::{ElementResolver, NormalizeBasis},
  model::{ConfigError, DetectorConfig, EstimateOptions, PoseBackend},
  pose::Pose,
};

#[derive(Error, Debug)]
pub enum AnalyzeError {
  #[error("Image element not found: {0}")]
  ElementNotFound(String),
  #[error("模型加载失败: {0:#}")]
  ModelLoad(anyhow::Error),
  #[error("Pose detection failed: {0:#}")]
  Estimation(anyhow::Error),
  #[error("图像元素 {0} 的尺寸为零，无法归一化")]
  InvalidDimensions(String),
  #[error("姿态序列化失败: {0}")]
  Serialize(#[from] serde_json::Error),
}

/// 分析器配置：模型类型、推理选项与归一化参考尺寸
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalyzerConfig {
  pub detector: DetectorConfig,
  pub options: EstimateOptions,
  pub basis: NormalizeBasis,
}

impl AnalyzerConfig {
  pub fn new(detector: DetectorConfig) -> Self {
    Self {
      detector,
      ..Default::default()
    }
  }

  pub fn basis(mut self, basis: NormalizeBasis) -> Self {
    self.basis = basis;
    self
  }

  pub fn options(mut self, options: EstimateOptions) -> Self {
    self.options = options;
    self
  }
}

impl FromUrlWithScheme for AnalyzerConfig {
  const SCHEME: &'static str = DetectorConfig::SCHEME;
}

/// 在检测器参数之外，额外识别 `max_poses`、`flip_horizontal` 与 `basis`
impl FromUrl for AnalyzerConfig {
  type Error = ConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let mut config = AnalyzerConfig::new(DetectorConfig::from_url(url)?);

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "max_poses" => {
          config.options.max_poses = value
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ConfigError::invalid(&key, &value))?;
        }
        "flip_horizontal" => {
          config.options.flip_horizontal = value
            .parse::<bool>()
            .map_err(|_| ConfigError::invalid(&key, &value))?;
        }
        "basis" => config.basis = value.parse()?,
        _ => {}
      }
    }

    Ok(config)
  }
}

/// 姿态分析器
///
/// 持有推理后端、元素解析器以及惰性构造的检测器句柄。句柄只构造一次，
/// 并发的首次调用共同等待同一次初始化；构造失败时保持未加载状态。
pub struct Analyzer<B: PoseBackend, R> {
  backend: B,
  resolver: R,
  config: AnalyzerConfig,
  detector: OnceCell<B::Detector>,
}

impl<B, R> Analyzer<B, R>
where
  B: PoseBackend,
  R: ElementResolver<Element = B::Image>,
{
  pub fn new(backend: B, resolver: R) -> Self {
    Self::with_config(backend, resolver, AnalyzerConfig::default())
  }

  pub fn with_config(backend: B, resolver: R, config: AnalyzerConfig) -> Self {
    Self {
      backend,
      resolver,
      config,
      detector: OnceCell::new(),
    }
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }

  pub fn resolver(&self) -> &R {
    &self.resolver
  }

  pub fn config(&self) -> &AnalyzerConfig {
    &self.config
  }

  pub fn is_loaded(&self) -> bool {
    self.detector.initialized()
  }

  /// 确保检测器已加载，返回共享句柄
  pub async fn ensure_loaded(&self) -> Result<&B::Detector, AnalyzeError> {
    self
      .detector
      .get_or_try_init(|| async {
        let model_type = self.config.detector.model_type.model_type();
        info!("加载 MoveNet 模型: {}", model_type);
        let detector = self
          .backend
          .create_detector(&self.config.detector)
          .await
          .map_err(AnalyzeError::ModelLoad)?;
        info!("MoveNet 模型加载完成: {}", model_type);
        Ok::<_, AnalyzeError>(detector)
      })
      .await
  }

  /// 分析指定元素，返回第一个姿态（坐标已归一化）
  ///
  /// 未检测到姿态时返回 `Ok(None)`；其余情况以 [`AnalyzeError`] 区分失败原因。
  pub async fn try_analyze(&self, id: &str) -> Result<Option<Pose>, AnalyzeError> {
    let element = self
      .resolver
      .resolve(id)
      .ok_or_else(|| AnalyzeError::ElementNotFound(id.to_string()))?;

    let detector = self.ensure_loaded().await?;

    debug!("开始推理: {}", id);
    let poses = self
      .backend
      .estimate_poses(detector, &element, &self.config.options)
      .await
      .map_err(AnalyzeError::Estimation)?;
    debug!("检测到 {} 个姿态", poses.len());

    let Some(mut pose) = poses.into_iter().next() else {
      return Ok(None);
    };

    let size = self
      .config
      .basis
      .reference_size(&element)
      .ok_or_else(|| AnalyzeError::InvalidDimensions(id.to_string()))?;
    debug!("归一化参考尺寸: {}x{}", size.width, size.height);
    pose.normalize(size.width as f64, size.height as f64);

    Ok(Some(pose))
  }

  /// 分析指定元素并序列化为 JSON；任何失败都记录日志并返回 `None`
  pub async fn analyze(&self, id: &str) -> Option<String> {
    let result = self
      .try_analyze(id)
      .await
      .and_then(|pose| pose.map(|p| p.to_json()).transpose().map_err(Into::into));

    match result {
      Ok(json) => json,
      Err(e @ AnalyzeError::InvalidDimensions(_)) => {
        warn!("{}", e);
        None
      }
      Err(e) => {
        error!("{}", e);
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn analyzer_config_from_url() {
    let url = Url::parse("movenet:lightning?max_poses=2&flip_horizontal=true&basis=natural").unwrap();
    let config = AnalyzerConfig::from_url(&url).unwrap();
    assert_eq!(
      config.detector.model_type,
      crate::model::ModelVariant::Lightning
    );
    assert_eq!(config.options.max_poses, 2);
    assert!(config.options.flip_horizontal);
    assert_eq!(config.basis, NormalizeBasis::Natural);
  }

  #[test]
  fn analyzer_config_defaults() {
    let config = AnalyzerConfig::from_url(&Url::parse("movenet:").unwrap()).unwrap();
    assert_eq!(config, AnalyzerConfig::default());
    assert_eq!(config.options, EstimateOptions::default());
    assert_eq!(config.basis, NormalizeBasis::Rendered);
  }

  #[test]
  fn analyzer_config_rejects_zero_poses() {
    let url = Url::parse("movenet:thunder?max_poses=0").unwrap();
    assert_eq!(
      AnalyzerConfig::from_url(&url),
      Err(ConfigError::invalid("max_poses", "0"))
    );
  }
}
