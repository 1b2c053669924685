// 该文件是 AI Vision 项目的一部分。
// src/bridge.rs - 宿主调用入口的共享状态
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

use std::{cell::RefCell, rc::Rc};

use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl,
  analyzer::{AnalyzeError, Analyzer, AnalyzerConfig},
  element::ElementResolver,
  model::{ConfigError, PoseBackend},
};

/// `loadAiModel` 成功时返回给宿主的状态
pub const LOADED_STATUS: &str = "loaded";

#[derive(Error, Debug)]
pub enum BridgeError {
  #[error("配置 URL 无效: {0}")]
  InvalidUrl(#[from] url::ParseError),
  #[error("配置无效: {0}")]
  Config(#[from] ConfigError),
  #[error("model already in use, configuration is fixed")]
  AlreadyStarted,
}

type Factory<B, R> = Box<dyn Fn(AnalyzerConfig) -> Analyzer<B, R>>;

/// 宿主入口背后的唯一分析器
///
/// 分析器在第一次 `load` 或 `run` 时按当前配置创建，此后配置不可更改，
/// 即使模型仍在加载中。
pub struct Bridge<B: PoseBackend, R> {
  factory: Factory<B, R>,
  config: RefCell<AnalyzerConfig>,
  analyzer: RefCell<Option<Rc<Analyzer<B, R>>>>,
}

impl<B, R> Bridge<B, R>
where
  B: PoseBackend,
  R: ElementResolver<Element = B::Image>,
{
  pub fn new(factory: impl Fn(AnalyzerConfig) -> Analyzer<B, R> + 'static) -> Self {
    Self {
      factory: Box::new(factory),
      config: RefCell::new(AnalyzerConfig::default()),
      analyzer: RefCell::new(None),
    }
  }

  pub fn is_started(&self) -> bool {
    self.analyzer.borrow().is_some()
  }

  pub fn configure(&self, config: AnalyzerConfig) -> Result<(), BridgeError> {
    if self.is_started() {
      warn!("分析器已创建，忽略新的配置");
      return Err(BridgeError::AlreadyStarted);
    }
    *self.config.borrow_mut() = config;
    Ok(())
  }

  /// 解析 `movenet:lightning?basis=natural` 形式的配置
  pub fn configure_url(&self, url: &str) -> Result<(), BridgeError> {
    let config = AnalyzerConfig::from_url(&Url::parse(url)?)?;
    self.configure(config)?;
    info!("使用模型配置: {}", url);
    Ok(())
  }

  pub fn analyzer(&self) -> Rc<Analyzer<B, R>> {
    self
      .analyzer
      .borrow_mut()
      .get_or_insert_with(|| Rc::new((self.factory)(self.config.borrow().clone())))
      .clone()
  }

  pub async fn load(&self) -> Result<&'static str, AnalyzeError> {
    let analyzer = self.analyzer();
    if let Err(e) = analyzer.ensure_loaded().await {
      error!("{}", e);
      return Err(e);
    }
    Ok(LOADED_STATUS)
  }

  /// 返回姿态 JSON；任何失败都表现为 `None`
  pub async fn run(&self, id: &str) -> Option<String> {
    let analyzer = self.analyzer();
    analyzer.analyze(id).await
  }
}
