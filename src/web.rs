// 该文件是 AI Vision 项目的一部分。
// src/web.rs - 浏览器端 TensorFlow.js 桥接
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

//! Flutter 宿主通过 `window.loadAiModel()` 与 `window.runAiAnalysis(id)` 调用本模块。
//! 页面需要预先加载 `@tensorflow-models/pose-detection` 的 UMD 构建（全局 `poseDetection`）。

use std::rc::Rc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use wasm_bindgen::{JsCast, prelude::*};
use wasm_bindgen_futures::future_to_promise;
use web_sys::HtmlImageElement;

use crate::{
  analyzer::Analyzer,
  bridge::Bridge,
  element::{ElementResolver, ElementSize, ImageElement},
  logging,
  model::{DetectorConfig, EstimateOptions, MOVENET_MODEL_NAME, PoseBackend},
  pose::Pose,
};

#[wasm_bindgen]
extern "C" {
  /// poseDetection 返回的检测器对象
  pub type JsPoseDetector;

  #[wasm_bindgen(js_namespace = poseDetection, js_name = createDetector, catch)]
  async fn create_movenet_detector(model: &str, config: JsValue) -> Result<JsValue, JsValue>;

  #[wasm_bindgen(method, catch, js_name = estimatePoses)]
  async fn estimate(
    this: &JsPoseDetector,
    image: &HtmlImageElement,
    config: JsValue,
  ) -> Result<JsValue, JsValue>;
}

fn js_error(context: &str, err: JsValue) -> anyhow::Error {
  let detail = match err.dyn_ref::<js_sys::Error>() {
    Some(e) => String::from(e.message()),
    None => err.as_string().unwrap_or_else(|| format!("{:?}", err)),
  };
  anyhow!("{}: {}", context, detail)
}

fn to_js<T: Serialize>(value: &T) -> anyhow::Result<JsValue> {
  let json = serde_json::to_string(value)?;
  js_sys::JSON::parse(&json).map_err(|e| js_error("JSON.parse", e))
}

fn poses_from_js(value: &JsValue) -> anyhow::Result<Vec<Pose>> {
  let json = js_sys::JSON::stringify(value).map_err(|e| js_error("JSON.stringify", e))?;
  let poses = serde_json::from_str(&String::from(json))?;
  Ok(poses)
}

/// 基于全局 `poseDetection` 的推理后端
pub struct TfjsBackend;

#[async_trait(?Send)]
impl PoseBackend for TfjsBackend {
  type Image = HtmlImageElement;
  type Detector = JsPoseDetector;

  async fn create_detector(&self, config: &DetectorConfig) -> anyhow::Result<Self::Detector> {
    let js_config = to_js(config)?;
    let detector = create_movenet_detector(MOVENET_MODEL_NAME, js_config)
      .await
      .map_err(|e| js_error("poseDetection.createDetector", e))?;
    Ok(detector.unchecked_into())
  }

  async fn estimate_poses(
    &self,
    detector: &Self::Detector,
    image: &Self::Image,
    options: &EstimateOptions,
  ) -> anyhow::Result<Vec<Pose>> {
    let js_options = to_js(options)?;
    let poses = detector
      .estimate(image, js_options)
      .await
      .map_err(|e| js_error("detector.estimatePoses", e))?;
    poses_from_js(&poses)
  }
}

impl ImageElement for HtmlImageElement {
  fn natural_size(&self) -> ElementSize {
    ElementSize::new(self.natural_width(), self.natural_height())
  }

  fn rendered_size(&self) -> ElementSize {
    ElementSize::new(self.width(), self.height())
  }
}

/// 通过 `document.getElementById` 查找 `<img>` 元素
pub struct DocumentResolver;

impl ElementResolver for DocumentResolver {
  type Element = HtmlImageElement;

  fn resolve(&self, id: &str) -> Option<Self::Element> {
    let element = web_sys::window()?.document()?.get_element_by_id(id)?;
    match element.dyn_into::<HtmlImageElement>() {
      Ok(image) => Some(image),
      Err(_) => {
        warn!("元素 {} 不是 <img>", id);
        None
      }
    }
  }
}

pub type WebBridge = Bridge<TfjsBackend, DocumentResolver>;

thread_local! {
  static BRIDGE: Rc<WebBridge> = Rc::new(Bridge::new(|config| {
    Analyzer::with_config(TfjsBackend, DocumentResolver, config)
  }));
}

fn shared_bridge() -> Rc<WebBridge> {
  BRIDGE.with(Rc::clone)
}

/// 在首次加载前选择模型配置，例如 `movenet:lightning?basis=natural`
#[wasm_bindgen(js_name = configureAiModel)]
pub fn configure_ai_model(url: &str) -> Result<(), JsValue> {
  shared_bridge()
    .configure_url(url)
    .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen(js_name = loadAiModel)]
pub async fn load_ai_model() -> Result<String, JsValue> {
  let bridge = shared_bridge();
  bridge
    .load()
    .await
    .map(str::to_string)
    .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// 返回 JSON 字符串，未检测到姿态或出错时返回 `null`
#[wasm_bindgen(js_name = runAiAnalysis)]
pub async fn run_ai_analysis(image_element_id: String) -> JsValue {
  let bridge = shared_bridge();
  match bridge.run(&image_element_id).await {
    Some(json) => JsValue::from_str(&json),
    None => JsValue::NULL,
  }
}

/// 运行时调整控制台日志级别，例如 `setAiLogLevel("debug")`
#[wasm_bindgen(js_name = setAiLogLevel)]
pub fn set_ai_log_level(level: &str) -> Result<(), JsValue> {
  let level = level
    .trim()
    .parse::<LevelFilter>()
    .map_err(|e| JsValue::from_str(&e.to_string()))?;
  logging::set_level(level).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// 宿主直接调用 `window.loadAiModel` / `window.runAiAnalysis`
fn install_window_bindings() -> Result<(), JsValue> {
  let Some(window) = web_sys::window() else {
    return Ok(());
  };

  let load = Closure::<dyn Fn() -> js_sys::Promise>::new(|| {
    future_to_promise(async { load_ai_model().await.map(JsValue::from) })
  });
  js_sys::Reflect::set(&window, &JsValue::from_str("loadAiModel"), load.as_ref())?;
  load.forget();

  let run = Closure::<dyn Fn(String) -> js_sys::Promise>::new(|id: String| {
    future_to_promise(async move { Ok(run_ai_analysis(id).await) })
  });
  js_sys::Reflect::set(&window, &JsValue::from_str("runAiAnalysis"), run.as_ref())?;
  run.forget();

  Ok(())
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
  console_error_panic_hook::set_once();
  logging::init();
  install_window_bindings()?;
  info!("AI Vision 桥接已就绪");
  Ok(())
}
