// 该文件是 AI Vision 项目的一部分。
// src/logging.rs - 日志初始化
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

use std::sync::OnceLock;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{Registry, filter::LevelFilter, prelude::*, reload};

/// 未设置 `RUST_LOG` 或无法解析时的默认级别
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::INFO;

type LevelHandle = reload::Handle<LevelFilter, Registry>;

static LEVEL_HANDLE: OnceLock<Option<LevelHandle>> = OnceLock::new();

#[derive(Error, Debug)]
pub enum LoggingError {
  #[error("日志系统尚未由本库初始化")]
  NotInitialized,
  #[error("无法调整日志级别: {0}")]
  Reload(#[from] reload::Error),
}

/// 浏览器控制台的输出方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMethod {
  Log,
  Warn,
  Error,
}

impl From<&Level> for ConsoleMethod {
  fn from(level: &Level) -> Self {
    match *level {
      Level::ERROR => ConsoleMethod::Error,
      Level::WARN => ConsoleMethod::Warn,
      _ => ConsoleMethod::Log,
    }
  }
}

/// 解析 `RUST_LOG` 形式的单一级别，例如 `debug`、`warn`、`off`
pub fn initial_level(value: Option<&str>) -> LevelFilter {
  value
    .and_then(|v| v.trim().parse::<LevelFilter>().ok())
    .unwrap_or(DEFAULT_LEVEL)
}

/// 安装全局 tracing 订阅器，重复调用无副作用
///
/// 初始级别取自 `RUST_LOG`，之后可以用 [`set_level`] 调整。
/// wasm32 下没有可用的系统时钟，输出不带时间戳，并按级别写入
/// `console.log` / `console.warn` / `console.error`。
pub fn init() {
  LEVEL_HANDLE.get_or_init(|| {
    let level = initial_level(std::env::var("RUST_LOG").ok().as_deref());
    let (filter, handle) = reload::Layer::new(level);

    #[cfg(target_arch = "wasm32")]
    let layer = tracing_subscriber::fmt::layer()
      .with_writer(console::ConsoleMakeWriter)
      .with_ansi(false)
      .without_time();

    #[cfg(not(target_arch = "wasm32"))]
    let layer = tracing_subscriber::fmt::layer();

    match tracing_subscriber::registry().with(filter).with(layer).try_init() {
      Ok(()) => {
        tracing::info!("日志系统初始化完成，级别 {}", level);
        Some(handle)
      }
      Err(_) => None,
    }
  });
}

/// 运行时调整日志级别
pub fn set_level(level: LevelFilter) -> Result<(), LoggingError> {
  let handle = LEVEL_HANDLE
    .get()
    .and_then(Option::as_ref)
    .ok_or(LoggingError::NotInitialized)?;
  handle.reload(level)?;
  tracing::info!("日志级别调整为 {}", level);
  Ok(())
}

/// 当前生效的日志级别，未初始化时为 `None`
pub fn current_level() -> Option<LevelFilter> {
  LEVEL_HANDLE.get()?.as_ref()?.clone_current()
}

#[cfg(target_arch = "wasm32")]
mod console {
  use std::io;

  use tracing::{Level, Metadata};
  use tracing_subscriber::fmt::MakeWriter;

  use super::ConsoleMethod;

  pub struct ConsoleMakeWriter;

  /// 缓冲一条日志事件，在析构时整体写入控制台
  pub struct ConsoleWriter {
    method: ConsoleMethod,
    buffer: Vec<u8>,
  }

  impl ConsoleWriter {
    fn new(level: &Level) -> Self {
      Self {
        method: ConsoleMethod::from(level),
        buffer: Vec::new(),
      }
    }
  }

  impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
      self.buffer.extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  impl Drop for ConsoleWriter {
    fn drop(&mut self) {
      let text = String::from_utf8_lossy(&self.buffer);
      let text = text.trim_end();
      if text.is_empty() {
        return;
      }
      let message = wasm_bindgen::JsValue::from_str(text);
      match self.method {
        ConsoleMethod::Error => web_sys::console::error_1(&message),
        ConsoleMethod::Warn => web_sys::console::warn_1(&message),
        ConsoleMethod::Log => web_sys::console::log_1(&message),
      }
    }
  }

  impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
      ConsoleWriter::new(&Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
      ConsoleWriter::new(meta.level())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn levels_map_to_console_methods() {
    assert_eq!(ConsoleMethod::from(&Level::ERROR), ConsoleMethod::Error);
    assert_eq!(ConsoleMethod::from(&Level::WARN), ConsoleMethod::Warn);
    assert_eq!(ConsoleMethod::from(&Level::INFO), ConsoleMethod::Log);
    assert_eq!(ConsoleMethod::from(&Level::TRACE), ConsoleMethod::Log);
  }

  #[test]
  fn init_twice_is_harmless() {
    init();
    init();
  }

  #[test]
  fn initial_level_reads_rust_log() {
    assert_eq!(initial_level(None), LevelFilter::INFO);
    assert_eq!(initial_level(Some("debug")), LevelFilter::DEBUG);
    assert_eq!(initial_level(Some(" TRACE ")), LevelFilter::TRACE);
    assert_eq!(initial_level(Some("off")), LevelFilter::OFF);
    // 带目标的指令不在支持范围内
    assert_eq!(initial_level(Some("ai_vision=debug")), LevelFilter::INFO);
  }

  #[test]
  fn debug_output_can_be_enabled_at_runtime() {
    init();
    set_level(LevelFilter::DEBUG).unwrap();
    assert_eq!(current_level(), Some(LevelFilter::DEBUG));
    assert!(tracing::enabled!(Level::DEBUG));

    set_level(LevelFilter::INFO).unwrap();
    assert_eq!(current_level(), Some(LevelFilter::INFO));
  }
}
