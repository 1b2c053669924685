// 该文件是 AI Vision 项目的一部分。
// src/pose.rs - 姿态与关键点定义
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

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// MoveNet 输出的 17 个 COCO 关键点名称，顺序与模型输出一致
pub const MOVENET_KEYPOINT_NAMES: [&str; 17] = [
  "nose",
  "left_eye",
  "right_eye",
  "left_ear",
  "right_ear",
  "left_shoulder",
  "right_shoulder",
  "left_elbow",
  "right_elbow",
  "left_wrist",
  "right_wrist",
  "left_hip",
  "right_hip",
  "left_knee",
  "right_knee",
  "left_ankle",
  "right_ankle",
];

/// 单个骨骼关键点
///
/// 推理库给出的是像素坐标，归一化之后为相对于元素尺寸的 [0, 1] 坐标。
/// 不做截断：检测器报告的越界坐标会保留在 [0, 1] 之外。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
  pub x: f64,
  pub y: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub score: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  /// 推理库附带的其它字段，原样透传
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Keypoint {
  pub fn new(name: &str, x: f64, y: f64, score: f64) -> Self {
    Self {
      x,
      y,
      score: Some(score),
      name: Some(name.to_string()),
      extra: Map::new(),
    }
  }
}

/// 一个检测到的人体姿态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
  pub keypoints: Vec<Keypoint>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub score: Option<f64>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Pose {
  pub fn new(keypoints: Vec<Keypoint>, score: Option<f64>) -> Self {
    Self {
      keypoints,
      score,
      extra: Map::new(),
    }
  }

  /// 按名称查找关键点
  pub fn keypoint(&self, name: &str) -> Option<&Keypoint> {
    self
      .keypoints
      .iter()
      .find(|kp| kp.name.as_deref() == Some(name))
  }

  /// 将像素坐标就地缩放到单位区间，x 除以宽度，y 除以高度
  pub fn normalize(&mut self, width: f64, height: f64) {
    for kp in self.keypoints.iter_mut() {
      kp.x /= width;
      kp.y /= height;
    }
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(self)
  }
}
