// 该文件是 Shiwu （识物） 项目的一部分。
// src/model.rs - 模型
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

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 图像像素坐标下的轴对齐边界框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

impl BoundingBox {
  pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
    }
  }

  /// 由归一化的 [ymin, xmin, ymax, xmax] 转换到像素坐标，并裁剪到图像内
  pub fn from_normalized(
    ymin: f32,
    xmin: f32,
    ymax: f32,
    xmax: f32,
    image_width: u32,
    image_height: u32,
  ) -> Self {
    let (w, h) = (image_width as f32, image_height as f32);
    Self {
      left: (xmin * w).clamp(0.0, w),
      top: (ymin * h).clamp(0.0, h),
      right: (xmax * w).clamp(0.0, w),
      bottom: (ymax * h).clamp(0.0, h),
    }
  }

  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
  pub index: i64,
  pub label: String,
  pub score: f32,
}

impl Category {
  /// 置信度百分比，向零截断
  pub fn percent(&self) -> i32 {
    (self.score * 100.0) as i32
  }
}

#[derive(Debug, Clone)]
pub struct DetectItem {
  pub bbox: BoundingBox,
  /// 按置信度从高到低排列
  pub categories: Box<[Category]>,
}

impl DetectItem {
  pub fn top_category(&self) -> Option<&Category> {
    self.categories.first()
  }

  pub fn score(&self) -> f32 {
    self.top_category().map(|c| c.score).unwrap_or(0.0)
  }

  /// 生成显示文本，例如 "salad, 87%"
  pub fn display_text(&self) -> Option<String> {
    self
      .top_category()
      .map(|c| format!("{}, {}%", c.label, c.percent()))
  }
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn new(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem> {
    self.items.iter()
  }
}

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.3;

/// 检测选项：结果数量上限、置信度阈值、标签白名单/黑名单
#[derive(Debug, Clone, PartialEq)]
pub struct DetectOptions {
  /// `None` 表示不限制
  pub max_results: Option<usize>,
  pub score_threshold: f32,
  pub label_allowlist: Vec<String>,
  pub label_denylist: Vec<String>,
}

impl Default for DetectOptions {
  fn default() -> Self {
    Self {
      max_results: Some(DEFAULT_MAX_RESULTS),
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      label_allowlist: Vec::new(),
      label_denylist: Vec::new(),
    }
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum DetectOptionsError {
  #[error("结果数量上限不能为 0")]
  ZeroMaxResults,
  #[error("置信度阈值无效: {0}")]
  InvalidThreshold(f32),
  #[error("标签白名单与黑名单不能同时设置")]
  ConflictingLabelLists,
}

impl DetectOptions {
  pub fn validate(&self) -> Result<(), DetectOptionsError> {
    if self.max_results == Some(0) {
      return Err(DetectOptionsError::ZeroMaxResults);
    }
    if !self.score_threshold.is_finite() {
      return Err(DetectOptionsError::InvalidThreshold(self.score_threshold));
    }
    if !self.label_allowlist.is_empty() && !self.label_denylist.is_empty() {
      return Err(DetectOptionsError::ConflictingLabelLists);
    }
    Ok(())
  }

  pub fn accepts_label(&self, label: &str) -> bool {
    if !self.label_allowlist.is_empty() {
      return self.label_allowlist.iter().any(|l| l == label);
    }
    !self.label_denylist.iter().any(|l| l == label)
  }

  pub fn accepts_score(&self, score: f32) -> bool {
    score >= self.score_threshold
  }
}

mod label;
pub use self::label::{LabelError, LabelMap};

mod ssd;
pub use self::ssd::{RawSsdOutput, SsdDetector, SsdDetectorBuilder, SsdError, postprocess};
