// 该文件是 Shiwu （识物） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{BoundingBox, DetectResult};

// 文本渲染常量
pub const MAX_FONT_SIZE: f32 = 96.0;
const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_STROKE_WIDTH: i32 = 5;
const TEXT_COLOR: [u8; 3] = [255, 255, 0]; // 黄色
const TEXT_STROKE_WIDTH: i32 = 2;

static FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法加载字体: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 一个待绘制的检测结果：边界框与显示文本
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
  pub bbox: BoundingBox,
  pub text: String,
}

impl Annotation {
  pub fn from_result(result: &DetectResult) -> Vec<Annotation> {
    result
      .iter()
      .filter_map(|item| match item.display_text() {
        Some(text) => Some(Annotation {
          bbox: item.bbox,
          text,
        }),
        None => {
          warn!("检测结果没有类别，跳过: {:?}", item.bbox);
          None
        }
      })
      .collect()
  }
}

/// 文本位置：字号、左侧 x、基线 y
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextPlacement {
  pub font_size: f32,
  pub x: f32,
  pub baseline: f32,
}

pub struct Draw {
  font: FontArc,
  max_font_size: f32,
  box_color: [u8; 3],
  box_stroke_width: i32,
  text_color: [u8; 3],
  text_stroke_width: i32,
}

impl Draw {
  /// 使用内嵌的 DejaVu Sans 字体
  pub fn new() -> Result<Self, DrawError> {
    let font = FontArc::try_from_slice(FONT_DATA)?;
    Ok(Self::with_font(font))
  }

  pub fn with_font(font: FontArc) -> Self {
    Self {
      font,
      max_font_size: MAX_FONT_SIZE,
      box_color: BOX_COLOR,
      box_stroke_width: BOX_STROKE_WIDTH,
      text_color: TEXT_COLOR,
      text_stroke_width: TEXT_STROKE_WIDTH,
    }
  }

  /// 计算文本在框内的位置和字号
  ///
  /// 先以最大字号测量文本，再按框宽等比缩小字号（不超过最大字号）。
  /// 边距和基线偏移都沿用最大字号下的测量值。
  /// 字号小于 1 像素时返回 `None`。
  pub fn place_text(&self, bbox: &BoundingBox, text: &str) -> Option<TextPlacement> {
    let (text_width, text_height) = text_size(PxScale::from(self.max_font_size), &self.font, text);
    if text_width == 0 {
      return None;
    }

    let (text_width, text_height) = (text_width as f32, text_height as f32);
    let box_width = bbox.width();

    let fitted = self.max_font_size * box_width / text_width;
    let font_size = if fitted < self.max_font_size {
      fitted
    } else {
      self.max_font_size
    };
    if font_size < 1.0 {
      return None;
    }

    let margin = ((box_width - text_width) / 2.0).max(0.0);

    Some(TextPlacement {
      font_size,
      x: bbox.left + margin,
      baseline: bbox.top + text_height,
    })
  }

  // 描边以框线为中心，向内外各扩展一半
  fn draw_box(&self, image: &mut RgbImage, bbox: &BoundingBox) {
    let left = bbox.left.round() as i32;
    let top = bbox.top.round() as i32;
    let right = bbox.right.round() as i32;
    let bottom = bbox.bottom.round() as i32;

    let half = self.box_stroke_width / 2;
    for d in -half..=half {
      let width = right - left - 2 * d + 1;
      let height = bottom - top - 2 * d + 1;
      if width <= 0 || height <= 0 {
        continue;
      }
      let rect = Rect::at(left + d, top + d).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.box_color));
    }
  }

  fn draw_label(&self, image: &mut RgbImage, text: &str, placement: &TextPlacement) {
    let scale = PxScale::from(placement.font_size);
    // draw_text_mut 以文本顶部定位，这里换算成基线
    let ascent = self.font.as_scaled(scale).ascent();
    let x = placement.x.round() as i32;
    let y = (placement.baseline - ascent).round() as i32;

    let half = self.text_stroke_width / 2;
    for dy in -half..=half {
      for dx in -half..=half {
        draw_text_mut(
          image,
          Rgb(self.text_color),
          x + dx,
          y + dy,
          scale,
          &self.font,
          text,
        );
      }
    }
  }

  pub fn draw_annotation(&self, image: &mut RgbImage, annotation: &Annotation) {
    self.draw_box(image, &annotation.bbox);

    match self.place_text(&annotation.bbox, &annotation.text) {
      Some(placement) => {
        debug!(
          "绘制标签 '{}': 字号 {:.1}, 位置 ({:.0}, {:.0})",
          annotation.text, placement.font_size, placement.x, placement.baseline
        );
        self.draw_label(image, &annotation.text, &placement);
      }
      None => debug!("边界框过窄，不绘制标签 '{}'", annotation.text),
    }
  }

  /// 在图像副本上绘制所有检测结果，原图不变
  pub fn draw_detections(&self, image: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut output = image.clone();
    for annotation in Annotation::from_result(result) {
      self.draw_annotation(&mut output, &annotation);
    }
    output
  }
}
