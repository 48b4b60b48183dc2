// 该文件是 Shiwu （识物） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};

use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ImageFrame,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, DrawError},
  },
  url_to_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("未知的记录格式: {0}")]
  UnknownRecord(String),
  #[error("路径编码无效: {0}")]
  PathEncoding(#[from] std::string::FromUtf8Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
}

/// 检测结果旁路记录格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
  None,
  Text,
  Json,
}

impl Record {
  fn with(kind: &str) -> Result<Self, DirectoryRecordOutputError> {
    match kind {
      "none" => Ok(Record::None),
      "txt" | "text" => Ok(Record::Text),
      "json" => Ok(Record::Json),
      other => Err(DirectoryRecordOutputError::UnknownRecord(other.to_string())),
    }
  }

  pub fn record(
    &self,
    frame: &ImageFrame,
    result: &DetectResult,
    path: &Path,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      Record::None => {}
      Record::Text => {
        let mut records = Vec::new();
        for item in result.iter() {
          let Some(category) = item.top_category() else {
            continue;
          };
          records.push(format!(
            "{}, {:.4}, {:.1}, {:.1}, {:.1}, {:.1}",
            category.label,
            category.score,
            item.bbox.left,
            item.bbox.top,
            item.bbox.right,
            item.bbox.bottom
          ));
        }
        std::fs::write(path.with_extension("txt"), records.join("\n"))?;
      }
      Record::Json => {
        let detections: Vec<_> = result
          .iter()
          .map(|item| {
            let categories: Vec<_> = item
              .categories
              .iter()
              .map(|c| json!({ "index": c.index, "label": c.label, "score": c.score }))
              .collect();
            json!({
              "text": item.display_text(),
              "bbox": {
                "left": item.bbox.left,
                "top": item.bbox.top,
                "right": item.bbox.right,
                "bottom": item.bbox.bottom,
              },
              "categories": categories,
            })
          })
          .collect();
        let document = json!({
          "source": frame.source.display().to_string(),
          "width": frame.width(),
          "height": frame.height(),
          "detections": detections,
        });
        std::fs::write(
          path.with_extension("json"),
          serde_json::to_string_pretty(&document)?,
        )?;
      }
    }
    Ok(())
  }
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  record: Record,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let mut record = Record::None;
    for (k, v) in uri.query_pairs() {
      if k == "record" {
        record = Record::with(&v)?;
        break;
      }
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: url_to_path(uri)?,
      draw: Draw::new()?,
      record,
      always,
    })
  }
}

impl DirectoryRecordOutput {
  pub fn frame_path(&self, frame: &ImageFrame) -> PathBuf {
    let stem = frame
      .source
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "frame".to_string());
    self.directory.join(format!("{:04}-{}.png", frame.index, stem))
  }
}

impl Render<ImageFrame, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &ImageFrame, result: &DetectResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("{} 没有检测结果，跳过保存", frame.source.display());
      return Ok(());
    }

    std::fs::create_dir_all(&self.directory)?;
    let path = self.frame_path(frame);

    let image = self.draw.draw_detections(&frame.image, result);
    image.save(&path)?;
    self.record.record(frame, result, &path)?;

    info!("保存图像到文件: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{BoundingBox, Category, DetectItem};
  use image::RgbImage;

  fn frame() -> ImageFrame {
    ImageFrame::new(3, "/photos/lunch.jpg".into(), RgbImage::new(40, 30))
  }

  fn result() -> DetectResult {
    DetectResult::new(vec![DetectItem {
      bbox: BoundingBox::new(1.0, 2.0, 30.0, 20.0),
      categories: vec![Category {
        index: 2,
        label: "salad".to_string(),
        score: 0.5,
      }]
      .into_boxed_slice(),
    }])
  }

  fn output(query: &str, dir: &Path) -> DirectoryRecordOutput {
    let url = url::Url::parse(&format!("folder://{}{}", dir.display(), query)).unwrap();
    DirectoryRecordOutput::from_url(&url).unwrap()
  }

  #[test]
  fn writes_image_and_text_record() {
    let dir = tempfile::tempdir().unwrap();
    let output = output("?record=txt", dir.path());
    output.render_result(&frame(), &result()).unwrap();

    let image_path = dir.path().join("0003-lunch.png");
    assert!(image_path.exists());
    let text = std::fs::read_to_string(image_path.with_extension("txt")).unwrap();
    assert_eq!(text, "salad, 0.5000, 1.0, 2.0, 30.0, 20.0");
  }

  #[test]
  fn writes_json_record() {
    let dir = tempfile::tempdir().unwrap();
    let output = output("?record=json", dir.path());
    output.render_result(&frame(), &result()).unwrap();

    let content = std::fs::read_to_string(dir.path().join("0003-lunch.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["width"], 40);
    assert_eq!(value["detections"][0]["text"], "salad, 50%");
    assert_eq!(value["detections"][0]["categories"][0]["label"], "salad");
  }

  #[test]
  fn empty_results_are_skipped_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let skipping = output("", dir.path());
    skipping.render_result(&frame(), &DetectResult::default()).unwrap();
    assert!(!dir.path().join("0003-lunch.png").exists());

    let always = output("?always", dir.path());
    always.render_result(&frame(), &DetectResult::default()).unwrap();
    assert!(dir.path().join("0003-lunch.png").exists());
  }

  #[test]
  fn unknown_record_kind() {
    let url = url::Url::parse("folder:///tmp/out?record=xml").unwrap();
    assert!(matches!(
      DirectoryRecordOutput::from_url(&url),
      Err(DirectoryRecordOutputError::UnknownRecord(_))
    ));
  }
}
