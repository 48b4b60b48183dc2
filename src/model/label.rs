// 该文件是 Shiwu （识物） 项目的一部分。
// src/model/label.rs - 标签表
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

use std::{collections::HashMap, path::Path};

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("标签文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件格式混用, 第 {line} 行: {content}")]
  MixedFormat { line: usize, content: String },
}

/// 类别编号到标签名的映射
///
/// 支持两种文本格式：
/// - 每行一个标签，行号即类别编号（TFLite labelmap 风格）
/// - 每行 `<编号> <标签>`
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
  labels: HashMap<i64, String>,
}

fn split_indexed(line: &str) -> Option<(i64, &str)> {
  let (id, rest) = line.split_once(char::is_whitespace)?;
  let id = id.parse::<i64>().ok()?;
  let rest = rest.trim();
  (!rest.is_empty()).then_some((id, rest))
}

impl LabelMap {
  pub fn load(path: &Path) -> Result<Self, LabelError> {
    let content = std::fs::read_to_string(path)?;
    let map = Self::parse(&content)?;
    debug!("从 {} 加载了 {} 个标签", path.display(), map.len());
    Ok(map)
  }

  pub fn parse(content: &str) -> Result<Self, LabelError> {
    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    let indexed = lines
      .iter()
      .find(|l| !l.is_empty())
      .map(|l| split_indexed(l).is_some())
      .unwrap_or(false);

    let mut labels = HashMap::new();
    for (line_no, line) in lines.iter().enumerate() {
      if line.is_empty() {
        continue;
      }
      if indexed {
        let (id, label) = split_indexed(line).ok_or_else(|| LabelError::MixedFormat {
          line: line_no + 1,
          content: line.to_string(),
        })?;
        labels.insert(id, label.to_string());
      } else {
        labels.insert(line_no as i64, line.to_string());
      }
    }

    Ok(Self { labels })
  }

  pub fn get(&self, index: i64) -> Option<&str> {
    self.labels.get(&index).map(String::as_str)
  }

  /// 找不到标签时退化为类别编号
  pub fn label_or_index(&self, index: i64) -> String {
    self
      .get(index)
      .map(str::to_string)
      .unwrap_or_else(|| index.to_string())
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}
