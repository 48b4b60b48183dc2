// 该文件是 Shiwu （识物） 项目的一部分。
// src/input/read_directory.rs - 目录图像输入
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

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ImageFrame,
  input::{ImageFileInputError, decode_image},
  url_to_path,
};

pub const SUPPORTED_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tif", "tiff"];

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("路径编码无效: {0}")]
  PathEncoding(#[from] std::string::FromUtf8Error),
  #[error("不是目录: {0}")]
  NotADirectory(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("{path}: {source}")]
  Decode {
    path: PathBuf,
    source: ImageFileInputError,
  },
}

/// 目录输入：构造时列出文件，逐张懒解码
pub struct DirectoryInput {
  entries: std::vec::IntoIter<PathBuf>,
  index: usize,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch);
    }
    Self::open(&url_to_path(url)?)
  }
}

fn is_supported(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      let ext = ext.to_ascii_lowercase();
      SUPPORTED_EXTENSIONS.contains(&ext.as_str())
    })
    .unwrap_or(false)
}

impl DirectoryInput {
  pub fn open(directory: &Path) -> Result<Self, DirectoryInputError> {
    if !directory.is_dir() {
      return Err(DirectoryInputError::NotADirectory(directory.to_path_buf()));
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && is_supported(&path) {
        entries.push(path);
      } else {
        debug!("跳过非图片文件: {}", path.display());
      }
    }
    entries.sort();

    info!("目录 {} 中共有 {} 张图片", directory.display(), entries.len());

    Ok(Self {
      entries: entries.into_iter(),
      index: 0,
    })
  }

  pub fn remaining(&self) -> usize {
    self.entries.len()
  }
}

impl Iterator for DirectoryInput {
  type Item = Result<ImageFrame, DirectoryInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.entries.next()?;
    let index = self.index;
    self.index += 1;

    Some(match decode_image(&path) {
      Ok(image) => Ok(ImageFrame::new(index, path, image)),
      Err(source) => Err(DirectoryInputError::Decode { path, source }),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn lists_images_in_sorted_order() {
    let dir = tempfile::tempdir().unwrap();
    let image = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
    image.save(dir.path().join("b.png")).unwrap();
    image.save(dir.path().join("a.PNG")).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
    std::fs::create_dir(dir.path().join("nested.png")).unwrap();

    let input = DirectoryInput::open(dir.path()).unwrap();
    assert_eq!(input.remaining(), 2);

    let frames: Vec<_> = input.map(|f| f.unwrap()).collect();
    assert_eq!(frames[0].source.file_name().unwrap(), "a.PNG");
    assert_eq!(frames[1].source.file_name().unwrap(), "b.png");
    assert_eq!(frames[1].index, 1);
  }

  #[test]
  fn broken_image_does_not_stop_iteration() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("0-broken.jpg"), b"garbage").unwrap();
    RgbImage::new(2, 2).save(dir.path().join("1-ok.png")).unwrap();

    let mut input = DirectoryInput::open(dir.path()).unwrap();
    assert!(matches!(
      input.next(),
      Some(Err(DirectoryInputError::Decode { .. }))
    ));
    let frame = input.next().unwrap().unwrap();
    assert_eq!(frame.index, 1);
    assert!(input.next().is_none());
  }

  #[test]
  fn file_is_not_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("x.png");
    std::fs::write(&file, b"").unwrap();
    assert!(matches!(
      DirectoryInput::open(&file),
      Err(DirectoryInputError::NotADirectory(_))
    ));
  }
}
