// 该文件是 Shiwu （识物） 项目的一部分。
// src/frame.rs - 解码图像与 NHWC/NCHW 帧定义
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

use std::path::PathBuf;

use image::{RgbImage, imageops::FilterType};

const RGB_CHANNELS: usize = 3;

/// 一张已解码的图片，保持原始分辨率
#[derive(Debug, Clone)]
pub struct ImageFrame {
  /// 在输入序列中的位置
  pub index: usize,
  /// 图片来源路径
  pub source: PathBuf,
  /// RGB 位图
  pub image: RgbImage,
}

impl ImageFrame {
  pub fn new(index: usize, source: PathBuf, image: RgbImage) -> Self {
    Self {
      index,
      source,
      image,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
  Nhwc,
  Nchw,
}

pub trait AsNchwFrame {
  fn as_nchw(&self) -> &[u8];
}

pub trait AsNhwcFrame {
  fn as_nhwc(&self) -> &[u8];
}

fn resized(image: &RgbImage, width: u32, height: u32) -> Option<RgbImage> {
  if image.dimensions() == (width, height) {
    None
  } else {
    Some(image::imageops::resize(
      image,
      width,
      height,
      FilterType::Triangle,
    ))
  }
}

fn normalize(data: &[u8], mean: f32, std: f32) -> Vec<f32> {
  data.iter().map(|&v| (v as f32 - mean) / std).collect()
}

#[derive(Debug, Clone)]
pub struct RgbNhwcFrame {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl RgbNhwcFrame {
  /// 缩放到模型输入尺寸后转换，尺寸一致时不做缩放
  pub fn resize_from(image: &RgbImage, width: u32, height: u32) -> Self {
    match resized(image, width, height) {
      Some(image) => Self::from(&image),
      None => Self::from(image),
    }
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn to_normalized_f32(&self, mean: f32, std: f32) -> Vec<f32> {
    normalize(&self.data, mean, std)
  }

  pub fn into_raw(self) -> Vec<u8> {
    self.data.into_vec()
  }
}

impl From<&RgbImage> for RgbNhwcFrame {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    // RgbImage 的内存排布本身就是 HWC
    Self {
      width: width as usize,
      height: height as usize,
      data: image.as_raw().clone().into_boxed_slice(),
    }
  }
}

impl AsNhwcFrame for RgbNhwcFrame {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

#[derive(Debug, Clone)]
pub struct RgbNchwFrame {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl RgbNchwFrame {
  pub fn resize_from(image: &RgbImage, width: u32, height: u32) -> Self {
    match resized(image, width, height) {
      Some(image) => Self::from(&image),
      None => Self::from(image),
    }
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn to_normalized_f32(&self, mean: f32, std: f32) -> Vec<f32> {
    normalize(&self.data, mean, std)
  }

  pub fn into_raw(self) -> Vec<u8> {
    self.data.into_vec()
  }
}

impl From<&RgbImage> for RgbNchwFrame {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let (width, height) = (width as usize, height as usize);
    let plane = width * height;

    let mut data = vec![0u8; RGB_CHANNELS * plane];
    for (x, y, pixel) in image.enumerate_pixels() {
      let idx = (y as usize) * width + (x as usize);
      data[idx] = pixel[0];
      data[plane + idx] = pixel[1];
      data[2 * plane + idx] = pixel[2];
    }
    Self {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }
}

impl AsNchwFrame for RgbNchwFrame {
  fn as_nchw(&self) -> &[u8] {
    &self.data
  }
}
