// 该文件是 Shiwu （识物） 项目的一部分。
// src/model/ssd.rs - SSD 类检测模型（ONNX Runtime 推理）
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

use std::{
  path::{Path, PathBuf},
  str::FromStr,
  sync::Mutex,
};

use ndarray::Array4;
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  tensor::TensorElementType,
  value::{DynValue, Tensor},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ImageFrame, RgbNchwFrame, RgbNhwcFrame, TensorLayout},
  model::{
    BoundingBox, Category, DetectItem, DetectOptions, DetectOptionsError, DetectResult, Model,
    label::{LabelError, LabelMap},
  },
  url_to_path,
};

const SSD_BOXES_NAME: &str = "detection_boxes";
const SSD_CLASSES_NAME: &str = "detection_classes";
const SSD_SCORES_NAME: &str = "detection_scores";
const SSD_COUNT_NAME: &str = "num_detections";
const SSD_MIN_OUTPUTS: usize = 3;

// 浮点模型的默认归一化参数：(v - 127.5) / 127.5
const SSD_DEFAULT_MEAN: f32 = 127.5;
const SSD_DEFAULT_STD: f32 = 127.5;

#[derive(Error, Debug)]
pub enum SsdError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("检测选项无效: {0}")]
  InvalidOptions(String),
  #[error("检测选项无效: {0}")]
  DetectOptionsError(#[from] DetectOptionsError),
  #[error("标签错误: {0}")]
  LabelError(#[from] LabelError),
  #[error("张量形状错误: {0}")]
  ShapeError(#[from] ndarray::ShapeError),
  #[error("推理会话锁已损坏")]
  Poisoned,
}

impl SsdError {
  fn ort(err: impl std::fmt::Display) -> Self {
    SsdError::OrtError(err.to_string())
  }

  fn invalid(msg: impl Into<String>) -> Self {
    let msg = msg.into();
    error!("{}", msg);
    SsdError::ModelInvalid(msg)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputElement {
  U8,
  F32,
}

impl InputElement {
  fn from_ort(ty: TensorElementType) -> Result<Self, SsdError> {
    match ty {
      TensorElementType::Uint8 => Ok(InputElement::U8),
      TensorElementType::Float32 => Ok(InputElement::F32),
      other => Err(SsdError::invalid(format!(
        "不支持的输入张量类型: {:?}",
        other
      ))),
    }
  }
}

/// 模型输入描述，`size` 为 `None` 时表示空间尺寸动态，直接送入原图
#[derive(Debug, Clone, PartialEq)]
struct InputSpec {
  name: String,
  layout: TensorLayout,
  size: Option<(u32, u32)>,
  element: InputElement,
}

impl InputSpec {
  fn from_dims(name: String, dims: &[i64], element: InputElement) -> Result<Self, SsdError> {
    if dims.len() != 4 {
      return Err(SsdError::invalid(format!(
        "预期模型输入为 4 维, 实际为 {:?}",
        dims
      )));
    }

    let (layout, h, w) = if dims[3] == 3 {
      (TensorLayout::Nhwc, dims[1], dims[2])
    } else if dims[1] == 3 {
      (TensorLayout::Nchw, dims[2], dims[3])
    } else {
      return Err(SsdError::invalid(format!(
        "无法识别模型输入布局: {:?}",
        dims
      )));
    };

    let size = (h > 0 && w > 0).then_some((w as u32, h as u32));
    Ok(Self {
      name,
      layout,
      size,
      element,
    })
  }
}

#[derive(Debug, Clone, PartialEq)]
struct SsdOutputNames {
  boxes: String,
  classes: String,
  scores: String,
  count: Option<String>,
}

impl SsdOutputNames {
  /// 优先按约定名称匹配，否则按后处理 SSD 的输出顺序（框、类别、分数、数量）
  fn resolve(names: &[String]) -> Result<Self, SsdError> {
    let find = |name: &str| names.iter().find(|n| n.as_str() == name).cloned();

    if let (Some(boxes), Some(classes), Some(scores)) = (
      find(SSD_BOXES_NAME),
      find(SSD_CLASSES_NAME),
      find(SSD_SCORES_NAME),
    ) {
      debug!("按名称匹配模型输出");
      return Ok(Self {
        boxes,
        classes,
        scores,
        count: find(SSD_COUNT_NAME),
      });
    }

    if names.len() < SSD_MIN_OUTPUTS {
      return Err(SsdError::invalid(format!(
        "预期模型输出数量至少为 {}, 实际为 {}",
        SSD_MIN_OUTPUTS,
        names.len()
      )));
    }

    debug!("按位置匹配模型输出: {:?}", names);
    Ok(Self {
      boxes: names[0].clone(),
      classes: names[1].clone(),
      scores: names[2].clone(),
      count: names.get(3).cloned(),
    })
  }
}

/// 模型原始输出，框为归一化的 [ymin, xmin, ymax, xmax]
#[derive(Debug, Clone, Default)]
pub struct RawSsdOutput {
  pub boxes: Vec<f32>,
  pub classes: Vec<f32>,
  pub scores: Vec<f32>,
  pub count: Option<usize>,
}

/// 将原始输出转换为像素坐标下的检测结果
pub fn postprocess(
  raw: &RawSsdOutput,
  image_width: u32,
  image_height: u32,
  labels: &LabelMap,
  label_offset: i64,
  options: &DetectOptions,
) -> DetectResult {
  let available = raw
    .scores
    .len()
    .min(raw.classes.len())
    .min(raw.boxes.len() / 4);
  let count = raw.count.unwrap_or(available).min(available);

  let mut items = Vec::with_capacity(count);
  for i in 0..count {
    let score = raw.scores[i];
    if !options.accepts_score(score) {
      continue;
    }

    let index = (raw.classes[i] as i64).saturating_add(label_offset);
    let label = labels.label_or_index(index);
    if !options.accepts_label(&label) {
      debug!("标签 {} 被过滤", label);
      continue;
    }

    let b = &raw.boxes[4 * i..4 * i + 4];
    let bbox = BoundingBox::from_normalized(b[0], b[1], b[2], b[3], image_width, image_height);

    items.push(DetectItem {
      bbox,
      categories: vec![Category {
        index,
        label,
        score,
      }]
      .into_boxed_slice(),
    });
  }

  items.sort_by(|a, b| b.score().total_cmp(&a.score()));
  if let Some(max) = options.max_results {
    items.truncate(max);
  }

  debug!("检测到 {} 个物体", items.len());
  DetectResult::new(items)
}

pub struct SsdDetectorBuilder {
  model_path: PathBuf,
  labels_path: Option<PathBuf>,
  threads: Option<usize>,
  label_offset: i64,
  mean: f32,
  std: f32,
  options: DetectOptions,
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, SsdError> {
  value
    .parse::<T>()
    .map_err(|_| SsdError::ModelPathError(format!("参数 {} 的值无效: {}", key, value)))
}

fn parse_max_results(value: &str) -> Result<Option<usize>, SsdError> {
  match value {
    "all" | "-1" => Ok(None),
    _ => match parse_value::<usize>("max_results", value)? {
      0 => Err(DetectOptionsError::ZeroMaxResults.into()),
      n => Ok(Some(n)),
    },
  }
}

fn parse_list(value: &str) -> Vec<String> {
  value
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
    .collect()
}

impl FromUrlWithScheme for SsdDetectorBuilder {
  const SCHEME: &'static str = "ssd";
}

impl FromUrl for SsdDetectorBuilder {
  type Error = SsdError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(SsdError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let path = url_to_path(url).map_err(|e| SsdError::ModelPathError(e.to_string()))?;
    let mut builder = SsdDetectorBuilder::new(path);

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "labels" => builder.labels_path = Some(PathBuf::from(value.as_ref())),
        "threads" => builder.threads = Some(parse_value(&key, &value)?),
        "max_results" => builder.options.max_results = parse_max_results(&value)?,
        "score_threshold" => builder.options.score_threshold = parse_value(&key, &value)?,
        "label_offset" => builder.label_offset = parse_value(&key, &value)?,
        "allow" => builder.options.label_allowlist = parse_list(&value),
        "deny" => builder.options.label_denylist = parse_list(&value),
        "mean" => builder.mean = parse_value(&key, &value)?,
        "std" => builder.std = parse_value(&key, &value)?,
        other => warn!("忽略未知的模型参数: {}", other),
      }
    }

    Ok(builder)
  }
}

impl SsdDetectorBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      labels_path: None,
      threads: None,
      label_offset: 0,
      mean: SSD_DEFAULT_MEAN,
      std: SSD_DEFAULT_STD,
      options: DetectOptions::default(),
    }
  }

  pub fn labels(mut self, path: impl Into<PathBuf>) -> Self {
    self.labels_path = Some(path.into());
    self
  }

  pub fn threads(mut self, threads: usize) -> Self {
    self.threads = Some(threads);
    self
  }

  pub fn label_offset(mut self, offset: i64) -> Self {
    self.label_offset = offset;
    self
  }

  pub fn max_results(mut self, max_results: Option<usize>) -> Self {
    self.options.max_results = max_results;
    self
  }

  pub fn score_threshold(mut self, threshold: f32) -> Self {
    self.options.score_threshold = threshold;
    self
  }

  pub fn normalization(mut self, mean: f32, std: f32) -> Self {
    self.mean = mean;
    self.std = std;
    self
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn options(&self) -> &DetectOptions {
    &self.options
  }

  pub fn build(self) -> Result<SsdDetector, SsdError> {
    self.options.validate()?;
    if self.std == 0.0 {
      return Err(SsdError::InvalidOptions("std 不能为 0".to_string()));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let metadata = std::fs::metadata(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    let labels = match &self.labels_path {
      Some(path) => LabelMap::load(path)?,
      None => {
        warn!("未指定标签文件，将以类别编号作为标签");
        LabelMap::default()
      }
    };

    info!("创建 ONNX Runtime 推理会话");
    let mut builder = Session::builder()
      .map_err(SsdError::ort)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(SsdError::ort)?;
    if let Some(threads) = self.threads {
      builder = builder.with_intra_threads(threads).map_err(SsdError::ort)?;
    }
    let session = builder
      .commit_from_file(&self.model_path)
      .map_err(SsdError::ort)?;

    if session.inputs.len() != 1 {
      return Err(SsdError::invalid(format!(
        "预期模型输入数量为 1, 实际为 {}",
        session.inputs.len()
      )));
    }

    let input = &session.inputs[0];
    let dims: Vec<i64> = input
      .input_type
      .tensor_shape()
      .map(|shape| shape.iter().copied().collect())
      .ok_or_else(|| SsdError::invalid("模型输入不是张量"))?;
    let element = input
      .input_type
      .tensor_type()
      .ok_or_else(|| SsdError::invalid("无法获取模型输入类型"))
      .and_then(InputElement::from_ort)?;
    let input = InputSpec::from_dims(input.name.clone(), &dims, element)?;
    debug!("模型输入: {:?}", input);

    let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
    let outputs = SsdOutputNames::resolve(&output_names)?;
    debug!("模型输出: {:?}", outputs);

    info!("模型加载完成");
    Ok(SsdDetector {
      session: Mutex::new(session),
      input,
      outputs,
      labels,
      label_offset: self.label_offset,
      mean: self.mean,
      std: self.std,
      options: self.options,
    })
  }
}

pub struct SsdDetector {
  session: Mutex<Session>,
  input: InputSpec,
  outputs: SsdOutputNames,
  labels: LabelMap,
  label_offset: i64,
  mean: f32,
  std: f32,
  options: DetectOptions,
}

#[derive(Debug, Clone, PartialEq)]
enum Prepared {
  U8(Vec<u8>),
  F32(Vec<f32>),
}

/// 送入模型的输入数据及其 4 维形状
#[derive(Debug, Clone, PartialEq)]
struct PreparedInput {
  shape: (usize, usize, usize, usize),
  data: Prepared,
}

impl PreparedInput {
  fn into_value(self) -> Result<DynValue, SsdError> {
    let value = match self.data {
      Prepared::U8(data) => Tensor::from_array(Array4::from_shape_vec(self.shape, data)?)
        .map_err(SsdError::ort)?
        .into_dyn(),
      Prepared::F32(data) => Tensor::from_array(Array4::from_shape_vec(self.shape, data)?)
        .map_err(SsdError::ort)?
        .into_dyn(),
    };
    Ok(value)
  }
}

/// 按模型输入要求缩放、重排并归一化图像
fn prepare_input(spec: &InputSpec, frame: &ImageFrame, mean: f32, std: f32) -> PreparedInput {
  let (w, h) = spec.size.unwrap_or((frame.width(), frame.height()));
  let (wu, hu) = (w as usize, h as usize);

  match spec.layout {
    TensorLayout::Nhwc => {
      let frame = RgbNhwcFrame::resize_from(&frame.image, w, h);
      let data = match spec.element {
        InputElement::U8 => Prepared::U8(frame.into_raw()),
        InputElement::F32 => Prepared::F32(frame.to_normalized_f32(mean, std)),
      };
      PreparedInput {
        shape: (1, hu, wu, 3),
        data,
      }
    }
    TensorLayout::Nchw => {
      let frame = RgbNchwFrame::resize_from(&frame.image, w, h);
      let data = match spec.element {
        InputElement::U8 => Prepared::U8(frame.into_raw()),
        InputElement::F32 => Prepared::F32(frame.to_normalized_f32(mean, std)),
      };
      PreparedInput {
        shape: (1, 3, hu, wu),
        data,
      }
    }
  }
}

fn extract_f32(value: &DynValue) -> Result<Vec<f32>, SsdError> {
  if let Ok((_, data)) = value.try_extract_tensor::<f32>() {
    return Ok(data.to_vec());
  }
  if let Ok((_, data)) = value.try_extract_tensor::<i64>() {
    return Ok(data.iter().map(|&v| v as f32).collect());
  }
  let (_, data) = value.try_extract_tensor::<i32>().map_err(SsdError::ort)?;
  Ok(data.iter().map(|&v| v as f32).collect())
}

impl SsdDetector {
  fn run(&self, input: DynValue) -> Result<RawSsdOutput, SsdError> {
    let mut session = self.session.lock().map_err(|_| SsdError::Poisoned)?;

    debug!("执行模型推理");
    let outputs = session
      .run(ort::inputs![self.input.name.as_str() => input])
      .map_err(SsdError::ort)?;

    debug!("获取模型输出");
    let count = match &self.outputs.count {
      Some(name) => extract_f32(&outputs[name.as_str()])?
        .first()
        .map(|&n| n.max(0.0) as usize),
      None => None,
    };

    Ok(RawSsdOutput {
      boxes: extract_f32(&outputs[self.outputs.boxes.as_str()])?,
      classes: extract_f32(&outputs[self.outputs.classes.as_str()])?,
      scores: extract_f32(&outputs[self.outputs.scores.as_str()])?,
      count,
    })
  }
}

impl Model for SsdDetector {
  type Input = ImageFrame;
  type Output = DetectResult;
  type Error = SsdError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入");
    let tensor = prepare_input(&self.input, input, self.mean, self.std).into_value()?;
    let raw = self.run(tensor)?;

    Ok(postprocess(
      &raw,
      input.width(),
      input.height(),
      &self.labels,
      self.label_offset,
      &self.options,
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw() -> RawSsdOutput {
    RawSsdOutput {
      boxes: vec![
        0.1, 0.1, 0.5, 0.5, //
        0.25, 0.25, 0.5, 0.75, //
        0.0, 0.0, 1.0, 1.0, //
        0.5, 0.5, 0.7, 0.7,
      ],
      classes: vec![1.0, 2.0, 0.0, 1.0],
      scores: vec![0.4, 0.9, 0.29, 0.3],
      count: Some(4),
    }
  }

  fn labels() -> LabelMap {
    LabelMap::parse("baked goods\nsalad\ncheese").unwrap()
  }

  #[test]
  fn threshold_sort_and_pixel_boxes() {
    let result = postprocess(&raw(), 200, 100, &labels(), 0, &DetectOptions::default());
    let texts: Vec<_> = result.iter().filter_map(|i| i.display_text()).collect();
    assert_eq!(texts, vec!["cheese, 90%", "salad, 40%", "salad, 30%"]);

    let first = &result.items[0];
    assert_eq!(first.bbox, BoundingBox::new(50.0, 25.0, 150.0, 50.0));
  }

  #[test]
  fn max_results_truncates_after_sorting() {
    let options = DetectOptions {
      max_results: Some(1),
      ..Default::default()
    };
    let result = postprocess(&raw(), 10, 10, &labels(), 0, &options);
    assert_eq!(result.len(), 1);
    assert_eq!(result.items[0].categories[0].label, "cheese");
  }

  #[test]
  fn count_limits_candidates() {
    let mut raw = raw();
    raw.count = Some(1);
    let result = postprocess(&raw, 10, 10, &labels(), 0, &DetectOptions::default());
    assert_eq!(result.len(), 1);
    assert_eq!(result.items[0].categories[0].label, "salad");

    raw.count = Some(100);
    raw.scores.truncate(2);
    let result = postprocess(&raw, 10, 10, &labels(), 0, &DetectOptions::default());
    assert_eq!(result.len(), 2);
  }

  #[test]
  fn label_offset_and_unknown_classes() {
    let result = postprocess(&raw(), 10, 10, &labels(), 5, &DetectOptions::default());
    assert_eq!(result.items[0].categories[0].label, "7");
    assert_eq!(result.items[0].categories[0].index, 7);
  }

  #[test]
  fn allowlist_filters_labels() {
    let options = DetectOptions {
      label_allowlist: vec!["salad".into()],
      max_results: None,
      ..Default::default()
    };
    let result = postprocess(&raw(), 10, 10, &labels(), 0, &options);
    assert_eq!(result.len(), 2);
    assert!(result.iter().all(|i| i.categories[0].label == "salad"));
  }

  #[test]
  fn huge_class_value_does_not_overflow() {
    let raw = RawSsdOutput {
      boxes: vec![0.0, 0.0, 1.0, 1.0],
      classes: vec![1e30],
      scores: vec![0.9],
      count: None,
    };
    let result = postprocess(&raw, 10, 10, &labels(), 1, &DetectOptions::default());
    assert_eq!(result.len(), 1);
    assert_eq!(result.items[0].categories[0].index, i64::MAX);
    assert_eq!(result.items[0].categories[0].label, i64::MAX.to_string());
  }

  fn frame_from(width: u32, height: u32, pixels: &[[u8; 3]]) -> ImageFrame {
    let data = pixels.iter().flatten().copied().collect();
    let image = image::RgbImage::from_raw(width, height, data).unwrap();
    ImageFrame::new(0, "x.png".into(), image)
  }

  #[test]
  fn prepare_nhwc_u8_resizes_to_model_size() {
    let spec = InputSpec::from_dims("x".into(), &[1, 2, 2, 3], InputElement::U8).unwrap();
    let frame = frame_from(4, 1, &[[9, 9, 9]; 4]);
    let prepared = prepare_input(&spec, &frame, 0.0, 1.0);
    assert_eq!(prepared.shape, (1, 2, 2, 3));
    assert_eq!(prepared.data, Prepared::U8(vec![9; 12]));
  }

  #[test]
  fn prepare_nhwc_f32_normalizes() {
    let spec = InputSpec::from_dims("x".into(), &[1, 1, 2, 3], InputElement::F32).unwrap();
    let frame = frame_from(2, 1, &[[0, 255, 0], [255, 0, 255]]);
    let prepared = prepare_input(&spec, &frame, 127.5, 127.5);
    assert_eq!(prepared.shape, (1, 1, 2, 3));
    assert_eq!(
      prepared.data,
      Prepared::F32(vec![-1.0, 1.0, -1.0, 1.0, -1.0, 1.0])
    );
  }

  #[test]
  fn prepare_nchw_u8_splits_planes() {
    let spec = InputSpec::from_dims("x".into(), &[1, 3, 1, 2], InputElement::U8).unwrap();
    let frame = frame_from(2, 1, &[[1, 2, 3], [4, 5, 6]]);
    let prepared = prepare_input(&spec, &frame, 0.0, 1.0);
    assert_eq!(prepared.shape, (1, 3, 1, 2));
    assert_eq!(prepared.data, Prepared::U8(vec![1, 4, 2, 5, 3, 6]));
  }

  #[test]
  fn prepare_nchw_f32_normalizes_per_plane() {
    let spec = InputSpec::from_dims("x".into(), &[1, 3, 1, 2], InputElement::F32).unwrap();
    let frame = frame_from(2, 1, &[[0, 2, 4], [6, 8, 10]]);
    let prepared = prepare_input(&spec, &frame, 0.0, 2.0);
    assert_eq!(prepared.shape, (1, 3, 1, 2));
    assert_eq!(
      prepared.data,
      Prepared::F32(vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0])
    );
  }

  #[test]
  fn prepare_dynamic_size_keeps_original_image() {
    let spec = InputSpec::from_dims("x".into(), &[1, -1, -1, 3], InputElement::U8).unwrap();
    let frame = frame_from(5, 3, &[[7, 8, 9]; 15]);
    let prepared = prepare_input(&spec, &frame, 0.0, 1.0);
    assert_eq!(prepared.shape, (1, 3, 5, 3));
    assert_eq!(prepared.data, Prepared::U8(frame.image.into_raw()));

    let spec = InputSpec::from_dims("x".into(), &[1, 3, -1, -1], InputElement::U8).unwrap();
    let frame = frame_from(5, 3, &[[7, 8, 9]; 15]);
    let prepared = prepare_input(&spec, &frame, 0.0, 1.0);
    assert_eq!(prepared.shape, (1, 3, 3, 5));
  }

  #[test]
  fn input_layout_detection() {
    let spec = InputSpec::from_dims("x".into(), &[1, 320, 320, 3], InputElement::U8).unwrap();
    assert_eq!(spec.layout, TensorLayout::Nhwc);
    assert_eq!(spec.size, Some((320, 320)));

    let spec = InputSpec::from_dims("x".into(), &[1, 3, 300, 400], InputElement::F32).unwrap();
    assert_eq!(spec.layout, TensorLayout::Nchw);
    assert_eq!(spec.size, Some((400, 300)));

    let spec = InputSpec::from_dims("x".into(), &[1, -1, -1, 3], InputElement::U8).unwrap();
    assert_eq!(spec.size, None);

    assert!(InputSpec::from_dims("x".into(), &[1, 320, 320], InputElement::U8).is_err());
    assert!(InputSpec::from_dims("x".into(), &[1, 4, 4, 4], InputElement::U8).is_err());
  }

  #[test]
  fn output_names_by_convention_or_position() {
    let names: Vec<String> = [
      "raw_detection_boxes",
      "detection_scores",
      "num_detections",
      "detection_boxes",
      "detection_classes",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let outputs = SsdOutputNames::resolve(&names).unwrap();
    assert_eq!(outputs.boxes, "detection_boxes");
    assert_eq!(outputs.count.as_deref(), Some("num_detections"));

    let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let outputs = SsdOutputNames::resolve(&names).unwrap();
    assert_eq!(
      (outputs.boxes.as_str(), outputs.classes.as_str(), outputs.scores.as_str()),
      ("a", "b", "c")
    );
    assert_eq!(outputs.count, None);

    assert!(SsdOutputNames::resolve(&names[..2]).is_err());
  }

  #[test]
  fn builder_from_url_query() {
    let url = Url::parse(
      "ssd:///models/salad.onnx?labels=/models/labels.txt&threads=2&max_results=all&score_threshold=0.5&label_offset=-1&allow=salad,%20cheese",
    )
    .unwrap();
    let builder = SsdDetectorBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path(), Path::new("/models/salad.onnx"));
    assert_eq!(builder.labels_path, Some(PathBuf::from("/models/labels.txt")));
    assert_eq!(builder.threads, Some(2));
    assert_eq!(builder.label_offset, -1);
    assert_eq!(builder.options().max_results, None);
    assert_eq!(builder.options().score_threshold, 0.5);
    assert_eq!(builder.options().label_allowlist, vec!["salad", "cheese"]);

    let builder = builder.max_results(Some(3)).score_threshold(0.1);
    assert_eq!(builder.options().max_results, Some(3));
    assert_eq!(builder.options().score_threshold, 0.1);
  }

  #[test]
  fn builder_rejects_bad_values() {
    let url = Url::parse("ssd:///m.onnx?max_results=0").unwrap();
    assert!(matches!(
      SsdDetectorBuilder::from_url(&url),
      Err(SsdError::DetectOptionsError(DetectOptionsError::ZeroMaxResults))
    ));

    let url = Url::parse("ssd:///m.onnx?threads=many").unwrap();
    assert!(matches!(
      SsdDetectorBuilder::from_url(&url),
      Err(SsdError::ModelPathError(_))
    ));

    let url = Url::parse("yolo:///m.onnx").unwrap();
    assert!(SsdDetectorBuilder::from_url(&url).is_err());
  }

  #[test]
  fn build_fails_without_model_file() {
    let result = SsdDetectorBuilder::new("/nonexistent/shiwu/model.onnx").build();
    assert!(matches!(result, Err(SsdError::ModelLoadError(_))));
  }
}
