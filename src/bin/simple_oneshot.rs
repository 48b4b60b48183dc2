// 该文件是 Shiwu （识物） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图片目标检测
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shiwu::{
  FromUrl,
  input::InputWrapper,
  model::SsdDetectorBuilder,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};

/// Shiwu 单张图片检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型路径，例如 ssd:///models/detect.onnx?labels=/models/labels.txt
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图片，例如 image:///photos/lunch.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 image:///tmp/lunch.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 最多保留的检测结果数
  #[arg(long, value_name = "N")]
  pub max_results: Option<usize>,
  /// 置信度阈值
  #[arg(long, value_name = "T")]
  pub score_threshold: Option<f32>,
  /// 推理线程数
  #[arg(long, value_name = "N")]
  pub threads: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let mut builder = SsdDetectorBuilder::from_url(&args.model)?;
  if let Some(max_results) = args.max_results {
    builder = builder.max_results(Some(max_results));
  }
  if let Some(threshold) = args.score_threshold {
    builder = builder.score_threshold(threshold);
  }
  if let Some(threads) = args.threads {
    builder = builder.threads(threads);
  }

  let model = builder.build()?;
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  OneShotTask.run_task(input, model, output)?;

  Ok(())
}
