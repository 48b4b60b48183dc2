// 该文件是 Shiwu （识物） 项目的一部分。
// src/bin/simple_continueshot.rs - 批量图片目标检测
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

use std::num::NonZeroUsize;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shiwu::{
  FromUrl,
  input::InputWrapper,
  model::SsdDetectorBuilder,
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};

/// Shiwu 批量检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 folder:///photos
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 folder:///tmp/out?record=json
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[arg(long, value_name = "N")]
  pub max_results: Option<usize>,
  #[arg(long, value_name = "T")]
  pub score_threshold: Option<f32>,
  #[arg(long, value_name = "N")]
  pub threads: Option<usize>,

  /// 处理到指定张数后停止，必须大于 0
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<NonZeroUsize>,
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

  ContinuousTask::default()
    .with_frame_number(args.frame_number.map(NonZeroUsize::get))
    .with_interrupt_handler(true)
    .run_task(input, model, output)?;

  Ok(())
}
