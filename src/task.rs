// 该文件是 Shiwu （识物） 项目的一部分。
// src/task.rs - 推理任务
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc,
  },
  thread,
  time::{Duration, Instant},
};

use anyhow::anyhow;
use tracing::{info, warn};

use crate::{
  frame::ImageFrame,
  model::{DetectResult, Model},
  output::Render,
};

const WORKER_NAME: &str = "shiwu-detect";
// 等待渲染的结果数上限，后台线程在队列满时阻塞
const RESULT_QUEUE_BOUND: usize = 1;

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 后台线程交回主线程的一帧结果
type Detected = (ImageFrame, DetectResult, Duration);

fn log_detections(frame: &ImageFrame, result: &DetectResult) {
  info!(
    "{} ({}x{}): 检测到 {} 个对象",
    frame.source.display(),
    frame.width(),
    frame.height(),
    result.len()
  );
  for item in result.iter() {
    if let Some(text) = item.display_text() {
      info!(
        "  - {} at ({:.0}, {:.0}, {:.0}x{:.0})",
        text,
        item.bbox.left,
        item.bbox.top,
        item.bbox.width(),
        item.bbox.height()
      );
    }
  }
}

fn render<O, RE>(output: &O, detected: &Detected) -> anyhow::Result<()>
where
  RE: std::error::Error + Sync + Send + 'static,
  O: Render<ImageFrame, DetectResult, Error = RE>,
{
  let (frame, result, elapsed) = detected;
  info!("推理完成，耗时: {:.2?}", elapsed);
  log_detections(frame, result);

  let now = Instant::now();
  output.render_result(frame, result)?;
  info!("渲染完成，耗时: {:.2?}", now.elapsed());
  Ok(())
}

fn detect_first<E, ME, I, M>(input: &mut I, model: &M) -> anyhow::Result<Detected>
where
  E: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<ImageFrame, E>>,
  M: Model<Input = ImageFrame, Output = DetectResult, Error = ME>,
{
  let frame = input.next().ok_or_else(|| anyhow!("没有输入帧"))??;
  info!("输入帧获取成功，开始推理...");
  let now = Instant::now();
  let result = model.infer(&frame)?;
  Ok((frame, result, now.elapsed()))
}

/// 单张图片：后台线程解码并推理，结果交回调用线程渲染
pub struct OneShotTask;

impl<E, ME, RE, I, M, O> Task<I, M, O> for OneShotTask
where
  E: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<ImageFrame, E>> + Send + 'static,
  M: Model<Input = ImageFrame, Output = DetectResult, Error = ME> + Send + 'static,
  O: Render<ImageFrame, DetectResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = mpsc::channel::<anyhow::Result<Detected>>();

    let worker = thread::Builder::new()
      .name(WORKER_NAME.to_string())
      .spawn(move || {
        let _ = tx.send(detect_first(&mut input, &model));
      })?;

    let detected = rx
      .recv()
      .map_err(|_| anyhow!("后台推理线程异常退出"))??;
    worker
      .join()
      .map_err(|_| anyhow!("后台推理线程异常退出"))?;

    render(&output, &detected)?;
    info!("任务完成");
    Ok(())
  }
}

/// 连续处理多张图片，可限制帧数，可响应 Ctrl-C
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理器；每个进程只能安装一次
  pub fn with_interrupt_handler(mut self, enable: bool) -> Self {
    self.handle_interrupt = enable;
    self
  }
}

impl<E, ME, RE, I, M, O> Task<I, M, O> for ContinuousTask
where
  E: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<ImageFrame, E>> + Send + 'static,
  M: Model<Input = ImageFrame, Output = DetectResult, Error = ME> + Send + 'static,
  O: Render<ImageFrame, DetectResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let stop = Arc::new(AtomicBool::new(false));

    if self.handle_interrupt {
      let stop = stop.clone();
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        stop.store(true, Ordering::SeqCst);
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }

    let frame_number = self.frame_number;
    let (tx, rx) = mpsc::sync_channel::<anyhow::Result<Detected>>(RESULT_QUEUE_BOUND);
    let worker_stop = stop.clone();

    let worker = thread::Builder::new()
      .name(WORKER_NAME.to_string())
      .spawn(move || {
        let mut input = input;
        let mut processed = 0usize;
        loop {
          if worker_stop.load(Ordering::SeqCst) {
            warn!("中断信号接收，退出任务循环");
            break;
          }
          if frame_number.is_some_and(|n| processed >= n) {
            info!("达到指定帧数 {}, 退出任务循环", processed);
            break;
          }
          let Some(item) = input.next() else {
            break;
          };
          let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
              warn!("读取图片失败，跳过: {}", e);
              continue;
            }
          };

          let now = Instant::now();
          let detected = model
            .infer(&frame)
            .map(|result| (frame, result, now.elapsed()))
            .map_err(anyhow::Error::from);
          let failed = detected.is_err();
          if tx.send(detected).is_err() || failed {
            break;
          }

          processed += 1;
        }
      })?;

    let mut frame_count = 0usize;
    let mut total_detections = 0usize;
    for detected in rx {
      if stop.load(Ordering::SeqCst) {
        warn!("中断信号接收，丢弃未渲染的结果");
        break;
      }
      let detected = detected?;
      frame_count += 1;
      total_detections += detected.1.len();
      info!("处理第 {} 张图片", frame_count);
      render(&output, &detected)?;
    }

    worker
      .join()
      .map_err(|_| anyhow!("后台推理线程异常退出"))?;

    info!(
      "任务完成，共处理 {} 张图片，检测到 {} 个对象",
      frame_count, total_detections
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{BoundingBox, Category, DetectItem};
  use image::RgbImage;
  use std::{
    cell::{Cell, RefCell},
    convert::Infallible,
    sync::atomic::AtomicUsize,
  };

  #[derive(Debug, thiserror::Error)]
  #[error("模拟错误")]
  struct MockError;

  struct CountingModel {
    calls: Arc<AtomicUsize>,
  }

  impl Model for CountingModel {
    type Input = ImageFrame;
    type Output = DetectResult;
    type Error = Infallible;

    fn infer(&self, input: &ImageFrame) -> Result<DetectResult, Infallible> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(DetectResult::new(vec![DetectItem {
        bbox: BoundingBox::new(0.0, 0.0, input.width() as f32, input.height() as f32),
        categories: vec![Category {
          index: 0,
          label: "salad".into(),
          score: 0.9,
        }]
        .into_boxed_slice(),
      }]))
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<(usize, usize, thread::ThreadId)>>,
  }

  impl Render<ImageFrame, DetectResult> for &Collect {
    type Error = Infallible;

    fn render_result(&self, frame: &ImageFrame, result: &DetectResult) -> Result<(), Infallible> {
      self
        .seen
        .borrow_mut()
        .push((frame.index, result.len(), thread::current().id()));
      Ok(())
    }
  }

  /// 渲染较慢，记录已取出但尚未渲染完的帧数峰值
  struct SlowRender {
    pulled: Arc<AtomicUsize>,
    rendered: Cell<usize>,
    max_pending: Cell<usize>,
  }

  impl Render<ImageFrame, DetectResult> for &SlowRender {
    type Error = Infallible;

    fn render_result(&self, _: &ImageFrame, _: &DetectResult) -> Result<(), Infallible> {
      thread::sleep(Duration::from_millis(5));
      let pending = self.pulled.load(Ordering::SeqCst) - self.rendered.get();
      self.max_pending.set(self.max_pending.get().max(pending));
      self.rendered.set(self.rendered.get() + 1);
      Ok(())
    }
  }

  fn frames(n: usize) -> Vec<Result<ImageFrame, MockError>> {
    (0..n)
      .map(|i| Ok(ImageFrame::new(i, format!("{}.png", i).into(), RgbImage::new(4, 4))))
      .collect()
  }

  #[test]
  fn oneshot_renders_on_calling_thread() {
    let calls = Arc::new(AtomicUsize::new(0));
    let collect = Collect::default();
    OneShotTask
      .run_task(
        frames(3).into_iter(),
        CountingModel {
          calls: calls.clone(),
        },
        &collect,
      )
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let seen = collect.seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!((seen[0].0, seen[0].1), (0, 1));
    assert_eq!(seen[0].2, thread::current().id());
  }

  #[test]
  fn oneshot_without_input_fails() {
    let calls = Arc::new(AtomicUsize::new(0));
    let result = OneShotTask.run_task(
      frames(0).into_iter(),
      CountingModel { calls },
      &Collect::default(),
    );
    assert!(result.is_err());
  }

  #[test]
  fn oneshot_decode_error_propagates() {
    let calls = Arc::new(AtomicUsize::new(0));
    let input = vec![Err::<ImageFrame, _>(MockError)].into_iter();
    let result = OneShotTask.run_task(
      input,
      CountingModel {
        calls: calls.clone(),
      },
      &Collect::default(),
    );
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn continuous_skips_bad_frames_and_honours_limit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut input = frames(5);
    input[1] = Err(MockError);

    let collect = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(3))
      .run_task(
        input.into_iter(),
        CountingModel {
          calls: calls.clone(),
        },
        &collect,
      )
      .unwrap();

    let indices: Vec<_> = collect.seen.borrow().iter().map(|s| s.0).collect();
    assert_eq!(indices, vec![0, 2, 3]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn continuous_processes_everything_without_limit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let collect = Collect::default();
    ContinuousTask::default()
      .run_task(frames(4).into_iter(), CountingModel { calls }, &collect)
      .unwrap();
    assert_eq!(collect.seen.borrow().len(), 4);
  }

  #[test]
  fn continuous_zero_frame_number_processes_nothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = pulled.clone();
    let input = frames(3).into_iter().inspect(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    let collect = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(0))
      .run_task(
        input,
        CountingModel {
          calls: calls.clone(),
        },
        &collect,
      )
      .unwrap();

    assert_eq!(pulled.load(Ordering::SeqCst), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(collect.seen.borrow().is_empty());
  }

  #[test]
  fn continuous_worker_waits_for_slow_renderer() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = pulled.clone();
    let input = frames(20).into_iter().inspect(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    let render = SlowRender {
      pulled: pulled.clone(),
      rendered: Cell::new(0),
      max_pending: Cell::new(0),
    };
    let calls = Arc::new(AtomicUsize::new(0));
    ContinuousTask::default()
      .run_task(input, CountingModel { calls }, &render)
      .unwrap();

    assert_eq!(render.rendered.get(), 20);
    // 正在渲染的一帧、队列中的结果、后台线程手中等待发送的一帧
    assert!(
      render.max_pending.get() <= RESULT_QUEUE_BOUND + 2,
      "pending = {}",
      render.max_pending.get()
    );
  }
}
