// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 任务循环
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
  },
  thread,
  time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::{
  coordinator::{Coordinator, PassOutcome, PassStats},
  frame::Frame,
  output::summarize,
  worker::PipelineWorker,
};

pub trait Task<I>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, coordinator: Arc<Coordinator>) -> Result<Self::Output, Self::Error>;
}

/// 只处理第一帧，在当前线程上同步完成
pub struct OneShotTask;

impl<I: Iterator<Item = Frame>> Task<I> for OneShotTask {
  type Output = PassOutcome;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, coordinator: Arc<Coordinator>) -> Result<PassOutcome, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始处理...");
    let now = Instant::now();
    let outcome = coordinator.submit(frame);
    let elapsed = now.elapsed();

    match &outcome {
      PassOutcome::Completed(results) => {
        info!("处理完成，耗时: {:.2?}, 结果: {}", elapsed, summarize(results))
      }
      PassOutcome::Failed(err) => warn!("处理失败，耗时: {:.2?}: {}", elapsed, err),
      PassOutcome::Dropped => warn!("管线忙，帧被丢弃"),
    }
    Ok(outcome)
  }
}

/// 持续把输入帧交给工作线程
///
/// 设置 `fps` 时按节拍投递，工作线程忙则丢帧，模拟实时相机；
/// 否则阻塞投递，每一帧都会被处理。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  fps: Option<f64>,
  stop: Option<Arc<AtomicBool>>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_fps(mut self, fps: Option<f64>) -> Self {
    self.fps = fps.filter(|f| f.is_finite() && *f > 0.0);
    self
  }

  /// 外部停止标志，例如由 Ctrl-C 处理函数设置
  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.stop = Some(stop);
    self
  }

  fn should_stop(&self) -> bool {
    self
      .stop
      .as_ref()
      .is_some_and(|stop| stop.load(Ordering::SeqCst))
  }
}

impl<I: Iterator<Item = Frame>> Task<I> for ContinuousTask {
  type Output = PassStats;
  type Error = anyhow::Error;

  fn run_task(self, input: I, coordinator: Arc<Coordinator>) -> Result<PassStats, Self::Error> {
    info!("开始任务...");
    let worker = PipelineWorker::spawn(coordinator.clone())?;
    let sender = worker
      .sender()
      .ok_or_else(|| anyhow::anyhow!("工作线程交接通道不可用"))?;
    let interval = self.fps.map(|fps| Duration::from_secs_f64(1.0 / fps));

    let mut frame_count = 0usize;
    let mut next_tick = Instant::now();
    for frame in input {
      if self.should_stop() {
        warn!("中断信号接收，退出任务循环");
        break;
      }

      frame_count += 1;
      match interval {
        Some(interval) => {
          let now = Instant::now();
          if next_tick > now {
            thread::sleep(next_tick - now);
          }
          next_tick = Instant::now() + interval;
          if !sender.offer(frame) {
            info!("第 {} 帧到达时管线忙，已丢弃", frame_count);
          }
        }
        None => {
          if !sender.deliver(frame) {
            warn!("工作线程已退出，停止投递");
            break;
          }
        }
      }

      if self.frame_number.is_some_and(|n| frame_count >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_count);
        break;
      }
    }

    drop(sender);
    worker.join();

    let stats = coordinator.stats();
    info!(
      "任务完成: 处理 {} 帧, 失败 {} 帧, 丢弃 {} 帧",
      stats.processed, stats.failed, stats.dropped
    );
    Ok(stats)
  }
}
