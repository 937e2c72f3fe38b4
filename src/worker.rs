// 该文件是 Shanan （山南西风） 项目的一部分。
// src/worker.rs - 管线工作线程
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
    mpsc::{self, Receiver, SyncSender, TrySendError},
  },
  thread::{self, JoinHandle},
};

use tracing::{debug, info, warn};

use crate::{coordinator::Coordinator, error::PipelineError, frame::Frame};

const WORKER_THREAD_NAME: &str = "shanan-lens-worker";

/// 专用工作线程，顺序执行处理
///
/// 帧通过零容量通道交接：只有工作线程正在等待时交接才会成功，
/// 否则帧被当场释放。
pub struct PipelineWorker {
  coordinator: Arc<Coordinator>,
  sender: Option<SyncSender<Frame>>,
  handle: Option<JoinHandle<()>>,
}

impl PipelineWorker {
  pub fn spawn(coordinator: Arc<Coordinator>) -> Result<Self, PipelineError> {
    let (sender, receiver) = mpsc::sync_channel::<Frame>(0);
    let worker_coordinator = coordinator.clone();
    let handle = thread::Builder::new()
      .name(WORKER_THREAD_NAME.to_string())
      .spawn(move || run_worker(worker_coordinator, receiver))
      .map_err(|e| PipelineError::initialization(format!("无法启动工作线程: {}", e)))?;

    info!("工作线程已启动");
    Ok(Self {
      coordinator,
      sender: Some(sender),
      handle: Some(handle),
    })
  }

  pub fn coordinator(&self) -> &Arc<Coordinator> {
    &self.coordinator
  }

  /// 帧来源持有的交接端，可以克隆
  pub fn sender(&self) -> Option<FrameSender> {
    self.sender.as_ref().map(|tx| FrameSender {
      tx: tx.clone(),
      coordinator: self.coordinator.clone(),
    })
  }

  /// 关闭交接通道并等待工作线程退出
  ///
  /// 所有 [`FrameSender`] 都被丢弃后工作线程才会退出。
  pub fn join(mut self) {
    self.sender.take();
    if let Some(handle) = self.handle.take()
      && handle.join().is_err()
    {
      warn!("工作线程异常退出");
    }
    info!("工作线程已退出");
  }
}

impl Drop for PipelineWorker {
  fn drop(&mut self) {
    self.sender.take();
  }
}

fn run_worker(coordinator: Arc<Coordinator>, receiver: Receiver<Frame>) {
  debug!("工作线程等待帧");
  for frame in receiver {
    coordinator.submit(frame);
  }
  debug!("交接通道已关闭");
}

#[derive(Clone)]
pub struct FrameSender {
  tx: SyncSender<Frame>,
  coordinator: Arc<Coordinator>,
}

impl FrameSender {
  /// 不阻塞地交出一帧；工作线程忙时丢弃并释放该帧，返回 `false`
  pub fn offer(&self, frame: Frame) -> bool {
    match self.tx.try_send(frame) {
      Ok(()) => true,
      Err(TrySendError::Full(frame)) => {
        self.coordinator.reject(frame);
        false
      }
      Err(TrySendError::Disconnected(frame)) => {
        warn!("工作线程已退出，丢弃第 {} 帧", frame.index());
        self.coordinator.reject(frame);
        false
      }
    }
  }

  /// 阻塞直到工作线程接收该帧，用于需要处理每一帧的离线输入
  pub fn deliver(&self, frame: Frame) -> bool {
    match self.tx.send(frame) {
      Ok(()) => true,
      Err(mpsc::SendError(frame)) => {
        warn!("工作线程已退出，丢弃第 {} 帧", frame.index());
        self.coordinator.reject(frame);
        false
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    config::PipelineConfig,
    coordinator::PipelineContext,
    frame::PixelFormat,
    model::{self, LabelTable},
    output::OverlayState,
    tensor::RawDetectionTensor,
  };
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn coordinator(overlay: &OverlayState) -> Arc<Coordinator> {
    let context = PipelineContext::new(
      PipelineConfig::default().with_model_input_size(16),
      LabelTable::new(vec!["person".into()]).unwrap(),
    )
    .unwrap();
    Arc::new(Coordinator::new(
      context,
      model::from_fn(|_| {
        Ok(RawDetectionTensor::new(
          vec![1, 5, 1],
          vec![0.5, 0.5, 0.5, 0.5, 0.9],
        ))
      }),
      overlay.clone(),
      overlay.clone(),
    ))
  }

  fn frame(released: &Arc<AtomicUsize>) -> Frame {
    let released = released.clone();
    Frame::new(vec![0u8; 16 * 16 * 3], 16, 16, PixelFormat::Rgb8).with_release(move || {
      released.fetch_add(1, Ordering::SeqCst);
    })
  }

  #[test]
  fn delivered_frames_are_processed_in_order() {
    let overlay = OverlayState::new();
    let worker = PipelineWorker::spawn(coordinator(&overlay)).unwrap();
    let sender = worker.sender().unwrap();
    let released = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
      assert!(sender.deliver(frame(&released)));
    }
    drop(sender);
    let coordinator = worker.coordinator().clone();
    worker.join();

    assert_eq!(coordinator.stats().processed, 3);
    assert_eq!(released.load(Ordering::SeqCst), 3);
    assert_eq!(overlay.generation(), 3);
  }

  #[test]
  fn every_offered_frame_is_processed_or_dropped() {
    let overlay = OverlayState::new();
    let worker = PipelineWorker::spawn(coordinator(&overlay)).unwrap();
    let sender = worker.sender().unwrap();
    let coordinator = worker.coordinator().clone();
    let released = Arc::new(AtomicUsize::new(0));

    let mut accepted = 0u64;
    for _ in 0..20 {
      if sender.offer(frame(&released)) {
        accepted += 1;
      }
      thread::sleep(std::time::Duration::from_millis(1));
    }
    drop(sender);
    worker.join();

    let stats = coordinator.stats();
    assert_eq!(stats.processed, accepted);
    assert_eq!(stats.processed + stats.dropped, 20);
    assert_eq!(released.load(Ordering::SeqCst), 20);
  }
}
