// 该文件是 Shanan （山南西风） 项目的一部分。
// src/coordinator.rs - 管线调度
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

//! 单次处理：预处理 -> 推理 -> 解码 -> NMS -> 坐标映射 -> 输出
//!
//! 同一时刻最多只有一次处理持有推理引擎。处理中到达的帧立即释放，
//! 不排队。失败的处理不会调用任何输出，叠加层保持上一次的结果。

use std::{
  sync::{
    Mutex, TryLockError,
    atomic::{AtomicBool, AtomicU64, Ordering},
  },
  time::Instant,
};

use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::{
  config::PipelineConfig,
  error::PipelineError,
  frame::Frame,
  mapper::CoordinateMapper,
  model::{Decoder, InferenceEngine, LabelTable, suppress},
  output::{DetectionResult, RenderSink, SummarySink, summarize},
  preprocess::Preprocessor,
};

/// 启动时构造一次的只读上下文
#[derive(Debug, Clone)]
pub struct PipelineContext {
  config: PipelineConfig,
  labels: LabelTable,
}

impl PipelineContext {
  /// 校验配置并加载标签；未配置标签文件时使用 COCO 标签
  pub fn initialize(config: PipelineConfig) -> Result<Self, PipelineError> {
    let labels = match &config.labels {
      Some(path) => LabelTable::from_path(path)?,
      None => {
        info!("未指定标签文件，使用内置 COCO 标签");
        LabelTable::coco()
      }
    };
    Self::new(config, labels)
  }

  pub fn new(config: PipelineConfig, labels: LabelTable) -> Result<Self, PipelineError> {
    config.validate()?;
    Ok(Self { config, labels })
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
  Idle,
  Processing,
}

#[derive(Debug)]
pub enum PassOutcome {
  Completed(Vec<DetectionResult>),
  Failed(PipelineError),
  /// 处理中到达，未进入管线
  Dropped,
}

impl PassOutcome {
  pub fn is_completed(&self) -> bool {
    matches!(self, PassOutcome::Completed(_))
  }

  pub fn is_dropped(&self) -> bool {
    matches!(self, PassOutcome::Dropped)
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
  pub processed: u64,
  pub failed: u64,
  pub dropped: u64,
}

#[derive(Default)]
struct Counters {
  processed: AtomicU64,
  failed: AtomicU64,
  dropped: AtomicU64,
}

/// 离开作用域时回到空闲状态，包括 panic 的情况
struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
  fn enter(flag: &'a AtomicBool) -> Self {
    flag.store(true, Ordering::Release);
    Self(flag)
  }
}

impl Drop for ProcessingGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

struct PassOutput {
  results: Vec<DetectionResult>,
  frame: Option<RgbImage>,
}

pub struct Coordinator {
  context: PipelineContext,
  preprocessor: Preprocessor,
  decoder: Decoder,
  mapper: CoordinateMapper,
  engine: Mutex<Box<dyn InferenceEngine>>,
  render: Box<dyn RenderSink>,
  summary: Box<dyn SummarySink>,
  processing: AtomicBool,
  counters: Counters,
}

impl Coordinator {
  pub fn new(
    context: PipelineContext,
    engine: impl InferenceEngine + 'static,
    render: impl RenderSink + 'static,
    summary: impl SummarySink + 'static,
  ) -> Self {
    let config = context.config();
    let preprocessor = Preprocessor::new(config.model_input(), config.resize_mode)
      .with_normalization(config.normalization)
      .with_layout(config.tensor_layout);
    let decoder = Decoder::new(config.output, config.model_input(), context.labels().len());
    let mapper = CoordinateMapper::new(config.view.size, config.view.fit, config.camera);

    info!(
      "管线就绪: 输入 {}, 置信度阈值 {}, IoU 阈值 {}, 标签 {} 个",
      config.model_input(),
      config.confidence_threshold,
      config.iou_threshold,
      context.labels().len()
    );

    Self {
      preprocessor,
      decoder,
      mapper,
      engine: Mutex::new(Box::new(engine)),
      render: Box::new(render),
      summary: Box::new(summary),
      processing: AtomicBool::new(false),
      counters: Counters::default(),
      context,
    }
  }

  pub fn context(&self) -> &PipelineContext {
    &self.context
  }

  pub fn state(&self) -> PipelineState {
    if self.processing.load(Ordering::Acquire) {
      PipelineState::Processing
    } else {
      PipelineState::Idle
    }
  }

  pub fn stats(&self) -> PassStats {
    PassStats {
      processed: self.counters.processed.load(Ordering::Relaxed),
      failed: self.counters.failed.load(Ordering::Relaxed),
      dropped: self.counters.dropped.load(Ordering::Relaxed),
    }
  }

  /// 记录一次未进入管线的帧并释放它
  pub(crate) fn reject(&self, frame: Frame) -> PassOutcome {
    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
    debug!("管线忙，丢弃第 {} 帧", frame.index());
    drop(frame);
    PassOutcome::Dropped
  }

  /// 提交一帧。空闲时同步完成一次处理，忙时立即丢弃。
  ///
  /// 无论结果如何，帧在返回前都已释放。
  pub fn submit(&self, frame: Frame) -> PassOutcome {
    let mut engine = match self.engine.try_lock() {
      Ok(engine) => engine,
      Err(TryLockError::WouldBlock) => return self.reject(frame),
      Err(TryLockError::Poisoned(poisoned)) => {
        warn!("上一次处理异常中止，恢复推理引擎");
        poisoned.into_inner()
      }
    };
    let _processing = ProcessingGuard::enter(&self.processing);

    let index = frame.index();
    let started = Instant::now();
    let pass = self.run_pass(&mut **engine, &frame);
    drop(frame);

    match pass {
      Ok(PassOutput { results, frame }) => {
        self.emit(frame.as_ref(), &results);
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        debug!(
          "第 {} 帧处理完成，{} 个结果，耗时: {:.2?}",
          index,
          results.len(),
          started.elapsed()
        );
        PassOutcome::Completed(results)
      }
      Err(err) => {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        match &err {
          PipelineError::InvalidModelOutput(_) => {
            error!("第 {} 帧处理失败，模型输出与解码器不匹配: {}", index, err)
          }
          _ => warn!("第 {} 帧处理失败: {}", index, err),
        }
        PassOutcome::Failed(err)
      }
    }
  }

  fn run_pass(
    &self,
    engine: &mut dyn InferenceEngine,
    frame: &Frame,
  ) -> Result<PassOutput, PipelineError> {
    let config = self.context.config();

    let now = Instant::now();
    let input = self.preprocessor.preprocess(frame)?;
    debug!("预处理耗时: {:.2?}", now.elapsed());

    let now = Instant::now();
    let raw = engine.infer(&input.tensor)?;
    debug!("推理耗时: {:.2?}, 输出形状 {:?}", now.elapsed(), raw.shape);

    let candidates = self.decoder.decode(&raw, config.confidence_threshold)?;
    let survivors = suppress(candidates, config.iou_threshold);

    let labels = self.context.labels();
    let results = survivors
      .into_iter()
      .filter_map(|candidate| {
        let label = labels.get(candidate.class_id)?;
        let bbox = self.mapper.map_to_view(&candidate.bbox, &input.transform)?;
        Some(DetectionResult::new(bbox, label, candidate.confidence))
      })
      .collect();

    let frame = if self.render.needs_frame() {
      Some(frame.to_upright_rgb()?)
    } else {
      None
    };

    Ok(PassOutput { results, frame })
  }

  fn emit(&self, frame: Option<&RgbImage>, results: &[DetectionResult]) {
    let rendered = match frame {
      Some(frame) => self.render.render_frame(frame, results),
      None => self.render.set_results(results),
    };
    if let Err(err) = rendered {
      warn!("渲染输出失败: {}", err);
    }

    if let Err(err) = self.summary.set_summary(&summarize(results)) {
      warn!("摘要输出失败: {}", err);
    }
  }
}
