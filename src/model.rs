// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

use crate::{
  error::InferenceError,
  tensor::{RawDetectionTensor, Tensor},
};

/// 推理引擎：张量进，原始输出张量出
///
/// 引擎句柄不可重入，协调器保证同一时间只有一个处理流程持有它。
pub trait InferenceEngine: Send {
  fn infer(&mut self, input: &Tensor) -> Result<RawDetectionTensor, InferenceError>;
}

impl<F> InferenceEngine for F
where
  F: FnMut(&Tensor) -> Result<RawDetectionTensor, InferenceError> + Send,
{
  fn infer(&mut self, input: &Tensor) -> Result<RawDetectionTensor, InferenceError> {
    self(input)
  }
}

/// 由闭包构造推理引擎，便于推断闭包签名
pub fn from_fn<F>(f: F) -> F
where
  F: FnMut(&Tensor) -> Result<RawDetectionTensor, InferenceError> + Send,
{
  f
}

mod decode;
mod labels;
mod nms;
mod replay;

pub use self::decode::{
  BoxEncoding, BoxUnits, Candidate, Decoder, DecoderConfig, OutputLayout, ScoreMode,
};
pub use self::labels::{COCO_LABELS, LabelTable};
pub use self::nms::{iou, suppress};
pub use self::replay::{ReplayEngine, ReplayEngineError};
