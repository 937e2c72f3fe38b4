// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use shanan_lens::{
  FromUrl,
  coordinator::{Coordinator, PassOutcome, PipelineContext},
  input::InputWrapper,
  model::ReplayEngine,
  output::{LogOutput, OutputWrapper},
  task::{ContinuousTask, OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("推理引擎: {}", args.model);
  info!("输入来源: {}", args.input);
  if let Some(output) = &args.output {
    info!("输出路径: {}", output);
  }

  let coordinator = match initialize(&args) {
    Ok(coordinator) => coordinator,
    Err(err) => {
      error!("初始化失败: {:#}", err);
      eprintln!("初始化失败，无法开始检测，程序退出: {:#}", err);
      std::process::exit(1);
    }
  };

  let input = InputWrapper::from_url(&args.input).context("无法打开输入来源")?;
  let ledger = input.ledger();

  if args.is_continuous() {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      handler_stop.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .context("无法设置 Ctrl-C 处理函数")?;

    ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .with_fps(args.fps)
      .with_stop_flag(stop)
      .run_task(input, coordinator)?;
  } else if let PassOutcome::Failed(err) = OneShotTask.run_task(input, coordinator)? {
    warn!("第一帧处理失败: {}", err);
  }

  if ledger.outstanding() > 0 {
    warn!("仍有 {} 帧未释放", ledger.outstanding());
  }
  info!("共读取 {} 帧, 已释放 {} 帧", ledger.delivered(), ledger.released());

  Ok(())
}

/// 加载配置、标签、推理引擎和输出；任何失败都不进入检测
fn initialize(args: &args::Args) -> Result<Arc<Coordinator>> {
  let config = args.pipeline_config()?;
  if config.view.size.is_some()
    && args
      .output
      .as_ref()
      .is_some_and(|url| url.scheme() == "image")
  {
    warn!("标注图像按正向画面绘制，指定显示区域时检测框位置以显示区域为准");
  }

  let context = PipelineContext::initialize(config)?;
  let engine = ReplayEngine::from_url(&args.model).context("无法加载推理引擎")?;
  let render = match &args.output {
    Some(url) => OutputWrapper::from_url(url).context("无法创建输出")?,
    None => OutputWrapper::Log(LogOutput),
  };

  Ok(Arc::new(Coordinator::new(context, engine, render, LogOutput)))
}
