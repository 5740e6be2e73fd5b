//! # ELISA Engine
//!
//! 体积跟踪与自适应分配控制器
//!
//! ## 组件（自底向上）
//!
//! - `geometry`: 剩余体积 + 容器形状 → 吸头底部间隙与吸液速率（纯函数）
//! - `ledger`: 每个容器的权威剩余体积，初始化时扣除不可吸取部分
//! - `batcher`: 吸液批次划分、安全体积保留、吸液状态机
//! - `rotation`: 轮换池（阈值 / 按块调度），可选剩余合并
//! - `planner`: 逻辑布局 → 有序目标序列，按（板, 分组）切分为运行
//! - `dilution`: 稀释倍数换算目标体积
//! - `provisioning`: 上机前的备料估算
//! - `orchestrator`: 两遍执行（编译 + 下发），诊断记录
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use elisa_driver::RecordingDriver;
//! use elisa_engine::run_protocol;
//! use elisa_tools::ProtocolConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProtocolConfig::load_from_file("protocol.toml")?;
//! let mut driver = RecordingDriver::new();
//! let report = run_protocol(&config, &mut driver)?;
//! println!("{} dispenses, {} aspirated", report.dispenses, report.aspirated);
//! # Ok(())
//! # }
//! ```

pub mod batcher;
pub mod dilution;
mod error;
pub mod geometry;
pub mod ledger;
pub mod orchestrator;
pub mod planner;
pub mod provisioning;
pub mod rotation;

pub use batcher::{AspirationBatcher, PlannedStroke, StrokePhase, StrokeTracker};
pub use error::{EngineError, Result};
pub use geometry::{Clearance, clearance};
pub use ledger::VolumeLedger;
pub use orchestrator::{LedgerEffect, Orchestrator, Program, RunReport, Step, run_protocol};
pub use planner::{DispensePlan, DispensePlanner, DispenseTarget, Run};
pub use provisioning::PoolEstimate;
pub use rotation::{Rotation, RotationPool};
