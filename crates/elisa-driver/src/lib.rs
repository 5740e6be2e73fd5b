//! # ELISA Driver
//!
//! 移液驱动端口层：编排器与外部硬件之间的窄接口
//!
//! ## 模块
//!
//! - `driver`: 驱动 Trait（`pick_up_tip` / `aspirate` / `dispense` / `mix` / `blow_out` / `drop_tip`）
//! - `command`: 可序列化的命令流
//! - `hooks`: 诊断回调管理
//! - `recording`: 每次吸液的诊断记录与异步记录钩子
//! - `mock`: 记录型 Mock 驱动（`mock` feature）
//!
//! ## 错误语义
//!
//! 每个驱动调用是原子的，失败即不可恢复；本层和上层都不重试。

pub mod command;
pub mod driver;
mod error;
pub mod hooks;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod recording;

pub use command::{Location, PipetteCommand};
pub use driver::PipettingDriver;
pub use error::DriverError;
pub use hooks::{DiagnosticCallback, HookManager};
pub use recording::{AsyncDiagnosticsHook, DiagnosticEvent, RotationRecord, StrokeRecord};

#[cfg(any(test, feature = "mock"))]
pub use mock::RecordingDriver;
