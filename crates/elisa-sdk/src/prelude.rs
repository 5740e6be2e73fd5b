//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use elisa_sdk::prelude::*;
//! ```

// 耗材描述
pub use elisa_labware::{
    FlowRate, Microliters, Millimeters, PipetteSpec, SafetyVolume, Vessel, VesselId, WellId,
    WellRef,
};

// 配置
pub use elisa_tools::{ProtocolConfig, RotationPolicy, SafetyDisposition, TipPolicy};

// 驱动端口与诊断
pub use elisa_driver::{
    AsyncDiagnosticsHook, DiagnosticCallback, DiagnosticEvent, Location, PipetteCommand,
    PipettingDriver, StrokeRecord,
};
#[cfg(feature = "mock")]
pub use elisa_driver::RecordingDriver;

// 引擎
pub use elisa_engine::{Orchestrator, RunReport, run_protocol};

// 错误类型
pub use elisa_driver::DriverError;
pub use elisa_engine::EngineError;
pub use elisa_tools::ConfigError;
