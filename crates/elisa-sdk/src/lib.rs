//! ELISA SDK - 酶联免疫板制备的移液控制 SDK
//!
//! 单臂移液工作站的体积跟踪与自适应分配控制器：根据容器几何与账本剩余
//! 计算吸头深度和吸液速率，决定何时重新吸液，并在源容器之间轮换。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **耗材层** (`labware`): 单位、孔位、容器与移液器描述
//! - **驱动层** (`driver`): 移液驱动 Trait、命令流、诊断钩子
//! - **配置层** (`tools`): 单一协议配置记录（TOML）
//! - **引擎层** (`engine`): 几何、账本、批处理、轮换、规划、编排
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use elisa_driver::RecordingDriver;
//! use elisa_sdk::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! elisa_sdk::init_logging("elisa_engine=info");
//!
//! let config = ProtocolConfig::load_from_file("protocol.toml")?;
//! let mut orchestrator = Orchestrator::new(&config)?;
//! let mut driver = RecordingDriver::new();
//! let report = orchestrator.execute(&mut driver)?;
//! println!("{} dispenses", report.dispenses);
//! # Ok(())
//! # }
//! ```

pub mod logging;
pub mod prelude;

// --- 用户以此为界 ---

pub use elisa_driver as driver;
pub use elisa_engine as engine;
pub use elisa_labware as labware;
pub use elisa_tools as tools;

pub use elisa_driver::{DriverError, PipettingDriver};
pub use elisa_engine::{EngineError, Orchestrator, RunReport, run_protocol};
pub use elisa_labware::LabwareError;
pub use elisa_tools::{ConfigError, ProtocolConfig};
pub use logging::{init_logging, try_init_logging};
