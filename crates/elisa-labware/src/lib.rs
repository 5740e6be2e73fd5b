//! # ELISA Labware
//!
//! 移液流程使用的耗材描述（无硬件依赖、无可变状态）
//!
//! ## 模块
//!
//! - `units`: 强类型单位（µL、mm、速率倍率）
//! - `well`: 孔位编号与板内定位
//! - `vessel`: 源容器两段式几何描述
//! - `pipette`: 移液器规格与安全体积
//! - `constants`: 命名常量
//!
//! ## Feature Flags
//!
//! - `serde`: 为所有描述类型派生 `Serialize`/`Deserialize`（配置文件加载需要）

pub mod constants;
mod error;
pub mod pipette;
pub mod units;
pub mod vessel;
pub mod well;

// 重新导出常用类型
pub use error::LabwareError;
pub use pipette::{PipetteSpec, SafetyVolume};
pub use units::{FlowRate, Microliters, Millimeters};
pub use vessel::{RateProfile, Vessel, VesselId, VesselShape};
pub use well::{WellId, WellRef};
