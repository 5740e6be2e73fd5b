//! # ELISA Tools - 协议配置
//!
//! **依赖原则**: 只依赖 `elisa-labware`，不依赖引擎与驱动
//!
//! ## 包含模块
//!
//! - `config` - 单一协议配置记录（移液器、批处理、容器表、轮换池、布局）
//! - `layout` - 逻辑布局描述（分组、复制块、排除集）
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use elisa_tools::ProtocolConfig;
//!
//! let config = ProtocolConfig::load_from_file("protocol.toml")?;
//! println!("{} plates, {} vessels", config.layout.plates, config.vessels.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
mod error;
pub mod layout;

// 重新导出常用类型
pub use config::{
    BatchingConfig, PoolConfig, ProtocolConfig, RotationPolicy, SafetyDisposition, TipPolicy,
    VesselConfig, VesselModel,
};
pub use error::ConfigError;
pub use layout::{
    CarveOut, GroupConfig, LayoutConfig, MixConfig, Pattern, TargetVolume, WellOrder,
};
