//! 引擎错误类型定义

use elisa_driver::DriverError;
use elisa_labware::{LabwareError, Microliters, VesselId};
use elisa_tools::ConfigError;
use thiserror::Error;

/// 引擎错误类型
///
/// 任何错误都终止整次运行（半块板会使整个检测失效），引擎不做部分恢复。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// 计划中的扣减会使剩余体积为负（配置或规划缺陷）
    #[error("Geometry underflow on {vessel}: requested {requested}, only {remaining} remaining")]
    GeometryUnderflow {
        vessel: VesselId,
        requested: Microliters,
        remaining: Microliters,
    },

    /// 吸液量超出移液器/吸头上限
    #[error("Capacity exceeded: {what} needs {requested}, limit is {limit}")]
    CapacityExceeded {
        what: String,
        requested: Microliters,
        limit: Microliters,
    },

    /// 轮换池耗尽但仍有目标孔未完成，需要人工补液
    #[error("Source exhausted: pool '{pool}' has no usable vessel left ({pending} destinations pending)")]
    SourceExhausted { pool: String, pending: usize },

    /// 驱动故障，原样透传
    #[error(transparent)]
    HardwareFault(#[from] DriverError),

    #[error("Unknown vessel: {0}")]
    UnknownVessel(VesselId),

    #[error("Unknown pool: {0}")]
    UnknownPool(String),

    /// 布局展开失败（孔位越界、排除集引用不存在的孔位、孔位重复分配）
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// 批处理状态机被错误驱动（内部不变量被破坏）
    #[error("Invalid stroke state: {0}")]
    InvalidState(String),

    /// 配置校验失败（容量超限除外，见 `From<ConfigError>`）
    #[error("Invalid configuration: {0}")]
    Config(ConfigError),

    #[error("Invalid labware: {0}")]
    Labware(#[from] LabwareError),
}

/// 配置层发现的容量超限统一归为 `CapacityExceeded`，
/// 与批处理器在规划阶段报告的是同一种错误。
impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::CapacityExceeded {
                capacity,
                safety,
                max_volume,
            } => EngineError::CapacityExceeded {
                what: format!("batch capacity {} plus safety volume {}", capacity, safety),
                requested: capacity + safety,
                limit: max_volume,
            },
            other => EngineError::Config(other),
        }
    }
}

impl EngineError {
    /// 是否在规划阶段（任何物理命令下发之前）产生
    ///
    /// `InvalidState` 不属于此类：它表示状态机被错误驱动，
    /// 或硬件故障后试图再次执行。
    pub fn is_preflight(&self) -> bool {
        !matches!(
            self,
            EngineError::HardwareFault(_) | EngineError::InvalidState(_)
        )
    }

    /// 是否需要操作员补液
    pub fn requires_refill(&self) -> bool {
        matches!(self, EngineError::SourceExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
