//! 移液器描述与安全体积

use crate::constants::SAFETY_VOLUME_LADDER_UL;
use crate::error::LabwareError;
use crate::units::Microliters;

/// 移液器规格
///
/// 所有吸/排体积均按单通道计；多通道移液器每次吸液从源容器取走
/// `volume * channels`。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipetteSpec {
    /// 型号（如 "p300_single_gen2"）
    pub name: String,
    /// 单通道最大吸液量
    pub max_volume: Microliters,
    /// 通道数（单道 1，排枪 8）
    #[cfg_attr(feature = "serde", serde(default = "default_channels"))]
    pub channels: u32,
}

#[cfg(feature = "serde")]
fn default_channels() -> u32 {
    1
}

impl PipetteSpec {
    pub fn new(name: impl Into<String>, max_volume: Microliters, channels: u32) -> Self {
        Self {
            name: name.into(),
            max_volume,
            channels,
        }
    }

    /// P300 单道
    pub fn p300_single() -> Self {
        Self::new("p300_single_gen2", Microliters(300.0), 1)
    }

    /// P300 八道排枪
    pub fn p300_multi() -> Self {
        Self::new("p300_multi", Microliters(300.0), 8)
    }

    /// 单通道体积换算为从源容器取走的总体积
    #[inline]
    pub fn total_volume(&self, per_channel: Microliters) -> Microliters {
        per_channel * f64::from(self.channels)
    }

    pub fn validate(&self) -> Result<(), LabwareError> {
        if self.max_volume.0 <= 0.0 {
            return Err(LabwareError::InvalidPipette {
                name: self.name.clone(),
                reason: "max volume must be positive".to_string(),
            });
        }
        if self.channels == 0 {
            return Err(LabwareError::InvalidPipette {
                name: self.name.clone(),
                reason: "channel count must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// 安全体积（每次首吸额外吸取、运行结束时吹回或丢弃）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "volume", rename_all = "snake_case"))]
pub enum SafetyVolume {
    /// 固定值
    Fixed(Microliters),
    /// 按移液器余量自动选择（见 [`SAFETY_VOLUME_LADDER_UL`]）
    #[default]
    Auto,
}

impl SafetyVolume {
    /// 解析为具体体积
    ///
    /// `Auto` 选择阶梯中满足 `batch_capacity + safety <= max_volume` 的最大值；
    /// 批容量本身已超出移液器上限时返回 0，由批处理器报告容量错误。
    pub fn resolve(self, pipette: &PipetteSpec, batch_capacity: Microliters) -> Microliters {
        match self {
            SafetyVolume::Fixed(v) => v,
            SafetyVolume::Auto => SAFETY_VOLUME_LADDER_UL
                .iter()
                .map(|v| Microliters(*v))
                .find(|v| (batch_capacity + *v).0 <= pipette.max_volume.0)
                .unwrap_or(Microliters::ZERO),
        }
    }
}
