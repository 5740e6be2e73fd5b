//! 源容器描述
//!
//! 两段式模型：圆柱段 + 可选锥形底。锥形底以下的液体由
//! `unusable_offset` 在账本初始化时扣除，几何公式只覆盖圆柱段。
//! 剩余体积不在此处保存，由引擎的体积账本独占。

use std::fmt;

use crate::constants::*;
use crate::error::LabwareError;
use crate::units::{FlowRate, Microliters, Millimeters};

/// 容器编号（如 "A1"、"reservoir-1"）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct VesselId(pub String);

impl VesselId {
    pub fn new(id: impl Into<String>) -> Self {
        VesselId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VesselId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VesselId {
    fn from(value: &str) -> Self {
        VesselId(value.to_string())
    }
}

/// 容器形状
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum VesselShape {
    /// 纯圆柱（储液槽按等效半径建模）
    Cylindrical,
    /// 圆柱 + 锥形底（Eppendorf 管、Falcon 管）
    ConicalBottom {
        /// 锥形段高度
        conical_height: Millimeters,
    },
}

impl VesselShape {
    /// 圆柱段起始高度（纯圆柱为 0）
    #[inline]
    pub fn cylinder_base(&self) -> Millimeters {
        match self {
            VesselShape::Cylindrical => Millimeters::ZERO,
            VesselShape::ConicalBottom { conical_height } => *conical_height,
        }
    }
}

/// 吸液速率曲线
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum RateProfile {
    /// 死体积以上恒为标称速率
    #[default]
    Nominal,
    /// 随剩余比例线性衰减：`floor + (1 - floor) * remaining / initial`
    Proportional { floor: f64 },
}

/// 源容器
///
/// # 字段约束
///
/// - `radius > 0`
/// - `floor_clearance <= fallback_clearance`
/// - `0 < fallback_rate <= 1`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vessel {
    pub id: VesselId,
    pub shape: VesselShape,
    /// 圆柱段半径
    pub radius: Millimeters,
    /// 总容量
    pub capacity: Microliters,
    /// 不可吸取的底部体积（通常为锥形段容积）
    #[cfg_attr(feature = "serde", serde(default))]
    pub unusable_offset: Microliters,
    /// 死体积阈值：跟踪剩余体积不高于此值时几何公式不可信
    #[cfg_attr(feature = "serde", serde(default))]
    pub dead_volume: Microliters,
    /// 期望浸没深度
    #[cfg_attr(feature = "serde", serde(default = "default_immersion"))]
    pub immersion_depth: Millimeters,
    /// 最小安全底部间隙
    pub floor_clearance: Millimeters,
    /// 死体积以下使用的固定底部间隙
    pub fallback_clearance: Millimeters,
    /// 死体积以下使用的吸液速率
    #[cfg_attr(feature = "serde", serde(default = "default_fallback_rate"))]
    pub fallback_rate: FlowRate,
    #[cfg_attr(feature = "serde", serde(default))]
    pub rate_profile: RateProfile,
}

#[cfg(feature = "serde")]
fn default_immersion() -> Millimeters {
    Millimeters(DEFAULT_IMMERSION_DEPTH_MM)
}

#[cfg(feature = "serde")]
fn default_fallback_rate() -> FlowRate {
    FlowRate(DEFAULT_FALLBACK_RATE)
}

impl Vessel {
    /// Eppendorf Safe-Lock 管（1.5 / 2.0 mL，锥形底 500 µL）
    pub fn eppendorf_tube(id: impl Into<String>, capacity: Microliters) -> Self {
        Self {
            id: VesselId::new(id),
            shape: VesselShape::ConicalBottom {
                conical_height: Millimeters(EPPENDORF_CONICAL_HEIGHT_MM),
            },
            radius: Millimeters(EPPENDORF_RADIUS_MM),
            capacity,
            unusable_offset: Microliters(EPPENDORF_CONICAL_VOLUME_UL),
            dead_volume: Microliters::ZERO,
            immersion_depth: Millimeters(DEFAULT_IMMERSION_DEPTH_MM),
            floor_clearance: Millimeters(EPPENDORF_FLOOR_CLEARANCE_MM),
            fallback_clearance: Millimeters(EPPENDORF_FALLBACK_CLEARANCE_MM),
            fallback_rate: FlowRate(DEFAULT_FALLBACK_RATE),
            rate_profile: RateProfile::Nominal,
        }
    }

    /// 矩形储液槽
    ///
    /// 以等效半径 `sqrt(capacity / (π·depth))` 建模为圆柱，
    /// 液面高度随体积线性变化，速率随剩余比例衰减。
    pub fn reservoir(
        id: impl Into<String>,
        capacity: Microliters,
        depth: Millimeters,
        dead_volume: Microliters,
    ) -> Result<Self, LabwareError> {
        let id = id.into();
        if capacity.0 <= 0.0 || depth.0 <= 0.0 {
            return Err(LabwareError::InvalidGeometry {
                vessel: id,
                reason: "reservoir capacity and depth must be positive".to_string(),
            });
        }
        let radius = Millimeters((capacity.0 / (std::f64::consts::PI * depth.0)).sqrt());
        let floor = Millimeters(RESERVOIR_FLOOR_CLEARANCE_MM);
        Ok(Self {
            id: VesselId::new(id),
            shape: VesselShape::Cylindrical,
            radius,
            capacity,
            unusable_offset: Microliters::ZERO,
            dead_volume,
            immersion_depth: Millimeters(RESERVOIR_IMMERSION_DEPTH_MM),
            floor_clearance: floor,
            fallback_clearance: floor,
            fallback_rate: FlowRate(MIN_RATE_FLOOR),
            rate_profile: RateProfile::Proportional {
                floor: MIN_RATE_FLOOR,
            },
        })
    }

    /// 圆柱段截面积（mm²，数值上等于每 mm 液柱的 µL 数）
    #[inline]
    pub fn cross_section_area(&self) -> f64 {
        std::f64::consts::PI * self.radius.0 * self.radius.0
    }

    /// 校验几何参数
    pub fn validate(&self) -> Result<(), LabwareError> {
        let fail = |reason: &str| {
            Err(LabwareError::InvalidGeometry {
                vessel: self.id.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.radius.0 <= 0.0 || !self.radius.0.is_finite() {
            return fail("radius must be positive");
        }
        if self.capacity.0 <= 0.0 {
            return fail("capacity must be positive");
        }
        if self.shape.cylinder_base().0 < 0.0 {
            return fail("conical height must not be negative");
        }
        if self.unusable_offset.0 < 0.0 || self.dead_volume.0 < 0.0 {
            return fail("unusable offset and dead volume must not be negative");
        }
        if self.unusable_offset >= self.capacity {
            return fail("unusable offset must be below capacity");
        }
        if self.floor_clearance.0 < 0.0 {
            return fail("floor clearance must not be negative");
        }
        if self.fallback_clearance < self.floor_clearance {
            return fail("fallback clearance must not be below floor clearance");
        }
        if !(self.fallback_rate.0 > 0.0 && self.fallback_rate.0 <= 1.0) {
            return fail("fallback rate must be in (0, 1]");
        }
        if let RateProfile::Proportional { floor } = self.rate_profile {
            if !(floor > 0.0 && floor <= 1.0) {
                return fail("rate floor must be in (0, 1]");
            }
        }
        Ok(())
    }
}
