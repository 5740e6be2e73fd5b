//! 容器几何模型
//!
//! 纯函数：跟踪剩余体积 + 容器形状 → 吸头底部间隙与吸液速率。
//!
//! - 死体积以上：`depth = round(cylinder_base + remaining / (π·r²) − immersion, 1)`
//! - 死体积及以下：固定回退间隙 + 回退速率
//! - 任何情况下 `depth >= floor_clearance`
//!
//! # 示例
//!
//! ```rust
//! use elisa_engine::geometry::clearance;
//! use elisa_labware::{Microliters, Millimeters, Vessel};
//!
//! let tube = Vessel::eppendorf_tube("A1", Microliters(2000.0));
//! let c = clearance(&tube, Microliters(700.0), Microliters(700.0));
//! assert_eq!(c.depth, Millimeters(23.6));
//! ```

use elisa_labware::{FlowRate, Microliters, Millimeters, RateProfile, Vessel};

/// 一次吸液的定位结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clearance {
    /// 距容器底部高度
    pub depth: Millimeters,
    pub rate: FlowRate,
    /// 是否使用了死体积以下的回退参数
    pub fallback: bool,
}

/// 计算底部间隙与吸液速率
///
/// `remaining` 为账本中的有效剩余体积（已扣除不可吸取部分），
/// `initial_fill` 为初始化时的有效体积，仅用于比例速率。
pub fn clearance(vessel: &Vessel, remaining: Microliters, initial_fill: Microliters) -> Clearance {
    if remaining <= vessel.dead_volume {
        return Clearance {
            depth: vessel.fallback_clearance.max(vessel.floor_clearance),
            rate: vessel.fallback_rate,
            fallback: true,
        };
    }

    let column = Millimeters(remaining.0 / vessel.cross_section_area());
    let depth = (vessel.shape.cylinder_base() + column - vessel.immersion_depth).round_to_tenth();

    Clearance {
        depth: depth.max(vessel.floor_clearance),
        rate: aspiration_rate(vessel.rate_profile, remaining, initial_fill),
        fallback: false,
    }
}

/// 死体积以上的吸液速率
///
/// 比例曲线：`floor + (1 − floor) · remaining / initial_fill`，限制在 `[floor, 1]`。
pub fn aspiration_rate(
    profile: RateProfile,
    remaining: Microliters,
    initial_fill: Microliters,
) -> FlowRate {
    match profile {
        RateProfile::Nominal => FlowRate::NOMINAL,
        RateProfile::Proportional { floor } => {
            if initial_fill.0 <= 0.0 {
                return FlowRate(floor).clamped(floor);
            }
            let fraction = (remaining / initial_fill).max(0.0);
            FlowRate(floor + (1.0 - floor) * fraction).clamped(floor)
        },
    }
}
