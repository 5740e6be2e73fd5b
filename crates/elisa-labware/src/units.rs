//! 强类型单位系统
//!
//! 使用 NewType 模式区分体积（µL）、高度（mm）和吸液速率倍率，
//! 防止把体积当作高度传给驱动。
//!
//! # 示例
//!
//! ```rust
//! use elisa_labware::units::{Microliters, Millimeters};
//!
//! let stroke = Microliters(200.0) + Microliters(50.0);
//! assert_eq!(stroke, Microliters(250.0));
//!
//! let depth = Millimeters(23.575).round_to_tenth();
//! assert_eq!(depth, Millimeters(23.6));
//!
//! // 类型安全：以下代码无法编译
//! // let _ = Microliters(1.0) + Millimeters(1.0);  // ❌ 类型不匹配
//! ```

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use crate::constants::VOLUME_EPSILON_UL;

/// 体积（微升，NewType）
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Microliters(pub f64);

impl Microliters {
    /// 零体积
    pub const ZERO: Self = Microliters(0.0);

    /// 创建新的体积值
    #[inline]
    pub const fn new(value: f64) -> Self {
        Microliters(value)
    }

    /// 获取原始值
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// 在 [`VOLUME_EPSILON_UL`] 容差内比较
    #[inline]
    pub fn approx_eq(self, other: Self) -> bool {
        (self.0 - other.0).abs() <= VOLUME_EPSILON_UL
    }

    /// 是否（在容差内）为零
    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.abs() <= VOLUME_EPSILON_UL
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        Microliters(self.0.max(other.0))
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        Microliters(self.0.min(other.0))
    }

    /// 该体积能整份容纳多少个 `portion`
    ///
    /// 带容差：`200 / 25` 即使有浮点误差也返回 8。
    /// `portion` 非正时返回 0。
    pub fn whole_portions(self, portion: Microliters) -> usize {
        if portion.0 <= 0.0 || self.0 <= 0.0 {
            return 0;
        }
        ((self.0 + VOLUME_EPSILON_UL) / portion.0).floor() as usize
    }
}

impl fmt::Display for Microliters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} µL", self.0)
    }
}

impl Add for Microliters {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Microliters(self.0 + rhs.0)
    }
}

impl AddAssign for Microliters {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Microliters {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Microliters(self.0 - rhs.0)
    }
}

impl SubAssign for Microliters {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul<f64> for Microliters {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Microliters(self.0 * rhs)
    }
}

impl Div<f64> for Microliters {
    type Output = Self;
    fn div(self, rhs: f64) -> Self {
        Microliters(self.0 / rhs)
    }
}

/// 体积之比（无量纲）
impl Div for Microliters {
    type Output = f64;
    fn div(self, rhs: Self) -> f64 {
        self.0 / rhs.0
    }
}

impl Neg for Microliters {
    type Output = Self;
    fn neg(self) -> Self {
        Microliters(-self.0)
    }
}

impl Sum for Microliters {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Microliters::ZERO, Add::add)
    }
}

/// 高度/距离（毫米，NewType）
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Millimeters(pub f64);

impl Millimeters {
    pub const ZERO: Self = Millimeters(0.0);

    #[inline]
    pub const fn new(value: f64) -> Self {
        Millimeters(value)
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// 四舍五入到 0.1 mm（驱动端定位精度）
    #[inline]
    pub fn round_to_tenth(self) -> Self {
        Millimeters((self.0 * 10.0).round() / 10.0)
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        Millimeters(self.0.max(other.0))
    }
}

impl fmt::Display for Millimeters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} mm", self.0)
    }
}

impl Add for Millimeters {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Millimeters(self.0 + rhs.0)
    }
}

impl Sub for Millimeters {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Millimeters(self.0 - rhs.0)
    }
}

/// 吸液速率倍率（相对标称流速，1.0 = 标称）
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FlowRate(pub f64);

impl FlowRate {
    /// 标称速率
    pub const NOMINAL: Self = FlowRate(1.0);

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// 限制在 `[floor, 1.0]` 内
    #[inline]
    pub fn clamped(self, floor: f64) -> Self {
        FlowRate(self.0.clamp(floor, 1.0))
    }
}

impl Default for FlowRate {
    fn default() -> Self {
        Self::NOMINAL
    }
}

impl fmt::Display for FlowRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x", self.0)
    }
}
