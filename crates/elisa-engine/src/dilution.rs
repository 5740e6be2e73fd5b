//! 稀释体积计算
//!
//! 终体积 `final`、稀释倍数 `factor`（1:factor）、合并储液份数 `parts`：
//!
//! - 储液：`final / factor`
//! - 稀释液：`(final − parts·final/factor) / parts`
//!
//! `parts > 1` 用于多个储液合并到同一孔的情形，
//! 稀释液分 `parts` 次加入（每个储液配一份）。

use elisa_labware::Microliters;
use elisa_tools::TargetVolume;

use crate::error::{EngineError, Result};

/// 储液体积
pub fn stock_volume(final_volume: Microliters, factor: f64) -> Microliters {
    final_volume / factor
}

/// 单份稀释液体积
pub fn diluent_volume(final_volume: Microliters, factor: f64, parts: u32) -> Microliters {
    let parts = f64::from(parts);
    (final_volume - final_volume * (parts / factor)) / parts
}

/// 解析每孔体积
///
/// # 错误
///
/// 结果非正（稀释倍数或份数不合理）时返回 `InvalidLayout`。
pub fn resolve(target: &TargetVolume) -> Result<Microliters> {
    let volume = match *target {
        TargetVolume::Fixed { volume } => volume,
        TargetVolume::Diluent {
            final_volume,
            factor,
            parts,
        } => {
            if parts == 0 {
                return Err(EngineError::InvalidLayout(
                    "diluent parts must be at least 1".to_string(),
                ));
            }
            diluent_volume(final_volume, factor, parts)
        },
        TargetVolume::Stock {
            final_volume,
            factor,
        } => stock_volume(final_volume, factor),
    };
    if !(volume.0.is_finite() && volume.0 > 0.0) {
        return Err(EngineError::InvalidLayout(format!(
            "target volume {:?} resolves to {}",
            target, volume
        )));
    }
    Ok(volume)
}
