//! 逻辑布局描述
//!
//! 布局只描述“哪个分组用哪个源、打到哪些孔、每孔多少”；
//! 展开为有序目标序列由引擎的规划器完成。

use elisa_labware::{Microliters, WellId};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 整个布局
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// 板数；每个分组在每块板上复制一次（按板顺序）
    #[serde(default = "default_plates")]
    pub plates: usize,
    pub groups: Vec<GroupConfig>,
    /// 排除集：把某分组的部分孔位划给另一个分组
    #[serde(default)]
    pub carve_outs: Vec<CarveOut>,
}

fn default_plates() -> usize {
    1
}

/// 分组内孔位的排列顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellOrder {
    /// A1, A2, … A12, B1 …
    #[default]
    RowMajor,
    /// A1, B1, … H1, A2 …（排枪按列加样）
    ColumnMajor,
    /// 保持配置中的书写顺序
    AsListed,
}

/// 逻辑分组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    /// 一个池（所有板共用）或每块板一个池
    pub sources: Vec<String>,
    #[serde(default)]
    pub order: WellOrder,
    /// 覆盖全局批容量
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_capacity: Option<Microliters>,
    /// 每孔体积（单通道）
    pub volume: TargetVolume,
    pub pattern: Pattern,
    /// 每个孔加满后原地混匀
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mix_after: Option<MixConfig>,
}

impl GroupConfig {
    /// 第 `plate` 块板（0 起）使用的池名
    pub fn source_for_plate(&self, plate: usize) -> Option<&str> {
        match self.sources.len() {
            1 => self.sources.first().map(String::as_str),
            _ => self.sources.get(plate).map(String::as_str),
        }
    }
}

/// 混匀参数（单通道）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixConfig {
    pub repetitions: u32,
    pub volume: Microliters,
}

impl MixConfig {
    pub(crate) fn validate(&self, group: &str, max_volume: Microliters) -> Result<(), ConfigError> {
        let reason = if self.repetitions == 0 {
            "mix repetitions must be at least 1".to_string()
        } else if self.volume.0 <= 0.0 || self.volume.0 > max_volume.0 {
            format!("mix volume {} outside (0, {}]", self.volume, max_volume)
        } else {
            return Ok(());
        };
        Err(ConfigError::InvalidVolume {
            group: group.to_string(),
            reason,
        })
    }
}

/// 孔位模式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pattern {
    /// 单源扇出到固定孔位列表
    FanOut { wells: Vec<WellId> },
    /// 模板块沿行/列平移复制 `repeats` 次
    ///
    /// 第 k 份复制：行 `rows + k·row_stride`，列 `columns + k·column_stride`。
    Block {
        /// 行字母，如 "A-H" 或 "ABGH"
        rows: String,
        /// 模板列号（1 起）
        columns: Vec<u8>,
        #[serde(default = "default_repeats")]
        repeats: u8,
        #[serde(default)]
        column_stride: u8,
        #[serde(default)]
        row_stride: u8,
    },
}

fn default_repeats() -> u8 {
    1
}

/// 排除集
///
/// `wells` 中的孔位从 `from_group` 移除，追加到 `into_group`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarveOut {
    pub from_group: String,
    pub into_group: String,
    pub wells: Vec<WellId>,
    /// 作用的板号（1 起）；为空表示所有板
    #[serde(default)]
    pub plates: Vec<usize>,
}

impl CarveOut {
    /// 是否作用于第 `plate` 块板（0 起）
    pub fn applies_to(&self, plate: usize) -> bool {
        self.plates.is_empty() || self.plates.contains(&(plate + 1))
    }
}

/// 每孔体积
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetVolume {
    /// 固定体积
    Fixed { volume: Microliters },
    /// 稀释液体积：`(final − parts·final/factor) / parts`
    ///
    /// `parts` 为合并到同一孔的储液份数（多个储液共用一份稀释液）。
    Diluent {
        final_volume: Microliters,
        factor: f64,
        #[serde(default = "default_parts")]
        parts: u32,
    },
    /// 储液体积：`final / factor`
    Stock { final_volume: Microliters, factor: f64 },
}

fn default_parts() -> u32 {
    1
}

impl TargetVolume {
    pub(crate) fn validate(&self, group: &str) -> Result<(), ConfigError> {
        let fail = |reason: String| {
            Err(ConfigError::InvalidVolume {
                group: group.to_string(),
                reason,
            })
        };
        match *self {
            TargetVolume::Fixed { volume } => {
                if volume.0 <= 0.0 {
                    return fail(format!("volume must be positive, got {}", volume));
                }
            },
            TargetVolume::Diluent {
                final_volume,
                factor,
                parts,
            } => {
                if final_volume.0 <= 0.0 {
                    return fail("final volume must be positive".to_string());
                }
                if parts == 0 {
                    return fail("parts must be at least 1".to_string());
                }
                // 稀释液体积必须为正
                if factor.is_nan() || factor <= f64::from(parts) {
                    return fail(format!(
                        "dilution factor {} leaves no diluent for {} part(s)",
                        factor, parts
                    ));
                }
            },
            TargetVolume::Stock {
                final_volume,
                factor,
            } => {
                if final_volume.0 <= 0.0 {
                    return fail("final volume must be positive".to_string());
                }
                if factor.is_nan() || factor < 1.0 {
                    return fail(format!("dilution factor must be >= 1, got {}", factor));
                }
            },
        }
        Ok(())
    }
}

impl Pattern {
    pub(crate) fn validate(&self, group: &str) -> Result<(), ConfigError> {
        let fail = |reason: String| {
            Err(ConfigError::InvalidPattern {
                group: group.to_string(),
                reason,
            })
        };
        match self {
            Pattern::FanOut { .. } => Ok(()),
            Pattern::Block {
                rows,
                columns,
                repeats,
                ..
            } => {
                let parsed = elisa_labware::well::parse_rows(rows)?;
                if parsed.is_empty() {
                    return fail("block needs at least one row".to_string());
                }
                if columns.is_empty() {
                    return fail("block needs at least one column".to_string());
                }
                if *repeats == 0 {
                    return fail("block repeats must be at least 1".to_string());
                }
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_for_plate() {
        let group = GroupConfig {
            name: "samples".to_string(),
            sources: vec!["p1".to_string(), "p2".to_string()],
            order: WellOrder::RowMajor,
            batch_capacity: None,
            volume: TargetVolume::Fixed {
                volume: Microliters(25.0),
            },
            pattern: Pattern::FanOut { wells: vec![] },
            mix_after: None,
        };
        assert_eq!(group.source_for_plate(1), Some("p2"));
        assert_eq!(group.source_for_plate(2), None);

        let shared = GroupConfig {
            sources: vec!["p1".to_string()],
            ..group
        };
        assert_eq!(shared.source_for_plate(7), Some("p1"));
    }

    #[test]
    fn test_carve_out_plate_filter() {
        let carve = CarveOut {
            from_group: "samples".to_string(),
            into_group: "blank".to_string(),
            wells: vec![],
            plates: vec![2],
        };
        assert!(!carve.applies_to(0));
        assert!(carve.applies_to(1));
    }

    #[test]
    fn test_target_volume_validation() {
        let ok = TargetVolume::Diluent {
            final_volume: Microliters(1700.0),
            factor: 825.0,
            parts: 7,
        };
        assert!(ok.validate("m7").is_ok());

        let no_diluent = TargetVolume::Diluent {
            final_volume: Microliters(1700.0),
            factor: 5.0,
            parts: 7,
        };
        assert!(no_diluent.validate("m7").is_err());

        let bad_stock = TargetVolume::Stock {
            final_volume: Microliters(600.0),
            factor: 0.5,
        };
        assert!(bad_stock.validate("pept").is_err());
    }

    #[test]
    fn test_mix_validation() {
        let max = Microliters(1000.0);
        let mix = MixConfig {
            repetitions: 3,
            volume: Microliters(900.0),
        };
        assert!(mix.validate("diluent", max).is_ok());
        assert!(
            MixConfig {
                repetitions: 0,
                ..mix
            }
            .validate("diluent", max)
            .is_err()
        );
        assert!(
            MixConfig {
                volume: Microliters(1200.0),
                ..mix
            }
            .validate("diluent", max)
            .is_err()
        );
    }

    #[test]
    fn test_block_validation() {
        let block = Pattern::Block {
            rows: "A-H".to_string(),
            columns: vec![1, 2, 3],
            repeats: 4,
            column_stride: 3,
            row_stride: 0,
        };
        assert!(block.validate("samples").is_ok());

        let bad_rows = Pattern::Block {
            rows: "H-A".to_string(),
            columns: vec![1],
            repeats: 1,
            column_stride: 0,
            row_stride: 0,
        };
        assert!(bad_rows.validate("samples").is_err());
    }
}
