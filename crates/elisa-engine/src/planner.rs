//! 分配规划
//!
//! 把逻辑布局展开为有序的目标序列，并按（板, 分组）切分为连续运行，
//! 每个运行绑定一个轮换池。
//!
//! 支持三种模式：
//!
//! - 扇出：一个源对应固定孔位列表
//! - 复制块：模板块沿行/列平移复制 K 次
//! - 排除集：把某分组的部分孔位划给另一分组
//!
//! 规划是确定性的：相同配置总是得到相同的有序输出。
//!
//! # 示例
//!
//! ```rust
//! use elisa_engine::planner::expand_pattern;
//! use elisa_tools::Pattern;
//!
//! let pattern = Pattern::Block {
//!     rows: "A-B".to_string(),
//!     columns: vec![1, 2],
//!     repeats: 2,
//!     column_stride: 4,
//!     row_stride: 0,
//! };
//! let wells: Vec<String> = expand_pattern(&pattern)?.iter().map(|w| w.to_string()).collect();
//! assert_eq!(wells, ["A1", "A2", "B1", "B2", "A5", "A6", "B5", "B6"]);
//! # Ok::<(), elisa_engine::EngineError>(())
//! ```

use std::collections::HashSet;

use elisa_labware::well::parse_rows;
use elisa_labware::{Microliters, WellId, WellRef};
use elisa_tools::{GroupConfig, Pattern, ProtocolConfig, WellOrder};
use tracing::debug;

use crate::dilution;
use crate::error::{EngineError, Result};

/// 单个目标：孔位 + 体积（规划后不可变）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispenseTarget {
    pub well: WellRef,
    /// 单通道体积
    pub volume: Microliters,
}

/// 连续运行：一组绑定同一逻辑源的目标
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    /// 在计划中的序号
    pub index: usize,
    /// 板序号（0 起）
    pub plate: usize,
    pub group: String,
    /// 轮换池名
    pub pool: String,
    pub per_target: Microliters,
    /// 生效的批容量
    pub batch_capacity: Microliters,
    pub targets: Vec<DispenseTarget>,
}

impl Run {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// 本运行分配的总体积（单通道）
    pub fn payload(&self) -> Microliters {
        self.targets.iter().map(|t| t.volume).sum()
    }
}

/// 分配计划
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispensePlan {
    runs: Vec<Run>,
}

impl DispensePlan {
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// 按执行顺序遍历所有目标
    pub fn targets(&self) -> impl Iterator<Item = &DispenseTarget> + '_ {
        self.runs.iter().flat_map(|run| run.targets.iter())
    }

    /// 目标总数
    pub fn len(&self) -> usize {
        self.runs.iter().map(Run::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// 展开单个孔位模式（不含排除集与排序）
pub fn expand_pattern(pattern: &Pattern) -> Result<Vec<WellId>> {
    match pattern {
        Pattern::FanOut { wells } => Ok(wells.clone()),
        Pattern::Block {
            rows,
            columns,
            repeats,
            column_stride,
            row_stride,
        } => {
            let rows = parse_rows(rows)?;
            let mut wells = Vec::with_capacity(rows.len() * columns.len() * usize::from(*repeats));
            for k in 0..*repeats {
                let shift = |stride: u8| {
                    k.checked_mul(stride).ok_or_else(|| {
                        EngineError::InvalidLayout(format!(
                            "block replica {} with stride {} leaves the plate",
                            k, stride
                        ))
                    })
                };
                let (row_shift, column_shift) = (shift(*row_stride)?, shift(*column_stride)?);
                for row in &rows {
                    for column in columns {
                        let well = WellId::new(*row, *column)?.offset(row_shift, column_shift)?;
                        wells.push(well);
                    }
                }
            }
            Ok(wells)
        },
    }
}

fn order_wells(wells: &mut [WellId], order: WellOrder) {
    match order {
        WellOrder::RowMajor => wells.sort(),
        WellOrder::ColumnMajor => wells.sort_by_key(|w| (w.column(), w.row())),
        WellOrder::AsListed => {},
    }
}

fn ensure_unique(group: &str, wells: &[WellId]) -> Result<()> {
    let mut seen = HashSet::with_capacity(wells.len());
    for well in wells {
        if !seen.insert(well) {
            return Err(EngineError::InvalidLayout(format!(
                "well {} listed twice in group '{}'",
                well, group
            )));
        }
    }
    Ok(())
}

/// 分配规划器
pub struct DispensePlanner<'a> {
    config: &'a ProtocolConfig,
}

impl<'a> DispensePlanner<'a> {
    pub fn new(config: &'a ProtocolConfig) -> Self {
        Self { config }
    }

    /// 展开布局
    ///
    /// 顺序：板优先；板内按分组配置顺序；分组内按其孔位顺序。
    pub fn plan(&self) -> Result<DispensePlan> {
        let layout = &self.config.layout;
        let groups = &layout.groups;

        let templates = groups
            .iter()
            .map(|group| {
                let wells = expand_pattern(&group.pattern)?;
                ensure_unique(&group.name, &wells)?;
                Ok(wells)
            })
            .collect::<Result<Vec<_>>>()?;
        let volumes = groups
            .iter()
            .map(|group| dilution::resolve(&group.volume))
            .collect::<Result<Vec<_>>>()?;

        let mut runs = Vec::new();
        for plate in 0..layout.plates {
            let mut wells = templates.clone();
            self.apply_carve_outs(plate, &mut wells)?;

            let mut claimed = HashSet::new();
            for (i, group) in groups.iter().enumerate() {
                order_wells(&mut wells[i], group.order);
                for well in &wells[i] {
                    if !claimed.insert(*well) {
                        return Err(EngineError::InvalidLayout(format!(
                            "well {} on plate {} claimed by more than one group",
                            well,
                            plate + 1
                        )));
                    }
                }
            }

            for (i, group) in groups.iter().enumerate() {
                if wells[i].is_empty() {
                    continue;
                }
                let run = self.build_run(runs.len(), plate, group, volumes[i], &wells[i])?;
                debug!(
                    "planned run #{}: plate {} group '{}' -> {} targets from pool '{}'",
                    run.index,
                    plate + 1,
                    run.group,
                    run.len(),
                    run.pool
                );
                runs.push(run);
            }
        }

        Ok(DispensePlan { runs })
    }

    fn apply_carve_outs(&self, plate: usize, wells: &mut [Vec<WellId>]) -> Result<()> {
        let groups = &self.config.layout.groups;
        let index_of = |name: &str| {
            groups
                .iter()
                .position(|g| g.name == name)
                .ok_or_else(|| EngineError::InvalidLayout(format!("unknown group '{}'", name)))
        };

        for carve in self.config.layout.carve_outs.iter().filter(|c| c.applies_to(plate)) {
            let from = index_of(&carve.from_group)?;
            let into = index_of(&carve.into_group)?;
            for well in &carve.wells {
                let position = wells[from].iter().position(|w| w == well).ok_or_else(|| {
                    EngineError::InvalidLayout(format!(
                        "carve-out well {} is not part of group '{}' on plate {}",
                        well,
                        carve.from_group,
                        plate + 1
                    ))
                })?;
                let moved = wells[from].remove(position);
                wells[into].push(moved);
            }
        }
        Ok(())
    }

    fn build_run(
        &self,
        index: usize,
        plate: usize,
        group: &GroupConfig,
        volume: Microliters,
        wells: &[WellId],
    ) -> Result<Run> {
        let pool = group
            .source_for_plate(plate)
            .ok_or_else(|| {
                EngineError::InvalidLayout(format!(
                    "group '{}' has no source for plate {}",
                    group.name,
                    plate + 1
                ))
            })?
            .to_string();
        Ok(Run {
            index,
            plate,
            group: group.name.clone(),
            pool,
            per_target: volume,
            batch_capacity: self.config.batch_capacity_for(group),
            targets: wells
                .iter()
                .map(|well| DispenseTarget {
                    well: WellRef::new(plate, *well),
                    volume,
                })
                .collect(),
        })
    }
}
