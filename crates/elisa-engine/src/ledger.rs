//! 体积账本
//!
//! 每个容器的有效剩余体积的唯一权威记录。
//! 注册时一次性扣除不可吸取部分（如锥形底），几何公式只对圆柱段建模。
//!
//! # 不变量
//!
//! - 剩余体积始终 `>= 0`
//! - 扣减超过剩余时返回 `GeometryUnderflow`，账本不变
//!
//! 账本只有一个写者：当前正在下发吸液命令的阶段。

use std::collections::BTreeMap;

use elisa_labware::constants::VOLUME_EPSILON_UL;
use elisa_labware::{Microliters, Vessel, VesselId};
use tracing::trace;

use crate::error::{EngineError, Result};

/// 单个容器的账本条目
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// 有效剩余体积
    pub remaining: Microliters,
    /// 初始化时的有效体积
    pub initial_fill: Microliters,
    /// 不可吸取部分
    pub unusable_offset: Microliters,
}

impl LedgerEntry {
    /// 物理体积（含不可吸取部分）
    pub fn physical(&self) -> Microliters {
        self.remaining + self.unusable_offset
    }
}

/// 体积账本
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeLedger {
    entries: BTreeMap<VesselId, LedgerEntry>,
}

impl VolumeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册容器
    ///
    /// `loaded` 为装载的物理体积；装载量低于不可吸取部分时有效体积为 0。
    pub fn register(&mut self, vessel: &Vessel, loaded: Microliters) {
        let effective = (loaded - vessel.unusable_offset).max(Microliters::ZERO);
        self.entries.insert(
            vessel.id.clone(),
            LedgerEntry {
                remaining: effective,
                initial_fill: effective,
                unusable_offset: vessel.unusable_offset,
            },
        );
    }

    fn entry(&self, vessel: &VesselId) -> Result<&LedgerEntry> {
        self.entries
            .get(vessel)
            .ok_or_else(|| EngineError::UnknownVessel(vessel.clone()))
    }

    fn entry_mut(&mut self, vessel: &VesselId) -> Result<&mut LedgerEntry> {
        self.entries
            .get_mut(vessel)
            .ok_or_else(|| EngineError::UnknownVessel(vessel.clone()))
    }

    /// 扣减
    pub fn debit(&mut self, vessel: &VesselId, volume: Microliters) -> Result<()> {
        let entry = self.entry_mut(vessel)?;
        if volume.0 > entry.remaining.0 + VOLUME_EPSILON_UL {
            return Err(EngineError::GeometryUnderflow {
                vessel: vessel.clone(),
                requested: volume,
                remaining: entry.remaining,
            });
        }
        entry.remaining = (entry.remaining - volume).max(Microliters::ZERO);
        trace!("ledger: {} -{} -> {}", vessel, volume, entry.remaining);
        Ok(())
    }

    /// 记入（吹回安全体积、合并转移）
    pub fn credit(&mut self, vessel: &VesselId, volume: Microliters) -> Result<()> {
        let entry = self.entry_mut(vessel)?;
        entry.remaining += volume;
        trace!("ledger: {} +{} -> {}", vessel, volume, entry.remaining);
        Ok(())
    }

    /// 清空并返回原剩余体积
    pub fn drain(&mut self, vessel: &VesselId) -> Result<Microliters> {
        let entry = self.entry_mut(vessel)?;
        let drained = entry.remaining;
        entry.remaining = Microliters::ZERO;
        Ok(drained)
    }

    /// 有效剩余体积
    pub fn query(&self, vessel: &VesselId) -> Result<Microliters> {
        Ok(self.entry(vessel)?.remaining)
    }

    /// 初始有效体积
    pub fn initial_fill(&self, vessel: &VesselId) -> Result<Microliters> {
        Ok(self.entry(vessel)?.initial_fill)
    }

    /// 物理体积
    pub fn physical_volume(&self, vessel: &VesselId) -> Result<Microliters> {
        Ok(self.entry(vessel)?.physical())
    }

    /// 所有容器当前有效剩余之和
    pub fn total_remaining(&self) -> Microliters {
        self.entries.values().map(|e| e.remaining).sum()
    }

    /// 快照（按容器编号排序）
    pub fn snapshot(&self) -> BTreeMap<VesselId, Microliters> {
        self.entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.remaining))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
