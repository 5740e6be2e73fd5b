//! 源容器轮换
//!
//! 轮换池是一组可互换的源容器加一个“当前容器”下标。两种策略：
//!
//! - `Threshold`: 每次吸液前检查 `query(active) < dead_volume + requirement`，
//!   不足则前进到下一个容器
//! - `Scheduled`: 每完成 N 个运行块切换一次，不看剩余体积
//!
//! 开启合并时，切换会把旧容器剩余液体分次转移到新容器
//! （账本：旧容器扣减，新容器记入），每次转移不超过吸头剩余容量，
//! 转移总量不超过新容器剩余空间。

use std::collections::BTreeMap;

use elisa_labware::constants::VOLUME_EPSILON_UL;
use elisa_labware::{Microliters, PipetteSpec, Vessel, VesselId};
use elisa_tools::{PoolConfig, RotationPolicy};
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::geometry::{self, Clearance};
use crate::ledger::VolumeLedger;

/// 合并转移中的一次吸液
#[derive(Debug, Clone, PartialEq)]
pub struct TransferChunk {
    /// 单通道体积
    pub volume: Microliters,
    /// 在旧容器中的吸液定位
    pub clearance: Clearance,
}

/// 一次轮换
#[derive(Debug, Clone, PartialEq)]
pub struct Rotation {
    pub from: VesselId,
    pub to: VesselId,
    /// 合并转移（未开启合并时为空）
    pub transfers: Vec<TransferChunk>,
    /// 转移总量（账本体积，已乘通道数）
    pub moved: Microliters,
}

/// 轮换所需的上下文
///
/// 账本由调用方独占传入，轮换本身不持有可变状态之外的引用。
pub struct RotationContext<'a> {
    pub ledger: &'a mut VolumeLedger,
    pub vessels: &'a BTreeMap<VesselId, Vessel>,
    pub pipette: &'a PipetteSpec,
    /// 吸头内当前液体（单通道）
    pub tip_held: Microliters,
}

impl RotationContext<'_> {
    fn vessel(&self, id: &VesselId) -> Result<&Vessel> {
        self.vessels
            .get(id)
            .ok_or_else(|| EngineError::UnknownVessel(id.clone()))
    }
}

/// 轮换池
#[derive(Debug, Clone, PartialEq)]
pub struct RotationPool {
    name: String,
    vessels: Vec<VesselId>,
    active: usize,
    policy: RotationPolicy,
    consolidate: bool,
    blocks_completed: usize,
}

impl RotationPool {
    pub fn new(
        name: impl Into<String>,
        vessels: Vec<VesselId>,
        policy: RotationPolicy,
        consolidate: bool,
    ) -> Result<Self> {
        let name = name.into();
        if vessels.is_empty() {
            return Err(EngineError::SourceExhausted {
                pool: name,
                pending: 0,
            });
        }
        Ok(Self {
            name,
            vessels,
            active: 0,
            policy,
            consolidate,
            blocks_completed: 0,
        })
    }

    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        Self::new(
            config.name.clone(),
            config.vessels.clone(),
            config.policy,
            config.consolidate,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 当前源容器
    pub fn active(&self) -> &VesselId {
        // new() 保证非空，active 只在有后继时前进
        &self.vessels[self.active]
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn vessels(&self) -> &[VesselId] {
        &self.vessels
    }

    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    pub fn blocks_completed(&self) -> usize {
        self.blocks_completed
    }

    /// 运行块开始前调用（`Scheduled` 策略在此切换）
    pub fn begin_block(
        &mut self,
        pending: usize,
        ctx: &mut RotationContext<'_>,
    ) -> Result<Vec<Rotation>> {
        let RotationPolicy::Scheduled {
            switch_after_blocks,
        } = self.policy
        else {
            return Ok(Vec::new());
        };

        let target = self.blocks_completed / switch_after_blocks.max(1);
        if target >= self.vessels.len() {
            return Err(EngineError::SourceExhausted {
                pool: self.name.clone(),
                pending,
            });
        }
        let mut rotations = Vec::new();
        while self.active < target {
            rotations.push(self.advance(pending, ctx)?);
        }
        Ok(rotations)
    }

    /// 吸液前调用（`Threshold` 策略在此切换）
    ///
    /// `requirement` 为下一次吸液从源容器取走的账本体积（已乘通道数）。
    pub fn ensure_supply(
        &mut self,
        requirement: Microliters,
        pending: usize,
        ctx: &mut RotationContext<'_>,
    ) -> Result<Vec<Rotation>> {
        if self.policy != RotationPolicy::Threshold {
            return Ok(Vec::new());
        }
        let mut rotations = Vec::new();
        loop {
            let active = self.active().clone();
            let remaining = ctx.ledger.query(&active)?;
            let dead_volume = ctx.vessel(&active)?.dead_volume;
            if remaining.0 + VOLUME_EPSILON_UL >= (dead_volume + requirement).0 {
                return Ok(rotations);
            }
            rotations.push(self.advance(pending, ctx)?);
        }
    }

    /// 运行块完成后调用
    pub fn complete_block(&mut self) {
        self.blocks_completed += 1;
    }

    fn advance(&mut self, pending: usize, ctx: &mut RotationContext<'_>) -> Result<Rotation> {
        if self.active + 1 >= self.vessels.len() {
            return Err(EngineError::SourceExhausted {
                pool: self.name.clone(),
                pending,
            });
        }
        let from = self.active().clone();
        self.active += 1;
        let to = self.active().clone();

        let (transfers, moved) = if self.consolidate {
            consolidate(&from, &to, ctx)?
        } else {
            (Vec::new(), Microliters::ZERO)
        };

        info!(
            "pool '{}': rotating {} -> {} (consolidated {})",
            self.name, from, to, moved
        );
        Ok(Rotation {
            from,
            to,
            transfers,
            moved,
        })
    }
}

/// 把 `from` 的剩余液体转移到 `to`，返回转移分块与账本总量
fn consolidate(
    from: &VesselId,
    to: &VesselId,
    ctx: &mut RotationContext<'_>,
) -> Result<(Vec<TransferChunk>, Microliters)> {
    let leftover = ctx.ledger.query(from)?;
    let target = ctx.vessel(to)?;
    let headroom = (target.capacity - ctx.ledger.physical_volume(to)?).max(Microliters::ZERO);
    let total = leftover.min(headroom);
    if total.is_zero() {
        return Ok((Vec::new(), Microliters::ZERO));
    }

    let chunk_limit = ctx.pipette.max_volume - ctx.tip_held;
    if chunk_limit.0 <= VOLUME_EPSILON_UL {
        warn!(
            "cannot consolidate {} into {}: tip is full ({} held)",
            from, to, ctx.tip_held
        );
        return Ok((Vec::new(), Microliters::ZERO));
    }
    if total < leftover {
        warn!(
            "consolidation {} -> {} limited to {} by target headroom ({} left behind)",
            from,
            to,
            total,
            leftover - total
        );
    }

    let channels = f64::from(ctx.pipette.channels);
    let source = ctx.vessel(from)?.clone();
    let mut per_channel_left = total / channels;
    let mut chunks = Vec::new();
    while per_channel_left.0 > VOLUME_EPSILON_UL {
        let volume = per_channel_left.min(chunk_limit);
        let clearance = geometry::clearance(
            &source,
            ctx.ledger.query(from)?,
            ctx.ledger.initial_fill(from)?,
        );
        let ledger_volume = volume * channels;
        ctx.ledger.debit(from, ledger_volume)?;
        ctx.ledger.credit(to, ledger_volume)?;
        chunks.push(TransferChunk { volume, clearance });
        per_channel_left -= volume;
    }
    warn!("consolidated {} from {} into {} in {} transfer(s)", total, from, to, chunks.len());
    Ok((chunks, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        ledger: VolumeLedger,
        vessels: BTreeMap<VesselId, Vessel>,
        pipette: PipetteSpec,
    }

    impl Fixture {
        /// 每个容器：(编号, 装载物理体积)，死体积 100 µL
        fn new(tubes: &[(&str, f64)]) -> Self {
            let mut ledger = VolumeLedger::new();
            let mut vessels = BTreeMap::new();
            for (id, loaded) in tubes {
                let mut tube = Vessel::eppendorf_tube(*id, Microliters(2000.0));
                tube.dead_volume = Microliters(100.0);
                ledger.register(&tube, Microliters(*loaded));
                vessels.insert(tube.id.clone(), tube);
            }
            Self {
                ledger,
                vessels,
                pipette: PipetteSpec::p300_single(),
            }
        }

        fn ctx(&mut self) -> RotationContext<'_> {
            RotationContext {
                ledger: &mut self.ledger,
                vessels: &self.vessels,
                pipette: &self.pipette,
                tip_held: Microliters::ZERO,
            }
        }
    }

    fn ids(names: &[&str]) -> Vec<VesselId> {
        names.iter().map(|n| VesselId::new(*n)).collect()
    }

    #[test]
    fn test_rotation_example() {
        // 剩余 80 < 死体积 100 + 需求 200
        let mut fx = Fixture::new(&[("D5", 580.0), ("D6", 1500.0)]);
        let mut pool =
            RotationPool::new("control", ids(&["D5", "D6"]), RotationPolicy::Threshold, false)
                .unwrap();

        let rotations = pool
            .ensure_supply(Microliters(200.0), 8, &mut fx.ctx())
            .unwrap();
        assert_eq!(rotations.len(), 1);
        assert_eq!(pool.active(), &VesselId::new("D6"));
        assert!(rotations[0].transfers.is_empty());
        // 未合并：旧容器保持原量
        assert_eq!(fx.ledger.query(&VesselId::new("D5")).unwrap(), Microliters(80.0));
    }

    #[test]
    fn test_no_rotation_when_supply_sufficient() {
        let mut fx = Fixture::new(&[("D5", 1500.0), ("D6", 1500.0)]);
        let mut pool =
            RotationPool::new("control", ids(&["D5", "D6"]), RotationPolicy::Threshold, false)
                .unwrap();
        let rotations = pool
            .ensure_supply(Microliters(250.0), 8, &mut fx.ctx())
            .unwrap();
        assert!(rotations.is_empty());
        assert_eq!(pool.active_index(), 0);
    }

    #[test]
    fn test_consolidation_moves_leftover() {
        let mut fx = Fixture::new(&[("D5", 880.0), ("D6", 1000.0)]);
        let mut pool =
            RotationPool::new("control", ids(&["D5", "D6"]), RotationPolicy::Threshold, true)
                .unwrap();

        // D5 有效 380 < 100 + 300
        let rotations = pool
            .ensure_supply(Microliters(300.0), 8, &mut fx.ctx())
            .unwrap();
        let rotation = &rotations[0];
        assert_eq!(rotation.moved, Microliters(380.0));
        // 吸头上限 300：分两次
        let chunks: Vec<f64> = rotation.transfers.iter().map(|c| c.volume.0).collect();
        assert_eq!(chunks, vec![300.0, 80.0]);
        assert_eq!(fx.ledger.query(&VesselId::new("D5")).unwrap(), Microliters::ZERO);
        assert_eq!(fx.ledger.query(&VesselId::new("D6")).unwrap(), Microliters(880.0));
    }

    #[test]
    fn test_consolidation_respects_target_headroom() {
        let mut fx = Fixture::new(&[("D5", 880.0), ("D6", 1900.0)]);
        let mut pool =
            RotationPool::new("control", ids(&["D5", "D6"]), RotationPolicy::Threshold, true)
                .unwrap();
        let rotations = pool
            .ensure_supply(Microliters(300.0), 8, &mut fx.ctx())
            .unwrap();
        assert_eq!(rotations[0].moved, Microliters(100.0));
        assert_eq!(fx.ledger.query(&VesselId::new("D5")).unwrap(), Microliters(280.0));
        assert_eq!(
            fx.ledger.physical_volume(&VesselId::new("D6")).unwrap(),
            Microliters(2000.0)
        );
    }

    #[test]
    fn test_exhausted_pool() {
        let mut fx = Fixture::new(&[("D5", 580.0), ("D6", 600.0)]);
        let mut pool =
            RotationPool::new("control", ids(&["D5", "D6"]), RotationPolicy::Threshold, false)
                .unwrap();
        let err = pool
            .ensure_supply(Microliters(200.0), 5, &mut fx.ctx())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::SourceExhausted {
                pool: "control".to_string(),
                pending: 5
            }
        );
    }

    #[test]
    fn test_scheduled_policy_switches_by_block() {
        let mut fx = Fixture::new(&[("T1", 1500.0), ("T2", 1500.0)]);
        let mut pool = RotationPool::new(
            "blocking",
            ids(&["T1", "T2"]),
            RotationPolicy::Scheduled {
                switch_after_blocks: 2,
            },
            false,
        )
        .unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            pool.begin_block(12, &mut fx.ctx()).unwrap();
            // 阈值检查对计划策略无效
            assert!(pool
                .ensure_supply(Microliters(5000.0), 12, &mut fx.ctx())
                .unwrap()
                .is_empty());
            seen.push(pool.active().to_string());
            pool.complete_block();
        }
        assert_eq!(seen, vec!["T1", "T1", "T2", "T2"]);

        let err = pool.begin_block(12, &mut fx.ctx()).unwrap_err();
        assert!(err.requires_refill());
    }
}
