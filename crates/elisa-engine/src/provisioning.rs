//! 试剂备料估算
//!
//! 在下发任何命令之前，按分配计划统计每个轮换池需要抽取的体积、
//! 所需容器数量以及现有装载是否足够，供操作员在上机前核对。

use std::fmt;

use elisa_labware::constants::VOLUME_EPSILON_UL;
use elisa_labware::Microliters;
use elisa_tools::{ProtocolConfig, SafetyDisposition};

use crate::batcher::AspirationBatcher;
use crate::error::{EngineError, Result};
use crate::planner::{DispensePlan, DispensePlanner};

/// 单个轮换池的备料估算（体积均为账本体积，已乘通道数）
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEstimate {
    pub pool: String,
    /// 绑定到该池的运行数
    pub runs: usize,
    /// 目标孔总数
    pub destinations: usize,
    /// 分配到孔位的总体积
    pub payload: Microliters,
    /// 吸液总量（含各运行首吸的安全体积）
    pub gross_draw: Microliters,
    /// 实际消耗（安全体积吹回时不计入）
    pub net_draw: Microliters,
    /// 单个容器满装时的可用体积（扣除不可吸取部分与死体积）
    pub per_vessel_usable: Microliters,
    /// 按满装计算所需容器数
    pub vessels_needed: usize,
    pub vessels_configured: usize,
    /// 当前装载的可用体积之和
    pub available: Microliters,
    pub sufficient: bool,
}

impl PoolEstimate {
    /// 需要补充的体积（足够时为 0）
    pub fn shortfall(&self) -> Microliters {
        (self.net_draw - self.available).max(Microliters::ZERO)
    }
}

impl fmt::Display for PoolEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pool '{}': {} run(s), {} target(s), draws {} (net {}), needs {} vessel(s) of {} usable, \
             {} configured with {} available",
            self.pool,
            self.runs,
            self.destinations,
            self.gross_draw,
            self.net_draw,
            self.vessels_needed,
            self.per_vessel_usable,
            self.vessels_configured,
            self.available
        )?;
        if !self.sufficient {
            write!(f, " (short by {})", self.shortfall())?;
        }
        Ok(())
    }
}

/// 展开布局并估算
pub fn estimate(config: &ProtocolConfig) -> Result<Vec<PoolEstimate>> {
    let plan = DispensePlanner::new(config).plan()?;
    estimate_plan(config, &plan)
}

/// 基于已展开的计划估算，结果按配置中的池顺序排列
pub fn estimate_plan(config: &ProtocolConfig, plan: &DispensePlan) -> Result<Vec<PoolEstimate>> {
    let channels = f64::from(config.pipette.channels);
    let returned = config.batching.safety_disposition == SafetyDisposition::ReturnToSource;

    let mut estimates = Vec::with_capacity(config.pools.len());
    for pool in &config.pools {
        let mut runs = 0;
        let mut destinations = 0;
        let mut payload = Microliters::ZERO;
        let mut gross = Microliters::ZERO;
        let mut safety_total = Microliters::ZERO;

        for run in plan.runs().iter().filter(|r| r.pool == pool.name) {
            let group = config
                .layout
                .groups
                .iter()
                .find(|g| g.name == run.group)
                .ok_or_else(|| EngineError::InvalidLayout(format!("unknown group '{}'", run.group)))?;
            let safety = config.safety_volume_for(group);
            let batcher = AspirationBatcher::new(&config.pipette, run.batch_capacity, safety)?;
            let strokes = batcher.plan(run.len(), run.per_target)?;

            runs += 1;
            destinations += run.len();
            payload += run.payload() * channels;
            gross += strokes.iter().map(|s| s.aspirate).sum::<Microliters>() * channels;
            safety_total += safety * channels;
        }

        let net = if returned { gross - safety_total } else { gross };

        let mut per_vessel_usable: Option<Microliters> = None;
        let mut available = Microliters::ZERO;
        for id in &pool.vessels {
            let entry = config
                .vessel(id)
                .ok_or_else(|| EngineError::UnknownVessel(id.clone()))?;
            let vessel = entry.to_vessel()?;
            let reserve = vessel.unusable_offset + vessel.dead_volume;
            let usable = (vessel.capacity - reserve).max(Microliters::ZERO);
            per_vessel_usable = Some(per_vessel_usable.map_or(usable, |u| u.min(usable)));
            available += (entry.initial_volume - reserve).max(Microliters::ZERO);
        }
        let per_vessel_usable = per_vessel_usable.unwrap_or(Microliters::ZERO);

        let vessels_needed = if net.0 <= VOLUME_EPSILON_UL {
            0
        } else if per_vessel_usable.0 <= VOLUME_EPSILON_UL {
            usize::MAX
        } else {
            (net / per_vessel_usable - VOLUME_EPSILON_UL).ceil() as usize
        };

        estimates.push(PoolEstimate {
            pool: pool.name.clone(),
            runs,
            destinations,
            payload,
            gross_draw: gross,
            net_draw: net,
            per_vessel_usable,
            vessels_needed,
            vessels_configured: pool.vessels.len(),
            available,
            sufficient: available.0 + VOLUME_EPSILON_UL >= net.0,
        });
    }
    Ok(estimates)
}
