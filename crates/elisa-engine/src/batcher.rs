//! 吸液批处理
//!
//! 决定每次吸液（stroke）服务哪些目标孔、吸多少，以及安全体积的保留。
//!
//! # 规则
//!
//! - 首吸：`payload + safety`，安全体积留在吸头内直到运行结束
//! - 每次吸液满足 `floor(payload / per_target)` 次分配后触发重吸
//! - 剩余目标不足一整批时最后一次吸液降量（避免多吸）
//! - 单个目标体积超过批容量时拆成 `ceil(v / capacity)` 等量子吸液，
//!   每次子吸液只服务该目标的一份
//!
//! # 状态机
//!
//! ```text
//! IDLE → LOADED → DEPLETING → RELOAD → LOADED → …
//!                          ↘ EXHAUSTED → IDLE
//! ```
//!
//! # 示例
//!
//! ```rust
//! use elisa_engine::batcher::AspirationBatcher;
//! use elisa_labware::{Microliters, PipetteSpec};
//!
//! let batcher = AspirationBatcher::new(
//!     &PipetteSpec::p300_single(),
//!     Microliters(200.0),
//!     Microliters(50.0),
//! )?;
//! let strokes = batcher.plan(24, Microliters(25.0))?;
//! let volumes: Vec<f64> = strokes.iter().map(|s| s.aspirate.0).collect();
//! assert_eq!(volumes, vec![250.0, 200.0, 200.0]);
//! # Ok::<(), elisa_engine::EngineError>(())
//! ```

use std::fmt;
use std::ops::Range;

use elisa_labware::constants::VOLUME_EPSILON_UL;
use elisa_labware::{Microliters, PipetteSpec};

use crate::error::{EngineError, Result};

/// 一次计划中的吸液
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStroke {
    /// 本次吸液量（单通道，首吸含安全体积）
    pub aspirate: Microliters,
    /// 本次要分配出去的体积
    pub payload: Microliters,
    /// 本次额外吸取的安全体积（仅首吸非零）
    pub safety: Microliters,
    /// 服务的目标在运行内的下标
    pub dispenses: Range<usize>,
    /// 每次分配的体积
    pub per_dispense: Microliters,
    /// 拆分吸液时为目标体积的第几份
    pub portion: Option<Portion>,
}

/// 大体积目标的一份
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Portion {
    pub index: usize,
    pub of: usize,
}

impl Portion {
    pub fn is_last(&self) -> bool {
        self.index + 1 == self.of
    }
}

impl PlannedStroke {
    pub fn dispense_count(&self) -> usize {
        self.dispenses.len()
    }

    /// 是否是运行的首吸
    pub fn is_priming(&self) -> bool {
        self.dispenses.start == 0 && self.portion.is_none_or(|p| p.index == 0)
    }

    /// 本次吸液分配完后是否有目标达到最终体积
    pub fn completes_targets(&self) -> bool {
        self.portion.is_none_or(|p| p.is_last())
    }
}

/// 批处理器
#[derive(Debug, Clone, PartialEq)]
pub struct AspirationBatcher {
    capacity: Microliters,
    safety: Microliters,
    max_volume: Microliters,
}

impl AspirationBatcher {
    /// 创建批处理器
    ///
    /// # 错误
    ///
    /// - `CapacityExceeded`: `capacity + safety` 超出移液器上限
    pub fn new(pipette: &PipetteSpec, capacity: Microliters, safety: Microliters) -> Result<Self> {
        if capacity.0 <= 0.0 || safety.0 < 0.0 {
            return Err(EngineError::InvalidLayout(format!(
                "batch capacity must be positive and safety volume non-negative (got {} / {})",
                capacity, safety
            )));
        }
        let stroke = capacity + safety;
        if stroke.0 > pipette.max_volume.0 + VOLUME_EPSILON_UL {
            return Err(EngineError::CapacityExceeded {
                what: format!("priming stroke on {}", pipette.name),
                requested: stroke,
                limit: pipette.max_volume,
            });
        }
        Ok(Self {
            capacity,
            safety,
            max_volume: pipette.max_volume,
        })
    }

    pub fn capacity(&self) -> Microliters {
        self.capacity
    }

    pub fn safety(&self) -> Microliters {
        self.safety
    }

    /// 一整批可满足的分配次数
    pub fn dispenses_per_stroke(&self, per_target: Microliters) -> usize {
        self.capacity.whole_portions(per_target)
    }

    /// 单个目标需要拆成的份数（不超过批容量时为 1）
    pub fn portions_per_target(&self, per_target: Microliters) -> usize {
        ((per_target.0 - VOLUME_EPSILON_UL) / self.capacity.0)
            .ceil()
            .max(1.0) as usize
    }

    /// 为 `destinations` 个目标、每个 `per_target` 规划吸液序列
    pub fn plan(&self, destinations: usize, per_target: Microliters) -> Result<Vec<PlannedStroke>> {
        if per_target.0 <= 0.0 {
            return Err(EngineError::InvalidLayout(format!(
                "per-target volume must be positive, got {}",
                per_target
            )));
        }
        let per_stroke = self.dispenses_per_stroke(per_target);
        if per_stroke == 0 {
            return Ok(self.plan_split(destinations, per_target));
        }

        let mut strokes = Vec::with_capacity(destinations.div_ceil(per_stroke));
        let mut next = 0;
        while next < destinations {
            let count = per_stroke.min(destinations - next);
            let payload = per_target * count as f64;
            let safety = if next == 0 {
                self.safety
            } else {
                Microliters::ZERO
            };
            let aspirate = payload + safety;
            debug_assert!(aspirate.0 <= self.max_volume.0 + VOLUME_EPSILON_UL);
            strokes.push(PlannedStroke {
                aspirate,
                payload,
                safety,
                dispenses: next..next + count,
                per_dispense: per_target,
                portion: None,
            });
            next += count;
        }
        Ok(strokes)
    }

    /// 每个目标拆成若干等量子吸液，每次吸排一份
    fn plan_split(&self, destinations: usize, per_target: Microliters) -> Vec<PlannedStroke> {
        let of = self.portions_per_target(per_target);
        let share = per_target / of as f64;
        let mut strokes = Vec::with_capacity(destinations * of);
        for target in 0..destinations {
            for index in 0..of {
                let safety = if target == 0 && index == 0 {
                    self.safety
                } else {
                    Microliters::ZERO
                };
                strokes.push(PlannedStroke {
                    aspirate: share + safety,
                    payload: share,
                    safety,
                    dispenses: target..target + 1,
                    per_dispense: share,
                    portion: Some(Portion { index, of }),
                });
            }
        }
        strokes
    }
}

// ============================================================================
// 吸液状态机
// ============================================================================

/// 吸液阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokePhase {
    /// 吸头内无待分配液体
    Idle,
    /// 刚完成吸液，尚未分配
    Loaded,
    /// 正在分配
    Depleting,
    /// 本次吸液已分配完，还有目标待处理
    Reload,
    /// 本次运行所有目标已完成，吸头内只剩安全体积
    Exhausted,
}

impl fmt::Display for StrokePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrokePhase::Idle => "IDLE",
            StrokePhase::Loaded => "LOADED",
            StrokePhase::Depleting => "DEPLETING",
            StrokePhase::Reload => "RELOAD",
            StrokePhase::Exhausted => "EXHAUSTED",
        };
        f.write_str(name)
    }
}

/// 单个移液通道的吸液状态
///
/// 由编排器持有并在调用间传递，不使用全局状态。
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeTracker {
    phase: StrokePhase,
    /// 吸头内液体（单通道）
    held: Microliters,
    /// 本次运行保留的安全体积
    safety: Microliters,
    /// 当前吸液计划的分配次数
    per_stroke: usize,
    /// 当前吸液的分配是否让目标达到最终体积
    completes: bool,
    /// 自上次吸液以来已完成的分配
    since_load: usize,
    /// 本次运行剩余目标
    pending: usize,
}

impl Default for StrokeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StrokeTracker {
    pub fn new() -> Self {
        Self {
            phase: StrokePhase::Idle,
            held: Microliters::ZERO,
            safety: Microliters::ZERO,
            per_stroke: 0,
            completes: true,
            since_load: 0,
            pending: 0,
        }
    }

    pub fn phase(&self) -> StrokePhase {
        self.phase
    }

    pub fn held(&self) -> Microliters {
        self.held
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn since_load(&self) -> usize {
        self.since_load
    }

    fn invalid(&self, action: &str) -> EngineError {
        EngineError::InvalidState(format!("cannot {} in phase {}", action, self.phase))
    }

    /// 开始一次运行
    pub fn begin_run(&mut self, destinations: usize, safety: Microliters) -> Result<()> {
        if self.phase != StrokePhase::Idle || self.pending != 0 {
            return Err(self.invalid("begin run"));
        }
        self.pending = destinations;
        self.safety = safety;
        self.held = Microliters::ZERO;
        Ok(())
    }

    /// 记录一次吸液
    pub fn load(&mut self, stroke: &PlannedStroke) -> Result<()> {
        let ready = match self.phase {
            StrokePhase::Idle => self.pending > 0,
            StrokePhase::Reload => true,
            _ => false,
        };
        if !ready || stroke.dispense_count() > self.pending {
            return Err(self.invalid("load"));
        }
        self.held += stroke.aspirate;
        self.per_stroke = stroke.dispense_count();
        self.completes = stroke.completes_targets();
        self.since_load = 0;
        self.phase = StrokePhase::Loaded;
        Ok(())
    }

    /// 记录一次分配，返回分配后的阶段
    ///
    /// 分配后吸头内必须仍保有安全体积。
    pub fn dispense(&mut self, volume: Microliters) -> Result<StrokePhase> {
        if !matches!(self.phase, StrokePhase::Loaded | StrokePhase::Depleting) {
            return Err(self.invalid("dispense"));
        }
        let after = self.held - volume;
        if after.0 + VOLUME_EPSILON_UL < self.safety.0 {
            return Err(EngineError::InvalidState(format!(
                "dispensing {} would consume the {} safety volume (holding {})",
                volume, self.safety, self.held
            )));
        }
        self.held = after.max(Microliters::ZERO);
        self.since_load += 1;
        if self.completes {
            self.pending -= 1;
        }
        self.phase = if self.since_load < self.per_stroke {
            StrokePhase::Depleting
        } else if self.pending > 0 {
            StrokePhase::Reload
        } else {
            StrokePhase::Exhausted
        };
        Ok(self.phase)
    }

    /// 结束运行，返回吸头内剩余的安全体积并回到 IDLE
    pub fn finish(&mut self) -> Result<Microliters> {
        if self.phase != StrokePhase::Exhausted {
            return Err(self.invalid("finish run"));
        }
        let leftover = self.held;
        *self = Self::new();
        Ok(leftover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batcher(capacity: f64, safety: f64) -> AspirationBatcher {
        AspirationBatcher::new(
            &PipetteSpec::p300_single(),
            Microliters(capacity),
            Microliters(safety),
        )
        .unwrap()
    }

    fn volumes(strokes: &[PlannedStroke]) -> Vec<f64> {
        strokes.iter().map(|s| s.aspirate.0).collect()
    }

    #[test]
    fn test_batching_example_24_destinations() {
        let strokes = batcher(200.0, 50.0).plan(24, Microliters(25.0)).unwrap();
        assert_eq!(volumes(&strokes), vec![250.0, 200.0, 200.0]);
        assert!(strokes.iter().all(|s| s.dispense_count() == 8));
        assert!(strokes[0].is_priming());
        assert_eq!(strokes[0].safety, Microliters(50.0));
        assert_eq!(strokes[2].dispenses, 16..24);
    }

    #[test]
    fn test_final_stroke_steps_down() {
        let strokes = batcher(200.0, 50.0).plan(20, Microliters(25.0)).unwrap();
        assert_eq!(volumes(&strokes), vec![250.0, 200.0, 100.0]);
        assert_eq!(strokes[2].dispense_count(), 4);

        // 44 孔：250 + 4×200 + 100
        let strokes = batcher(200.0, 50.0).plan(44, Microliters(25.0)).unwrap();
        assert_eq!(volumes(&strokes), vec![250.0, 200.0, 200.0, 200.0, 200.0, 100.0]);
    }

    #[test]
    fn test_small_run_primes_with_reduced_payload() {
        let strokes = batcher(200.0, 50.0).plan(3, Microliters(25.0)).unwrap();
        assert_eq!(volumes(&strokes), vec![125.0]);
    }

    #[test]
    fn test_capacity_checks() {
        let err = AspirationBatcher::new(
            &PipetteSpec::p300_single(),
            Microliters(280.0),
            Microliters(50.0),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::CapacityExceeded { .. }));

        assert!(batcher(200.0, 50.0).plan(4, Microliters(0.0)).is_err());
    }

    #[test]
    fn test_large_target_is_split_into_portions() {
        // 1:100 稀释到 1700 µL：每孔 1683 µL 稀释液，p1000 批容量 1000
        let batcher = AspirationBatcher::new(
            &PipetteSpec::new("p1000_single_gen2", Microliters(1000.0), 1),
            Microliters(1000.0),
            Microliters::ZERO,
        )
        .unwrap();
        assert_eq!(batcher.portions_per_target(Microliters(1683.0)), 2);
        assert_eq!(batcher.portions_per_target(Microliters(1000.0)), 1);

        let strokes = batcher.plan(2, Microliters(1683.0)).unwrap();
        assert_eq!(volumes(&strokes), vec![841.5; 4]);
        assert_eq!(strokes[1].dispenses, 0..1);
        assert_eq!(strokes[2].dispenses, 1..2);
        assert!(!strokes[0].completes_targets());
        assert!(strokes[1].completes_targets());
        assert!(strokes[0].is_priming());
        assert!(!strokes[1].is_priming());
        let delivered: Microliters = strokes.iter().map(|s| s.payload).sum();
        assert_eq!(delivered, Microliters(2.0 * 1683.0));
    }

    #[test]
    fn test_split_strokes_carry_safety_once() {
        let strokes = batcher(200.0, 50.0).plan(2, Microliters(250.0)).unwrap();
        assert_eq!(volumes(&strokes), vec![175.0, 125.0, 125.0, 125.0]);
        assert_eq!(strokes[0].safety, Microliters(50.0));

        let mut tracker = StrokeTracker::new();
        tracker.begin_run(2, Microliters(50.0)).unwrap();
        let mut phases = Vec::new();
        for stroke in &strokes {
            tracker.load(stroke).unwrap();
            phases.push(tracker.dispense(stroke.per_dispense).unwrap());
        }
        assert_eq!(
            phases,
            vec![
                StrokePhase::Reload,
                StrokePhase::Reload,
                StrokePhase::Reload,
                StrokePhase::Exhausted
            ]
        );
        assert_eq!(tracker.finish().unwrap(), Microliters(50.0));
    }

    #[test]
    fn test_non_divisible_volume() {
        // 200 / 30 = 6 次分配，每次吸 180
        let strokes = batcher(200.0, 0.0).plan(13, Microliters(30.0)).unwrap();
        assert_eq!(volumes(&strokes), vec![180.0, 180.0, 30.0]);
    }

    #[test]
    fn test_tracker_walks_state_machine() {
        let strokes = batcher(200.0, 50.0).plan(10, Microliters(25.0)).unwrap();
        let mut tracker = StrokeTracker::new();
        tracker.begin_run(10, Microliters(50.0)).unwrap();
        assert_eq!(tracker.phase(), StrokePhase::Idle);

        tracker.load(&strokes[0]).unwrap();
        assert_eq!(tracker.phase(), StrokePhase::Loaded);
        for _ in 0..7 {
            assert_eq!(
                tracker.dispense(Microliters(25.0)).unwrap(),
                StrokePhase::Depleting
            );
        }
        assert_eq!(
            tracker.dispense(Microliters(25.0)).unwrap(),
            StrokePhase::Reload
        );
        assert_eq!(tracker.held(), Microliters(50.0));

        tracker.load(&strokes[1]).unwrap();
        tracker.dispense(Microliters(25.0)).unwrap();
        assert_eq!(
            tracker.dispense(Microliters(25.0)).unwrap(),
            StrokePhase::Exhausted
        );
        assert_eq!(tracker.finish().unwrap(), Microliters(50.0));
        assert_eq!(tracker.phase(), StrokePhase::Idle);
    }

    #[test]
    fn test_tracker_rejects_out_of_order_calls() {
        let strokes = batcher(200.0, 50.0).plan(8, Microliters(25.0)).unwrap();
        let mut tracker = StrokeTracker::new();
        assert!(tracker.dispense(Microliters(25.0)).is_err());
        assert!(tracker.load(&strokes[0]).is_err());

        tracker.begin_run(8, Microliters(50.0)).unwrap();
        tracker.load(&strokes[0]).unwrap();
        assert!(tracker.load(&strokes[0]).is_err());
        assert!(tracker.finish().is_err());
    }

    #[test]
    fn test_tracker_protects_safety_volume() {
        let stroke = PlannedStroke {
            aspirate: Microliters(100.0),
            payload: Microliters(50.0),
            safety: Microliters(50.0),
            dispenses: 0..1,
            per_dispense: Microliters(50.0),
            portion: None,
        };
        let mut tracker = StrokeTracker::new();
        tracker.begin_run(1, Microliters(50.0)).unwrap();
        tracker.load(&stroke).unwrap();
        let err = tracker.dispense(Microliters(75.0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }
}
