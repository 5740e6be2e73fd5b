//! 编排器
//!
//! 把规划、批处理、几何与轮换串成驱动命令流。执行分两遍：
//!
//! 1. **编译**：在账本与轮换池的私有副本上完整推演整次运行，
//!    `GeometryUnderflow`/`CapacityExceeded`/`SourceExhausted` 都在此阶段暴露，
//!    此时尚未下发任何物理命令
//! 2. **执行**：按顺序下发编译好的命令，每条命令成功后才把它的账本效果
//!    写入权威账本（单一写者），每次吸液向所有钩子发出一条诊断记录
//!
//! 任何错误都终止整次运行；硬件故障后编排器拒绝再次执行。
//!
//! # 示例
//!
//! ```rust
//! use elisa_driver::RecordingDriver;
//! use elisa_engine::Orchestrator;
//! use elisa_tools::ProtocolConfig;
//!
//! let config = ProtocolConfig::from_toml_str(include_str!(
//!     "../../../demos/primary_antibody_8_plates.toml"
//! ))
//! .unwrap();
//!
//! let mut orchestrator = Orchestrator::new(&config)?;
//! let mut driver = RecordingDriver::new();
//! let report = orchestrator.execute(&mut driver)?;
//! assert_eq!(report.dispenses, 8 * 96);
//! # Ok::<(), elisa_engine::EngineError>(())
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use elisa_driver::{
    DiagnosticCallback, HookManager, Location, PipetteCommand, PipettingDriver, RotationRecord,
    StrokeRecord,
};
use elisa_labware::constants::VOLUME_EPSILON_UL;
use elisa_labware::{Microliters, Vessel, VesselId};
use elisa_tools::{GroupConfig, ProtocolConfig, SafetyDisposition, TipPolicy};
use tracing::{debug, error, info, trace, warn};

use crate::batcher::{AspirationBatcher, StrokeTracker};
use crate::error::{EngineError, Result};
use crate::geometry::{self, Clearance};
use crate::ledger::VolumeLedger;
use crate::planner::{DispensePlan, DispensePlanner, Run};
use crate::provisioning;
use crate::rotation::{Rotation, RotationContext, RotationPool};

// ============================================================================
// 编译产物
// ============================================================================

/// 命令成功后对账本的影响（账本体积，已乘通道数）
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEffect {
    None,
    Debit { vessel: VesselId, volume: Microliters },
    Credit { vessel: VesselId, volume: Microliters },
    /// 液体离开系统（安全体积吹入废液）
    Discard { volume: Microliters },
}

/// 吸液命令附带的诊断信息
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeMeta {
    pub run: usize,
    pub group: String,
    pub stroke_in_run: usize,
    pub clearance: Clearance,
}

/// 编译后的一步
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// 运行开始标记
    RunStart {
        run: usize,
        plate: usize,
        group: String,
        pool: String,
        targets: usize,
    },
    Command {
        command: PipetteCommand,
        effect: LedgerEffect,
        /// 仅分配吸液（非合并转移）携带
        stroke: Option<StrokeMeta>,
    },
    Rotation(RotationRecord),
    /// 运行结束标记
    RunEnd { run: usize },
}

/// 编译好的整次运行
#[derive(Debug, Clone)]
pub struct Program {
    steps: Vec<Step>,
    pools: BTreeMap<String, RotationPool>,
    projected: VolumeLedger,
}

impl Program {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// 按顺序列出驱动命令
    pub fn commands(&self) -> impl Iterator<Item = &PipetteCommand> + '_ {
        self.steps.iter().filter_map(|step| match step {
            Step::Command { command, .. } => Some(command),
            _ => None,
        })
    }

    /// 运行结束时各容器的预计有效剩余
    pub fn projected_volumes(&self) -> BTreeMap<VesselId, Microliters> {
        self.projected.snapshot()
    }
}

// ============================================================================
// 运行报告
// ============================================================================

/// 执行结果汇总（体积为账本体积，已乘通道数）
///
/// 守恒关系：`aspirated == dispensed + safety_returned + safety_discarded`，
/// 合并转移单独计入 `consolidated`。
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    pub strokes: usize,
    pub dispenses: usize,
    pub aspirated: Microliters,
    pub dispensed: Microliters,
    pub safety_returned: Microliters,
    pub safety_discarded: Microliters,
    pub consolidated: Microliters,
    pub rotations: usize,
    pub final_volumes: BTreeMap<VesselId, Microliters>,
}

impl RunReport {
    /// 守恒偏差（应在 `VOLUME_EPSILON_UL` 量级内）
    pub fn conservation_error(&self) -> f64 {
        (self.aspirated - self.dispensed - self.safety_returned - self.safety_discarded)
            .0
            .abs()
    }
}

// ============================================================================
// 编排器
// ============================================================================

/// 编排器
///
/// 持有整次运行的全部可变状态（权威账本、轮换池、诊断钩子），
/// 不使用任何全局状态。
pub struct Orchestrator {
    config: ProtocolConfig,
    vessels: BTreeMap<VesselId, Vessel>,
    ledger: VolumeLedger,
    pools: BTreeMap<String, RotationPool>,
    plan: DispensePlan,
    hooks: HookManager,
    sequence: u64,
    faulted: bool,
}

impl Orchestrator {
    /// 校验配置、初始化账本并展开计划
    pub fn new(config: &ProtocolConfig) -> Result<Self> {
        config.validate()?;

        let mut vessels = BTreeMap::new();
        let mut ledger = VolumeLedger::new();
        for entry in &config.vessels {
            let vessel = entry.to_vessel()?;
            ledger.register(&vessel, entry.initial_volume);
            vessels.insert(vessel.id.clone(), vessel);
        }

        let pools = config
            .pools
            .iter()
            .map(|pool| Ok((pool.name.clone(), RotationPool::from_config(pool)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let plan = DispensePlanner::new(config).plan()?;

        for estimate in provisioning::estimate_plan(config, &plan)? {
            if estimate.sufficient {
                info!("{}", estimate);
            } else {
                warn!("{}", estimate);
            }
        }
        info!(
            "orchestrator ready: {} run(s), {} target(s), {} vessel(s), {} pool(s)",
            plan.runs().len(),
            plan.len(),
            vessels.len(),
            pools.len()
        );

        Ok(Self {
            config: config.clone(),
            vessels,
            ledger,
            pools,
            plan,
            hooks: HookManager::new(),
            sequence: 0,
            faulted: false,
        })
    }

    /// 注册诊断钩子
    pub fn add_hook(&mut self, hook: Arc<dyn DiagnosticCallback>) {
        self.hooks.add_callback(hook);
    }

    pub fn plan(&self) -> &DispensePlan {
        &self.plan
    }

    /// 权威账本
    pub fn ledger(&self) -> &VolumeLedger {
        &self.ledger
    }

    pub fn pool(&self, name: &str) -> Option<&RotationPool> {
        self.pools.get(name)
    }

    fn vessel(&self, id: &VesselId) -> Result<&Vessel> {
        self.vessels
            .get(id)
            .ok_or_else(|| EngineError::UnknownVessel(id.clone()))
    }

    fn group(&self, name: &str) -> Result<&GroupConfig> {
        self.config
            .layout
            .groups
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| EngineError::InvalidLayout(format!("unknown group '{}'", name)))
    }

    /// 编译整次运行（不下发命令，不修改权威状态）
    pub fn compile(&self) -> Result<Program> {
        let mut ledger = self.ledger.clone();
        let mut pools = self.pools.clone();
        let mut steps = Vec::new();
        let mut tracker = StrokeTracker::new();

        let pipette = &self.config.pipette;
        let channels = f64::from(pipette.channels);
        let tip_policy = self.config.batching.tip_policy;
        let runs = self.plan.runs();
        let total = self.plan.len();
        let mut done = 0;

        for (position, run) in runs.iter().enumerate() {
            let first = position == 0;
            let last = position + 1 == runs.len();
            let group = self.group(&run.group)?;
            let safety = self.config.safety_volume_for(group);
            let mix = group.mix_after;
            let batcher = AspirationBatcher::new(pipette, run.batch_capacity, safety)?;
            let strokes = batcher.plan(run.len(), run.per_target)?;
            let pool = pools
                .get_mut(&run.pool)
                .ok_or_else(|| EngineError::UnknownPool(run.pool.clone()))?;

            steps.push(Step::RunStart {
                run: run.index,
                plate: run.plate,
                group: run.group.clone(),
                pool: run.pool.clone(),
                targets: run.len(),
            });
            if tip_policy == TipPolicy::PerRun || first {
                steps.push(plain(PipetteCommand::PickUpTip));
            }
            tracker.begin_run(run.len(), safety)?;

            let rotations = pool.begin_block(
                total - done,
                &mut RotationContext {
                    ledger: &mut ledger,
                    vessels: &self.vessels,
                    pipette,
                    tip_held: tracker.held(),
                },
            )?;
            push_rotations(&mut steps, run, rotations, channels);

            for (stroke_in_run, stroke) in strokes.iter().enumerate() {
                let requirement = pipette.total_volume(stroke.aspirate);
                let rotations = pool.ensure_supply(
                    requirement,
                    total - done,
                    &mut RotationContext {
                        ledger: &mut ledger,
                        vessels: &self.vessels,
                        pipette,
                        tip_held: tracker.held(),
                    },
                )?;
                push_rotations(&mut steps, run, rotations, channels);

                let source = pool.active().clone();
                let clearance = geometry::clearance(
                    self.vessel(&source)?,
                    ledger.query(&source)?,
                    ledger.initial_fill(&source)?,
                );
                ledger.debit(&source, requirement)?;
                tracker.load(stroke)?;
                steps.push(Step::Command {
                    command: PipetteCommand::Aspirate {
                        volume: stroke.aspirate,
                        source: source.clone(),
                        depth: clearance.depth,
                        rate: clearance.rate,
                    },
                    effect: LedgerEffect::Debit {
                        vessel: source,
                        volume: requirement,
                    },
                    stroke: Some(StrokeMeta {
                        run: run.index,
                        group: run.group.clone(),
                        stroke_in_run,
                        clearance,
                    }),
                });

                for target in &run.targets[stroke.dispenses.clone()] {
                    tracker.dispense(stroke.per_dispense)?;
                    steps.push(plain(PipetteCommand::Dispense {
                        volume: stroke.per_dispense,
                        target: Location::Well(target.well),
                    }));
                    if !stroke.completes_targets() {
                        continue;
                    }
                    done += 1;
                    if let Some(mix) = mix {
                        let held = tracker.held() + mix.volume;
                        if held.0 > pipette.max_volume.0 + VOLUME_EPSILON_UL {
                            return Err(EngineError::CapacityExceeded {
                                what: format!(
                                    "mix in {} while holding {}",
                                    target.well,
                                    tracker.held()
                                ),
                                requested: held,
                                limit: pipette.max_volume,
                            });
                        }
                        steps.push(plain(PipetteCommand::Mix {
                            repetitions: mix.repetitions,
                            volume: mix.volume,
                            target: Location::Well(target.well),
                        }));
                    }
                }
            }

            let leftover = tracker.finish()? * channels;
            match self.config.batching.safety_disposition {
                SafetyDisposition::ReturnToSource => {
                    let active = pool.active().clone();
                    ledger.credit(&active, leftover)?;
                    steps.push(Step::Command {
                        command: PipetteCommand::BlowOut {
                            target: Location::Vessel(active.clone()),
                        },
                        effect: LedgerEffect::Credit {
                            vessel: active,
                            volume: leftover,
                        },
                        stroke: None,
                    });
                },
                SafetyDisposition::Discard => steps.push(Step::Command {
                    command: PipetteCommand::BlowOut {
                        target: Location::Trash,
                    },
                    effect: LedgerEffect::Discard { volume: leftover },
                    stroke: None,
                }),
            }
            if tip_policy == TipPolicy::PerRun || last {
                steps.push(plain(PipetteCommand::DropTip));
            }
            pool.complete_block();
            steps.push(Step::RunEnd { run: run.index });
        }

        Ok(Program {
            steps,
            pools,
            projected: ledger,
        })
    }

    /// 编译并执行整次运行
    ///
    /// 规划阶段的错误在任何命令下发前返回；驱动故障原样透传，
    /// 之后该编排器不可再执行。
    pub fn execute<D: PipettingDriver + ?Sized>(&mut self, driver: &mut D) -> Result<RunReport> {
        if self.faulted {
            return Err(EngineError::InvalidState(
                "a previous execution failed on hardware; the run cannot be resumed".to_string(),
            ));
        }
        let program = self.compile()?;
        let channels = f64::from(self.config.pipette.channels);
        info!(
            "executing protocol: {} step(s), {} command(s)",
            program.steps.len(),
            program.commands().count()
        );

        let mut report = RunReport::default();
        for step in &program.steps {
            match step {
                Step::RunStart {
                    run,
                    plate,
                    group,
                    pool,
                    targets,
                } => info!(
                    "run #{} started: plate {} group '{}' ({} target(s) from pool '{}')",
                    run,
                    plate + 1,
                    group,
                    targets,
                    pool
                ),
                Step::RunEnd { run } => info!("run #{} finished", run),
                Step::Rotation(record) => {
                    report.rotations += 1;
                    report.consolidated += record.consolidated;
                    self.hooks.trigger_rotation(record);
                },
                Step::Command {
                    command,
                    effect,
                    stroke,
                } => {
                    if let Err(fault) = command.send_to(driver) {
                        self.faulted = true;
                        error!("{} failed: {}", command, fault);
                        return Err(fault.into());
                    }
                    let before = match effect {
                        LedgerEffect::Debit { vessel, .. } => Some(self.ledger.query(vessel)?),
                        _ => None,
                    };
                    self.apply(effect)?;
                    account(&mut report, command, effect, stroke.is_some(), channels);
                    if let (Some(meta), Some(before), PipetteCommand::Aspirate { volume, source, .. }) =
                        (stroke, before, command)
                    {
                        let record = StrokeRecord {
                            sequence: self.sequence,
                            run: meta.run,
                            group: meta.group.clone(),
                            vessel: source.clone(),
                            stroke_in_run: meta.stroke_in_run,
                            aspirate_volume: *volume,
                            clearance: meta.clearance.depth,
                            rate: meta.clearance.rate,
                            remaining_before: before,
                            remaining_after: self.ledger.query(source)?,
                            fallback: meta.clearance.fallback,
                        };
                        self.sequence += 1;
                        log_stroke(&record);
                        self.hooks.trigger_stroke(&record);
                    }
                },
            }
        }

        self.pools = program.pools;
        report.final_volumes = self.ledger.snapshot();
        info!(
            "protocol finished: {} stroke(s), {} dispense(s), {} aspirated, {} dispensed, {} rotation(s)",
            report.strokes, report.dispenses, report.aspirated, report.dispensed, report.rotations
        );
        if report.conservation_error() > VOLUME_EPSILON_UL * report.strokes.max(1) as f64 {
            warn!(
                "volume conservation drift of {:.6} µL across the run",
                report.conservation_error()
            );
        }
        Ok(report)
    }

    fn apply(&mut self, effect: &LedgerEffect) -> Result<()> {
        match effect {
            LedgerEffect::Debit { vessel, volume } => self.ledger.debit(vessel, *volume),
            LedgerEffect::Credit { vessel, volume } => self.ledger.credit(vessel, *volume),
            LedgerEffect::None | LedgerEffect::Discard { .. } => Ok(()),
        }
    }
}

/// 一步执行：加载配置并完成整次运行
pub fn run_protocol<D: PipettingDriver + ?Sized>(
    config: &ProtocolConfig,
    driver: &mut D,
) -> Result<RunReport> {
    Orchestrator::new(config)?.execute(driver)
}

fn account(
    report: &mut RunReport,
    command: &PipetteCommand,
    effect: &LedgerEffect,
    is_stroke: bool,
    channels: f64,
) {
    match (command, effect) {
        (PipetteCommand::Aspirate { .. }, LedgerEffect::Debit { volume, .. }) if is_stroke => {
            report.strokes += 1;
            report.aspirated += *volume;
        },
        (
            PipetteCommand::Dispense {
                volume,
                target: Location::Well(well),
            },
            _,
        ) => {
            trace!("dispensed {} into {}", volume, well);
            report.dispenses += 1;
            report.dispensed += *volume * channels;
        },
        (PipetteCommand::BlowOut { .. }, LedgerEffect::Credit { volume, .. }) => {
            report.safety_returned += *volume;
        },
        (PipetteCommand::BlowOut { .. }, LedgerEffect::Discard { volume }) => {
            report.safety_discarded += *volume;
        },
        _ => {},
    }
}

fn plain(command: PipetteCommand) -> Step {
    Step::Command {
        command,
        effect: LedgerEffect::None,
        stroke: None,
    }
}

fn push_rotations(steps: &mut Vec<Step>, run: &Run, rotations: Vec<Rotation>, channels: f64) {
    for rotation in rotations {
        steps.push(Step::Rotation(RotationRecord {
            group: run.group.clone(),
            from: rotation.from.clone(),
            to: rotation.to.clone(),
            consolidated: rotation.moved,
        }));
        for chunk in rotation.transfers {
            let volume = chunk.volume * channels;
            steps.push(Step::Command {
                command: PipetteCommand::Aspirate {
                    volume: chunk.volume,
                    source: rotation.from.clone(),
                    depth: chunk.clearance.depth,
                    rate: chunk.clearance.rate,
                },
                effect: LedgerEffect::Debit {
                    vessel: rotation.from.clone(),
                    volume,
                },
                stroke: None,
            });
            steps.push(Step::Command {
                command: PipetteCommand::Dispense {
                    volume: chunk.volume,
                    target: Location::Vessel(rotation.to.clone()),
                },
                effect: LedgerEffect::Credit {
                    vessel: rotation.to.clone(),
                    volume,
                },
                stroke: None,
            });
        }
    }
}

fn log_stroke(record: &StrokeRecord) {
    debug!(
        "stroke #{} (run #{} '{}' #{}): {} from {} at {} ({}), remaining {} -> {}",
        record.sequence,
        record.run,
        record.group,
        record.stroke_in_run,
        record.aspirate_volume,
        record.vessel,
        record.clearance,
        record.rate,
        record.remaining_before,
        record.remaining_after
    );
    if record.fallback {
        warn!(
            "{} is at or below its dead volume ({} left): using fallback clearance {} at {}",
            record.vessel, record.remaining_before, record.clearance, record.rate
        );
    }
}
