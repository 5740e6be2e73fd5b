//! Mock 驱动
//!
//! 内存中记录全部命令，并模拟吸头状态：
//! - 未取吸头时吸液/排液报 `TipState`
//! - 吸头内液体不足时排液报 `TipUnderflow`
//! - 设置了吸头容量时超量吸液（含混匀）报 `TipOverfilled`
//!
//! 可通过 [`RecordingDriver::fail_at`] 在第 N 条命令注入硬件故障，用于测试故障透传。

use elisa_labware::constants::VOLUME_EPSILON_UL;
use elisa_labware::{FlowRate, Microliters, Millimeters, VesselId};
use tracing::trace;

use crate::command::{Location, PipetteCommand};
use crate::driver::PipettingDriver;
use crate::error::DriverError;

/// 记录型 Mock 驱动
#[derive(Debug, Default, Clone)]
pub struct RecordingDriver {
    commands: Vec<PipetteCommand>,
    tip_attached: bool,
    /// 吸头内液体（单通道）
    held: Microliters,
    tip_capacity: Option<Microliters>,
    fail_at: Option<usize>,
}

impl RecordingDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 限制吸头容量（单通道）
    #[must_use]
    pub fn with_tip_capacity(mut self, capacity: Microliters) -> Self {
        self.tip_capacity = Some(capacity);
        self
    }

    /// 第 `index` 条命令（0 起）返回硬件故障，且不被记录
    #[must_use]
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// 已成功执行的命令
    pub fn commands(&self) -> &[PipetteCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<PipetteCommand> {
        self.commands
    }

    /// 当前是否持有吸头
    pub fn tip_attached(&self) -> bool {
        self.tip_attached
    }

    /// 吸头内剩余液体
    pub fn held(&self) -> Microliters {
        self.held
    }

    /// 吸液命令数
    pub fn aspirate_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, PipetteCommand::Aspirate { .. }))
            .count()
    }

    /// 所有吸液量之和（单通道）
    pub fn total_aspirated(&self) -> Microliters {
        self.commands
            .iter()
            .filter_map(|c| match c {
                PipetteCommand::Aspirate { volume, .. } => Some(*volume),
                _ => None,
            })
            .sum()
    }

    /// 排入孔位的体积之和（单通道，不含合并转移）
    pub fn total_dispensed_to_wells(&self) -> Microliters {
        self.commands
            .iter()
            .filter_map(|c| match c {
                PipetteCommand::Dispense {
                    volume,
                    target: Location::Well(_),
                } => Some(*volume),
                _ => None,
            })
            .sum()
    }

    fn check_fault(&self, operation: &'static str) -> Result<(), DriverError> {
        if self.fail_at == Some(self.commands.len()) {
            return Err(DriverError::hardware(
                operation,
                format!("injected fault at command #{}", self.commands.len()),
            ));
        }
        Ok(())
    }

    fn require_tip(&self, operation: &str) -> Result<(), DriverError> {
        if !self.tip_attached {
            return Err(DriverError::TipState(format!("{} without a tip", operation)));
        }
        Ok(())
    }

    fn record(&mut self, command: PipetteCommand) {
        trace!("mock driver: {}", command);
        self.commands.push(command);
    }
}

impl PipettingDriver for RecordingDriver {
    fn pick_up_tip(&mut self) -> Result<(), DriverError> {
        self.check_fault("pick_up_tip")?;
        if self.tip_attached {
            return Err(DriverError::TipState("tip already attached".to_string()));
        }
        self.tip_attached = true;
        self.held = Microliters::ZERO;
        self.record(PipetteCommand::PickUpTip);
        Ok(())
    }

    fn aspirate(
        &mut self,
        volume: Microliters,
        source: &VesselId,
        depth: Millimeters,
        rate: FlowRate,
    ) -> Result<(), DriverError> {
        self.check_fault("aspirate")?;
        self.require_tip("aspirate")?;
        if let Some(max) = self.tip_capacity {
            if (self.held + volume).0 > max.0 + VOLUME_EPSILON_UL {
                return Err(DriverError::TipOverfilled {
                    held: self.held.0,
                    requested: volume.0,
                    max: max.0,
                });
            }
        }
        self.held += volume;
        self.record(PipetteCommand::Aspirate {
            volume,
            source: source.clone(),
            depth,
            rate,
        });
        Ok(())
    }

    fn dispense(&mut self, volume: Microliters, target: &Location) -> Result<(), DriverError> {
        self.check_fault("dispense")?;
        self.require_tip("dispense")?;
        if volume.0 > self.held.0 + VOLUME_EPSILON_UL {
            return Err(DriverError::TipUnderflow {
                held: self.held.0,
                requested: volume.0,
            });
        }
        self.held = (self.held - volume).max(Microliters::ZERO);
        self.record(PipetteCommand::Dispense {
            volume,
            target: target.clone(),
        });
        Ok(())
    }

    fn mix(
        &mut self,
        repetitions: u32,
        volume: Microliters,
        target: &Location,
    ) -> Result<(), DriverError> {
        self.check_fault("mix")?;
        self.require_tip("mix")?;
        if let Some(max) = self.tip_capacity {
            if (self.held + volume).0 > max.0 + VOLUME_EPSILON_UL {
                return Err(DriverError::TipOverfilled {
                    held: self.held.0,
                    requested: volume.0,
                    max: max.0,
                });
            }
        }
        self.record(PipetteCommand::Mix {
            repetitions,
            volume,
            target: target.clone(),
        });
        Ok(())
    }

    fn blow_out(&mut self, target: &Location) -> Result<(), DriverError> {
        self.check_fault("blow_out")?;
        self.require_tip("blow_out")?;
        self.held = Microliters::ZERO;
        self.record(PipetteCommand::BlowOut {
            target: target.clone(),
        });
        Ok(())
    }

    fn drop_tip(&mut self) -> Result<(), DriverError> {
        self.check_fault("drop_tip")?;
        self.require_tip("drop_tip")?;
        self.tip_attached = false;
        self.held = Microliters::ZERO;
        self.record(PipetteCommand::DropTip);
        Ok(())
    }
}
