//! 命令流
//!
//! 编排器先把整次运行编译为 `PipetteCommand` 序列，再逐条下发给驱动。
//! 命令本身不可变，执行阶段只读。

use std::fmt;

use elisa_labware::{FlowRate, Microliters, Millimeters, VesselId, WellRef};

use crate::driver::PipettingDriver;
use crate::error::DriverError;

/// 排液/吹出目标位置
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "at", rename_all = "snake_case"))]
pub enum Location {
    /// 源容器（吹回安全体积、合并转移）
    Vessel(VesselId),
    /// 板上孔位
    Well(WellRef),
    /// 废液槽
    Trash,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Vessel(id) => write!(f, "vessel {}", id),
            Location::Well(well) => write!(f, "well {}", well),
            Location::Trash => f.write_str("trash"),
        }
    }
}

/// 单条移液命令
///
/// 体积均为单通道体积。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "op", rename_all = "snake_case"))]
pub enum PipetteCommand {
    PickUpTip,
    Aspirate {
        volume: Microliters,
        source: VesselId,
        /// 吸头距容器底部的高度
        depth: Millimeters,
        rate: FlowRate,
    },
    Dispense {
        volume: Microliters,
        target: Location,
    },
    /// 分配后在孔内混匀
    Mix {
        repetitions: u32,
        volume: Microliters,
        target: Location,
    },
    BlowOut {
        target: Location,
    },
    DropTip,
}

impl PipetteCommand {
    /// 驱动调用名（用于日志和故障上下文）
    pub fn name(&self) -> &'static str {
        match self {
            PipetteCommand::PickUpTip => "pick_up_tip",
            PipetteCommand::Aspirate { .. } => "aspirate",
            PipetteCommand::Dispense { .. } => "dispense",
            PipetteCommand::Mix { .. } => "mix",
            PipetteCommand::BlowOut { .. } => "blow_out",
            PipetteCommand::DropTip => "drop_tip",
        }
    }

    /// 将命令下发给驱动
    ///
    /// 驱动错误原样返回，不重试。
    pub fn send_to<D: PipettingDriver + ?Sized>(&self, driver: &mut D) -> Result<(), DriverError> {
        match self {
            PipetteCommand::PickUpTip => driver.pick_up_tip(),
            PipetteCommand::Aspirate {
                volume,
                source,
                depth,
                rate,
            } => driver.aspirate(*volume, source, *depth, *rate),
            PipetteCommand::Dispense { volume, target } => driver.dispense(*volume, target),
            PipetteCommand::Mix {
                repetitions,
                volume,
                target,
            } => driver.mix(*repetitions, *volume, target),
            PipetteCommand::BlowOut { target } => driver.blow_out(target),
            PipetteCommand::DropTip => driver.drop_tip(),
        }
    }
}

impl fmt::Display for PipetteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipetteCommand::PickUpTip => f.write_str("pick up tip"),
            PipetteCommand::Aspirate {
                volume,
                source,
                depth,
                rate,
            } => write!(f, "aspirate {} from {} at {} ({})", volume, source, depth, rate),
            PipetteCommand::Dispense { volume, target } => {
                write!(f, "dispense {} into {}", volume, target)
            },
            PipetteCommand::Mix {
                repetitions,
                volume,
                target,
            } => write!(f, "mix {}x {} in {}", repetitions, volume, target),
            PipetteCommand::BlowOut { target } => write!(f, "blow out into {}", target),
            PipetteCommand::DropTip => f.write_str("drop tip"),
        }
    }
}
