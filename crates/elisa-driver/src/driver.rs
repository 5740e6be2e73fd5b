//! 移液驱动端口
//!
//! 机械臂运动、吸头架管理与硬件超时都在驱动内部完成。
//! 每个调用是原子的：要么成功，要么返回不可恢复的 [`DriverError`]。

use elisa_labware::{FlowRate, Microliters, Millimeters, VesselId};

use crate::command::Location;
use crate::error::DriverError;

/// 移液驱动 Trait
///
/// 所有体积均为单通道体积；多通道移液器由驱动负责把同一命令施加到全部通道。
///
/// # 示例
///
/// ```rust
/// use elisa_driver::{DriverError, Location, PipettingDriver};
/// use elisa_labware::{FlowRate, Microliters, Millimeters, VesselId};
///
/// struct Console;
///
/// impl PipettingDriver for Console {
///     fn pick_up_tip(&mut self) -> Result<(), DriverError> { Ok(()) }
///     fn aspirate(
///         &mut self,
///         volume: Microliters,
///         source: &VesselId,
///         depth: Millimeters,
///         rate: FlowRate,
///     ) -> Result<(), DriverError> {
///         println!("aspirate {} from {} at {} ({})", volume, source, depth, rate);
///         Ok(())
///     }
///     fn dispense(&mut self, _volume: Microliters, _target: &Location) -> Result<(), DriverError> { Ok(()) }
///     fn mix(&mut self, _repetitions: u32, _volume: Microliters, _target: &Location) -> Result<(), DriverError> { Ok(()) }
///     fn blow_out(&mut self, _target: &Location) -> Result<(), DriverError> { Ok(()) }
///     fn drop_tip(&mut self) -> Result<(), DriverError> { Ok(()) }
/// }
/// ```
pub trait PipettingDriver {
    /// 取吸头
    fn pick_up_tip(&mut self) -> Result<(), DriverError>;

    /// 在距底部 `depth` 处以 `rate` 倍标称流速吸液
    fn aspirate(
        &mut self,
        volume: Microliters,
        source: &VesselId,
        depth: Millimeters,
        rate: FlowRate,
    ) -> Result<(), DriverError>;

    /// 排液
    fn dispense(&mut self, volume: Microliters, target: &Location) -> Result<(), DriverError>;

    /// 在目标处原地吸排 `repetitions` 次混匀，吸头内原有液体不变
    fn mix(
        &mut self,
        repetitions: u32,
        volume: Microliters,
        target: &Location,
    ) -> Result<(), DriverError>;

    /// 吹出吸头内剩余液体
    fn blow_out(&mut self, target: &Location) -> Result<(), DriverError>;

    /// 弃吸头
    fn drop_tip(&mut self) -> Result<(), DriverError>;
}

impl<D: PipettingDriver + ?Sized> PipettingDriver for &mut D {
    fn pick_up_tip(&mut self) -> Result<(), DriverError> {
        (**self).pick_up_tip()
    }

    fn aspirate(
        &mut self,
        volume: Microliters,
        source: &VesselId,
        depth: Millimeters,
        rate: FlowRate,
    ) -> Result<(), DriverError> {
        (**self).aspirate(volume, source, depth, rate)
    }

    fn dispense(&mut self, volume: Microliters, target: &Location) -> Result<(), DriverError> {
        (**self).dispense(volume, target)
    }

    fn mix(
        &mut self,
        repetitions: u32,
        volume: Microliters,
        target: &Location,
    ) -> Result<(), DriverError> {
        (**self).mix(repetitions, volume, target)
    }

    fn blow_out(&mut self, target: &Location) -> Result<(), DriverError> {
        (**self).blow_out(target)
    }

    fn drop_tip(&mut self) -> Result<(), DriverError> {
        (**self).drop_tip()
    }
}

impl<D: PipettingDriver + ?Sized> PipettingDriver for Box<D> {
    fn pick_up_tip(&mut self) -> Result<(), DriverError> {
        (**self).pick_up_tip()
    }

    fn aspirate(
        &mut self,
        volume: Microliters,
        source: &VesselId,
        depth: Millimeters,
        rate: FlowRate,
    ) -> Result<(), DriverError> {
        (**self).aspirate(volume, source, depth, rate)
    }

    fn dispense(&mut self, volume: Microliters, target: &Location) -> Result<(), DriverError> {
        (**self).dispense(volume, target)
    }

    fn mix(
        &mut self,
        repetitions: u32,
        volume: Microliters,
        target: &Location,
    ) -> Result<(), DriverError> {
        (**self).mix(repetitions, volume, target)
    }

    fn blow_out(&mut self, target: &Location) -> Result<(), DriverError> {
        (**self).blow_out(target)
    }

    fn drop_tip(&mut self) -> Result<(), DriverError> {
        (**self).drop_tip()
    }
}
