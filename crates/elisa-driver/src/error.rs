//! 驱动层错误类型定义

use thiserror::Error;

/// 驱动层错误类型
///
/// 每个驱动调用要么成功，要么返回不可恢复的错误；本层不做重试。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// 硬件故障（电机、传感器、吸头检测等）
    #[error("Hardware fault during {operation}: {reason}")]
    HardwareFault {
        /// 出错的驱动调用（如 "aspirate"）
        operation: &'static str,
        reason: String,
    },

    /// 吸头状态不符（未取吸头就吸液、重复取吸头）
    #[error("Tip state violation: {0}")]
    TipState(String),

    /// 吸液量超过吸头剩余容量
    #[error("Tip overfilled: holding {held:.1} µL, requested {requested:.1} µL, max {max:.1} µL")]
    TipOverfilled { held: f64, requested: f64, max: f64 },

    /// 排液量超过吸头内液体
    #[error("Tip underflow: holding {held:.1} µL, requested {requested:.1} µL")]
    TipUnderflow { held: f64, requested: f64 },
}

impl DriverError {
    /// 构造硬件故障
    pub fn hardware(operation: &'static str, reason: impl Into<String>) -> Self {
        DriverError::HardwareFault {
            operation,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DriverError;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::hardware("aspirate", "plunger stalled");
        assert_eq!(
            format!("{}", err),
            "Hardware fault during aspirate: plunger stalled"
        );

        let err = DriverError::TipState("no tip attached".to_string());
        assert!(format!("{}", err).contains("no tip attached"));

        let err = DriverError::TipOverfilled {
            held: 50.0,
            requested: 300.0,
            max: 300.0,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("50.0") && msg.contains("300.0"));
    }
}
