//! 耗材层错误类型定义

use thiserror::Error;

/// 耗材描述错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LabwareError {
    /// 孔位编号无法解析（如 "Z99"）
    #[error("Invalid well id: {0:?}")]
    InvalidWellId(String),

    /// 孔位超出板型范围
    #[error("Well {well} out of range (rows: {max_rows}, columns: {max_columns})")]
    WellOutOfRange {
        well: String,
        max_rows: u8,
        max_columns: u8,
    },

    /// 容器几何参数非法
    #[error("Invalid geometry for vessel {vessel}: {reason}")]
    InvalidGeometry { vessel: String, reason: String },

    /// 移液器参数非法
    #[error("Invalid pipette {name}: {reason}")]
    InvalidPipette { name: String, reason: String },
}
