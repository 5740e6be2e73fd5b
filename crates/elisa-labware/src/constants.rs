//! 命名常量
//!
//! 所有阈值、几何参数与默认值集中在此处，配置文件未指定时使用。
//! 单位：体积 µL，长度 mm，速率为相对标称流速的倍率。

// ============================================================================
// 数值容差
// ============================================================================

/// 体积比较容差（µL）
///
/// 账本扣减与守恒校验均在此容差内判等。
pub const VOLUME_EPSILON_UL: f64 = 1e-6;

// ============================================================================
// 浸没与吸液速率
// ============================================================================

/// 吸头浸入液面以下的默认深度（mm）
pub const DEFAULT_IMMERSION_DEPTH_MM: f64 = 6.0;

/// 死体积以下使用的回退吸液速率
///
/// 液面接近底部时降速，避免吸入空气。
pub const DEFAULT_FALLBACK_RATE: f64 = 0.4;

/// 比例速率曲线允许配置的最低下限
pub const MIN_RATE_FLOOR: f64 = 0.2;

/// 标称吸液速率
pub const NOMINAL_RATE: f64 = 1.0;

// ============================================================================
// Eppendorf Safe-Lock 1.5 / 2.0 mL 管
// ============================================================================

/// 圆柱段半径（mm），内径 8.7 mm
pub const EPPENDORF_RADIUS_MM: f64 = 4.35;

/// 锥形底部高度（mm）
pub const EPPENDORF_CONICAL_HEIGHT_MM: f64 = 17.8;

/// 锥形底部容积（µL），即 0.5 mL 刻度以下
///
/// 账本初始化时一次性扣除，几何公式只对圆柱段建模。
pub const EPPENDORF_CONICAL_VOLUME_UL: f64 = 500.0;

/// 锥形管回退底部间隙（mm）
///
/// 该高度下吸头即使下探过深也不会溢出或堵塞。
pub const EPPENDORF_FALLBACK_CLEARANCE_MM: f64 = 1.2;

/// 锥形管最小安全底部间隙（mm）
pub const EPPENDORF_FLOOR_CLEARANCE_MM: f64 = 1.0;

// ============================================================================
// 储液槽
// ============================================================================

/// 储液槽吸头浸没深度（mm）
pub const RESERVOIR_IMMERSION_DEPTH_MM: f64 = 3.0;

/// 储液槽最小底部间隙（mm），同时用作死体积以下的回退间隙
pub const RESERVOIR_FLOOR_CLEARANCE_MM: f64 = 0.1;

// ============================================================================
// 安全体积
// ============================================================================

/// 安全体积自动选择的候选阶梯（µL），从大到小尝试
///
/// 选择满足 `batch_capacity + safety <= max_volume` 的最大值。
pub const SAFETY_VOLUME_LADDER_UL: [f64; 3] = [50.0, 25.0, 0.0];

// ============================================================================
// 板型
// ============================================================================

/// 支持的最大行数（A-P，384 孔板）
pub const MAX_PLATE_ROWS: u8 = 16;

/// 支持的最大列数（1-24，384 孔板）
pub const MAX_PLATE_COLUMNS: u8 = 24;
