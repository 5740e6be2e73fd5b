//! 异步诊断记录钩子
//!
//! 基于有界 Channel：执行线程只做 `try_send`，队列满时丢弃记录并计数，
//! 不会因为消费端缓慢而拖慢移液。
//!
//! # 使用示例
//!
//! ```rust
//! use elisa_driver::recording::{AsyncDiagnosticsHook, DiagnosticEvent};
//! use std::sync::Arc;
//!
//! let (hook, rx) = AsyncDiagnosticsHook::new();
//! let dropped = hook.dropped_records().clone();
//!
//! std::thread::spawn(move || {
//!     while let Ok(event) = rx.recv() {
//!         if let DiagnosticEvent::Stroke(stroke) = event {
//!             println!("{} -> {}", stroke.vessel, stroke.clearance);
//!         }
//!     }
//! });
//!
//! println!("丢弃 {} 条", dropped.load(std::sync::atomic::Ordering::Relaxed));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded};
use elisa_labware::{FlowRate, Microliters, Millimeters, VesselId};

use crate::hooks::DiagnosticCallback;

/// 诊断队列容量
///
/// 一块 96 孔板约几十次吸液，足够容纳多板整次运行。
pub const DIAGNOSTIC_QUEUE_CAPACITY: usize = 10_000;

/// 单次吸液的诊断记录
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StrokeRecord {
    /// 全局吸液序号（0 起）
    pub sequence: u64,
    /// 所属运行序号
    pub run: usize,
    /// 逻辑分组名
    pub group: String,
    /// 吸液源容器
    pub vessel: VesselId,
    /// 本次运行内的吸液序号（0 为首吸，含安全体积）
    pub stroke_in_run: usize,
    /// 单通道吸液量
    pub aspirate_volume: Microliters,
    /// 计算出的底部间隙
    pub clearance: Millimeters,
    pub rate: FlowRate,
    /// 吸液前账本剩余（有效体积）
    pub remaining_before: Microliters,
    /// 吸液后账本剩余（有效体积）
    pub remaining_after: Microliters,
    /// 是否处于死体积以下的回退区
    pub fallback: bool,
}

/// 源容器轮换记录
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RotationRecord {
    pub group: String,
    pub from: VesselId,
    pub to: VesselId,
    /// 合并转移到新容器的体积（未合并为 0）
    pub consolidated: Microliters,
}

/// 队列中的诊断事件
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum DiagnosticEvent {
    Stroke(StrokeRecord),
    Rotation(RotationRecord),
}

/// 异步诊断钩子（Bounded Queue）
///
/// - 队列满时丢弃记录，而不是阻塞执行线程
/// - 通过 `dropped_records` 和 `record_counter` 监控
pub struct AsyncDiagnosticsHook {
    tx: Sender<DiagnosticEvent>,
    /// 丢弃计数器
    dropped_records: Arc<AtomicU64>,
    /// 成功入队计数器
    record_counter: Arc<AtomicU64>,
}

impl AsyncDiagnosticsHook {
    /// 创建默认容量的诊断钩子
    ///
    /// # 返回
    ///
    /// - `(hook, rx)`: 钩子实例和接收端
    #[must_use]
    pub fn new() -> (Self, Receiver<DiagnosticEvent>) {
        Self::with_capacity(DIAGNOSTIC_QUEUE_CAPACITY)
    }

    /// 指定队列容量
    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, Receiver<DiagnosticEvent>) {
        let (tx, rx) = bounded(capacity);
        let hook = Self {
            tx,
            dropped_records: Arc::new(AtomicU64::new(0)),
            record_counter: Arc::new(AtomicU64::new(0)),
        };
        (hook, rx)
    }

    /// 丢弃计数器的引用
    #[must_use]
    pub fn dropped_records(&self) -> &Arc<AtomicU64> {
        &self.dropped_records
    }

    /// 入队计数器的引用
    #[must_use]
    pub fn record_counter(&self) -> &Arc<AtomicU64> {
        &self.record_counter
    }

    /// 已丢弃的记录数
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_records.load(Ordering::Relaxed)
    }

    /// 已入队的记录数
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.record_counter.load(Ordering::Relaxed)
    }

    fn push(&self, event: DiagnosticEvent) {
        if self.tx.try_send(event).is_err() {
            self.dropped_records.fetch_add(1, Ordering::Relaxed);
        } else {
            self.record_counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl DiagnosticCallback for AsyncDiagnosticsHook {
    #[inline]
    fn on_stroke(&self, record: &StrokeRecord) {
        self.push(DiagnosticEvent::Stroke(record.clone()));
    }

    #[inline]
    fn on_rotation(&self, record: &RotationRecord) {
        self.push(DiagnosticEvent::Rotation(record.clone()));
    }
}
