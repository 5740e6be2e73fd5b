//! 诊断钩子系统
//!
//! 编排器每完成一次吸液（stroke）或切换一次源容器时触发已注册的回调。
//! 诊断流只用于追溯，不参与正确性判断：回调不能返回错误，也不能阻塞执行线程。
//!
//! # 使用示例
//!
//! ```rust
//! use elisa_driver::hooks::{DiagnosticCallback, HookManager};
//! use elisa_driver::recording::AsyncDiagnosticsHook;
//! use std::sync::Arc;
//!
//! let mut hooks = HookManager::new();
//! let (hook, _rx) = AsyncDiagnosticsHook::new();
//! hooks.add_callback(Arc::new(hook) as Arc<dyn DiagnosticCallback>);
//! assert_eq!(hooks.len(), 1);
//! ```

use std::sync::Arc;

use crate::recording::{RotationRecord, StrokeRecord};

/// 诊断回调 Trait
///
/// # 性能要求
///
/// - **非阻塞**: 推荐使用 `crossbeam_channel::Sender::try_send` 把记录转交给其他线程
/// - 禁止 I/O 和长时间持锁
pub trait DiagnosticCallback: Send + Sync {
    /// 每次吸液后调用
    fn on_stroke(&self, record: &StrokeRecord);

    /// 源容器轮换后调用（可选）
    ///
    /// 默认为空操作。
    fn on_rotation(&self, record: &RotationRecord) {
        let _ = record;
    }
}

/// 钩子管理器
///
/// 回调列表本身不是线程安全的；编排器单线程独占持有，无需额外同步。
#[derive(Default)]
pub struct HookManager {
    callbacks: Vec<Arc<dyn DiagnosticCallback>>,
}

impl HookManager {
    /// 创建新的钩子管理器
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// 添加回调
    pub fn add_callback(&mut self, callback: Arc<dyn DiagnosticCallback>) {
        self.callbacks.push(callback);
    }

    /// 移除所有回调
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// 触发所有吸液回调
    pub fn trigger_stroke(&self, record: &StrokeRecord) {
        for callback in self.callbacks.iter() {
            callback.on_stroke(record);
        }
    }

    /// 触发所有轮换回调
    pub fn trigger_rotation(&self, record: &RotationRecord) {
        for callback in self.callbacks.iter() {
            callback.on_rotation(record);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookManager")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
