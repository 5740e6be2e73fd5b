//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 订阅者：`RUST_LOG` 优先，否则使用调用方给出的
//! 默认指令。同时把 `log` 宏的记录桥接到 `tracing`。

use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

fn filter(default_directive: &str) -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    match default_directive.parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// 安装全局订阅者，已存在时返回错误
pub fn try_init_logging(default_directive: &str) -> Result<(), SetGlobalDefaultError> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter(default_directive))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    // 已有 log 实现时桥接失败，不影响 tracing 输出
    let _ = tracing_log::LogTracer::init();
    Ok(())
}

/// 安装全局订阅者，已存在时静默忽略
///
/// # 示例
///
/// ```rust
/// elisa_sdk::init_logging("elisa_engine=debug");
/// ```
pub fn init_logging(default_directive: &str) {
    let _ = try_init_logging(default_directive);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        init_logging("elisa_engine=info");
        assert!(try_init_logging("elisa_engine=info").is_err());
    }

    #[test]
    fn test_default_directive_applied() {
        let filter = filter("elisa_engine=debug");
        assert!(filter.to_string().contains("elisa_engine=debug"));
        // 无法解析的指令被忽略
        let _ = super::filter("elisa_engine=[");
    }
}
