//! # 日志初始化
//!
//! 安装全局 `tracing` 订阅者，输出到 stderr。
//!
//! 过滤规则从 `MDBATCH_LOG` 读取（语法同 `RUST_LOG`），未设置时默认 `warn`，
//! `--verbose` 时默认 `debug`。重复调用无副作用。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `tracing-subscriber`

use tracing_subscriber::EnvFilter;

/// 过滤规则的环境变量名
pub const LOG_ENV: &str = "MDBATCH_LOG";

/// 初始化日志
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("mdbatch={}", default_level)));

    // 已有全局订阅者时忽略
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
