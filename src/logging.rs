//! 日志初始化
//!
//! 诊断信息统一写到 stderr，stdout 只留给最终的统计输出。

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// 安装全局 tracing subscriber
///
/// 未设置 `RUST_LOG` 时：默认 `info`，`verbose` 为 `debug`，`silent` 为 `warn`。
/// 重复调用不会报错（后续调用被忽略）。
pub fn init_logging(verbose: bool, silent: bool) {
    let level = if verbose {
        "debug"
    } else if silent {
        "warn"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("logfiler={}", level)));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}
