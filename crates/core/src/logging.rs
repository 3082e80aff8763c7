use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{Result, WorkqError};

/// 初始化日志系统
///
/// `level` 为默认级别（`RUST_LOG` 可覆盖），`format` 支持 `pretty` 和 `json`。
pub fn init_logging(level: &str, format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| WorkqError::Configuration(format!("无效的日志级别 {level}: {e}")))?;

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .map_err(|e| WorkqError::Configuration(format!("初始化日志失败: {e}")))?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .map_err(|e| WorkqError::Configuration(format!("初始化日志失败: {e}")))?;
        }
        other => {
            return Err(WorkqError::Configuration(format!(
                "不支持的日志格式: {other}"
            )));
        }
    }

    Ok(())
}
