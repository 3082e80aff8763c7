use anyhow::{Context, Result};
use clap::{Arg, Command};
use tokio::signal;
use tracing::{error, info};

mod app;
mod commands;
mod shutdown;

use app::{AppMode, Application};
use shutdown::ShutdownManager;
use workq_core::config::AppConfig;
use workq_core::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("workq")
        .version("1.0.0")
        .about("分布式作业队列与定时调度系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .default_value("config/workq.toml"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["worker", "scheduler", "all", "status"])
                .default_value("all"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();
    let mode_str = matches.get_one::<String>("mode").unwrap();
    let log_level = matches.get_one::<String>("log-level").unwrap();
    let log_format = matches.get_one::<String>("log-format").unwrap();

    // 初始化日志系统
    logging::init_logging(log_level, log_format).context("初始化日志失败")?;

    info!("启动作业队列系统");
    info!("配置文件: {config_path}");
    info!("运行模式: {mode_str}");

    // 加载配置
    let config = AppConfig::load(Some(config_path))
        .with_context(|| format!("加载配置文件失败: {config_path}"))?;
    info!("队列驱动: {}", config.queue.driver_name());

    let mode = AppMode::parse(mode_str)?;

    // status 模式直接执行后退出，不进入常驻循环
    if mode == AppMode::Status {
        let shutdown_manager = ShutdownManager::new();
        let shutdown_rx = shutdown_manager.subscribe().await;
        return Application::new(config, mode).run(shutdown_rx).await;
    }

    let app = Application::new(config, mode);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e}");
            }
        })
    };

    // 等待关闭信号
    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");

    shutdown_manager.shutdown().await;
    if let Err(e) = app_handle.await {
        error!("等待应用退出失败: {e}");
    }

    info!("已退出");
    Ok(())
}

/// 等待 SIGINT / SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("注册 Ctrl+C 信号失败");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 信号失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
