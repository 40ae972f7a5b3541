//! Funky 主程序入口
//!
//! 在执行任何命令之前确保 fn 守护进程已注册并运行

use anyhow::{Context, Result};
use clap::Parser;
use funky::cli::{command_for, ensure_daemon, Args};
use funky::config::{ConfigLoader, TomlConfigLoader};
use funky::logging::{LogConfig, LoggingSystem};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 加载配置并应用命令行覆盖
    let loader = TomlConfigLoader::new(true);
    let mut config = loader
        .load_or_default(args.config.as_deref())
        .await
        .context("加载配置失败")?;
    args.apply_overrides(&mut config);
    loader.validate(&config).context("配置无效")?;

    // 初始化日志系统
    let log_config = LogConfig::from_settings(&config.log, args.verbose);
    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("funky v{} 启动", funky::VERSION);

    if let Err(e) = ensure_daemon(&config, args.verbose).await {
        error!("fn 守护进程启动失败: {e}");
        eprintln!("Error: failed to start the fn daemon.\n{e}\nExiting...");
        std::process::exit(1);
    }

    // 执行命令
    if let Err(e) = command_for(&args).execute(&args).await {
        error!("命令执行失败: {e}");
        std::process::exit(1);
    }

    Ok(())
}
