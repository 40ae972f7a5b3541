//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::backend;
use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::Config;
use crate::daemon::DaemonManager;
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 默认命令
pub struct RootCommand;

#[async_trait]
impl Command for RootCommand {
    async fn execute(&self, _args: &Args) -> Result<()> {
        println!("Funky!");
        Ok(())
    }
}

/// 版本命令
pub struct VersionCommand;

impl VersionCommand {
    /// 生成版本信息文本
    pub fn render(format: &OutputFormat) -> Result<String> {
        let text = match format {
            OutputFormat::Json => {
                let version_info = serde_json::json!({
                    "name": crate::APP_NAME,
                    "version": crate::VERSION,
                    "description": crate::APP_DESCRIPTION
                });
                serde_json::to_string_pretty(&version_info)?
            }
            OutputFormat::Text => format!("{} v{}", crate::APP_NAME, crate::VERSION),
        };
        Ok(text)
    }
}

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Some(Commands::Version { format }) = &args.command {
            println!("{}", Self::render(format)?);
        }
        Ok(())
    }
}

/// 在执行任何命令之前确保 fn 守护进程正在运行
pub async fn ensure_daemon(config: &Config, verbose: bool) -> Result<()> {
    let backend = backend::from_config(&config.backend);
    info!("使用 {} 后端检查守护进程", backend.name());

    DaemonManager::new(config.daemon.clone())
        .ensure_running(backend.as_ref(), verbose)
        .await?;

    if verbose {
        println!("fn running!");
    }
    Ok(())
}

/// 获取参数对应的命令处理器
pub fn command_for(args: &Args) -> Box<dyn Command> {
    match args.command {
        Some(Commands::Version { .. }) => Box::new(VersionCommand),
        None => Box::new(RootCommand),
    }
}
