//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use crate::backend::SandboxConfig;
use crate::config::Config;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Funky - 构建和部署 serverless 函数
#[derive(Parser, Debug, Clone)]
#[command(
    name = "funky",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "FUNKY_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 是否启用详细输出
    #[arg(
        short,
        long,
        global = true,
        help = "输出 fn 后台任务的详细信息"
    )]
    pub verbose: bool,

    /// 日志文件路径
    #[arg(
        long,
        value_name = "FILE",
        help = "日志文件路径（默认 app.log）",
        env = "FUNKY_LOG_FILE"
    )]
    pub log_file: Option<PathBuf>,

    /// 在指定容器内管理守护进程
    #[arg(
        long,
        value_name = "CONTAINER",
        help = "在指定容器内管理 fn 守护进程",
        env = "FUNKY_SANDBOX"
    )]
    pub sandbox: Option<String>,

    /// 容器运行时
    #[arg(
        long,
        value_name = "BIN",
        help = "容器运行时（docker/podman），仅在配置了沙箱时生效"
    )]
    pub runtime: Option<String>,

    /// 子命令
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 用命令行参数覆盖配置文件中的值
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref log_file) = self.log_file {
            config.log.file = log_file.clone();
        }

        if let Some(ref container) = self.sandbox {
            let mut sandbox = config
                .backend
                .sandbox
                .clone()
                .unwrap_or_else(|| SandboxConfig::new(container.as_str()));
            sandbox.container = container.clone();
            config.backend.sandbox = Some(sandbox);
        }

        if let (Some(runtime), Some(sandbox)) = (&self.runtime, config.backend.sandbox.as_mut()) {
            sandbox.runtime = runtime.clone();
        }
    }
}
