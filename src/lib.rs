//! Funky - 构建和部署 serverless 函数
//!
//! 在执行命令之前确保 fn 守护进程已经注册到 systemd 用户实例并处于运行状态：
//! - 可替换的执行后端（宿主机 / 容器沙箱）
//! - 检查 → 注册 → 复查 的守护进程生命周期
//! - TOML 配置与结构化日志

pub mod backend;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;


// 重新导出主要类型
pub use backend::{ExecOutput, ExecutionBackend, LocalBackend, SandboxBackend, SandboxConfig};
pub use config::Config;
pub use daemon::{ensure_daemon_running, DaemonConfig, DaemonManager, DaemonStatus, ServiceDescriptor};
pub use error::{FunkyError, Result};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
