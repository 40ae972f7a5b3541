//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Funky 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum FunkyError {
    /// 无法启动命令或与执行后端通信
    #[error("执行失败 {program}: {message}")]
    ExecTransport { program: String, message: String },

    /// 后端操作超过截止时间
    #[error("{operation} 超时 ({timeout_secs}秒)")]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    /// 文件系统操作失败（mkdir/chmod/create/write）
    #[error("{operation} {} 失败: {message}", path.display())]
    FileSystem {
        operation: &'static str,
        path: PathBuf,
        message: String,
    },

    /// 守护进程状态不是 active
    #[error("fn 守护进程未运行 (状态: {status:?})")]
    DaemonInactive { status: String },

    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl FunkyError {
    pub(crate) fn file_system(
        operation: &'static str,
        path: &Path,
        message: impl Into<String>,
    ) -> Self {
        FunkyError::FileSystem {
            operation,
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// 是否为传输层错误（无法确定目标程序的执行结果）
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FunkyError::ExecTransport { .. } | FunkyError::Timeout { .. }
        )
    }
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, FunkyError>;
