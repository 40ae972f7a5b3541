//! 执行后端模块
//!
//! 定义守护进程注册所需的命令执行和文件系统能力集合，
//! 提供宿主机直接执行和沙箱（容器）代理执行两种实现

use crate::config::BackendConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod local;
pub mod process;
pub mod sandbox;

pub use local::LocalBackend;
pub use process::ProcessBuilder;
pub use sandbox::{SandboxBackend, SandboxConfig};

/// 默认的单次操作截止时间
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// 命令执行结果
///
/// 非零退出码不是错误，只表示目标程序执行失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// 退出码（被信号终止时为 -1）
    pub exit_code: i32,
    /// 合并后的文本输出
    pub output: String,
}

impl ExecOutput {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    /// 是否以零退出码结束
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// 执行后端特征
///
/// 调用方只依赖这组能力，不感知具体注入的是哪种后端
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// 执行命令并收集输出
    ///
    /// 仅当命令无法启动、与后端通信失败或超时时返回错误
    async fn exec(&self, argv: &[String]) -> Result<ExecOutput>;

    /// 创建目录（含缺失的父目录）并设置权限
    ///
    /// 目录已存在时不做任何操作；路径存在但不是目录时返回错误
    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()>;

    /// 修改已存在路径的权限
    async fn chmod(&self, path: &Path, mode: u32) -> Result<()>;

    /// 获取后端环境中当前用户的主目录
    async fn user_home_dir(&self) -> Result<PathBuf>;

    /// 创建或截断文件，父目录不存在时返回错误
    async fn create(&self, path: &Path) -> Result<()>;

    /// 创建或截断文件并写入全部内容
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// 后端名称，用于日志
    fn name(&self) -> &str;
}

/// 把字符串切片转换为命令参数向量
pub fn argv<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().map(|s| s.as_ref().to_string()).collect()
}

/// 根据配置创建执行后端，未配置沙箱时使用宿主机后端
pub fn from_config(config: &BackendConfig) -> Box<dyn ExecutionBackend> {
    let timeout = config.operation_timeout();
    match config.sandbox {
        Some(ref sandbox) => {
            Box::new(SandboxBackend::new(sandbox.clone()).with_timeout(timeout))
        }
        None => Box::new(LocalBackend::new().with_timeout(timeout)),
    }
}
