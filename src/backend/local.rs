//! 宿主机执行后端
//!
//! 所有操作直接映射到宿主机的进程和文件系统原语

use crate::backend::{ExecOutput, ExecutionBackend, ProcessBuilder, DEFAULT_OPERATION_TIMEOUT};
use crate::error::{FunkyError, Result};
use async_trait::async_trait;
use std::fs::Permissions;
use std::future::Future;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// 宿主机后端
#[derive(Debug, Clone)]
pub struct LocalBackend {
    /// 单次操作截止时间
    timeout: Duration,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBackend {
    /// 创建使用默认截止时间的宿主机后端
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// 设置单次操作截止时间
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 在截止时间内完成文件系统操作
    async fn within_deadline<T, F>(&self, operation: &'static str, path: &Path, fut: F) -> Result<T>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(FunkyError::file_system(operation, path, e.to_string())),
            Err(_) => Err(FunkyError::Timeout {
                operation: format!("{operation} {}", path.display()),
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl ExecutionBackend for LocalBackend {
    async fn exec(&self, argv: &[String]) -> Result<ExecOutput> {
        let (program, args) = argv.split_first().ok_or_else(|| FunkyError::ExecTransport {
            program: String::new(),
            message: "命令为空".to_string(),
        })?;

        ProcessBuilder::new(program)
            .args(args)
            .timeout(self.timeout)
            .run()
            .await
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                debug!("目录已存在: {}", path.display());
                Ok(())
            }
            Ok(_) => Err(FunkyError::file_system(
                "mkdir",
                path,
                "路径已存在但不是目录",
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.within_deadline("mkdir", path, tokio::fs::create_dir_all(path))
                    .await?;
                self.within_deadline(
                    "chmod",
                    path,
                    tokio::fs::set_permissions(path, Permissions::from_mode(mode)),
                )
                .await?;
                debug!("已创建目录 {} ({:o})", path.display(), mode);
                Ok(())
            }
            Err(e) => Err(FunkyError::file_system("mkdir", path, e.to_string())),
        }
    }

    async fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        self.within_deadline(
            "chmod",
            path,
            tokio::fs::set_permissions(path, Permissions::from_mode(mode)),
        )
        .await
    }

    async fn user_home_dir(&self) -> Result<PathBuf> {
        match dirs::home_dir() {
            Some(home) if !home.as_os_str().is_empty() => Ok(home),
            _ => Err(FunkyError::file_system(
                "home",
                Path::new("~"),
                "无法确定当前用户的主目录",
            )),
        }
    }

    async fn create(&self, path: &Path) -> Result<()> {
        // 句柄在离开作用域时关闭
        self.within_deadline("create", path, tokio::fs::File::create(path))
            .await
            .map(drop)
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        self.within_deadline("write", path, tokio::fs::write(path, content))
            .await
    }

    fn name(&self) -> &str {
        "local"
    }
}
