//! 沙箱执行后端
//!
//! 通过容器运行时（docker/podman）的 `exec` 控制通道，
//! 在隔离环境内执行与宿主机后端相同的操作。
//! 文件系统操作被翻译为 `sh -c` 脚本，路径只作为位置参数传入。

use crate::backend::process::combine_output;
use crate::backend::{ExecOutput, ExecutionBackend, ProcessBuilder};
use crate::error::{FunkyError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tracing::debug;

/// 容器运行时自身出错（如容器不存在）时的退出码
const RUNTIME_FAILURE_EXIT_CODE: i32 = 125;

/// 容器内命令无法执行 / 不存在时运行时返回的退出码
const COMMAND_NOT_EXECUTABLE_EXIT_CODE: i32 = 126;
const COMMAND_NOT_FOUND_EXIT_CODE: i32 = 127;

const MKDIR_SCRIPT: &str = r#"[ -d "$1" ] && exit 0
[ -e "$1" ] && { echo "path exists but is not a directory" >&2; exit 1; }
mkdir -p "$1" && chmod "$2" "$1""#;
const CREATE_SCRIPT: &str = r#": > "$1""#;
const WRITE_SCRIPT: &str = r#"cat > "$1""#;
const HOME_SCRIPT: &str = r#"printf '%s' "$HOME""#;

/// 沙箱后端配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxConfig {
    /// 容器运行时可执行文件
    #[serde(default = "default_runtime")]
    pub runtime: String,
    /// 目标容器名称或ID
    pub container: String,
}

fn default_runtime() -> String {
    "docker".to_string()
}

impl SandboxConfig {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            runtime: default_runtime(),
            container: container.into(),
        }
    }
}

/// 沙箱后端
#[derive(Debug, Clone)]
pub struct SandboxBackend {
    config: SandboxConfig,
    /// 单次操作截止时间
    timeout: Duration,
}

impl SandboxBackend {
    /// 创建沙箱后端
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            timeout: super::DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// 设置单次操作截止时间
    ///
    /// 超时只会杀死宿主机上的运行时客户端（如 `docker exec`），
    /// 容器内已经启动的进程不受影响，会继续运行到自行结束
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 获取配置
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// 通过控制通道执行命令，可附带标准输入
    ///
    /// 运行时本身失败时返回传输错误，其余退出码原样交给调用方
    async fn exec_in_container(&self, argv: &[String], stdin: Option<&str>) -> Result<Output> {
        if argv.is_empty() {
            return Err(FunkyError::ExecTransport {
                program: self.config.runtime.clone(),
                message: "命令为空".to_string(),
            });
        }

        let mut builder = ProcessBuilder::new(&self.config.runtime)
            .args(["exec", "-i", self.config.container.as_str()])
            .args(argv)
            .timeout(self.timeout);
        if let Some(input) = stdin {
            builder = builder.stdin(input);
        }

        let output = builder.output().await?;
        if output.status.code() == Some(RUNTIME_FAILURE_EXIT_CODE) {
            return Err(FunkyError::ExecTransport {
                program: self.config.runtime.clone(),
                message: format!(
                    "容器 {} 不可用: {}",
                    self.config.container,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(output)
    }

    /// 在容器内执行文件系统脚本，非零退出码视为文件系统错误
    async fn run_script(
        &self,
        operation: &'static str,
        path: &Path,
        script: &str,
        extra: &[String],
        stdin: Option<&str>,
    ) -> Result<()> {
        let mut argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "sh".to_string(),
            path.to_string_lossy().to_string(),
        ];
        argv.extend_from_slice(extra);

        let result = combine_output(self.exec_in_container(&argv, stdin).await?);
        if !result.success() {
            return Err(FunkyError::file_system(
                operation,
                path,
                format!("退出码 {}: {}", result.exit_code, result.output.trim()),
            ));
        }
        debug!("沙箱 {operation} 完成: {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl ExecutionBackend for SandboxBackend {
    async fn exec(&self, argv: &[String]) -> Result<ExecOutput> {
        let result = combine_output(self.exec_in_container(argv, None).await?);
        match result.exit_code {
            COMMAND_NOT_EXECUTABLE_EXIT_CODE | COMMAND_NOT_FOUND_EXIT_CODE => {
                Err(FunkyError::ExecTransport {
                    program: argv[0].clone(),
                    message: format!(
                        "容器 {} 内无法执行 (退出码 {}): {}",
                        self.config.container,
                        result.exit_code,
                        result.output.trim()
                    ),
                })
            }
            _ => Ok(result),
        }
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        self.run_script("mkdir", path, MKDIR_SCRIPT, &[format!("{mode:o}")], None)
            .await
    }

    async fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        let argv = vec![
            "chmod".to_string(),
            format!("{mode:o}"),
            path.to_string_lossy().to_string(),
        ];
        let result = combine_output(self.exec_in_container(&argv, None).await?);
        if !result.success() {
            return Err(FunkyError::file_system(
                "chmod",
                path,
                format!("退出码 {}: {}", result.exit_code, result.output.trim()),
            ));
        }
        Ok(())
    }

    async fn user_home_dir(&self) -> Result<PathBuf> {
        let argv = vec!["sh".to_string(), "-c".to_string(), HOME_SCRIPT.to_string()];
        let output = self.exec_in_container(&argv, None).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let home = stdout.trim();
        if !output.status.success() || home.is_empty() {
            return Err(FunkyError::file_system(
                "home",
                Path::new("~"),
                format!("无法获取容器 {} 内的主目录", self.config.container),
            ));
        }
        Ok(PathBuf::from(home))
    }

    async fn create(&self, path: &Path) -> Result<()> {
        self.run_script("create", path, CREATE_SCRIPT, &[], None).await
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        self.run_script("write", path, WRITE_SCRIPT, &[], Some(content))
            .await
    }

    fn name(&self) -> &str {
        "sandbox"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_config_defaults_to_docker() {
        let config = SandboxConfig::new("fn-test");
        assert_eq!(config.runtime, "docker");
        assert_eq!(config.container, "fn-test");
    }

    #[test]
    fn test_sandbox_config_from_toml() {
        let config: SandboxConfig = toml::from_str(
            r#"
runtime = "podman"
container = "fn-sandbox"
"#,
        )
        .unwrap();
        assert_eq!(config.runtime, "podman");
        assert_eq!(config.container, "fn-sandbox");
    }

    #[tokio::test]
    async fn test_missing_runtime_is_transport_error() {
        let mut config = SandboxConfig::new("fn-test");
        config.runtime = "nonexistent_runtime_12345".to_string();
        let backend = SandboxBackend::new(config);

        let err = backend
            .exec(&crate::backend::argv(["true"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FunkyError::ExecTransport { .. }));
    }
}
