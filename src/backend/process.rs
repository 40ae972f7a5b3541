//! 子进程执行
//!
//! 两种后端共用的进程启动逻辑：
//! - 不经过 shell 解释，直接 exec
//! - 单次操作截止时间，超时后杀死子进程
//! - 可选的标准输入内容

use crate::backend::ExecOutput;
use crate::error::{FunkyError, Result};
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// 子进程构建器
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: String,
    args: Vec<String>,
    stdin: Option<String>,
    timeout: Duration,
}

impl ProcessBuilder {
    /// 创建新的子进程构建器
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            stdin: None,
            timeout: super::DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// 追加参数
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// 追加单个参数
    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// 写入子进程标准输入的内容
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// 设置截止时间
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 执行命令并等待完成，返回合并后的输出
    pub async fn run(self) -> Result<ExecOutput> {
        self.output().await.map(combine_output)
    }

    /// 执行命令并等待完成，标准输出和标准错误分开返回
    ///
    /// 超时只杀死这里启动的直接子进程
    pub async fn output(self) -> Result<Output> {
        debug!(
            program = %self.program,
            args = ?self.args,
            timeout_secs = self.timeout.as_secs(),
            "执行子进程"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }

        let mut child = cmd.spawn().map_err(|e| FunkyError::ExecTransport {
            program: self.program.clone(),
            message: format!("无法启动进程: {e}"),
        })?;

        let start = Instant::now();
        let input = self.stdin;
        let pending = async move {
            if let Some(input) = input {
                if let Some(mut pipe) = child.stdin.take() {
                    pipe.write_all(input.as_bytes()).await?;
                    pipe.shutdown().await?;
                }
            }
            child.wait_with_output().await
        };

        // 超时后 future 被丢弃，kill_on_drop 负责回收子进程
        match tokio::time::timeout(self.timeout, pending).await {
            Ok(Ok(output)) => {
                debug!(
                    exit_code = ?output.status.code(),
                    duration_ms = start.elapsed().as_millis(),
                    "子进程结束"
                );
                Ok(output)
            }
            Ok(Err(e)) => Err(FunkyError::ExecTransport {
                program: self.program,
                message: format!("与进程通信失败: {e}"),
            }),
            Err(_) => {
                warn!(
                    program = %self.program,
                    timeout_secs = self.timeout.as_secs(),
                    "子进程超时，已终止"
                );
                Err(FunkyError::Timeout {
                    operation: self.program,
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// 合并输出：优先标准输出，为空时退回标准错误
pub(crate) fn combine_output(output: Output) -> ExecOutput {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let text = if stdout.trim().is_empty() {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        stdout
    };
    ExecOutput::new(output.status.code().unwrap_or(-1), text)
}
