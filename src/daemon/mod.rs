//! 守护进程生命周期管理
//!
//! 检查 fn 守护进程是否在 systemd 用户实例中运行，
//! 未运行时注册并启动服务，然后重新检查一次

use crate::backend::{argv, ExecutionBackend};
use crate::error::{FunkyError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub mod descriptor;

pub use descriptor::ServiceDescriptor;

/// 配置目录权限
const CONFIG_DIR_MODE: u32 = 0o755;

/// systemd 表示正在运行的状态字符串
const ACTIVE_SENTINEL: &str = "active";

/// 守护进程配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// 服务名称
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// 服务管理器命令
    #[serde(default = "default_service_manager")]
    pub service_manager: String,
    /// 服务描述文件
    #[serde(default)]
    pub unit: ServiceDescriptor,
}

fn default_service_name() -> String {
    "fnserver".to_string()
}

fn default_service_manager() -> String {
    "systemctl".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            service_manager: default_service_manager(),
            unit: ServiceDescriptor::default(),
        }
    }
}

/// 守护进程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonStatus {
    /// 运行中
    Active,
    /// 未运行
    Inactive,
}

impl DaemonStatus {
    /// 根据 `is-active` 的输出判断状态
    pub fn from_output(output: &str) -> Self {
        if output.trim() == ACTIVE_SENTINEL {
            DaemonStatus::Active
        } else {
            DaemonStatus::Inactive
        }
    }
}

/// 守护进程管理器
///
/// 只通过注入的执行后端工作，不感知后端类型
#[derive(Debug, Clone, Default)]
pub struct DaemonManager {
    config: DaemonConfig,
}

impl DaemonManager {
    /// 创建新的守护进程管理器
    pub fn new(config: DaemonConfig) -> Self {
        Self { config }
    }

    /// 获取配置
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    fn service_manager_command(&self, args: &[&str]) -> Vec<String> {
        let mut command = vec![self.config.service_manager.clone(), "--user".to_string()];
        command.extend(argv(args));
        command
    }

    /// 检查守护进程状态
    ///
    /// 仅当输出去除空白后等于 `active` 时成功。
    /// 执行后端的传输错误单独返回，不视为未运行。
    pub async fn status(&self, backend: &dyn ExecutionBackend, verbose: bool) -> Result<()> {
        let service = self.config.service_name.as_str();
        report(verbose, "正在检查 fn 守护进程状态...");

        let command = self.service_manager_command(&["is-active", service]);
        let result = backend.exec(&command).await.inspect_err(|e| {
            warn!("无法获取服务状态 {service} (后端: {}): {e}", backend.name());
        })?;

        let status = result.output.trim();
        debug!("服务 {service} 状态: {status:?} (退出码 {})", result.exit_code);

        match DaemonStatus::from_output(status) {
            DaemonStatus::Active => {
                report(verbose, "fn 守护进程正在运行");
                Ok(())
            }
            DaemonStatus::Inactive => {
                report(verbose, &format!("fn 守护进程未运行: {status}"));
                Err(FunkyError::DaemonInactive {
                    status: status.to_string(),
                })
            }
        }
    }

    /// 注册守护进程服务
    ///
    /// 创建目录和写入 unit 文件失败时立即返回错误；
    /// daemon-reload、enable、start 的失败只记录日志。
    /// 不重新检查状态，由调用方负责。
    pub async fn register(&self, backend: &dyn ExecutionBackend, verbose: bool) -> Result<()> {
        let service = self.config.service_name.as_str();
        report(verbose, "正在注册 fn 守护进程...");
        info!("注册服务 {service} (后端: {})", backend.name());

        let home = backend.user_home_dir().await?;
        for dir in ServiceDescriptor::config_dirs(&home) {
            backend.mkdir(&dir, CONFIG_DIR_MODE).await?;
        }

        let unit_path = ServiceDescriptor::install_path(&home, service);
        backend.create(&unit_path).await?;
        backend
            .write_file(&unit_path, &self.config.unit.render())
            .await
            .inspect_err(|_| report(verbose, "写入 fn 服务配置失败"))?;
        info!("服务描述文件已写入: {}", unit_path.display());

        for args in [
            vec!["daemon-reload"],
            vec!["enable", service],
            vec!["start", service],
        ] {
            let command = self.service_manager_command(&args);
            match backend.exec(&command).await {
                Ok(result) => {
                    if result.success() {
                        debug!("{} 完成", args.join(" "));
                    } else {
                        warn!("{} 退出码 {}", args.join(" "), result.exit_code);
                    }
                    let output = result.output.trim();
                    if verbose && !output.is_empty() {
                        println!("{output}");
                    }
                }
                Err(e) => warn!("{} 执行失败: {e}", args.join(" ")),
            }
        }

        Ok(())
    }

    /// 确保守护进程正在运行
    ///
    /// 未运行时注册一次并重新检查，不重试
    pub async fn ensure_running(&self, backend: &dyn ExecutionBackend, verbose: bool) -> Result<()> {
        match self.status(backend, verbose).await {
            Ok(()) => return Ok(()),
            Err(FunkyError::DaemonInactive { .. }) => {}
            Err(e) => return Err(e),
        }

        self.register(backend, verbose).await?;
        self.status(backend, verbose).await
    }
}

/// 使用默认配置确保 fn 守护进程正在运行
pub async fn ensure_daemon_running(backend: &dyn ExecutionBackend, verbose: bool) -> Result<()> {
    DaemonManager::default().ensure_running(backend, verbose).await
}

/// 详细模式下输出进度
fn report(verbose: bool, message: &str) {
    debug!("{message}");
    if verbose {
        println!("{message}");
    }
}
