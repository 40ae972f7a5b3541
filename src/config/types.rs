//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::backend::SandboxConfig;
use crate::daemon::DaemonConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 守护进程配置
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// 执行后端配置
    #[serde(default)]
    pub backend: BackendConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogSettings,
}

/// 执行后端配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// 单次操作截止时间（秒）
    #[serde(default = "default_timeout")]
    pub operation_timeout_seconds: u64,
    /// 沙箱配置，未设置时直接在宿主机执行
    pub sandbox: Option<SandboxConfig>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            operation_timeout_seconds: default_timeout(),
            sandbox: None,
        }
    }
}

impl BackendConfig {
    /// 单次操作截止时间
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_seconds)
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogSettings {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
    /// 是否同时输出到控制台
    #[serde(default)]
    pub console: bool,
    /// 是否使用JSON格式
    #[serde(default)]
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
            console: false,
            json: false,
        }
    }
}

// 默认值函数
fn default_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> PathBuf {
    PathBuf::from("app.log")
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    let service_name = &config.daemon.service_name;
    if service_name.is_empty() {
        return Err("服务名称不能为空".to_string());
    }
    if service_name
        .chars()
        .any(|c| c == '/' || c.is_whitespace())
    {
        return Err(format!("服务名称包含非法字符: {service_name}"));
    }

    if config.daemon.service_manager.trim().is_empty() {
        return Err("服务管理器命令不能为空".to_string());
    }

    config.daemon.unit.validate()?;

    if config.backend.operation_timeout_seconds == 0 {
        return Err("操作超时时间不能为0".to_string());
    }

    if let Some(ref sandbox) = config.backend.sandbox {
        if sandbox.container.trim().is_empty() {
            return Err("沙箱容器名称不能为空".to_string());
        }
        if sandbox.runtime.trim().is_empty() {
            return Err("容器运行时不能为空".to_string());
        }
    }

    // 验证日志级别
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.log.level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，有效值: {:?}",
            config.log.level, valid_log_levels
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.daemon.service_name, "fnserver");
        assert_eq!(config.backend.operation_timeout(), Duration::from_secs(30));
        assert_eq!(config.log.file, PathBuf::from("app.log"));
        assert!(config.backend.sandbox.is_none());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_service_name() {
        let mut config = Config::default();
        config.daemon.service_name = "fn server".to_string();
        assert!(validate_config(&config).is_err());

        config.daemon.service_name = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_unit_field_with_newline_rejected() {
        let config: Config = toml::from_str(
            r#"
[daemon.unit]
environment = "A=1\nExecStartPre=/bin/evil"
"#,
        )
        .unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("environment"));

        let mut config = Config::default();
        config.daemon.unit.exec_start = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.backend.operation_timeout_seconds = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_sandbox_container_rejected() {
        let mut config = Config::default();
        config.backend.sandbox = Some(SandboxConfig::new(""));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.log.level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }
}
