//! systemd 用户服务描述文件
//!
//! 生成 fn 守护进程的 unit 文件内容并推导安装路径

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// unit 文件相对主目录的三级安装目录
pub const CONFIG_DIRS: [&str; 3] = [".config", ".config/systemd", ".config/systemd/user"];

/// 服务描述文件
///
/// `%h` 占位符原样写入，由 systemd 在加载时展开为用户主目录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDescriptor {
    /// 服务描述
    #[serde(default = "default_description")]
    pub description: String,
    /// 启动命令
    #[serde(default = "default_exec_start")]
    pub exec_start: String,
    /// 重启策略
    #[serde(default = "default_restart")]
    pub restart: String,
    /// 工作目录
    #[serde(default = "default_working_directory")]
    pub working_directory: String,
    /// 环境变量（KEY=VALUE）
    #[serde(default = "default_environment")]
    pub environment: String,
    /// 安装目标
    #[serde(default = "default_wanted_by")]
    pub wanted_by: String,
}

fn default_description() -> String {
    "Fn Server Daemon".to_string()
}
fn default_exec_start() -> String {
    "/usr/local/bin/fn start".to_string()
}
fn default_restart() -> String {
    "on-failure".to_string()
}
fn default_working_directory() -> String {
    "%h/.fn".to_string()
}
fn default_environment() -> String {
    "FN_HOME=%h/.fn".to_string()
}
fn default_wanted_by() -> String {
    "default.target".to_string()
}

impl Default for ServiceDescriptor {
    fn default() -> Self {
        Self {
            description: default_description(),
            exec_start: default_exec_start(),
            restart: default_restart(),
            working_directory: default_working_directory(),
            environment: default_environment(),
            wanted_by: default_wanted_by(),
        }
    }
}

impl ServiceDescriptor {
    /// 生成 unit 文件内容
    pub fn render(&self) -> String {
        format!(
            r#"[Unit]
Description={}

[Service]
ExecStart={}
Restart={}
WorkingDirectory={}
Environment={}

[Install]
WantedBy={}
"#,
            self.description,
            self.exec_start,
            self.restart,
            self.working_directory,
            self.environment,
            self.wanted_by
        )
    }

    /// 检查各字段能否安全写入 unit 文件
    ///
    /// 每个字段只能占据一行，换行等控制字符会改变 unit 的结构
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("description", &self.description),
            ("exec_start", &self.exec_start),
            ("restart", &self.restart),
            ("working_directory", &self.working_directory),
            ("environment", &self.environment),
            ("wanted_by", &self.wanted_by),
        ];
        for (name, value) in fields {
            if value.chars().any(char::is_control) {
                return Err(format!("unit 字段 {name} 包含换行或控制字符"));
            }
        }
        if self.exec_start.trim().is_empty() {
            return Err("ExecStart 不能为空".to_string());
        }
        Ok(())
    }

    /// unit 文件名
    pub fn file_name(service_name: &str) -> String {
        format!("{service_name}.service")
    }

    /// 需要依次创建的配置目录
    pub fn config_dirs(home: &Path) -> Vec<PathBuf> {
        CONFIG_DIRS.iter().map(|dir| home.join(dir)).collect()
    }

    /// unit 文件的完整安装路径
    pub fn install_path(home: &Path, service_name: &str) -> PathBuf {
        home.join(CONFIG_DIRS[2]).join(Self::file_name(service_name))
    }
}
