//! 守护进程生命周期集成测试
//!
//! 用脚本模拟容器运行时和 systemctl，验证两种后端下的检查、注册、复查流程

#![cfg(unix)]

use funky::backend::{argv, ExecutionBackend, LocalBackend, SandboxBackend, SandboxConfig};
use funky::daemon::{DaemonConfig, DaemonManager, ServiceDescriptor};
use funky::FunkyError;
use serial_test::serial;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const CONTAINER: &str = "fn-sandbox";

/// 模拟的沙箱环境：root/home 为容器内主目录，root/bin 提供 systemctl
struct FakeSandbox {
    root: TempDir,
}

impl FakeSandbox {
    /// `start_activates` 为 false 时 start 不会让服务变为 active
    fn new(start_activates: bool) -> Self {
        let root = TempDir::new().unwrap();
        let base = root.path().to_path_buf();
        fs::create_dir_all(base.join("home")).unwrap();
        fs::create_dir_all(base.join("bin")).unwrap();

        let runtime = format!(
            r#"#!/bin/sh
[ "$1" = "exec" ] || exit 125
shift
[ "$1" = "-i" ] && shift
if [ "$1" != "{CONTAINER}" ]; then
    echo "Error: No such container: $1" >&2
    exit 125
fi
shift
export HOME="{root}/home"
export PATH="{root}/bin:$PATH"
exec "$@"
"#,
            root = base.display()
        );
        write_script(&base.join("runtime"), &runtime);

        let on_start = if start_activates {
            r#"grep -q '^Restart=on-failure$' "$HOME/.config/systemd/user/$2.service" && echo active > "$state""#
        } else {
            ":"
        };
        let systemctl = format!(
            r#"#!/bin/sh
state="{root}/state"
[ "$1" = "--user" ] && shift
echo "$@" >> "{root}/calls"
case "$1" in
    is-active)
        if [ -f "$state" ]; then cat "$state"; exit 0; fi
        echo inactive
        exit 3
        ;;
    daemon-reload) ;;
    enable)
        if [ ! -f "$HOME/.config/systemd/user/$2.service" ]; then
            echo "Unit file $2.service does not exist." >&2
            exit 1
        fi
        ;;
    start)
        {on_start}
        ;;
esac
"#,
            root = base.display()
        );
        write_script(&base.join("bin").join("systemctl"), &systemctl);

        Self { root }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn home(&self) -> PathBuf {
        self.path().join("home")
    }

    fn backend(&self) -> SandboxBackend {
        self.backend_for(CONTAINER)
    }

    fn backend_for(&self, container: &str) -> SandboxBackend {
        SandboxBackend::new(SandboxConfig {
            runtime: self.path().join("runtime").to_string_lossy().to_string(),
            container: container.to_string(),
        })
    }

    /// systemctl 收到的调用记录
    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.path().join("calls"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn write_script(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[tokio::test]
#[serial]
async fn test_sandbox_register_then_status_succeeds() {
    let sandbox = FakeSandbox::new(true);
    let backend = sandbox.backend();
    let manager = DaemonManager::default();

    // 全新环境中服务未安装
    let err = manager.status(&backend, false).await.unwrap_err();
    assert!(matches!(err, FunkyError::DaemonInactive { ref status } if status == "inactive"));

    manager.register(&backend, false).await.unwrap();
    manager.status(&backend, false).await.unwrap();

    let unit_path = sandbox
        .home()
        .join(".config/systemd/user/fnserver.service");
    assert_eq!(
        fs::read_to_string(unit_path).unwrap(),
        ServiceDescriptor::default().render()
    );
    assert_eq!(
        sandbox.calls(),
        vec![
            "is-active fnserver",
            "daemon-reload",
            "enable fnserver",
            "start fnserver",
            "is-active fnserver",
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_sandbox_ensure_running_single_attempt() {
    let sandbox = FakeSandbox::new(false);
    let backend = sandbox.backend();

    let err = DaemonManager::default()
        .ensure_running(&backend, true)
        .await
        .unwrap_err();

    assert!(matches!(err, FunkyError::DaemonInactive { .. }));
    let calls = sandbox.calls();
    assert_eq!(calls.iter().filter(|c| c.starts_with("start")).count(), 1);
    assert_eq!(calls.iter().filter(|c| c.starts_with("is-active")).count(), 2);
}

#[tokio::test]
#[serial]
async fn test_sandbox_unknown_container_is_transport_error() {
    let sandbox = FakeSandbox::new(true);
    let backend = sandbox.backend_for("missing-container");

    let err = DaemonManager::default()
        .ensure_running(&backend, false)
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert!(!sandbox.home().join(".config").exists());
    assert!(sandbox.calls().is_empty());
}

#[tokio::test]
#[serial]
async fn test_unrunnable_program_is_transport_error_on_both_backends() {
    let sandbox = FakeSandbox::new(true);
    let not_executable = sandbox.home().join("not-executable");
    fs::write(&not_executable, "#!/bin/sh\necho hi\n").unwrap();
    fs::set_permissions(&not_executable, fs::Permissions::from_mode(0o644)).unwrap();

    let backends: [Box<dyn ExecutionBackend>; 2] =
        [Box::new(LocalBackend::new()), Box::new(sandbox.backend())];
    for backend in &backends {
        let missing = backend.exec(&argv(["funky_missing_binary_12345"])).await;
        assert!(
            matches!(missing, Err(ref e) if e.is_transport()),
            "{}: {missing:?}",
            backend.name()
        );

        let denied = backend
            .exec(&argv([not_executable.to_string_lossy()]))
            .await;
        assert!(
            matches!(denied, Err(ref e) if e.is_transport()),
            "{}: {denied:?}",
            backend.name()
        );
    }

    // 目标程序自身的失败退出码不是传输错误
    let result = sandbox.backend().exec(&argv(["sh", "-c", "exit 3"])).await.unwrap();
    assert_eq!(result.exit_code, 3);
}

#[tokio::test]
#[serial]
async fn test_sandbox_missing_service_manager_does_not_register() {
    let sandbox = FakeSandbox::new(true);
    let config = DaemonConfig {
        service_manager: "funky_missing_systemctl".to_string(),
        ..Default::default()
    };

    let err = DaemonManager::new(config)
        .ensure_running(&sandbox.backend(), false)
        .await
        .unwrap_err();

    assert!(matches!(err, FunkyError::ExecTransport { .. }));
    assert!(!sandbox.home().join(".config").exists());
}

#[tokio::test]
#[serial]
async fn test_sandbox_exec_times_out() {
    let sandbox = FakeSandbox::new(true);
    let backend = sandbox.backend().with_timeout(Duration::from_millis(300));

    let start = Instant::now();
    let err = backend.exec(&argv(["sleep", "5"])).await.unwrap_err();

    assert!(matches!(err, FunkyError::Timeout { .. }));
    assert!(err.is_transport());
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
#[serial]
async fn test_sandbox_home_ignores_runtime_stderr() {
    let sandbox = FakeSandbox::new(true);
    let noisy = sandbox.path().join("noisy-runtime");
    write_script(
        &noisy,
        r#"#!/bin/sh
echo "WARNING: client version is deprecated" >&2
shift 3
export HOME=""
exec "$@"
"#,
    );
    let backend = SandboxBackend::new(SandboxConfig {
        runtime: noisy.to_string_lossy().to_string(),
        container: CONTAINER.to_string(),
    });

    let err = backend.user_home_dir().await.unwrap_err();
    assert!(matches!(err, FunkyError::FileSystem { operation: "home", .. }));
}

#[tokio::test]
#[serial]
async fn test_sandbox_filesystem_operations() {
    let sandbox = FakeSandbox::new(true);
    let backend = sandbox.backend();

    assert_eq!(backend.user_home_dir().await.unwrap(), sandbox.home());

    // mkdir 幂等，第二次调用不改权限
    let dir = sandbox.home().join("existing/dir");
    backend.mkdir(&dir, 0o755).await.unwrap();
    backend.mkdir(&dir, 0o700).await.unwrap();
    assert_eq!(
        fs::metadata(&dir).unwrap().permissions().mode() & 0o777,
        0o755
    );

    // 已存在的普通文件
    let file = sandbox.home().join("plain");
    fs::write(&file, "content").unwrap();
    let err = backend.mkdir(&file, 0o755).await.unwrap_err();
    assert!(matches!(err, FunkyError::FileSystem { operation: "mkdir", .. }));
    assert_eq!(fs::read_to_string(&file).unwrap(), "content");

    // 父目录不存在时 create 失败且不留下任何内容
    let missing = sandbox.home().join("missing");
    let err = backend.create(&missing.join("x.service")).await.unwrap_err();
    assert!(matches!(err, FunkyError::FileSystem { operation: "create", .. }));
    assert!(!missing.exists());

    // 内容原样写入，不经过 shell 展开
    let target = sandbox.home().join("unit.service");
    let content = "Environment=FN_HOME=%h/.fn\nEcho=\"$HOME\" `id`\n";
    backend.write_file(&target, content).await.unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), content);

    backend.chmod(&target, 0o600).await.unwrap();
    assert_eq!(
        fs::metadata(&target).unwrap().permissions().mode() & 0o777,
        0o600
    );
    assert!(backend
        .chmod(&sandbox.home().join("nope"), 0o600)
        .await
        .is_err());
}

#[tokio::test]
#[serial]
async fn test_local_backend_full_lifecycle() {
    let sandbox = FakeSandbox::new(true);
    let previous_home = std::env::var_os("HOME");
    std::env::set_var("HOME", sandbox.home());

    let config = DaemonConfig {
        service_manager: sandbox
            .path()
            .join("bin/systemctl")
            .to_string_lossy()
            .to_string(),
        ..Default::default()
    };
    let result = DaemonManager::new(config)
        .ensure_running(&LocalBackend::new(), false)
        .await;

    match previous_home {
        Some(home) => std::env::set_var("HOME", home),
        None => std::env::remove_var("HOME"),
    }

    result.unwrap();
    assert!(sandbox
        .home()
        .join(".config/systemd/user/fnserver.service")
        .is_file());
    assert_eq!(sandbox.calls().len(), 5);
}
