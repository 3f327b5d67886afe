// ==========================================
// PAWS 木材供应仿真系统 - 外部可执行文件 JSON 调用
// ==========================================
// 约定: 请求 JSON 写入子进程 stdin, stdout 解析为 JSON
// 降级: 不存在 => {warning}; 非零退出 => {error}; 非 JSON => {stdout}; 超时 => {error}
// ==========================================

use crate::domain::commitment::failure_reason;
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// 调用外部可执行文件并解析 JSON 输出
///
/// # 参数
/// - executable: 可执行文件名（按 PATH 查找）
/// - args: 固定参数
/// - payload: 写入 stdin 的请求（None 则不写）
/// - timeout: 墙钟超时
pub async fn run_cli_json(
    executable: &str,
    args: &[String],
    payload: Option<&Value>,
    timeout: Duration,
) -> Value {
    let mut child = match Command::new(executable)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(executable, "外部可执行文件不存在");
            return json!({ "warning": format!("executable not found: {}", executable) });
        }
        Err(e) => {
            warn!(executable, error = %e, "外部进程启动失败");
            return json!({ "error": format!("failed to start {}: {}", executable, e) });
        }
    };

    let body = payload.map(Value::to_string).unwrap_or_default();
    let stdin = child.stdin.take();
    let writer = async move {
        if let Some(mut stdin) = stdin {
            // 子进程可能不读 stdin, 写失败忽略
            if let Err(e) = stdin.write_all(body.as_bytes()).await {
                debug!(error = %e, "写入子进程 stdin 失败");
            }
            let _ = stdin.shutdown().await;
        }
    };

    let run = async {
        let (_, output) = tokio::join!(writer, child.wait_with_output());
        output
    };

    let output = match tokio::time::timeout(timeout, run).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(executable, error = %e, "等待外部进程失败");
            return json!({ "error": e.to_string() });
        }
        Err(_) => {
            warn!(executable, timeout_secs = timeout.as_secs_f64(), "外部进程超时");
            return json!({ "error": format!("timed out after {}s", timeout.as_secs_f64()) });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(executable, code = ?output.status.code(), %stderr, "外部进程非零退出");
        return json!({ "error": stderr });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    match serde_json::from_str::<Value>(&stdout) {
        Ok(value) => value,
        Err(_) => {
            debug!(executable, bytes = stdout.len(), "外部进程输出不是 JSON");
            json!({ "stdout": stdout })
        }
    }
}

/// 载荷中的 warning/error 字段; 非对象载荷视为正常
pub fn payload_failure(value: &Value) -> Option<String> {
    value.as_object().and_then(failure_reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_missing_executable_is_warning() {
        let out = run_cli_json("paws-definitely-missing-tool", &[], None, TIMEOUT).await;
        assert_eq!(
            out,
            json!({"warning": "executable not found: paws-definitely-missing-tool"})
        );
        assert!(payload_failure(&out).is_some());
        assert!(payload_failure(&json!(["warning"])).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_json_stdout_is_parsed() {
        let args = vec!["-c".to_string(), "echo '{\"ok\": true}'".to_string()];
        let out = run_cli_json("sh", &args, None, TIMEOUT).await;
        assert_eq!(out, json!({"ok": true}));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdin_payload_is_forwarded() {
        let args = vec!["-c".to_string(), "cat".to_string()];
        let payload = json!({"period": 3});
        let out = run_cli_json("sh", &args, Some(&payload), TIMEOUT).await;
        assert_eq!(out, payload);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_json_stdout_is_raw() {
        let args = vec!["-c".to_string(), "echo hello".to_string()];
        let out = run_cli_json("sh", &args, None, TIMEOUT).await;
        assert_eq!(out, json!({"stdout": "hello\n"}));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let args = vec!["-c".to_string(), "echo boom >&2; exit 3".to_string()];
        let out = run_cli_json("sh", &args, None, TIMEOUT).await;
        assert_eq!(out, json!({"error": "boom"}));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_error() {
        let args = vec!["-c".to_string(), "sleep 5".to_string()];
        let out = run_cli_json("sh", &args, None, Duration::from_millis(100)).await;
        let message = payload_failure(&out).unwrap();
        assert!(message.starts_with("timed out after"));
    }
}
