//! Subprocess execution for file-backed skill scripts.
//!
//! Arguments are passed as `--key value` flags. The child is killed if the
//! returned future is dropped, which is how an enclosing timeout reclaims it.

use serde_json::Value;
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::types::{Result, ScriptArgs, ScriptType, SkillError};

/// Render an argument map as command-line flags.
///
/// `true` becomes a bare flag, `false` and `null` are dropped, arrays repeat
/// the flag per element, and nested objects are passed as JSON.
pub fn render_args(args: &ScriptArgs) -> Vec<String> {
    let mut out = Vec::new();
    for (key, value) in args {
        let flag = format!("--{key}");
        match value {
            Value::Null | Value::Bool(false) => {}
            Value::Bool(true) => out.push(flag),
            Value::Array(items) => {
                for item in items {
                    out.push(flag.clone());
                    out.push(scalar_arg(item));
                }
            }
            other => {
                out.push(flag);
                out.push(scalar_arg(other));
            }
        }
    }
    out
}

fn scalar_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Largest amount of stdout or stderr kept from one run; the rest is drained
/// and discarded.
pub const MAX_OUTPUT_BYTES: usize = 32 * 1024;

/// Read at most `max` bytes, then drain the stream so the child never blocks
/// on a full pipe. Returns whether anything was dropped.
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, max: usize) -> io::Result<(String, bool)> {
    let Some(mut reader) = reader else {
        return Ok((String::new(), false));
    };

    let mut buf = Vec::new();
    (&mut reader).take(max as u64 + 1).read_to_end(&mut buf).await?;
    let truncated = buf.len() > max;
    if truncated {
        buf.truncate(max);
        tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    }
    Ok((String::from_utf8_lossy(&buf).to_string(), truncated))
}

fn mark_truncated(mut text: String, truncated: bool) -> String {
    if truncated {
        text.push_str(&format!("\n[output truncated at {MAX_OUTPUT_BYTES} bytes]"));
    }
    text
}

pub(crate) async fn run_script_file(
    path: &Path, script_type: ScriptType, args: Option<&ScriptArgs>, working_dir: Option<&Path>,
) -> Result<String> {
    let Some(interpreter) = script_type.interpreter() else {
        return Err(SkillError::ExecutionFailed(format!(
            "Unknown script type for {}",
            path.display()
        )));
    };

    let mut cmd = Command::new(interpreter);
    cmd.arg(path)
        .args(args.map(render_args).unwrap_or_default())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    tracing::debug!(interpreter, script = %path.display(), "spawning skill script");
    let mut child = cmd
        .spawn()
        .map_err(|e| SkillError::ExecutionFailed(format!("failed to launch {interpreter}: {e}")))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let ((stdout, stdout_cut), (stderr, stderr_cut), status) = tokio::try_join!(
        read_capped(stdout, MAX_OUTPUT_BYTES),
        read_capped(stderr, MAX_OUTPUT_BYTES),
        child.wait(),
    )?;

    if stdout_cut || stderr_cut {
        tracing::warn!(script = %path.display(), stdout_cut, stderr_cut, "skill script output truncated");
    }
    let stdout = mark_truncated(stdout, stdout_cut);
    let stderr = mark_truncated(stderr, stderr_cut);

    if !status.success() {
        let code = status.code().map_or_else(|| "signal".to_string(), |c| c.to_string());
        return Err(SkillError::ExecutionFailed(format!(
            "exit code {code}\n\nSTDERR:\n{stderr}\n\nSTDOUT:\n{stdout}"
        )));
    }

    if stderr.trim().is_empty() { Ok(stdout) } else { Ok(format!("{stdout}\n\nSTDERR:\n{stderr}")) }
}
