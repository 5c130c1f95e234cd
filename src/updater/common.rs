use failure::ResultExt;
use log::{debug, error, trace};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

pub(crate) mod upd_error;
pub use upd_error::{UpdErrCtx, UpdError, UpdErrorKind};

pub mod config;
pub use config::Config;

pub mod logger;
pub mod prompt;
pub mod severity;

/// Result of one external command invocation.
#[derive(Debug)]
pub struct CmdRes {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

impl CmdRes {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Short description of a failed call, suitable for a log line.
    pub fn diagnostic(&self) -> String {
        let code = match self.status.code() {
            Some(code) => format!("exit code {}", code),
            None => String::from("terminated by signal"),
        };
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            code
        } else {
            let last_line = stderr.lines().last().unwrap_or("");
            format!("{}: {}", code, last_line)
        }
    }
}

pub(crate) fn path_append<P1: AsRef<Path>, P2: AsRef<Path>>(base: P1, append: P2) -> PathBuf {
    let base = base.as_ref();
    let append = append.as_ref();

    if append.is_absolute() {
        let mut components = append.components();
        let mut curr = PathBuf::from(base);
        components.next();
        for comp in components {
            curr = curr.join(comp);
        }
        curr
    } else {
        base.join(append)
    }
}

pub fn dir_exists<P: AsRef<Path>>(name: P) -> Result<bool, UpdError> {
    let path = name.as_ref();
    if path.exists() {
        Ok(path
            .metadata()
            .context(UpdErrCtx::from_remark(
                UpdErrorKind::Upstream,
                &format!(
                    "dir_exists: failed to retrieve metadata for path: '{}'",
                    path.display()
                ),
            ))?
            .file_type()
            .is_dir())
    } else {
        Ok(false)
    }
}

pub fn file_exists<P: AsRef<Path>>(file: P) -> bool {
    file.as_ref().exists()
}

pub(crate) fn call(cmd: &str, args: &[&str], trim_stdout: bool) -> Result<CmdRes, UpdError> {
    trace!("call: '{}' called with {:?}, {}", cmd, args, trim_stdout);

    match Command::new(cmd)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
    {
        Ok(output) => {
            debug!("call: output: {:?}", output);
            Ok(CmdRes {
                stdout: if trim_stdout {
                    String::from(String::from_utf8_lossy(&output.stdout).trim())
                } else {
                    String::from(String::from_utf8_lossy(&output.stdout))
                },
                stderr: String::from(String::from_utf8_lossy(&output.stderr)),
                status: output.status,
            })
        }
        Err(why) => {
            error!("call: output failed: {:?}", why);
            Err(UpdError::from_remark(
                UpdErrorKind::Upstream,
                &format!("call: failed to execute: command {} '{:?}'", cmd, args),
            ))
        }
    }
}

/// Runs a command attached to the terminal so the operator sees its progress
/// and can answer its questions. Output is not captured.
pub(crate) fn call_interactive(cmd: &str, args: &[&str]) -> Result<CmdRes, UpdError> {
    trace!("call_interactive: '{}' called with {:?}", cmd, args);

    let status = Command::new(cmd)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .context(UpdErrCtx::from_remark(
            UpdErrorKind::Upstream,
            &format!(
                "call_interactive: failed to execute: command {} '{:?}'",
                cmd, args
            ),
        ))?;

    Ok(CmdRes {
        stdout: String::new(),
        stderr: String::new(),
        status,
    })
}

const KIB_SIZE: u64 = 1024;
const MIB_SIZE: u64 = 1024 * KIB_SIZE;
const GIB_SIZE: u64 = 1024 * MIB_SIZE;

pub fn format_size_with_unit(size: u64) -> String {
    if size > (10 * GIB_SIZE) {
        format!("{} GiB", size / GIB_SIZE)
    } else if size > (10 * MIB_SIZE) {
        format!("{} MiB", size / MIB_SIZE)
    } else if size > (10 * KIB_SIZE) {
        format!("{} KiB", size / KIB_SIZE)
    } else {
        format!("{} B", size)
    }
}
