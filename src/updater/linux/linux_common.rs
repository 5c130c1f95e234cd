use log::{debug, trace, warn};
use nix::unistd::{Uid, User};
use std::env;
use std::path::Path;

use crate::{
    common::{call, file_exists, UpdError, UpdErrorKind},
    defs::MIB_SIZE,
    linux::{
        linux_defs::{DF_CMD, PKEXEC_UID_VAR, SUDO_USER_VAR, WHEREIS_CMD},
        sys_ops::SysOps,
    },
};

const BIN_DIRS: &[&str] = &["/bin", "/usr/bin", "/sbin", "/usr/sbin", "/usr/local/bin"];

pub(crate) fn is_admin() -> bool {
    trace!("is_admin: entered");
    unsafe { libc::geteuid() == 0 }
}

/// The unprivileged user that invoked us through sudo or pkexec, if any.
pub(crate) fn get_invoking_user() -> Option<String> {
    if let Ok(user) = env::var(SUDO_USER_VAR) {
        if !user.is_empty() && user != "root" {
            debug!("get_invoking_user: from {}: '{}'", SUDO_USER_VAR, user);
            return Some(user);
        }
    }

    if let Ok(uid) = env::var(PKEXEC_UID_VAR) {
        if let Ok(uid) = uid.parse::<u32>() {
            if uid != 0 {
                match User::from_uid(Uid::from_raw(uid)) {
                    Ok(Some(user)) => return Some(user.name),
                    Ok(None) => warn!("get_invoking_user: no user found for uid {}", uid),
                    Err(why) => warn!("get_invoking_user: failed to look up uid {}: {}", uid, why),
                }
            }
        }
    }

    None
}

pub(crate) fn whereis(cmd: &str) -> Result<String, UpdError> {
    // try manually first
    for path in BIN_DIRS {
        let path = format!("{}/{}", &path, cmd);
        if file_exists(&path) {
            return Ok(path);
        }
    }

    // else try whereis command
    let args: [&str; 2] = ["-b", cmd];
    let cmd_res = match call(WHEREIS_CMD, &args, true) {
        Ok(cmd_res) => cmd_res,
        Err(why) => {
            return Err(UpdError::from_remark(
                UpdErrorKind::NotFound,
                &format!(
                    "whereis failed to execute for: {:?}, error: {:?}",
                    args, why
                ),
            ));
        }
    };

    if cmd_res.status.success() {
        let mut words = cmd_res.stdout.split(' ');
        if let Some(s) = words.nth(1) {
            Ok(String::from(s))
        } else {
            Err(UpdError::from_remark(
                UpdErrorKind::NotFound,
                &format!("whereis: command not found: '{}'", cmd),
            ))
        }
    } else {
        Err(UpdError::from_remark(
            UpdErrorKind::ExecProcess,
            &format!(
                "whereis: command failed for {}: {}",
                cmd,
                cmd_res.status.code().unwrap_or(0)
            ),
        ))
    }
}

/// Free space snapshot of the filesystem holding a path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FsSpace {
    pub device: String,
    pub avail_mb: u64,
}

pub(crate) fn get_fs_space<P: AsRef<Path>>(ops: &dyn SysOps, path: P) -> Result<FsSpace, UpdError> {
    let path = path.as_ref();
    trace!("get_fs_space: entered with '{}'", path.display());

    let path_str = path.to_string_lossy();
    let args: Vec<&str> = vec!["--block-size=M", &path_str];

    let cmd_res = ops.call(DF_CMD, &args, true)?;
    if !cmd_res.status.success() || cmd_res.stdout.is_empty() {
        return Err(UpdError::from_remark(
            UpdErrorKind::ExecProcess,
            &format!(
                "get_fs_space: failed to get drive space for path '{}': {}",
                path.display(),
                cmd_res.diagnostic()
            ),
        ));
    }

    parse_df_output(&cmd_res.stdout)
}

pub(crate) fn parse_df_output(output: &str) -> Result<FsSpace, UpdError> {
    let output: Vec<&str> = output.lines().collect();
    if output.len() != 2 {
        return Err(UpdError::from_remark(
            UpdErrorKind::InvParam,
            &format!(
                "parse_df_output: unexpected number of lines in df output: {}",
                output.len()
            ),
        ));
    }

    let hdrs: Vec<&str> = output[0].split_whitespace().collect();
    let values: Vec<&str> = output[1].split_whitespace().collect();

    let mut device: Option<String> = None;
    let mut avail_mb: Option<u64> = None;

    for (index, header) in hdrs.iter().enumerate() {
        let value = if let Some(value) = values.get(index) {
            value
        } else {
            break;
        };

        if *header == "Filesystem" {
            device = Some(String::from(*value));
        } else if *header == "Available" || *header == "Avail" {
            avail_mb = Some(value.trim_end_matches('M').parse::<u64>().map_err(|_why| {
                UpdError::from_remark(
                    UpdErrorKind::InvParam,
                    &format!("parse_df_output: failed to parse size from '{}'", value),
                )
            })?);
        }
    }

    match (device, avail_mb) {
        (Some(device), Some(avail_mb)) => {
            debug!("parse_df_output: device: {}, avail: {} MiB", device, avail_mb);
            Ok(FsSpace { device, avail_mb })
        }
        _ => Err(UpdError::from_remark(
            UpdErrorKind::InvParam,
            "parse_df_output: failed to find device and available space",
        )),
    }
}

pub(crate) fn bytes_to_mb(bytes: u64) -> u64 {
    bytes / MIB_SIZE
}
