use lazy_static::lazy_static;
use log::{debug, trace};
use regex::Regex;

use crate::{
    common::{CmdRes, UpdError, UpdErrorKind},
    linux::{
        linux_defs::{PACCACHE_CMD, PACMAN_CMD, SUDO_CMD},
        sys_ops::SysOps,
    },
};

lazy_static! {
    static ref SI_VERSION_RE: Regex = Regex::new(r#"^Version\s*:\s*(\S+)\s*$"#).unwrap();
}

// pacman reports unknown packages on stderr with this text
const NOT_FOUND_TEXT: &str = "was not found";

/// The package database verbs used by the update stages.
pub(crate) struct Pacman<'a> {
    ops: &'a dyn SysOps,
}

impl<'a> Pacman<'a> {
    pub fn new(ops: &'a dyn SysOps) -> Pacman<'a> {
        Pacman { ops }
    }

    pub fn is_installed(&self, pkg: &str) -> Result<bool, UpdError> {
        trace!("is_installed: entered with '{}'", pkg);
        let cmd_res = self.ops.call(PACMAN_CMD, &["-Qi", pkg], true)?;
        Ok(cmd_res.success())
    }

    /// Returns `(name, version)` for each of `pkgs` that is installed.
    pub fn query_installed(&self, pkgs: &[&str]) -> Result<Vec<(String, String)>, UpdError> {
        trace!("query_installed: entered with {:?}", pkgs);
        if pkgs.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["-Q"];
        args.extend_from_slice(pkgs);
        let cmd_res = self.ops.call(PACMAN_CMD, &args, true)?;

        // a non zero exit code just means some packages are not installed
        if !cmd_res.success()
            && cmd_res.stdout.is_empty()
            && !cmd_res.stderr.contains(NOT_FOUND_TEXT)
        {
            return Err(UpdError::from_remark(
                UpdErrorKind::ExecProcess,
                &format!(
                    "query_installed: pacman query failed: {}",
                    cmd_res.diagnostic()
                ),
            ));
        }

        Ok(parse_query_output(&cmd_res.stdout))
    }

    pub fn installed_version(&self, pkg: &str) -> Result<Option<String>, UpdError> {
        Ok(self
            .query_installed(&[pkg])?
            .into_iter()
            .find(|(name, _)| name == pkg)
            .map(|(_, version)| version))
    }

    /// Version offered by the sync databases.
    pub fn available_version(&self, pkg: &str) -> Result<Option<String>, UpdError> {
        trace!("available_version: entered with '{}'", pkg);
        let cmd_res = self.ops.call(PACMAN_CMD, &["-Si", pkg], true)?;
        if !cmd_res.success() {
            debug!(
                "available_version: no sync info for '{}': {}",
                pkg,
                cmd_res.diagnostic()
            );
            return Ok(None);
        }

        Ok(parse_si_version(&cmd_res.stdout))
    }

    pub fn install(&self, pkgs: &[&str], needed: bool) -> Result<CmdRes, UpdError> {
        let mut args = vec!["-S", "--noconfirm"];
        if needed {
            args.push("--needed");
        }
        args.extend_from_slice(pkgs);
        self.ops.call_interactive(PACMAN_CMD, &args)
    }

    /// Reinstall ignoring file conflicts, this may overwrite files owned by
    /// other packages.
    pub fn install_overwrite(&self, pkgs: &[&str]) -> Result<CmdRes, UpdError> {
        let mut args = vec!["-S", "--noconfirm", "--overwrite", "*"];
        args.extend_from_slice(pkgs);
        self.ops.call_interactive(PACMAN_CMD, &args)
    }

    /// Refreshes the sync databases and upgrades everything.
    pub fn upgrade(&self, ignore_arg: Option<&str>) -> Result<CmdRes, UpdError> {
        let mut args = vec!["-Syu", "--noconfirm"];
        if let Some(ignore_arg) = ignore_arg {
            args.push(ignore_arg);
        }
        self.ops.call_interactive(PACMAN_CMD, &args)
    }

    /// Same upgrade through a community helper, run as `user`.
    pub fn helper_upgrade(
        &self,
        helper: &str,
        user: &str,
        ignore_arg: Option<&str>,
    ) -> Result<CmdRes, UpdError> {
        let mut args = vec!["-u", user, helper, "-Syu", "--noconfirm"];
        if let Some(ignore_arg) = ignore_arg {
            args.push(ignore_arg);
        }
        self.ops.call_interactive(SUDO_CMD, &args)
    }

    /// News items the helper thinks the user has not read yet.
    pub fn helper_news(&self, helper: &str, user: &str) -> Result<CmdRes, UpdError> {
        self.ops.call(SUDO_CMD, &["-u", user, helper, "-Pw"], true)
    }

    pub fn prune_cache(&self, keep: u32) -> Result<CmdRes, UpdError> {
        let keep_arg = format!("-rk{}", keep);
        let cmd_res = self.ops.call(PACCACHE_CMD, &[keep_arg.as_str()], true)?;
        if !cmd_res.success() {
            return Ok(cmd_res);
        }
        // uninstalled packages
        self.ops.call(PACCACHE_CMD, &["-ruk0"], true)
    }
}

pub(crate) fn parse_query_output(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some(name), Some(version)) => Some((String::from(name), String::from(version))),
                _ => None,
            }
        })
        .collect()
}

pub(crate) fn parse_si_version(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        SI_VERSION_RE
            .captures(line)
            .and_then(|captures| captures.get(1))
            .map(|version| String::from(version.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linux::sys_ops::mock::MockOps;

    const SI_OUTPUT: &str = r##"Repository      : extra
Name            : gnome-shell
Version         : 1:47.2-1
Description     : Next generation desktop shell
Architecture    : x86_64"##;

    #[test]
    fn parse_versions() {
        assert_eq!(parse_si_version(SI_OUTPUT), Some(String::from("1:47.2-1")));
        assert_eq!(parse_si_version("Name : foo"), None);
        assert_eq!(
            parse_query_output("linux 6.11.5.arch1-1\nlinux-lts 6.6.58-1\n"),
            vec![
                (String::from("linux"), String::from("6.11.5.arch1-1")),
                (String::from("linux-lts"), String::from("6.6.58-1"))
            ]
        );
    }

    #[test]
    fn query_with_some_missing() {
        let ops = MockOps::new().on_stderr(
            "pacman -Q",
            1,
            "linux 6.11.5.arch1-1",
            "error: package 'linux-lts' was not found",
        );
        let pacman = Pacman::new(&ops);
        let res = pacman.query_installed(&["linux", "linux-lts"]).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].0, "linux");
    }

    #[test]
    fn query_failure_is_error() {
        let ops = MockOps::new().on_stderr("pacman -Q", 1, "", "error: could not open database");
        let pacman = Pacman::new(&ops);
        assert!(pacman.query_installed(&["linux"]).is_err());
    }

    #[test]
    fn upgrade_args() {
        let ops = MockOps::new();
        let pacman = Pacman::new(&ops);
        pacman.upgrade(Some("--ignore=gnome-shell,mutter")).unwrap();
        pacman.helper_upgrade("yay", "alice", None).unwrap();
        pacman.prune_cache(3).unwrap();
        assert_eq!(
            *ops.calls.borrow(),
            vec![
                "pacman -Syu --noconfirm --ignore=gnome-shell,mutter",
                "sudo -u alice yay -Syu --noconfirm",
                "paccache -rk3",
                "paccache -ruk0",
            ]
        );
    }
}
