use log::{info, trace, warn};

use crate::{
    common::{config::UpdateConfig, prompt::Prompter, severity::StageOutcome, UpdError},
    linux::{
        linux_defs::{CACHE_TOOL_PKG, PACCACHE_CMD, SUDO_CMD},
        pacman::Pacman,
        sys_ops::SysOps,
    },
};

/// Decided before the upgrade: whether desktop packages are held back.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UpdatePlan {
    pub exclude_desktop: bool,
    pub ignore: Vec<String>,
}

impl UpdatePlan {
    pub fn full() -> UpdatePlan {
        UpdatePlan {
            exclude_desktop: false,
            ignore: Vec::new(),
        }
    }

    pub fn without_desktop(desktop_group: &[String]) -> UpdatePlan {
        UpdatePlan {
            exclude_desktop: true,
            ignore: desktop_group.to_vec(),
        }
    }

    /// `--ignore=a,b,c` for pacman and its helpers.
    pub fn ignore_arg(&self) -> Option<String> {
        if self.ignore.is_empty() {
            None
        } else {
            Some(format!("--ignore={}", self.ignore.join(",")))
        }
    }
}

/// Makes sure the cache pruning tool is there.
pub(crate) fn check_dependencies(ops: &dyn SysOps) -> StageOutcome {
    trace!("check_dependencies: entered");
    let pacman = Pacman::new(ops);
    match pacman.is_installed(CACHE_TOOL_PKG) {
        Ok(true) => StageOutcome::Ok,
        Ok(false) => {
            info!("installing {}", CACHE_TOOL_PKG);
            match pacman.install(&[CACHE_TOOL_PKG], true) {
                Ok(ref cmd_res) if cmd_res.success() => StageOutcome::Ok,
                Ok(cmd_res) => StageOutcome::Warn(format!(
                    "failed to install {}: {}",
                    CACHE_TOOL_PKG,
                    cmd_res.diagnostic()
                )),
                Err(why) => StageOutcome::Warn(format!(
                    "failed to install {}: {}",
                    CACHE_TOOL_PKG, why
                )),
            }
        }
        Err(why) => StageOutcome::Warn(format!(
            "failed to query package {}: {}",
            CACHE_TOOL_PKG, why
        )),
    }
}

/// Shows upstream news and asks whether to go on. Returns `false` when the
/// operator wants to stop, an unanswered prompt is an error.
pub(crate) fn show_news(
    ops: &dyn SysOps,
    prompter: &dyn Prompter,
    config: &UpdateConfig,
    user: Option<&str>,
) -> Result<(StageOutcome, bool), UpdError> {
    trace!("show_news: entered");
    let mut outcome = StageOutcome::Ok;

    match user {
        Some(user) if ops.has_cmd(&config.aur_helper) && ops.has_cmd(SUDO_CMD) => {
            match Pacman::new(ops).helper_news(&config.aur_helper, user) {
                Ok(cmd_res) => {
                    if cmd_res.stdout.is_empty() {
                        info!("no unread news");
                    } else {
                        info!("*** news ***");
                        for line in cmd_res.stdout.lines() {
                            info!("{}", line);
                        }
                    }
                    if !cmd_res.success() {
                        outcome =
                            StageOutcome::Warn(format!("news check failed: {}", cmd_res.diagnostic()));
                    }
                }
                Err(why) => outcome = StageOutcome::Warn(format!("news check failed: {}", why)),
            }
        }
        Some(_) => info!(
            "{} is not available, not checking news",
            config.aur_helper
        ),
        None => info!("not invoked through sudo, not checking news"),
    }

    let proceed = prompter.confirm("Continue with the update?", true)?;
    Ok((outcome, proceed))
}

/// Compares installed and offered desktop versions and lets the operator
/// hold the desktop back.
pub(crate) fn check_desktop_version(
    ops: &dyn SysOps,
    prompter: &dyn Prompter,
    config: &UpdateConfig,
) -> Result<(StageOutcome, UpdatePlan), UpdError> {
    trace!("check_desktop_version: entered");
    let pacman = Pacman::new(ops);
    let desktop = &config.desktop_package;

    let installed = match pacman.installed_version(desktop) {
        Ok(Some(version)) => version,
        Ok(None) => {
            info!("{} is not installed", desktop);
            return Ok((StageOutcome::Ok, UpdatePlan::full()));
        }
        Err(why) => {
            return Ok((
                StageOutcome::Warn(format!("failed to query {}: {}", desktop, why)),
                UpdatePlan::full(),
            ))
        }
    };

    let available = match pacman.available_version(desktop) {
        Ok(Some(version)) => version,
        Ok(None) => {
            info!("no repository version found for {}", desktop);
            return Ok((StageOutcome::Ok, UpdatePlan::full()));
        }
        Err(why) => {
            return Ok((
                StageOutcome::Warn(format!("failed to query {}: {}", desktop, why)),
                UpdatePlan::full(),
            ))
        }
    };

    if installed == available {
        info!("{} {} is up to date", desktop, installed);
        return Ok((StageOutcome::Ok, UpdatePlan::full()));
    }

    info!(
        "{} update available: {} -> {}",
        desktop, installed, available
    );
    if prompter.confirm(
        &format!(
            "Update the desktop ({} {} -> {})?",
            desktop, installed, available
        ),
        true,
    )? {
        Ok((StageOutcome::Ok, UpdatePlan::full()))
    } else {
        info!("holding back: {}", config.desktop_group.join(", "));
        Ok((
            StageOutcome::Ok,
            UpdatePlan::without_desktop(&config.desktop_group),
        ))
    }
}

/// Full upgrade, preferring the community helper run as the invoking user
/// and falling back to plain pacman with the same exclusions.
pub(crate) fn run_update(
    ops: &dyn SysOps,
    config: &UpdateConfig,
    plan: &UpdatePlan,
    user: Option<&str>,
) -> StageOutcome {
    trace!("run_update: entered with {:?}", plan);
    let pacman = Pacman::new(ops);
    let ignore_arg = plan.ignore_arg();
    let helper = &config.aur_helper;

    let mut helper_failed = false;
    if let Some(user) = user {
        if ops.has_cmd(helper) && ops.has_cmd(SUDO_CMD) {
            info!("updating with {} as user {}", helper, user);
            match pacman.helper_upgrade(helper, user, ignore_arg.as_deref()) {
                Ok(ref cmd_res) if cmd_res.success() => return StageOutcome::Ok,
                Ok(cmd_res) => warn!("{} failed: {}", helper, cmd_res.diagnostic()),
                Err(why) => warn!("{} failed: {}", helper, why),
            }
            helper_failed = true;
        } else {
            info!("{} not found, using pacman", helper);
        }
    } else {
        info!("no unprivileged invoking user known, using pacman");
    }

    info!("updating with pacman");
    match pacman.upgrade(ignore_arg.as_deref()) {
        Ok(ref cmd_res) if cmd_res.success() => {
            if helper_failed {
                StageOutcome::warn("community helper failed, repository packages were updated with pacman")
            } else {
                StageOutcome::Ok
            }
        }
        Ok(cmd_res) => StageOutcome::Warn(format!("system upgrade failed: {}", cmd_res.diagnostic())),
        Err(why) => StageOutcome::Warn(format!("system upgrade failed: {}", why)),
    }
}

/// Drops all but the newest cached package versions.
pub(crate) fn clean_cache(ops: &dyn SysOps, config: &UpdateConfig) -> StageOutcome {
    trace!("clean_cache: entered");
    if !ops.has_cmd(PACCACHE_CMD) {
        return StageOutcome::warn("paccache not found, package cache not cleaned");
    }

    match Pacman::new(ops).prune_cache(config.cache_keep) {
        Ok(ref cmd_res) if cmd_res.success() => {
            for line in cmd_res.stdout.lines() {
                info!("{}", line);
            }
            StageOutcome::Ok
        }
        Ok(cmd_res) => StageOutcome::Warn(format!(
            "package cache cleanup failed: {}",
            cmd_res.diagnostic()
        )),
        Err(why) => StageOutcome::Warn(format!("package cache cleanup failed: {}", why)),
    }
}
