use log::{debug, info, trace, warn};
use std::fs::read_link;
use std::path::{Path, PathBuf};

use crate::{
    common::{config::UpdateConfig, dir_exists, severity::StageOutcome},
    linux::{
        linux_defs::{
            CHMOD_CMD, DCONF_CMD, GDM_ACCOUNT, GDM_SERVICE, GDM_THEME_CMD, SETFACL_CMD,
            SYSTEMCTL_CMD,
        },
        sys_ops::SysOps,
    },
};

/// Name of the display manager the `display-manager.service` link points to.
pub(crate) fn display_manager<P: AsRef<Path>>(link: P) -> Option<String> {
    let link = link.as_ref();
    match read_link(link) {
        Ok(target) => target
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| String::from(name.trim_end_matches(".service"))),
        Err(why) => {
            debug!("display_manager: cannot read '{}': {}", link.display(), why);
            None
        }
    }
}

/// Package updates can reset the GDM login screen background, put it back and
/// make sure gdm can still read the images.
pub(crate) fn refresh_login_theme(ops: &dyn SysOps, config: &UpdateConfig) -> StageOutcome {
    trace!("refresh_login_theme: entered");

    match display_manager(&config.paths.display_manager_link) {
        Some(ref name) if name == GDM_SERVICE => (),
        Some(name) => {
            info!("display manager is {}, nothing to do", name);
            return StageOutcome::Ok;
        }
        None => {
            info!("no display manager configured, nothing to do");
            return StageOutcome::Ok;
        }
    }

    let theme_refreshed = refresh_theme(ops);

    if ops
        .call(SYSTEMCTL_CMD, &["is-active", "--quiet", GDM_SERVICE], true)
        .map(|cmd_res| cmd_res.success())
        .unwrap_or(false)
    {
        match ops.call(SYSTEMCTL_CMD, &["reload", GDM_SERVICE], true) {
            Ok(ref cmd_res) if cmd_res.success() => info!("reloaded {}", GDM_SERVICE),
            Ok(cmd_res) => debug!("reload of {} ignored: {}", GDM_SERVICE, cmd_res.diagnostic()),
            Err(why) => debug!("reload of {} ignored: {}", GDM_SERVICE, why),
        }
    }

    let background_dirs: Vec<&PathBuf> = config
        .background_dirs
        .iter()
        .filter(|dir| dir_exists(dir).unwrap_or(false))
        .collect();

    for dir in &background_dirs {
        fix_permissions(ops, dir);
    }

    if ops.has_cmd(SETFACL_CMD) {
        for dir in &background_dirs {
            grant_gdm_access(ops, dir);
        }
    } else {
        debug!("{} not found, relying on mode bits for {}", SETFACL_CMD, GDM_ACCOUNT);
    }

    if theme_refreshed {
        StageOutcome::Ok
    } else {
        StageOutcome::warn("login screen theme could not be refreshed")
    }
}

/// Backup-then-restore with the theme helper, else a plain dconf database
/// update.
fn refresh_theme(ops: &dyn SysOps) -> bool {
    if ops.has_cmd(GDM_THEME_CMD) {
        let backup = ops.call(GDM_THEME_CMD, &["backup", "update"], true);
        match backup {
            Ok(ref cmd_res) if cmd_res.success() => {
                match ops.call(GDM_THEME_CMD, &["backup", "restore"], true) {
                    Ok(ref cmd_res) if cmd_res.success() => {
                        info!("login screen theme reapplied");
                        return true;
                    }
                    Ok(cmd_res) => warn!("theme restore failed: {}", cmd_res.diagnostic()),
                    Err(why) => warn!("theme restore failed: {}", why),
                }
            }
            Ok(cmd_res) => warn!("theme backup failed: {}", cmd_res.diagnostic()),
            Err(why) => warn!("theme backup failed: {}", why),
        }
    }

    if ops.has_cmd(DCONF_CMD) {
        match ops.call(DCONF_CMD, &["update"], true) {
            Ok(ref cmd_res) if cmd_res.success() => {
                info!("dconf database updated");
                return true;
            }
            Ok(cmd_res) => warn!("dconf update failed: {}", cmd_res.diagnostic()),
            Err(why) => warn!("dconf update failed: {}", why),
        }
    }

    false
}

fn fix_permissions(ops: &dyn SysOps, dir: &Path) {
    let dir_str = dir.to_string_lossy();
    let res = ops.call(CHMOD_CMD, &["-R", "u+rwX,go+rX", &*dir_str], true);
    match res {
        Ok(ref cmd_res) if cmd_res.success() => debug!("permissions fixed on '{}'", dir_str),
        Ok(cmd_res) => warn!("chmod on '{}' failed: {}", dir_str, cmd_res.diagnostic()),
        Err(why) => warn!("chmod on '{}' failed: {}", dir_str, why),
    }
}

/// gdm needs to traverse every parent and read the directory itself.
fn grant_gdm_access(ops: &dyn SysOps, dir: &Path) {
    let read_acl = format!("u:{}:rX", GDM_ACCOUNT);
    let traverse_acl = format!("u:{}:x", GDM_ACCOUNT);

    let dir_str = dir.to_string_lossy();
    let res = ops.call(SETFACL_CMD, &["-R", "-m", &read_acl, &*dir_str], true);
    if let Ok(ref cmd_res) = res {
        if !cmd_res.success() {
            warn!("setfacl on '{}' failed: {}", dir_str, cmd_res.diagnostic());
        }
    }

    for parent in dir.ancestors().skip(1) {
        if parent.parent().is_none() {
            break;
        }
        let parent_str = parent.to_string_lossy();
        let res = ops.call(SETFACL_CMD, &["-m", &traverse_acl, &*parent_str], true);
        if let Ok(ref cmd_res) = res {
            if !cmd_res.success() {
                warn!("setfacl on '{}' failed: {}", parent_str, cmd_res.diagnostic());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PathConfig;
    use crate::linux::sys_ops::mock::MockOps;
    use std::fs::create_dir_all;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn setup(dm: Option<&str>) -> (TempDir, UpdateConfig) {
        let tmp_dir = TempDir::new().unwrap();
        let mut config = UpdateConfig::default();
        config.paths = PathConfig::rooted_at(tmp_dir.path());
        let bg_dir = tmp_dir.path().join("usr/share/backgrounds");
        create_dir_all(&bg_dir).unwrap();
        config.background_dirs = vec![bg_dir, tmp_dir.path().join("missing")];
        if let Some(dm) = dm {
            let link = &config.paths.display_manager_link;
            create_dir_all(link.parent().unwrap()).unwrap();
            symlink(format!("/usr/lib/systemd/system/{}.service", dm), link).unwrap();
        }
        (tmp_dir, config)
    }

    #[test]
    fn detects_display_manager() {
        let (_tmp_dir, config) = setup(Some("gdm"));
        assert_eq!(
            display_manager(&config.paths.display_manager_link),
            Some(String::from("gdm"))
        );
    }

    #[test]
    fn other_display_manager_is_skipped() {
        let (_tmp_dir, config) = setup(Some("sddm"));
        let ops = MockOps::new();
        assert_eq!(refresh_login_theme(&ops, &config), StageOutcome::Ok);
        assert!(ops.calls.borrow().is_empty());

        let (_tmp_dir, config) = setup(None);
        assert_eq!(refresh_login_theme(&ops, &config), StageOutcome::Ok);
        assert!(ops.calls.borrow().is_empty());
    }

    #[test]
    fn theme_helper_round_trip() {
        let (tmp_dir, config) = setup(Some("gdm"));
        let ops = MockOps::new();
        assert_eq!(refresh_login_theme(&ops, &config), StageOutcome::Ok);

        let bg_dir = tmp_dir.path().join("usr/share/backgrounds");
        let backup = ops.position("set-gdm-theme backup update").unwrap();
        let restore = ops.position("set-gdm-theme backup restore").unwrap();
        assert!(backup < restore);
        assert!(!ops.called("dconf"));
        assert!(ops.called("systemctl reload gdm"));
        assert!(ops.called(&format!("chmod -R u+rwX,go+rX {}", bg_dir.display())));
        assert!(ops.called(&format!("setfacl -R -m u:gdm:rX {}", bg_dir.display())));
        assert!(ops.called(&format!(
            "setfacl -m u:gdm:x {}",
            tmp_dir.path().join("usr/share").display()
        )));
        assert!(!ops.called(&format!(
            "chmod -R u+rwX,go+rX {}",
            tmp_dir.path().join("missing").display()
        )));
    }

    #[test]
    fn dconf_fallback_and_best_effort_steps() {
        let (_tmp_dir, config) = setup(Some("gdm"));
        let ops = MockOps::new()
            .without("set-gdm-theme")
            .without("setfacl")
            .on("systemctl is-active", 3, "")
            .on("chmod", 1, "");
        assert_eq!(refresh_login_theme(&ops, &config), StageOutcome::Ok);
        assert!(ops.called("dconf update"));
        assert!(!ops.called("systemctl reload"));
    }

    #[test]
    fn failed_refresh_warns() {
        let (_tmp_dir, config) = setup(Some("gdm"));
        let ops = MockOps::new()
            .on("set-gdm-theme backup update", 1, "")
            .on("dconf update", 1, "");
        assert!(matches!(
            refresh_login_theme(&ops, &config),
            StageOutcome::Warn(_)
        ));
        assert!(!ops.called("set-gdm-theme backup restore"));
    }
}
