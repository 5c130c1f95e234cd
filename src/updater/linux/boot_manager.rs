use log::{info, trace};

use crate::{
    common::{config::PathConfig, severity::StageOutcome},
    defs::BootType,
    linux::sys_ops::SysOps,
};

pub(crate) mod grub_boot_manager;
pub(crate) use grub_boot_manager::GrubBootManager;
pub(crate) mod sd_boot_manager;
pub(crate) use sd_boot_manager::SdBootManager;

pub(crate) trait BootManager {
    fn get_boot_type(&self) -> BootType;
    /// Regenerates the boot loader configuration, if it has one to generate.
    fn update_config(&self, ops: &dyn SysOps) -> StageOutcome;
    /// Read only check that at least one boot entry exists.
    fn verify_entries(&self) -> StageOutcome;
}

/// Boot loaders with a footprint on this system, systemd-boot first.
pub(crate) fn find_boot_managers(paths: &PathConfig) -> Vec<Box<dyn BootManager>> {
    trace!("find_boot_managers: entered");
    let mut found: Vec<Box<dyn BootManager>> = Vec::new();
    if let Some(sd_boot) = SdBootManager::locate(paths) {
        found.push(Box::new(sd_boot));
    }
    if let Some(grub) = GrubBootManager::locate(paths) {
        found.push(Box::new(grub));
    }
    found
}

/// Regenerates the grub configuration wherever it lives.
pub(crate) fn update_boot_config(ops: &dyn SysOps, paths: &PathConfig) -> StageOutcome {
    if let Some(grub) = GrubBootManager::locate(paths) {
        return grub.update_config(ops);
    }

    if let Some(sd_boot) = SdBootManager::locate(paths) {
        return sd_boot.update_config(ops);
    }

    StageOutcome::warn("no grub.cfg found, boot loader configuration not regenerated")
}

/// One boot loader with at least one entry is enough. An empty systemd-boot
/// entries dir does not hide a working grub configuration.
pub(crate) fn verify_boot_entries(paths: &PathConfig) -> StageOutcome {
    let mut failed: Option<StageOutcome> = None;
    for boot_manager in find_boot_managers(paths) {
        info!("boot loader: {:?}", boot_manager.get_boot_type());
        match boot_manager.verify_entries() {
            StageOutcome::Ok => return StageOutcome::Ok,
            outcome => {
                if failed.is_none() {
                    failed = Some(outcome);
                }
            }
        }
    }

    failed.unwrap_or_else(|| {
        StageOutcome::warn("could not detect the boot loader, boot entries not verified")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linux::sys_ops::mock::MockOps;
    use std::fs::{create_dir_all, write};
    use tempfile::TempDir;

    #[test]
    fn nothing_detected() {
        let tmp_dir = TempDir::new().unwrap();
        let paths = PathConfig::rooted_at(tmp_dir.path());
        let ops = MockOps::new();
        assert!(find_boot_managers(&paths).is_empty());
        assert!(matches!(
            update_boot_config(&ops, &paths),
            StageOutcome::Warn(_)
        ));
        assert!(matches!(
            verify_boot_entries(&paths),
            StageOutcome::Warn(_)
        ));
        assert!(ops.calls.borrow().is_empty());
    }

    #[test]
    fn systemd_boot_preferred_for_verification() {
        let tmp_dir = TempDir::new().unwrap();
        let paths = PathConfig::rooted_at(tmp_dir.path());
        create_dir_all(&paths.loader_entries_dir).unwrap();
        write(paths.loader_entries_dir.join("arch.conf"), "title Arch\n").unwrap();

        let boot_managers = find_boot_managers(&paths);
        assert_eq!(boot_managers.len(), 1);
        assert_eq!(boot_managers[0].get_boot_type(), BootType::SystemdBoot);
        assert_eq!(verify_boot_entries(&paths), StageOutcome::Ok);

        let ops = MockOps::new();
        assert_eq!(update_boot_config(&ops, &paths), StageOutcome::Ok);
        assert!(ops.calls.borrow().is_empty());
    }

    #[test]
    fn empty_loader_entries_fall_back_to_grub() {
        let tmp_dir = TempDir::new().unwrap();
        let paths = PathConfig::rooted_at(tmp_dir.path());
        create_dir_all(&paths.loader_entries_dir).unwrap();
        create_dir_all(paths.grub_cfg.parent().unwrap()).unwrap();
        write(&paths.grub_cfg, "menuentry 'Arch Linux' --class arch {\n}\n").unwrap();

        assert_eq!(find_boot_managers(&paths).len(), 2);
        assert_eq!(verify_boot_entries(&paths), StageOutcome::Ok);

        write(&paths.grub_cfg, "set timeout=5\n").unwrap();
        match verify_boot_entries(&paths) {
            StageOutcome::Warn(msg) => assert!(msg.contains("no boot entries")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
