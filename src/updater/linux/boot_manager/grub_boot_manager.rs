use lazy_static::lazy_static;
use log::{debug, info, trace};
use regex::Regex;
use std::ffi::OsStr;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{
    common::{config::PathConfig, file_exists, severity::StageOutcome},
    defs::BootType,
    linux::{
        boot_manager::BootManager,
        linux_defs::{GRUB_CFG_NAME, GRUB_MKCONFIG_CMD},
        sys_ops::SysOps,
    },
};

// how deep to look for a grub.cfg below the boot and EFI dirs
const GRUB_CFG_SEARCH_DEPTH: usize = 5;

lazy_static! {
    static ref MENUENTRY_RE: Regex = Regex::new(r#"^\s*menuentry\s+['"]"#).unwrap();
}

pub(crate) struct GrubBootManager {
    cfg_path: PathBuf,
}

impl GrubBootManager {
    /// Finds the grub config: the legacy location, the EFI location, then
    /// any grub.cfg below the boot and EFI dirs.
    pub fn locate(paths: &PathConfig) -> Option<GrubBootManager> {
        trace!("GrubBootManager::locate: entered");
        let cfg_path = if file_exists(&paths.grub_cfg) {
            Some(paths.grub_cfg.clone())
        } else if file_exists(&paths.efi_grub_cfg) {
            Some(paths.efi_grub_cfg.clone())
        } else {
            let mut search_dirs = vec![paths.boot_dir.clone()];
            search_dirs.extend(paths.efi_dirs.iter().cloned());
            search_dirs.iter().find_map(|dir| search_grub_cfg(dir))
        };

        cfg_path.map(|cfg_path| {
            debug!("GrubBootManager::locate: using '{}'", cfg_path.display());
            GrubBootManager { cfg_path }
        })
    }

    pub fn get_cfg_path(&self) -> &Path {
        &self.cfg_path
    }
}

fn search_grub_cfg(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .max_depth(GRUB_CFG_SEARCH_DEPTH)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == OsStr::new(GRUB_CFG_NAME))
        .map(|entry| entry.path().to_path_buf())
}

pub(crate) fn count_menu_entries(grub_cfg: &str) -> usize {
    grub_cfg
        .lines()
        .filter(|line| MENUENTRY_RE.is_match(line))
        .count()
}

impl BootManager for GrubBootManager {
    fn get_boot_type(&self) -> BootType {
        BootType::Grub
    }

    fn update_config(&self, ops: &dyn SysOps) -> StageOutcome {
        let cfg_path = self.get_cfg_path().to_string_lossy();
        info!("regenerating '{}'", cfg_path);
        match ops.call_interactive(GRUB_MKCONFIG_CMD, &["-o", &*cfg_path]) {
            Ok(ref cmd_res) if cmd_res.success() => StageOutcome::Ok,
            Ok(cmd_res) => StageOutcome::Warn(format!(
                "{} failed, '{}' may be stale: {}",
                GRUB_MKCONFIG_CMD,
                cfg_path,
                cmd_res.diagnostic()
            )),
            Err(why) => StageOutcome::Warn(format!(
                "{} failed, '{}' may be stale: {}",
                GRUB_MKCONFIG_CMD, cfg_path, why
            )),
        }
    }

    fn verify_entries(&self) -> StageOutcome {
        trace!("GrubBootManager::verify_entries: entered");
        match read_to_string(self.get_cfg_path()) {
            Ok(content) => {
                let count = count_menu_entries(&content);
                if count > 0 {
                    info!(
                        "found {} menu entries in '{}'",
                        count,
                        self.cfg_path.display()
                    );
                    StageOutcome::Ok
                } else {
                    StageOutcome::Warn(format!(
                        "no menu entries in '{}'",
                        self.cfg_path.display()
                    ))
                }
            }
            Err(why) => StageOutcome::Warn(format!(
                "failed to read '{}': {}",
                self.cfg_path.display(),
                why
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linux::sys_ops::mock::MockOps;
    use std::fs::{create_dir_all, write};
    use tempfile::TempDir;

    const GRUB_CFG: &str = r##"### BEGIN /etc/grub.d/10_linux ###
menuentry 'Arch Linux' --class arch --class gnu-linux {
	linux	/vmlinuz-linux root=UUID=f5a69346 rw
}
submenu 'Advanced options for Arch Linux' {
	menuentry 'Arch Linux, with Linux linux-lts' --class arch {
		linux	/vmlinuz-linux-lts root=UUID=f5a69346 rw
	}
}
# menuentry 'commented out'
"##;

    #[test]
    fn counts_menu_entries() {
        assert_eq!(count_menu_entries(GRUB_CFG), 2);
        assert_eq!(count_menu_entries("set timeout=5\n"), 0);
    }

    #[test]
    fn resolution_order() {
        let tmp_dir = TempDir::new().unwrap();
        let paths = PathConfig::rooted_at(tmp_dir.path());
        assert!(GrubBootManager::locate(&paths).is_none());

        let custom = paths.efi_dirs[1].join("EFI/arch/grub.cfg");
        create_dir_all(custom.parent().unwrap()).unwrap();
        write(&custom, GRUB_CFG).unwrap();
        assert_eq!(GrubBootManager::locate(&paths).unwrap().get_cfg_path(), custom);

        create_dir_all(paths.efi_grub_cfg.parent().unwrap()).unwrap();
        write(&paths.efi_grub_cfg, GRUB_CFG).unwrap();
        assert_eq!(
            GrubBootManager::locate(&paths).unwrap().get_cfg_path(),
            paths.efi_grub_cfg
        );

        create_dir_all(paths.grub_cfg.parent().unwrap()).unwrap();
        write(&paths.grub_cfg, GRUB_CFG).unwrap();
        assert_eq!(
            GrubBootManager::locate(&paths).unwrap().get_cfg_path(),
            paths.grub_cfg
        );
    }

    #[test]
    fn regenerates_in_place() {
        let tmp_dir = TempDir::new().unwrap();
        let paths = PathConfig::rooted_at(tmp_dir.path());
        create_dir_all(paths.grub_cfg.parent().unwrap()).unwrap();
        write(&paths.grub_cfg, GRUB_CFG).unwrap();

        let grub = GrubBootManager::locate(&paths).unwrap();
        let ops = MockOps::new();
        assert_eq!(grub.update_config(&ops), StageOutcome::Ok);
        assert_eq!(
            *ops.calls.borrow(),
            vec![format!("grub-mkconfig -o {}", paths.grub_cfg.display())]
        );
        assert_eq!(grub.verify_entries(), StageOutcome::Ok);

        let ops = MockOps::new().on("grub-mkconfig", 1, "");
        assert!(matches!(grub.update_config(&ops), StageOutcome::Warn(_)));
    }
}
