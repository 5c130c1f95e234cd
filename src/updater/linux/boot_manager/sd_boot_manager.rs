use log::{info, trace};
use std::fs::read_dir;
use std::path::PathBuf;

use crate::{
    common::{config::PathConfig, dir_exists, severity::StageOutcome},
    defs::BootType,
    linux::{boot_manager::BootManager, sys_ops::SysOps},
};

const ENTRY_EXTENSION: &str = "conf";

/// systemd-boot reads its entries directly, there is no generated config.
pub(crate) struct SdBootManager {
    entries_dir: PathBuf,
}

impl SdBootManager {
    pub fn locate(paths: &PathConfig) -> Option<SdBootManager> {
        if dir_exists(&paths.loader_entries_dir).unwrap_or(false) {
            Some(SdBootManager {
                entries_dir: paths.loader_entries_dir.clone(),
            })
        } else {
            None
        }
    }

    fn count_entries(&self) -> usize {
        match read_dir(&self.entries_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| {
                    let path = entry.path();
                    path.is_file()
                        && path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION)
                })
                .count(),
            Err(_) => 0,
        }
    }
}

impl BootManager for SdBootManager {
    fn get_boot_type(&self) -> BootType {
        BootType::SystemdBoot
    }

    fn update_config(&self, _ops: &dyn SysOps) -> StageOutcome {
        info!(
            "systemd-boot uses the entries in '{}', nothing to regenerate",
            self.entries_dir.display()
        );
        StageOutcome::Ok
    }

    fn verify_entries(&self) -> StageOutcome {
        trace!("SdBootManager::verify_entries: entered");
        let count = self.count_entries();
        if count > 0 {
            info!("found {} boot entries in '{}'", count, self.entries_dir.display());
            StageOutcome::Ok
        } else {
            StageOutcome::Warn(format!(
                "no boot entries found in '{}'",
                self.entries_dir.display()
            ))
        }
    }
}
