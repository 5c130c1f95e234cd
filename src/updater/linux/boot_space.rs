use lazy_static::lazy_static;
use log::{debug, error, info, trace, warn};
use regex::Regex;
use std::collections::HashSet;
use std::fs::{read_dir, remove_dir_all, remove_file};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{
    common::{
        config::UpdateConfig, format_size_with_unit, prompt::Prompter, severity::StageOutcome,
        UpdError,
    },
    linux::{
        kernel::{find_orphan_kernel_files, installed_kernels, is_kernel_file_name, safe_set},
        linux_common::{bytes_to_mb, get_fs_space, FsSpace},
        linux_defs::BOOT_SCAN_SKIP_DIRS,
        sys_ops::SysOps,
    },
};

lazy_static! {
    static ref BACKUP_DIR_RE: Regex =
        Regex::new(r#"^((boot[-_.])?backup([-_.].*)?|.+\.bak)$"#).unwrap();
}

/// Makes room on the boot volume before the initramfs images are rebuilt.
pub(crate) struct BootSpaceGuard<'a> {
    ops: &'a dyn SysOps,
    prompter: &'a dyn Prompter,
    config: &'a UpdateConfig,
}

impl<'a> BootSpaceGuard<'a> {
    pub fn new(
        ops: &'a dyn SysOps,
        prompter: &'a dyn Prompter,
        config: &'a UpdateConfig,
    ) -> BootSpaceGuard<'a> {
        BootSpaceGuard {
            ops,
            prompter,
            config,
        }
    }

    /// Fails only when the operator does not answer the cleanup prompt.
    pub fn check(&self) -> Result<StageOutcome, UpdError> {
        trace!("BootSpaceGuard::check: entered");
        let boot_dir = &self.config.paths.boot_dir;

        let space = match get_fs_space(self.ops, boot_dir) {
            Ok(space) => space,
            Err(why) => {
                return Ok(StageOutcome::Warn(format!(
                    "could not determine free space on '{}': {}",
                    boot_dir.display(),
                    why
                )))
            }
        };
        info!(
            "boot volume {}: {} MiB available",
            space.device, space.avail_mb
        );

        let mut outcome = StageOutcome::Ok;
        if let Err(why) = remove_backup_dirs(boot_dir) {
            outcome = outcome.worst(StageOutcome::Warn(why));
        }

        if space.avail_mb >= self.config.boot_low_water_mb {
            return Ok(outcome);
        }

        warn!(
            "less than {} MiB available on {}, cleaning up",
            self.config.boot_low_water_mb, space.device
        );
        Ok(outcome.worst(self.clean_up(boot_dir, &space)?))
    }

    fn clean_up(&self, boot_dir: &Path, space: &FsSpace) -> Result<StageOutcome, UpdError> {
        let mut outcome = StageOutcome::Ok;

        let kernels = match installed_kernels(self.ops, &self.config.paths.modules_dir) {
            Ok(kernels) => Some(kernels),
            Err(why) => {
                outcome = StageOutcome::Warn(format!(
                    "cannot determine installed kernels, kernel files left alone: {}",
                    why
                ));
                None
            }
        };
        let safe = kernels.as_deref().map(safe_set).unwrap_or_default();

        let mut large_files = find_large_files(
            boot_dir,
            self.config.large_file_mb,
            &safe,
            &self.config.large_file_excludes,
        );
        if kernels.is_none() {
            // nothing kernel named is offered without the installed kernel list
            large_files.retain(|(path, _)| {
                !path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(is_kernel_file_name)
                    .unwrap_or(false)
            });
        }

        if !large_files.is_empty() {
            info!("large files on the boot volume:");
            for (path, size) in &large_files {
                info!("  {:<48} {}", path.display(), format_size_with_unit(*size));
            }
            if self.prompter.confirm(
                &format!("Remove these {} large file(s)?", large_files.len()),
                false,
            )? {
                for (path, _) in &large_files {
                    if let Err(why) = remove_file(path) {
                        outcome = outcome.worst(StageOutcome::Warn(format!(
                            "failed to remove '{}': {}",
                            path.display(),
                            why
                        )));
                    } else {
                        info!("removed '{}'", path.display());
                    }
                }
            }
        }

        match kernels {
            Some(ref kernels) if !kernels.is_empty() => {
                match find_orphan_kernel_files(boot_dir, &safe) {
                    Ok(orphans) => {
                        for orphan in orphans {
                            if let Err(why) = remove_file(&orphan) {
                                outcome = outcome.worst(StageOutcome::Warn(format!(
                                    "failed to remove '{}': {}",
                                    orphan.display(),
                                    why
                                )));
                            } else {
                                info!("removed stale kernel file '{}'", orphan.display());
                            }
                        }
                    }
                    Err(why) => {
                        outcome = outcome.worst(StageOutcome::Warn(format!(
                            "failed to look for stale kernel files: {}",
                            why
                        )))
                    }
                }
            }
            _ => warn!("installed kernels unknown, leaving kernel files in place"),
        }

        match get_fs_space(self.ops, boot_dir) {
            Ok(after) => {
                info!(
                    "boot volume {}: {} MiB available after cleanup (was {} MiB)",
                    after.device, after.avail_mb, space.avail_mb
                );
                if after.avail_mb < self.config.boot_critical_mb {
                    error!(
                        "CRITICAL: only {} MiB left on {}, the initramfs rebuild may fail. Free up space manually.",
                        after.avail_mb, after.device
                    );
                    outcome = outcome.worst(StageOutcome::Warn(format!(
                        "boot volume still low on space: {} MiB",
                        after.avail_mb
                    )));
                }
            }
            Err(why) => {
                outcome = outcome.worst(StageOutcome::Warn(format!(
                    "could not determine free space after cleanup: {}",
                    why
                )))
            }
        }

        Ok(outcome)
    }
}

pub(crate) fn is_backup_dir_name(name: &str) -> bool {
    BACKUP_DIR_RE.is_match(name)
}

/// Deletes backup directories left in the boot dir by earlier runs or tools.
fn remove_backup_dirs(boot_dir: &Path) -> Result<(), String> {
    let entries = match read_dir(boot_dir) {
        Ok(entries) => entries,
        Err(why) => {
            return Err(format!(
                "failed to list '{}': {}",
                boot_dir.display(),
                why
            ))
        }
    };

    let mut failed: Vec<String> = Vec::new();
    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let is_backup = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(is_backup_dir_name)
            .unwrap_or(false);
        if is_backup {
            match remove_dir_all(&path) {
                Ok(_) => info!("removed backup directory '{}'", path.display()),
                Err(why) => {
                    warn!("failed to remove '{}': {}", path.display(), why);
                    failed.push(path.display().to_string());
                }
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "failed to remove backup directories: {}",
            failed.join(", ")
        ))
    }
}

/// Regular files above `threshold_mb` below the boot dir, sorted by size,
/// skipping boot loader trees, files of installed kernels and `excludes`.
pub(crate) fn find_large_files(
    boot_dir: &Path,
    threshold_mb: u64,
    safe: &HashSet<String>,
    excludes: &[String],
) -> Vec<(PathBuf, u64)> {
    let mut found: Vec<(PathBuf, u64)> = Vec::new();

    let walker = WalkDir::new(boot_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 1 && entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy();
                !BOOT_SCAN_SKIP_DIRS.iter().any(|skip| *skip == name)
            } else {
                true
            }
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(why) => {
                debug!("find_large_files: skipping entry: {}", why);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if safe.contains(&*name) || excludes.iter().any(|ex| *ex == name) {
            continue;
        }

        if let Ok(metadata) = entry.metadata() {
            let size = metadata.len();
            if bytes_to_mb(size) > threshold_mb {
                found.push((entry.path().to_path_buf(), size));
            }
        }
    }

    found.sort_by(|a, b| b.1.cmp(&a.1));
    found
}
