//! Kernel packages and the boot files they own.
//!
//! Arch kernel packages install `vmlinuz-<pkg>` and have mkinitcpio generate
//! `initramfs-<pkg>.img` plus `initramfs-<pkg>-fallback.img` from the preset
//! of the same name. The mapping is the same for the official variants and
//! for any other kernel package.

use failure::ResultExt;
use log::{debug, trace, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::{self, Display, Formatter};
use std::fs::{read_dir, read_to_string};
use std::path::{Path, PathBuf};

use crate::{
    common::{dir_exists, UpdErrCtx, UpdError, UpdErrorKind},
    linux::{
        linux_defs::{
            INITRAMFS_FALLBACK_SUFFIX, INITRAMFS_PREFIX, INITRAMFS_SUFFIX, KERNEL_IMAGE_PREFIX,
            PKGBASE_FILE,
        },
        pacman::Pacman,
        sys_ops::SysOps,
    },
};

pub(crate) const KNOWN_KERNELS: &[&str] = &["linux", "linux-lts", "linux-zen", "linux-hardened"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum KernelVariant {
    Standard,
    Lts,
    Zen,
    Hardened,
    Other(String),
}

impl KernelVariant {
    pub fn from_package(pkg: &str) -> KernelVariant {
        match pkg {
            "linux" => KernelVariant::Standard,
            "linux-lts" => KernelVariant::Lts,
            "linux-zen" => KernelVariant::Zen,
            "linux-hardened" => KernelVariant::Hardened,
            _ => KernelVariant::Other(String::from(pkg)),
        }
    }

    pub fn package_name(&self) -> &str {
        match self {
            KernelVariant::Standard => "linux",
            KernelVariant::Lts => "linux-lts",
            KernelVariant::Zen => "linux-zen",
            KernelVariant::Hardened => "linux-hardened",
            KernelVariant::Other(name) => name,
        }
    }

    pub fn boot_files(&self) -> BootFiles {
        boot_files(self.package_name())
    }
}

impl Display for KernelVariant {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.package_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BootFiles {
    pub image: String,
    pub initramfs: String,
    pub fallback: String,
}

impl BootFiles {
    pub fn names(&self) -> [&str; 3] {
        [&self.image, &self.initramfs, &self.fallback]
    }
}

/// File names in the boot dir belonging to kernel package `pkg`.
pub(crate) fn boot_files(pkg: &str) -> BootFiles {
    BootFiles {
        image: format!("{}{}", KERNEL_IMAGE_PREFIX, pkg),
        initramfs: format!("{}{}{}", INITRAMFS_PREFIX, pkg, INITRAMFS_SUFFIX),
        fallback: format!("{}{}{}", INITRAMFS_PREFIX, pkg, INITRAMFS_FALLBACK_SUFFIX),
    }
}

/// Boot dir file names that must never be removed.
pub(crate) fn safe_set(kernels: &[KernelVariant]) -> HashSet<String> {
    kernels
        .iter()
        .flat_map(|kernel| {
            let files = kernel.boot_files();
            let names: Vec<String> = files.names().iter().map(|name| String::from(*name)).collect();
            names
        })
        .collect()
}

pub(crate) fn is_kernel_image_name(name: &str) -> bool {
    name.starts_with(KERNEL_IMAGE_PREFIX) && name.len() > KERNEL_IMAGE_PREFIX.len()
}

pub(crate) fn is_initramfs_name(name: &str) -> bool {
    name.starts_with(INITRAMFS_PREFIX) && name.ends_with(INITRAMFS_SUFFIX)
}

pub(crate) fn is_kernel_file_name(name: &str) -> bool {
    is_kernel_image_name(name) || is_initramfs_name(name)
}

/// mkinitcpio preset name for a kernel image, `vmlinuz-linux-lts` -> `linux-lts`.
pub(crate) fn preset_from_image<P: AsRef<Path>>(image: P) -> Option<String> {
    image
        .as_ref()
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix(KERNEL_IMAGE_PREFIX))
        .filter(|preset| !preset.is_empty())
        .map(String::from)
}

fn list_boot_files<F>(boot_dir: &Path, filter: F) -> Result<Vec<PathBuf>, UpdError>
where
    F: Fn(&str) -> bool,
{
    if !dir_exists(boot_dir)? {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in read_dir(boot_dir).context(UpdErrCtx::from_remark(
        UpdErrorKind::Upstream,
        &format!("failed to list directory '{}'", boot_dir.display()),
    ))? {
        let entry = entry.context(UpdErrCtx::from_remark(
            UpdErrorKind::Upstream,
            &format!("failed to read entry in '{}'", boot_dir.display()),
        ))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            if filter(name) {
                files.push(path.clone());
            }
        }
    }
    files.sort();
    Ok(files)
}

pub(crate) fn find_kernel_images<P: AsRef<Path>>(boot_dir: P) -> Result<Vec<PathBuf>, UpdError> {
    list_boot_files(boot_dir.as_ref(), is_kernel_image_name)
}

pub(crate) fn find_initramfs_images<P: AsRef<Path>>(boot_dir: P) -> Result<Vec<PathBuf>, UpdError> {
    list_boot_files(boot_dir.as_ref(), is_initramfs_name)
}

/// Kernel file names in the boot dir that no installed kernel owns.
pub(crate) fn find_orphan_kernel_files<P: AsRef<Path>>(
    boot_dir: P,
    safe: &HashSet<String>,
) -> Result<Vec<PathBuf>, UpdError> {
    list_boot_files(boot_dir.as_ref(), |name| {
        is_kernel_file_name(name) && !safe.contains(name)
    })
}

fn read_pkgbases(modules_dir: &Path) -> Result<BTreeSet<String>, UpdError> {
    let mut pkgbases: BTreeSet<String> = BTreeSet::new();
    if !dir_exists(modules_dir)? {
        return Ok(pkgbases);
    }

    for entry in read_dir(modules_dir).context(UpdErrCtx::from_remark(
        UpdErrorKind::Upstream,
        &format!("failed to list directory '{}'", modules_dir.display()),
    ))? {
        let entry = entry.context(UpdErrCtx::from_remark(
            UpdErrorKind::Upstream,
            &format!("failed to read entry in '{}'", modules_dir.display()),
        ))?;
        let pkgbase_path = entry.path().join(PKGBASE_FILE);
        if pkgbase_path.is_file() {
            match read_to_string(&pkgbase_path) {
                Ok(content) => {
                    let pkgbase = content.trim();
                    if !pkgbase.is_empty() {
                        debug!(
                            "read_pkgbases: '{}' -> '{}'",
                            pkgbase_path.display(),
                            pkgbase
                        );
                        pkgbases.insert(String::from(pkgbase));
                    }
                }
                Err(why) => warn!(
                    "failed to read '{}': {}",
                    pkgbase_path.display(),
                    why
                ),
            }
        }
    }
    Ok(pkgbases)
}

/// Kernel packages currently installed: the known variants found in the
/// package database plus every package that owns a modules directory.
pub(crate) fn installed_kernels<P: AsRef<Path>>(
    ops: &dyn SysOps,
    modules_dir: P,
) -> Result<Vec<KernelVariant>, UpdError> {
    trace!("installed_kernels: entered");
    let mut names: BTreeSet<String> = Pacman::new(ops)
        .query_installed(KNOWN_KERNELS)?
        .into_iter()
        .map(|(name, _)| name)
        .collect();

    names.extend(read_pkgbases(modules_dir.as_ref())?);

    let kernels: Vec<KernelVariant> = names
        .iter()
        .map(|name| KernelVariant::from_package(name))
        .collect();
    debug!("installed_kernels: {:?}", kernels);
    Ok(kernels)
}

/// Installed kernel packages with their versions.
pub(crate) fn kernel_versions<P: AsRef<Path>>(
    ops: &dyn SysOps,
    modules_dir: P,
) -> Result<BTreeMap<String, String>, UpdError> {
    let kernels = installed_kernels(ops, modules_dir)?;
    let names: Vec<&str> = kernels.iter().map(|k| k.package_name()).collect();
    Ok(Pacman::new(ops)
        .query_installed(&names)?
        .into_iter()
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum KernelChange {
    Added(String, String),
    Removed(String, String),
    Updated(String, String, String),
}

impl Display for KernelChange {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            KernelChange::Added(name, version) => write!(f, "{} {} installed", name, version),
            KernelChange::Removed(name, version) => write!(f, "{} {} removed", name, version),
            KernelChange::Updated(name, from, to) => {
                write!(f, "{} updated from {} to {}", name, from, to)
            }
        }
    }
}

pub(crate) fn diff_kernels(
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
) -> Vec<KernelChange> {
    let mut changes: Vec<KernelChange> = Vec::new();
    for (name, old_version) in before {
        match after.get(name) {
            Some(new_version) if new_version != old_version => changes.push(
                KernelChange::Updated(name.clone(), old_version.clone(), new_version.clone()),
            ),
            Some(_) => (),
            None => changes.push(KernelChange::Removed(name.clone(), old_version.clone())),
        }
    }
    for (name, version) in after {
        if !before.contains_key(name) {
            changes.push(KernelChange::Added(name.clone(), version.clone()));
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linux::sys_ops::mock::MockOps;
    use std::fs::{create_dir_all, write};
    use tempfile::TempDir;

    #[test]
    fn boot_file_names() {
        let files = KernelVariant::Lts.boot_files();
        assert_eq!(files.image, "vmlinuz-linux-lts");
        assert_eq!(files.initramfs, "initramfs-linux-lts.img");
        assert_eq!(files.fallback, "initramfs-linux-lts-fallback.img");

        let files = KernelVariant::from_package("linux-cachyos").boot_files();
        assert_eq!(files.image, "vmlinuz-linux-cachyos");
        assert_eq!(
            KernelVariant::from_package("linux-zen"),
            KernelVariant::Zen
        );
    }

    #[test]
    fn kernel_file_names() {
        assert!(is_kernel_file_name("vmlinuz-linux"));
        assert!(is_kernel_file_name("initramfs-linux-fallback.img"));
        assert!(!is_kernel_file_name("intel-ucode.img"));
        assert!(!is_kernel_file_name("vmlinuz-"));
        assert!(!is_kernel_file_name("initramfs-linux.img.old"));
        assert_eq!(
            preset_from_image("/boot/vmlinuz-linux-hardened"),
            Some(String::from("linux-hardened"))
        );
        assert_eq!(preset_from_image("/boot/amd-ucode.img"), None);
    }

    #[test]
    fn orphans_exclude_every_installed_subset() {
        let tmp_dir = TempDir::new().unwrap();
        let all = [
            KernelVariant::Standard,
            KernelVariant::Lts,
            KernelVariant::Zen,
            KernelVariant::Hardened,
        ];
        for kernel in &all {
            for name in kernel.boot_files().names().iter() {
                write(tmp_dir.path().join(name), b"k").unwrap();
            }
        }

        for mask in 0..16u32 {
            let installed: Vec<KernelVariant> = all
                .iter()
                .enumerate()
                .filter(|(idx, _)| mask & (1 << idx) != 0)
                .map(|(_, k)| k.clone())
                .collect();
            let safe = safe_set(&installed);
            let orphans = find_orphan_kernel_files(tmp_dir.path(), &safe).unwrap();
            for kernel in &installed {
                for name in kernel.boot_files().names().iter() {
                    assert!(!orphans.iter().any(|p| p.ends_with(name)));
                }
            }
            assert_eq!(orphans.len(), 3 * (all.len() - installed.len()));
        }
    }

    #[test]
    fn installed_from_db_and_pkgbase() {
        let tmp_dir = TempDir::new().unwrap();
        let mod_dir = tmp_dir.path().join("6.12.1-custom");
        create_dir_all(&mod_dir).unwrap();
        write(mod_dir.join("pkgbase"), "linux-custom\n").unwrap();
        create_dir_all(tmp_dir.path().join("6.11.5-arch1-1")).unwrap();

        let ops = MockOps::new().on_stderr(
            "pacman -Q linux linux-lts",
            1,
            "linux 6.11.5.arch1-1\nlinux-zen 6.11.5.zen1-1",
            "error: package 'linux-lts' was not found",
        );
        let kernels = installed_kernels(&ops, tmp_dir.path()).unwrap();
        assert_eq!(
            kernels,
            vec![
                KernelVariant::Standard,
                KernelVariant::Other(String::from("linux-custom")),
                KernelVariant::Zen,
            ]
        );
    }

    #[test]
    fn kernel_diff() {
        let mut before = BTreeMap::new();
        before.insert(String::from("linux"), String::from("6.11.4-1"));
        before.insert(String::from("linux-lts"), String::from("6.6.57-1"));
        let mut after = BTreeMap::new();
        after.insert(String::from("linux"), String::from("6.11.5-1"));
        after.insert(String::from("linux-lts"), String::from("6.6.57-1"));
        after.insert(String::from("linux-zen"), String::from("6.11.5-1"));

        let changes = diff_kernels(&before, &after);
        assert_eq!(
            changes,
            vec![
                KernelChange::Updated(
                    String::from("linux"),
                    String::from("6.11.4-1"),
                    String::from("6.11.5-1")
                ),
                KernelChange::Added(String::from("linux-zen"), String::from("6.11.5-1")),
            ]
        );
        assert!(diff_kernels(&after, &after).is_empty());
    }
}
