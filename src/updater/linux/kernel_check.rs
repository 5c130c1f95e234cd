use log::{error, info, trace, warn};

use crate::{
    common::{config::UpdateConfig, file_exists, severity::StageOutcome},
    linux::{
        kernel::{find_initramfs_images, find_kernel_images, installed_kernels},
        pacman::Pacman,
        sys_ops::SysOps,
    },
};

#[derive(Debug)]
pub(crate) struct KernelCheck {
    pub outcome: StageOutcome,
    /// packages that had to be (re)installed
    pub reinstalled: Vec<String>,
}

/// Makes sure every installed kernel package has its image in the boot dir,
/// reinstalling packages whose image is gone.
pub(crate) fn verify_kernels(ops: &dyn SysOps, config: &UpdateConfig) -> KernelCheck {
    trace!("verify_kernels: entered");
    let boot_dir = &config.paths.boot_dir;
    let pacman = Pacman::new(ops);
    let mut outcome = StageOutcome::Ok;
    let mut reinstalled: Vec<String> = Vec::new();

    match installed_kernels(ops, &config.paths.modules_dir) {
        Ok(kernels) => {
            if kernels.is_empty() {
                warn!(
                    "no kernel package installed, installing {}",
                    config.default_kernel
                );
                reinstalled.push(config.default_kernel.clone());
            } else {
                for kernel in &kernels {
                    let image = boot_dir.join(kernel.boot_files().image);
                    if file_exists(&image) {
                        info!("{}: found '{}'", kernel, image.display());
                    } else {
                        warn!("{}: '{}' is missing, reinstalling", kernel, image.display());
                        reinstalled.push(String::from(kernel.package_name()));
                    }
                }
            }
        }
        Err(why) => {
            outcome = StageOutcome::Warn(format!("failed to determine installed kernels: {}", why));
        }
    }

    if !reinstalled.is_empty() {
        let pkgs: Vec<&str> = reinstalled.iter().map(|pkg| pkg.as_str()).collect();
        match pacman.install(&pkgs, false) {
            Ok(ref cmd_res) if cmd_res.success() => info!("reinstalled {}", pkgs.join(", ")),
            Ok(cmd_res) => {
                outcome = outcome.worst(StageOutcome::Warn(format!(
                    "failed to install {}: {}",
                    pkgs.join(", "),
                    cmd_res.diagnostic()
                )))
            }
            Err(why) => {
                outcome = outcome.worst(StageOutcome::Warn(format!(
                    "failed to install {}: {}",
                    pkgs.join(", "),
                    why
                )))
            }
        }

        if find_kernel_images(boot_dir).map(|images| images.is_empty()).unwrap_or(true) {
            warn!(
                "still no kernel image in '{}', reinstalling with --overwrite",
                boot_dir.display()
            );
            match pacman.install_overwrite(&pkgs) {
                Ok(ref cmd_res) if cmd_res.success() => (),
                Ok(cmd_res) => warn!("forced reinstall failed: {}", cmd_res.diagnostic()),
                Err(why) => warn!("forced reinstall failed: {}", why),
            }
        }
    }

    let images = match find_kernel_images(boot_dir) {
        Ok(images) => images,
        Err(why) => {
            warn!("failed to list kernel images: {}", why);
            Vec::new()
        }
    };

    if images.is_empty() {
        error!("no kernel image found in '{}'", boot_dir.display());
        outcome = outcome.worst(StageOutcome::Critical(format!(
            "no kernel image in '{}' after all repair attempts",
            boot_dir.display()
        )));
    }

    KernelCheck {
        outcome,
        reinstalled,
    }
}

/// Last look before handing back to the operator: every installed kernel
/// needs its image and initramfs.
pub(crate) fn verify_boot_artifacts(ops: &dyn SysOps, config: &UpdateConfig) -> StageOutcome {
    trace!("verify_boot_artifacts: entered");
    let boot_dir = &config.paths.boot_dir;

    let images = find_kernel_images(boot_dir).unwrap_or_default();
    let initramfs = find_initramfs_images(boot_dir).unwrap_or_default();
    if images.is_empty() || initramfs.is_empty() {
        return StageOutcome::Critical(format!(
            "'{}' holds {} kernel image(s) and {} initramfs image(s), the system will not boot",
            boot_dir.display(),
            images.len(),
            initramfs.len()
        ));
    }

    let kernels = match installed_kernels(ops, &config.paths.modules_dir) {
        Ok(kernels) => kernels,
        Err(why) => {
            return StageOutcome::Warn(format!(
                "boot images present, but installed kernels could not be checked: {}",
                why
            ))
        }
    };

    let mut missing: Vec<String> = Vec::new();
    for kernel in &kernels {
        let files = kernel.boot_files();
        for name in &[files.image, files.initramfs] {
            if !file_exists(boot_dir.join(name)) {
                missing.push(name.clone());
            }
        }
    }

    if missing.is_empty() {
        info!(
            "{} kernel image(s) and {} initramfs image(s) in place",
            images.len(),
            initramfs.len()
        );
        StageOutcome::Ok
    } else {
        StageOutcome::Critical(format!("missing boot files: {}", missing.join(", ")))
    }
}
