use log::{info, trace, warn};
use std::path::Path;

use crate::{
    common::severity::StageOutcome,
    linux::{
        kernel::{find_kernel_images, preset_from_image},
        linux_defs::MKINITCPIO_CMD,
        sys_ops::SysOps,
    },
};

/// Regenerates the initramfs images of all kernels in the boot dir. When the
/// bulk rebuild fails every preset is retried on its own so one broken
/// kernel does not take the others down.
pub(crate) fn rebuild_initramfs<P: AsRef<Path>>(ops: &dyn SysOps, boot_dir: P) -> StageOutcome {
    let boot_dir = boot_dir.as_ref();
    trace!("rebuild_initramfs: entered with '{}'", boot_dir.display());

    let images = match find_kernel_images(boot_dir) {
        Ok(images) => images,
        Err(why) => return StageOutcome::Warn(format!("failed to list kernel images: {}", why)),
    };

    if images.is_empty() {
        return StageOutcome::Warn(format!(
            "no kernel image in '{}', reinstall a kernel package (e.g. 'pacman -S linux') and run again",
            boot_dir.display()
        ));
    }

    info!("rebuilding initramfs for all presets");
    match ops.call_interactive(MKINITCPIO_CMD, &["-P"]) {
        Ok(ref cmd_res) if cmd_res.success() => return StageOutcome::Ok,
        Ok(cmd_res) => warn!("{} -P failed: {}", MKINITCPIO_CMD, cmd_res.diagnostic()),
        Err(why) => warn!("{} -P failed: {}", MKINITCPIO_CMD, why),
    }

    let mut failed: Vec<String> = Vec::new();
    for image in &images {
        let preset = match preset_from_image(image) {
            Some(preset) => preset,
            None => continue,
        };

        info!("rebuilding initramfs for preset {}", preset);
        let res = ops.call_interactive(MKINITCPIO_CMD, &["-p", preset.as_str()]);
        match res {
            Ok(ref cmd_res) if cmd_res.success() => info!("preset {} rebuilt", preset),
            Ok(cmd_res) => {
                warn!("preset {} failed: {}", preset, cmd_res.diagnostic());
                failed.push(preset);
            }
            Err(why) => {
                warn!("preset {} failed: {}", preset, why);
                failed.push(preset);
            }
        }
    }

    if failed.is_empty() {
        StageOutcome::warn("bulk initramfs rebuild failed, all presets rebuilt one by one")
    } else {
        StageOutcome::Warn(format!(
            "initramfs rebuild failed for: {}",
            failed.join(", ")
        ))
    }
}
