pub const WHEREIS_CMD: &str = "whereis";
pub const DF_CMD: &str = "df";
pub const CHMOD_CMD: &str = "chmod";
pub const SETFACL_CMD: &str = "setfacl";
pub const SUDO_CMD: &str = "sudo";
pub const PACMAN_CMD: &str = "pacman";
pub const PACCACHE_CMD: &str = "paccache";
pub const MKINITCPIO_CMD: &str = "mkinitcpio";
pub const GRUB_MKCONFIG_CMD: &str = "grub-mkconfig";
pub const SYSTEMCTL_CMD: &str = "systemctl";
pub const GDM_THEME_CMD: &str = "set-gdm-theme";
pub const DCONF_CMD: &str = "dconf";

// package providing paccache
pub const CACHE_TOOL_PKG: &str = "pacman-contrib";

pub const KERNEL_IMAGE_PREFIX: &str = "vmlinuz-";
pub const INITRAMFS_PREFIX: &str = "initramfs-";
pub const INITRAMFS_SUFFIX: &str = ".img";
pub const INITRAMFS_FALLBACK_SUFFIX: &str = "-fallback.img";

// file in each modules dir naming the kernel package that owns it
pub const PKGBASE_FILE: &str = "pkgbase";

pub const GRUB_CFG_NAME: &str = "grub.cfg";

// boot dir subdirectories never scanned for large files
pub const BOOT_SCAN_SKIP_DIRS: &[&str] = &["grub", "efi", "EFI", "loader"];

pub const GDM_SERVICE: &str = "gdm";
pub const GDM_ACCOUNT: &str = "gdm";

pub const SUDO_USER_VAR: &str = "SUDO_USER";
pub const PKEXEC_UID_VAR: &str = "PKEXEC_UID";
