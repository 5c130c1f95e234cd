// default config file, only read when present
pub const DEFAULT_CONFIG_FILE: &str = "/etc/sys-update.yml";

pub const BOOT_DIR: &str = "/boot";
pub const MODULES_DIR: &str = "/usr/lib/modules";
pub const GRUB_CFG_PATH: &str = "/boot/grub/grub.cfg";
pub const EFI_GRUB_CFG_PATH: &str = "/boot/efi/EFI/grub/grub.cfg";
pub const EFI_DIRS: &[&str] = &["/boot/efi", "/efi"];
pub const LOADER_ENTRIES_DIR: &str = "/boot/loader/entries";
pub const DISPLAY_MANAGER_LINK: &str = "/etc/systemd/system/display-manager.service";

// boot space thresholds in MiB
pub const BOOT_LOW_WATER_MB: u64 = 75;
pub const BOOT_CRITICAL_MB: u64 = 25;
pub const LARGE_FILE_MB: u64 = 10;

pub const DEFAULT_KERNEL: &str = "linux";
pub const DEFAULT_AUR_HELPER: &str = "yay";
pub const DESKTOP_PACKAGE: &str = "gnome-shell";
pub const DESKTOP_GROUP: &[&str] = &[
    "gnome-shell",
    "mutter",
    "gnome-session",
    "gnome-settings-daemon",
    "gnome-control-center",
    "gdm",
];

pub const CACHE_KEEP: u32 = 2;

pub const BACKGROUND_DIRS: &[&str] = &[
    "/usr/share/backgrounds",
    "/usr/share/gnome-background-properties",
];

pub const MIB_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BootType {
    Grub,
    SystemdBoot,
}
