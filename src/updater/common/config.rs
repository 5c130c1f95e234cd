use clap::{App, Arg, ArgMatches};
use failure::ResultExt;
use log::{debug, info};
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use crate::{
    common::{file_exists, logger::Logger, path_append, UpdErrCtx, UpdError, UpdErrorKind},
    defs::{
        BACKGROUND_DIRS, BOOT_CRITICAL_MB, BOOT_DIR, BOOT_LOW_WATER_MB, CACHE_KEEP,
        DEFAULT_AUR_HELPER, DEFAULT_CONFIG_FILE, DEFAULT_KERNEL, DESKTOP_GROUP, DESKTOP_PACKAGE,
        DISPLAY_MANAGER_LINK, EFI_DIRS, EFI_GRUB_CFG_PATH, GRUB_CFG_PATH, LARGE_FILE_MB,
        LOADER_ENTRIES_DIR, MODULES_DIR,
    },
};

/// Locations on the managed system, overridable to run against a scratch tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub boot_dir: PathBuf,
    pub modules_dir: PathBuf,
    pub efi_dirs: Vec<PathBuf>,
    pub grub_cfg: PathBuf,
    pub efi_grub_cfg: PathBuf,
    pub loader_entries_dir: PathBuf,
    pub display_manager_link: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        PathConfig {
            boot_dir: PathBuf::from(BOOT_DIR),
            modules_dir: PathBuf::from(MODULES_DIR),
            efi_dirs: EFI_DIRS.iter().map(PathBuf::from).collect(),
            grub_cfg: PathBuf::from(GRUB_CFG_PATH),
            efi_grub_cfg: PathBuf::from(EFI_GRUB_CFG_PATH),
            loader_entries_dir: PathBuf::from(LOADER_ENTRIES_DIR),
            display_manager_link: PathBuf::from(DISPLAY_MANAGER_LINK),
        }
    }
}

impl PathConfig {
    /// Moves every path below `root`, used for scratch trees.
    pub fn rooted_at<P: AsRef<Path>>(root: P) -> PathConfig {
        let root = root.as_ref();
        let defaults = PathConfig::default();
        PathConfig {
            boot_dir: path_append(root, &defaults.boot_dir),
            modules_dir: path_append(root, &defaults.modules_dir),
            efi_dirs: defaults
                .efi_dirs
                .iter()
                .map(|dir| path_append(root, dir))
                .collect(),
            grub_cfg: path_append(root, &defaults.grub_cfg),
            efi_grub_cfg: path_append(root, &defaults.efi_grub_cfg),
            loader_entries_dir: path_append(root, &defaults.loader_entries_dir),
            display_manager_link: path_append(root, &defaults.display_manager_link),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub boot_low_water_mb: u64,
    pub boot_critical_mb: u64,
    pub large_file_mb: u64,
    pub large_file_excludes: Vec<String>,
    pub default_kernel: String,
    pub aur_helper: String,
    pub desktop_package: String,
    pub desktop_group: Vec<String>,
    pub cache_keep: u32,
    pub background_dirs: Vec<PathBuf>,
    pub paths: PathConfig,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        UpdateConfig {
            boot_low_water_mb: BOOT_LOW_WATER_MB,
            boot_critical_mb: BOOT_CRITICAL_MB,
            large_file_mb: LARGE_FILE_MB,
            large_file_excludes: Vec::new(),
            default_kernel: String::from(DEFAULT_KERNEL),
            aur_helper: String::from(DEFAULT_AUR_HELPER),
            desktop_package: String::from(DESKTOP_PACKAGE),
            desktop_group: DESKTOP_GROUP.iter().map(|s| String::from(*s)).collect(),
            cache_keep: CACHE_KEEP,
            background_dirs: BACKGROUND_DIRS.iter().map(PathBuf::from).collect(),
            paths: PathConfig::default(),
        }
    }
}

impl UpdateConfig {
    pub fn from_string(config_str: &str) -> Result<UpdateConfig, UpdError> {
        let config: UpdateConfig = serde_yaml::from_str(config_str).context(
            UpdErrCtx::from_remark(UpdErrorKind::Upstream, "failed to parse configuration"),
        )?;
        config.check()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<UpdateConfig, UpdError> {
        let file = file.as_ref();
        let config_str = read_to_string(file).context(UpdErrCtx::from_remark(
            UpdErrorKind::Upstream,
            &format!("failed to read config file '{}'", file.display()),
        ))?;
        UpdateConfig::from_string(&config_str)
    }

    fn check(&self) -> Result<(), UpdError> {
        if self.boot_critical_mb > self.boot_low_water_mb {
            return Err(UpdError::from_remark(
                UpdErrorKind::InvParam,
                &format!(
                    "boot_critical_mb ({}) must not exceed boot_low_water_mb ({})",
                    self.boot_critical_mb, self.boot_low_water_mb
                ),
            ));
        }
        if self.default_kernel.is_empty() {
            return Err(UpdError::from_remark(
                UpdErrorKind::InvParam,
                "default_kernel must not be empty",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub update: UpdateConfig,
    config_file: Option<PathBuf>,
    no_reboot: bool,
}

impl Config {
    /// Parses the command line and sets up logging. The config file is read
    /// separately by `load`.
    pub fn new() -> Result<Config, UpdError> {
        let arg_matches = Config::get_app().get_matches();
        Logger::initialise(arg_matches.occurrences_of("verbose"))?;
        Ok(Config::from_matches(&arg_matches))
    }

    fn get_app() -> App<'static, 'static> {
        App::new("sys-update")
            .version("0.1")
            .author("Thomas <thomas@etnur.net>")
            .about("Updates an Arch Linux system and keeps it bootable")
            .arg(
                Arg::with_name("config")
                    .short("c")
                    .long("config")
                    .value_name("FILE")
                    .help("use config file"),
            )
            .arg(
                Arg::with_name("no-reboot")
                    .long("no-reboot")
                    .help("do not offer a reboot when done"),
            )
            .arg(
                Arg::with_name("verbose")
                    .short("v")
                    .multiple(true)
                    .help("Sets the level of verbosity"),
            )
    }

    fn from_matches(arg_matches: &ArgMatches) -> Config {
        Config {
            update: UpdateConfig::default(),
            config_file: arg_matches.value_of("config").map(PathBuf::from),
            no_reboot: arg_matches.is_present("no-reboot"),
        }
    }

    /// Reads the config file given on the command line, else the default one
    /// if present.
    pub fn load(&mut self) -> Result<(), UpdError> {
        if let Some(ref config_file) = self.config_file {
            info!("using config file '{}'", config_file.display());
            self.update = UpdateConfig::from_file(config_file)?;
        } else if file_exists(DEFAULT_CONFIG_FILE) {
            info!("using config file '{}'", DEFAULT_CONFIG_FILE);
            self.update = UpdateConfig::from_file(DEFAULT_CONFIG_FILE)?;
        } else {
            debug!("no config file found, using defaults");
        }
        Ok(())
    }

    pub fn from_parts(update: UpdateConfig, no_reboot: bool) -> Config {
        Config {
            update,
            config_file: None,
            no_reboot,
        }
    }

    pub fn is_no_reboot(&self) -> bool {
        self.no_reboot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r##"
boot_low_water_mb: 100
large_file_excludes:
  - memtest86+.bin
desktop_group:
  - gnome-shell
  - mutter
paths:
  boot_dir: /mnt/boot
"##;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = UpdateConfig::from_string(CONFIG).unwrap();
        assert_eq!(config.boot_low_water_mb, 100);
        assert_eq!(config.boot_critical_mb, BOOT_CRITICAL_MB);
        assert_eq!(config.large_file_excludes, vec!["memtest86+.bin"]);
        assert_eq!(config.desktop_group, vec!["gnome-shell", "mutter"]);
        assert_eq!(config.paths.boot_dir, PathBuf::from("/mnt/boot"));
        assert_eq!(config.paths.grub_cfg, PathBuf::from(GRUB_CFG_PATH));
        assert_eq!(config.aur_helper, "yay");
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let res = UpdateConfig::from_string("boot_low_water_mb: 20\nboot_critical_mb: 30\n");
        assert_eq!(res.unwrap_err().kind(), UpdErrorKind::InvParam);
    }

    #[test]
    fn rooted_paths() {
        let paths = PathConfig::rooted_at("/tmp/scratch");
        assert_eq!(paths.boot_dir, PathBuf::from("/tmp/scratch/boot"));
        assert_eq!(
            paths.efi_grub_cfg,
            PathBuf::from("/tmp/scratch/boot/efi/EFI/grub/grub.cfg")
        );
        assert_eq!(paths.efi_dirs[1], PathBuf::from("/tmp/scratch/efi"));
    }

    #[test]
    fn command_line_does_not_read_config_file() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let config_file = tmp_dir.path().join("sys-update.yml");
        std::fs::write(&config_file, "boot_low_water_mb: [not a number\n").unwrap();
        let config_str = config_file.to_string_lossy().to_string();

        let arg_matches = Config::get_app().get_matches_from(vec![
            "sys-update",
            "-c",
            config_str.as_str(),
            "--no-reboot",
        ]);
        let mut config = Config::from_matches(&arg_matches);
        assert!(config.is_no_reboot());
        assert_eq!(config.update.boot_low_water_mb, BOOT_LOW_WATER_MB);

        // a broken file only fails once it is loaded
        assert_eq!(config.load().unwrap_err().kind(), UpdErrorKind::Upstream);

        std::fs::write(&config_file, "boot_low_water_mb: 120\n").unwrap();
        config.load().unwrap();
        assert_eq!(config.update.boot_low_water_mb, 120);
    }
}
