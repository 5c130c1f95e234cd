use log::{error, info, trace, warn};

use crate::common::{
    prompt::{Prompter, TermPrompter},
    severity::{RunReport, Severity, StageOutcome},
    Config, UpdError,
};

pub(crate) mod linux_defs;
use linux_defs::SYSTEMCTL_CMD;

pub(crate) mod linux_common;
use linux_common::{get_invoking_user, is_admin};

pub(crate) mod ensured_cmds;

pub(crate) mod sys_ops;
use sys_ops::{LinuxSysOps, SysOps};

pub(crate) mod pacman;

pub(crate) mod kernel;
use kernel::{diff_kernels, kernel_versions};

pub(crate) mod boot_space;
use boot_space::BootSpaceGuard;

pub(crate) mod pkg_update;
use pkg_update::{check_dependencies, check_desktop_version, clean_cache, run_update, show_news};

pub(crate) mod kernel_check;
use kernel_check::{verify_boot_artifacts, verify_kernels};

pub(crate) mod initramfs;
use initramfs::rebuild_initramfs;

pub(crate) mod boot_manager;
use boot_manager::{update_boot_config, verify_boot_entries};

pub(crate) mod login_theme;
use login_theme::refresh_login_theme;

const STAGE_DEPENDENCIES: &str = "dependencies";
const STAGE_BOOT_SPACE: &str = "boot space";
const STAGE_NEWS: &str = "news";
const STAGE_DESKTOP: &str = "desktop version";
const STAGE_UPDATE: &str = "system update";
const STAGE_KERNEL_FILES: &str = "kernel files";
const STAGE_INITRAMFS: &str = "initramfs";
const STAGE_BOOT_CONFIG: &str = "bootloader config";
const STAGE_LOGIN_THEME: &str = "login theme";
const STAGE_BOOT_ENTRIES: &str = "boot entries";
const STAGE_PACKAGE_CACHE: &str = "package cache";
const STAGE_FINAL_CHECK: &str = "final verification";

/// Runs the maintenance stages in order. A failing stage never stops the
/// run, it only raises the reported severity.
pub(crate) struct SysUpdater<'a> {
    config: &'a Config,
    user: Option<String>,
    ops: &'a dyn SysOps,
    prompter: &'a dyn Prompter,
}

impl<'a> SysUpdater<'a> {
    pub fn update() -> Result<Severity, UpdError> {
        let mut config = Config::new()?;

        if !is_admin() {
            error!("please run this program as root");
            return Err(UpdError::displayed());
        }

        config.load()?;

        let ops = LinuxSysOps::new();
        let prompter = TermPrompter::new();
        let updater = SysUpdater::new(&config, get_invoking_user(), &ops, &prompter);
        Ok(updater.run().get_severity())
    }

    pub fn new(
        config: &'a Config,
        user: Option<String>,
        ops: &'a dyn SysOps,
        prompter: &'a dyn Prompter,
    ) -> SysUpdater<'a> {
        SysUpdater {
            config,
            user,
            ops,
            prompter,
        }
    }

    pub fn run(&self) -> RunReport {
        trace!("SysUpdater::run: entered");
        let ops = self.ops;
        let config = &self.config.update;
        let user = self.user.as_deref();
        let mut report = RunReport::new();

        info!("*** checking dependencies ***");
        report.record(STAGE_DEPENDENCIES, check_dependencies(ops));

        info!("*** checking boot volume ***");
        match BootSpaceGuard::new(ops, self.prompter, config).check() {
            Ok(outcome) => report.record(STAGE_BOOT_SPACE, outcome),
            Err(why) => return SysUpdater::cancelled(report, &why),
        }

        info!("*** checking news ***");
        match show_news(ops, self.prompter, config, user) {
            Ok((outcome, proceed)) => {
                report.record(STAGE_NEWS, outcome);
                if !proceed {
                    warn!("update cancelled, no packages were changed");
                    report.add_note("update cancelled by the operator");
                    report.log_summary();
                    return report;
                }
            }
            Err(why) => return SysUpdater::cancelled(report, &why),
        }

        info!("*** checking desktop version ***");
        let plan = match check_desktop_version(ops, self.prompter, config) {
            Ok((outcome, plan)) => {
                report.record(STAGE_DESKTOP, outcome);
                plan
            }
            Err(why) => return SysUpdater::cancelled(report, &why),
        };

        let kernels_before = match kernel_versions(ops, &config.paths.modules_dir) {
            Ok(versions) => Some(versions),
            Err(why) => {
                warn!("failed to record kernel versions: {}", why);
                None
            }
        };

        info!("*** updating system ***");
        report.record(STAGE_UPDATE, run_update(ops, config, &plan, user));
        if plan.exclude_desktop {
            report.add_note(&format!(
                "desktop packages held back: {}",
                config.desktop_group.join(", ")
            ));
        }

        if let Some(before) = kernels_before {
            match kernel_versions(ops, &config.paths.modules_dir) {
                Ok(after) => {
                    let changes = diff_kernels(&before, &after);
                    if changes.is_empty() {
                        info!("no kernel package changed");
                    }
                    for change in changes {
                        info!("kernel change: {}", change);
                        report.add_note(&change.to_string());
                    }
                }
                Err(why) => warn!("failed to record kernel versions: {}", why),
            }
        }

        info!("*** verifying kernel files ***");
        let kernel_check = verify_kernels(ops, config);
        for pkg in &kernel_check.reinstalled {
            report.add_note(&format!("reinstalled {}", pkg));
        }
        report.record(STAGE_KERNEL_FILES, kernel_check.outcome);

        info!("*** rebuilding initramfs ***");
        report.record(
            STAGE_INITRAMFS,
            rebuild_initramfs(ops, &config.paths.boot_dir),
        );

        info!("*** updating bootloader config ***");
        report.record(STAGE_BOOT_CONFIG, update_boot_config(ops, &config.paths));

        info!("*** refreshing login theme ***");
        report.record(STAGE_LOGIN_THEME, refresh_login_theme(ops, config));

        info!("*** verifying boot entries ***");
        report.record(STAGE_BOOT_ENTRIES, verify_boot_entries(&config.paths));

        info!("*** cleaning package cache ***");
        report.record(STAGE_PACKAGE_CACHE, clean_cache(ops, config));

        info!("*** final verification ***");
        let outcome = verify_boot_artifacts(ops, config);
        if let StageOutcome::Critical(_) = outcome {
            error!("do not reboot before the kernel and initramfs are back in place");
            error!("try: pacman -S {} && mkinitcpio -P", config.default_kernel);
        }
        report.record(STAGE_FINAL_CHECK, outcome);

        report.log_summary();

        self.offer_reboot(&report);
        report
    }

    /// A prompt went unanswered before any package was touched, stop here.
    fn cancelled(mut report: RunReport, why: &UpdError) -> RunReport {
        warn!("{}", why);
        warn!("update cancelled, no packages were changed");
        report.raise(Severity::Recoverable);
        report.add_note("update cancelled, a prompt was not answered");
        report.log_summary();
        report
    }

    fn offer_reboot(&self, report: &RunReport) {
        if self.config.is_no_reboot() {
            return;
        }

        if report.get_severity() == Severity::Critical {
            error!("the system may not boot, fix the problems above before rebooting");
        }

        match self.prompter.confirm("Reboot now?", false) {
            Ok(true) => {
                if let Err(why) = self.ops.call(SYSTEMCTL_CMD, &["reboot"], true) {
                    error!("failed to reboot: {}", why);
                }
            }
            Ok(false) => info!("not rebooting"),
            Err(why) => warn!("{}, not rebooting", why),
        }
    }
}
