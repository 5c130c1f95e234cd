use chrono::Local;
use colored::*;
use failure::ResultExt;
use lazy_static::lazy_static;
use log::{Level, Log, Metadata, Record};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs::read_to_string;
use std::str::FromStr;

use crate::common::{UpdErrCtx, UpdError, UpdErrorKind};

pub const DEFAULT_LOG_LEVEL: Level = Level::Info;

// names a yaml file with per module log levels
const LOG_CONFIG_VAR: &str = "LOG_CONFIG";

lazy_static! {
    static ref MODULE_RE: Regex = Regex::new(r#"^[^:]+::(.*)$"#).unwrap();
}

#[derive(Debug, Deserialize)]
struct ModuleLevel {
    name: String,
    level: String,
}

#[derive(Debug, Deserialize)]
struct LogConfig {
    log_level: Option<String>,
    #[serde(default)]
    modules: Vec<ModuleLevel>,
}

#[derive(Debug)]
pub struct Logger {
    default_level: Level,
    mod_level: HashMap<String, Level>,
}

impl Logger {
    pub fn initialise(verbosity: u64) -> Result<(), UpdError> {
        let mut logger = Logger {
            default_level: DEFAULT_LOG_LEVEL,
            mod_level: HashMap::new(),
        };

        if let Ok(config_path) = env::var(LOG_CONFIG_VAR) {
            let config_str = read_to_string(&config_path).context(UpdErrCtx::from_remark(
                UpdErrorKind::Upstream,
                &format!("Logger::initialise: failed to read {}", config_path),
            ))?;
            logger.apply_config(&config_str)?;
        }

        if let Some(level) = Logger::level_from_verbosity(verbosity) {
            logger.default_level = level;
        }

        let max_level = logger.max_level();

        log::set_boxed_logger(Box::new(logger)).context(UpdErrCtx::from_remark(
            UpdErrorKind::Upstream,
            "Logger::initialise: failed to initialize logger",
        ))?;
        log::set_max_level(max_level.to_level_filter());

        Ok(())
    }

    fn apply_config(&mut self, config_str: &str) -> Result<(), UpdError> {
        let log_cfg: LogConfig = serde_yaml::from_str(config_str).context(
            UpdErrCtx::from_remark(UpdErrorKind::Upstream, "Logger: failed to parse log config"),
        )?;

        if let Some(ref level) = log_cfg.log_level {
            if let Ok(level) = Level::from_str(level) {
                self.default_level = level;
            }
        }

        for module in log_cfg.modules {
            if let Ok(level) = Level::from_str(&module.level) {
                self.mod_level.insert(module.name, level);
            }
        }
        Ok(())
    }

    fn max_level(&self) -> Level {
        self.mod_level
            .values()
            .fold(self.default_level, |max, level| {
                if *level > max {
                    *level
                } else {
                    max
                }
            })
    }

    fn level_from_verbosity(verbosity: u64) -> Option<Level> {
        match verbosity {
            0 => None,
            1 => Some(Level::Debug),
            _ => Some(Level::Trace),
        }
    }

    fn module_name(mod_path: Option<&str>) -> String {
        if let Some(mod_path) = mod_path {
            if let Some(captures) = MODULE_RE.captures(mod_path) {
                if let Some(name) = captures.get(1) {
                    return String::from(name.as_str());
                }
            }
        }
        String::from("main")
    }
}

impl Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let mod_name = Logger::module_name(record.module_path());
        let level = *self.mod_level.get(&mod_name).unwrap_or(&self.default_level);

        let curr_level = record.metadata().level();
        if curr_level <= level {
            let output = format!(
                "{} {:<5} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level().to_string(),
                &mod_name,
                record.args()
            );

            match curr_level {
                Level::Error => println!("{}", output.red()),
                Level::Warn => println!("{}", output.yellow()),
                Level::Info => println!("{}", output.green()),
                Level::Debug => println!("{}", output.cyan()),
                Level::Trace => println!("{}", output.blue()),
            };
        }
    }

    fn flush(&self) {}
}
