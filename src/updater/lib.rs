pub mod common;
pub mod defs;

#[cfg(target_os = "linux")]
mod linux;

pub use common::config::{Config, UpdateConfig};
pub use common::severity::Severity;
pub use common::{UpdErrCtx, UpdError, UpdErrorKind};

#[cfg(target_os = "linux")]
pub fn update() -> Result<Severity, UpdError> {
    Ok(linux::SysUpdater::update()?)
}
