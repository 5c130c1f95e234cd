use log::{trace, warn};
use std::collections::HashMap;

use crate::{
    common::{call, call_interactive, CmdRes, UpdError, UpdErrorKind},
    linux::linux_common::whereis,
};

/// Table of commands that have been located on this system.
#[derive(Debug)]
pub(crate) struct EnsuredCmds {
    cmd_table: HashMap<String, String>,
}

impl EnsuredCmds {
    pub fn new() -> EnsuredCmds {
        EnsuredCmds {
            cmd_table: HashMap::new(),
        }
    }

    pub fn ensure(&mut self, cmd: &str) -> Result<String, UpdError> {
        if let Some(cmd_path) = self.cmd_table.get(cmd) {
            return Ok(cmd_path.clone());
        }

        if let Ok(cmd_path) = whereis(cmd) {
            self.cmd_table.insert(String::from(cmd), cmd_path.clone());
            Ok(cmd_path)
        } else {
            let message = format!("cannot find command {}", cmd);
            warn!("{}", message);
            Err(UpdError::from_remark(UpdErrorKind::NotFound, &message))
        }
    }

    pub fn has(&self, cmd: &str) -> bool {
        self.cmd_table.contains_key(cmd)
    }

    pub fn get<'a>(&'a self, cmd: &str) -> Result<&'a str, UpdError> {
        if let Some(cmd_path) = self.cmd_table.get(cmd) {
            Ok(cmd_path)
        } else {
            Err(UpdError::from_remark(
                UpdErrorKind::InvParam,
                &format!("The command is not a checked command: {}", cmd),
            ))
        }
    }

    pub fn call(&self, cmd: &str, args: &[&str], trim_stdout: bool) -> Result<CmdRes, UpdError> {
        trace!(
            "call_cmd: entered with cmd: '{}', args: {:?}, trim: {}",
            cmd,
            args,
            trim_stdout
        );

        Ok(call(self.get(cmd)?, args, trim_stdout)?)
    }

    pub fn call_interactive(&self, cmd: &str, args: &[&str]) -> Result<CmdRes, UpdError> {
        trace!(
            "call_interactive: entered with cmd: '{}', args: {:?}",
            cmd,
            args
        );

        Ok(call_interactive(self.get(cmd)?, args)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_and_call() {
        let mut cmds = EnsuredCmds::new();
        assert!(!cmds.has("sh"));
        cmds.ensure("sh").unwrap();
        assert!(cmds.has("sh"));
        let cmd_res = cmds.call("sh", &["-c", "echo ok"], true).unwrap();
        assert_eq!(cmd_res.stdout, "ok");
    }

    #[test]
    fn unchecked_command_is_rejected() {
        let cmds = EnsuredCmds::new();
        assert_eq!(
            cmds.call("sh", &[], true).unwrap_err().kind(),
            UpdErrorKind::InvParam
        );
    }

    #[test]
    fn missing_command() {
        let mut cmds = EnsuredCmds::new();
        assert!(cmds.ensure("no-such-command-sys-update").is_err());
    }
}
