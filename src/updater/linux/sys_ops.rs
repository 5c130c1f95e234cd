use std::cell::RefCell;

use crate::{
    common::{CmdRes, UpdError},
    linux::ensured_cmds::EnsuredCmds,
};

/// Everything that leaves the process: running external tools.
pub(crate) trait SysOps {
    /// Runs a command with captured output.
    fn call(&self, cmd: &str, args: &[&str], trim_stdout: bool) -> Result<CmdRes, UpdError>;
    /// Runs a command attached to the terminal.
    fn call_interactive(&self, cmd: &str, args: &[&str]) -> Result<CmdRes, UpdError>;
    fn has_cmd(&self, cmd: &str) -> bool;
}

pub(crate) struct LinuxSysOps {
    cmds: RefCell<EnsuredCmds>,
}

impl LinuxSysOps {
    pub fn new() -> LinuxSysOps {
        LinuxSysOps {
            cmds: RefCell::new(EnsuredCmds::new()),
        }
    }
}

impl SysOps for LinuxSysOps {
    fn call(&self, cmd: &str, args: &[&str], trim_stdout: bool) -> Result<CmdRes, UpdError> {
        self.cmds.borrow_mut().ensure(cmd)?;
        self.cmds.borrow().call(cmd, args, trim_stdout)
    }

    fn call_interactive(&self, cmd: &str, args: &[&str]) -> Result<CmdRes, UpdError> {
        self.cmds.borrow_mut().ensure(cmd)?;
        self.cmds.borrow().call_interactive(cmd, args)
    }

    fn has_cmd(&self, cmd: &str) -> bool {
        let mut cmds = self.cmds.borrow_mut();
        cmds.has(cmd) || cmds.ensure(cmd).is_ok()
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::SysOps;
    use crate::common::{CmdRes, UpdError, UpdErrorKind};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    // exit code, stdout, stderr
    type Handler = Box<dyn Fn(&str) -> (i32, String, String)>;

    fn default_stderr(cmd: &str, code: i32) -> String {
        if code == 0 {
            String::new()
        } else {
            format!("error: {} failed", cmd)
        }
    }

    /// Scripted stand-in for the system. Command lines are matched by prefix,
    /// the first matching rule answers, unmatched commands succeed silently.
    pub(crate) struct MockOps {
        rules: Vec<(String, Handler)>,
        missing: HashSet<String>,
        pub calls: RefCell<Vec<String>>,
    }

    impl MockOps {
        pub fn new() -> MockOps {
            MockOps {
                rules: Vec::new(),
                missing: HashSet::new(),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub fn on(mut self, prefix: &str, code: i32, stdout: &str) -> MockOps {
            let stdout = String::from(stdout);
            let stderr = default_stderr(prefix, code);
            self.rules.push((
                String::from(prefix),
                Box::new(move |_| (code, stdout.clone(), stderr.clone())),
            ));
            self
        }

        pub fn on_stderr(mut self, prefix: &str, code: i32, stdout: &str, stderr: &str) -> MockOps {
            let stdout = String::from(stdout);
            let stderr = String::from(stderr);
            self.rules.push((
                String::from(prefix),
                Box::new(move |_| (code, stdout.clone(), stderr.clone())),
            ));
            self
        }

        pub fn on_fn<F>(mut self, prefix: &str, handler: F) -> MockOps
        where
            F: Fn(&str) -> (i32, String) + 'static,
        {
            let cmd = String::from(prefix);
            self.rules.push((
                String::from(prefix),
                Box::new(move |line| {
                    let (code, stdout) = handler(line);
                    (code, stdout, default_stderr(&cmd, code))
                }),
            ));
            self
        }

        pub fn without(mut self, cmd: &str) -> MockOps {
            self.missing.insert(String::from(cmd));
            self
        }

        pub fn called(&self, prefix: &str) -> bool {
            self.calls.borrow().iter().any(|c| c.starts_with(prefix))
        }

        pub fn count(&self, prefix: &str) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }

        pub fn position(&self, prefix: &str) -> Option<usize> {
            self.calls.borrow().iter().position(|c| c.starts_with(prefix))
        }

        fn run(&self, cmd: &str, args: &[&str]) -> Result<CmdRes, UpdError> {
            if self.missing.contains(cmd) {
                return Err(UpdError::from_remark(
                    UpdErrorKind::NotFound,
                    &format!("cannot find command {}", cmd),
                ));
            }

            let mut line = String::from(cmd);
            for arg in args {
                line.push(' ');
                line.push_str(arg);
            }
            self.calls.borrow_mut().push(line.clone());

            let (code, stdout, stderr) = self
                .rules
                .iter()
                .find(|(prefix, _)| line.starts_with(prefix.as_str()))
                .map(|(_, handler)| handler(&line))
                .unwrap_or((0, String::new(), String::new()));

            Ok(CmdRes {
                stdout,
                stderr,
                status: ExitStatus::from_raw(code << 8),
            })
        }
    }

    impl SysOps for MockOps {
        fn call(&self, cmd: &str, args: &[&str], _trim_stdout: bool) -> Result<CmdRes, UpdError> {
            self.run(cmd, args)
        }

        fn call_interactive(&self, cmd: &str, args: &[&str]) -> Result<CmdRes, UpdError> {
            self.run(cmd, args)
        }

        fn has_cmd(&self, cmd: &str) -> bool {
            !self.missing.contains(cmd)
        }
    }
}
