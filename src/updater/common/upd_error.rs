use failure::{Backtrace, Context, Fail};
use std::fmt::{self, Display};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Fail)]
pub enum UpdErrorKind {
    #[fail(display = "An error occured in an upstream function")]
    Upstream,
    #[fail(display = "An invalid value was encountered")]
    InvParam,
    #[fail(display = "A required item could not be found")]
    NotFound,
    #[fail(display = "A spawned process returned an error code")]
    ExecProcess,
    #[fail(display = "The operator did not answer a prompt")]
    Interrupted,
    #[fail(display = "The error was displayed upstream")]
    Displayed,
}

#[derive(Debug)]
pub struct UpdErrCtx {
    kind: UpdErrorKind,
    descr: String,
}

impl UpdErrCtx {
    pub fn from_remark(kind: UpdErrorKind, descr: &str) -> UpdErrCtx {
        UpdErrCtx {
            kind,
            descr: String::from(descr),
        }
    }
}

impl From<UpdErrorKind> for UpdErrCtx {
    fn from(kind: UpdErrorKind) -> UpdErrCtx {
        UpdErrCtx {
            kind,
            descr: String::new(),
        }
    }
}

impl Display for UpdErrCtx {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.descr.is_empty() {
            write!(f, "Error: {}", self.kind)
        } else {
            write!(f, "Error: {}, {}", self.kind, self.descr)
        }
    }
}

#[derive(Debug)]
pub struct UpdError {
    inner: Context<UpdErrCtx>,
}

impl Fail for UpdError {
    fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for UpdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl UpdError {
    pub fn kind(&self) -> UpdErrorKind {
        self.inner.get_context().kind
    }

    pub fn from_remark(kind: UpdErrorKind, remark: &str) -> UpdError {
        UpdError {
            inner: Context::new(UpdErrCtx::from_remark(kind, remark)),
        }
    }

    pub fn displayed() -> UpdError {
        UpdError::from(UpdErrorKind::Displayed)
    }
}

impl From<UpdErrorKind> for UpdError {
    fn from(kind: UpdErrorKind) -> UpdError {
        UpdError {
            inner: Context::new(UpdErrCtx::from(kind)),
        }
    }
}

impl From<UpdErrCtx> for UpdError {
    fn from(upd_ctxt: UpdErrCtx) -> UpdError {
        UpdError {
            inner: Context::new(upd_ctxt),
        }
    }
}

impl From<Context<UpdErrCtx>> for UpdError {
    fn from(inner: Context<UpdErrCtx>) -> UpdError {
        UpdError { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use failure::ResultExt;

    fn failing_read() -> Result<String, UpdError> {
        Ok(std::fs::read_to_string("/nonexistent/sys-update/file").context(
            UpdErrCtx::from_remark(UpdErrorKind::Upstream, "failed to read test file"),
        )?)
    }

    #[test]
    fn context_keeps_kind_and_remark() {
        let err = failing_read().unwrap_err();
        assert_eq!(err.kind(), UpdErrorKind::Upstream);
        assert!(format!("{}", err).contains("failed to read test file"));
    }

    #[test]
    fn kind_only_display() {
        let err = UpdError::from(UpdErrorKind::Interrupted);
        assert_eq!(
            format!("{}", err),
            "Error: The operator did not answer a prompt"
        );
    }
}
