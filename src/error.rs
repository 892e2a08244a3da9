use std::fmt::{Display, Formatter};

/// Interpreter-side evaluation failure.
///
/// Travels inside events as plain data, the name of the failure kind
/// (exception class, error type) plus an optional message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub kind: String,
    pub message: Option<String>,
}

impl EvalError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: Some(message.into()),
        }
    }

    pub fn without_message(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: None,
        }
    }

    /// Human-readable message, falls back to the failure kind.
    pub fn display_message(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.kind)
    }
}

impl Display for EvalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {msg}", self.kind),
            None => f.write_str(&self.kind),
        }
    }
}

impl std::error::Error for EvalError {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("configuration: {0}")]
    Config(#[from] toml::de::Error),

    // --------------------------------- value modification ----------------------------------------
    #[error("could not convert <{expression}> to {target}")]
    UnsupportedConversion { expression: String, target: String },
    #[error("value of \"{0}\" can not be modified")]
    UnsupportedTarget(String),

    // --------------------------------- evaluation ------------------------------------------------
    #[error("error during watch expression evaluation: {0}")]
    Evaluation(EvalError),
    #[error("expressions can be evaluated in a stack frame context only")]
    UnsupportedContext,

    // --------------------------------- session ---------------------------------------------------
    #[error("memory block retrieval not supported by {0}")]
    MemoryRetrievalUnsupported(&'static str),
    #[error("{0} can not be terminated while other threads are alive")]
    TerminateUnsupported(String),
    #[error("debug session already terminated")]
    SessionTerminated,

    // --------------------------------- third party errors ----------------------------------------
    #[error("engine: {0:#}")]
    Engine(anyhow::Error),
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $target: expr, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: $target, "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $target: expr, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: $target, concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
///
/// Log target is the calling module unless given explicitly.
#[macro_export]
macro_rules! weak_error {
    (target: $target: expr, $res: expr) => {
        $crate::_error!(log::warn, $target, $res)
    };
    (target: $target: expr, $res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $target, $res, $msg)
    };
    ($res: expr) => {
        $crate::_error!(log::warn, module_path!(), $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, module_path!(), $res, $msg)
    };
}
