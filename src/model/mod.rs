//! Debug model exposed to a debugging front end.
//!
//! The tree is [`DebugTarget`] -> [`Process`] -> [`Thread`] -> [`StackFrame`] -> [`Variable`]
//! -> [`Value`]. Parents own their children, children point back with weak references.
//! Every mutation coming from the interpreter enters through [`DebugTarget::handle_event`],
//! every user command leaves as a [`crate::event::ModelRequest`].

pub mod frame;
pub mod hook;
pub mod process;
pub mod session;
pub mod target;
pub mod thread;
pub mod value;
pub mod variable;
pub mod watch;

pub use frame::StackFrame;
pub use hook::{ChangeDetail, EventHook, ModelElement, NopHook};
pub use process::Process;
pub use session::SessionId;
pub use target::{DebugTarget, DebugTargetBuilder};
pub use thread::{Thread, ThreadState};
pub use value::Value;
pub use variable::{OriginKind, Variable};
pub use watch::{WatchExpressionDelegate, WatchExpressionResult, WatchListener};

use std::sync::{Arc, Weak};

/// Debug element that owns a variable or a value, used to reach the debug target.
#[derive(Clone, Default)]
pub enum Parent {
    #[default]
    Detached,
    Target(Weak<DebugTarget>),
    Frame(Weak<StackFrame>),
}

impl Parent {
    pub fn frame(&self) -> Option<Arc<StackFrame>> {
        match self {
            Parent::Frame(frame) => frame.upgrade(),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<Arc<DebugTarget>> {
        match self {
            Parent::Detached => None,
            Parent::Target(target) => target.upgrade(),
            Parent::Frame(frame) => frame.upgrade()?.target(),
        }
    }
}

impl From<&Arc<StackFrame>> for Parent {
    fn from(frame: &Arc<StackFrame>) -> Self {
        Parent::Frame(Arc::downgrade(frame))
    }
}

impl From<&Arc<DebugTarget>> for Parent {
    fn from(target: &Arc<DebugTarget>) -> Self {
        Parent::Target(Arc::downgrade(target))
    }
}
