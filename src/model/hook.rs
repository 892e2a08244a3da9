use crate::event::{ResumeKind, SuspendReason};
use crate::model::{DebugTarget, Process, StackFrame, Thread};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Any element of the debug model tree.
#[derive(Clone)]
pub enum ModelElement {
    Target(Arc<DebugTarget>),
    Process(Arc<Process>),
    Thread(Arc<Thread>),
    Frame(Arc<StackFrame>),
}

impl ModelElement {
    pub fn target(&self) -> Option<Arc<DebugTarget>> {
        match self {
            ModelElement::Target(target) => Some(target.clone()),
            ModelElement::Process(process) => process.target(),
            ModelElement::Thread(thread) => thread.target(),
            ModelElement::Frame(frame) => frame.target(),
        }
    }

    pub fn as_frame(&self) -> Option<&Arc<StackFrame>> {
        match self {
            ModelElement::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_thread(&self) -> Option<&Arc<Thread>> {
        match self {
            ModelElement::Thread(thread) => Some(thread),
            _ => None,
        }
    }
}

impl Debug for ModelElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelElement::Target(target) => write!(f, "Target({})", target.name()),
            ModelElement::Process(process) => write!(f, "Process({})", process.label()),
            ModelElement::Thread(thread) => write!(f, "Thread({})", thread.name()),
            ModelElement::Frame(frame) => {
                write!(f, "Frame({}:{})", frame.name(), frame.line_number())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChangeDetail {
    /// Children of the element changed.
    Content,
    /// Attributes of the element changed.
    State,
}

/// Model notifications. A front end implements this trait to learn about model changes.
///
/// Hooks are called from the thread that applies an event (usually the dispatcher thread)
/// and may query the model.
pub trait EventHook: Send + Sync {
    fn on_create(&self, element: &ModelElement);

    fn on_terminate(&self, element: &ModelElement);

    fn on_change(&self, element: &ModelElement, detail: ChangeDetail);

    fn on_suspend(&self, thread: &Arc<Thread>, reason: SuspendReason);

    fn on_resume(&self, thread: &Arc<Thread>, kind: ResumeKind);
}

pub struct NopHook {}

impl EventHook for NopHook {
    fn on_create(&self, _: &ModelElement) {}
    fn on_terminate(&self, _: &ModelElement) {}
    fn on_change(&self, _: &ModelElement, _: ChangeDetail) {}
    fn on_suspend(&self, _: &Arc<Thread>, _: SuspendReason) {}
    fn on_resume(&self, _: &Arc<Thread>, _: ResumeKind) {}
}
