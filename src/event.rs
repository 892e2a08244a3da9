//! Messages exchanged between the interpreter side and the debug model.
//!
//! [`DebuggerEvent`] flows from the interpreter to the model, [`ModelRequest`] flows the other
//! way. Both sets are closed: adding a message kind means revisiting every `match` over them.

use crate::breakpoint::Breakpoint;
use crate::error::EvalError;
use crate::model::frame::StackFrame;
use crate::model::value::RawValue;
use crate::model::variable::Variable;
use crate::model::watch::WatchListener;
use crate::model::Parent;
use crate::script::{CallFrame, Script, ThreadHandle};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// How a thread should continue after it was suspended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ResumeKind {
    /// Automatic resume, the previous step mode stays in effect.
    #[default]
    Unspecified,
    ClientRequest,
    StepInto,
    StepOver,
    StepReturn,
}

impl ResumeKind {
    pub fn is_step(self) -> bool {
        matches!(
            self,
            ResumeKind::StepInto | ResumeKind::StepOver | ResumeKind::StepReturn
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspendReason {
    Breakpoint,
    ClientRequest,
    StepEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BreakpointMode {
    Add,
    Remove,
}

/// Event produced by the interpreter side.
pub enum DebuggerEvent {
    EngineStarted,
    /// A tracked script is about to execute, interpreter thread waits for a resume request.
    ScriptReady {
        script: Script,
        thread: ThreadHandle,
        root: bool,
    },
    ThreadCreated {
        thread: ThreadHandle,
    },
    ThreadTerminated {
        thread: ThreadHandle,
    },
    /// Frames are ordered innermost first.
    Suspended {
        thread: ThreadHandle,
        reason: SuspendReason,
        frames: Vec<CallFrame>,
    },
    Resumed {
        thread: ThreadHandle,
        kind: ResumeKind,
    },
    StackFrames {
        thread: ThreadHandle,
        frames: Vec<CallFrame>,
    },
    Variables {
        frame: Arc<StackFrame>,
        variables: Vec<Arc<Variable>>,
    },
    EvaluateExpression {
        expression: String,
        frame: Arc<StackFrame>,
        result: Result<RawValue, EvalError>,
        listener: Arc<dyn WatchListener>,
    },
    EngineTerminated,
}

/// Request produced by the debug model.
pub enum ModelRequest {
    /// Suspend a thread at the next line, `None` addresses all threads.
    Suspend {
        thread: Option<ThreadHandle>,
    },
    /// Resume a thread, `None` addresses all suspended threads.
    Resume {
        thread: Option<ThreadHandle>,
        kind: ResumeKind,
    },
    GetStackFrames {
        thread: ThreadHandle,
    },
    GetVariables {
        frame: Arc<StackFrame>,
    },
    SetVariable {
        context: Parent,
        variable: Arc<Variable>,
        expression: String,
    },
    EvaluateExpression {
        expression: String,
        frame: Arc<StackFrame>,
        thread: ThreadHandle,
        listener: Arc<dyn WatchListener>,
    },
    Breakpoint {
        script: Script,
        breakpoint: Breakpoint,
        mode: BreakpointMode,
    },
    RemoveAllBreakpoints,
    Terminate,
    Disconnect,
}

/// Anything that travels through the event dispatcher.
pub enum DispatchEvent {
    Debugger(DebuggerEvent),
    Request(ModelRequest),
}

impl From<DebuggerEvent> for DispatchEvent {
    fn from(event: DebuggerEvent) -> Self {
        DispatchEvent::Debugger(event)
    }
}

impl From<ModelRequest> for DispatchEvent {
    fn from(request: ModelRequest) -> Self {
        DispatchEvent::Request(request)
    }
}

impl Display for DebuggerEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DebuggerEvent::EngineStarted => f.write_str("engine started"),
            DebuggerEvent::ScriptReady {
                script,
                thread,
                root,
            } => write!(f, "script ready: {script} on {thread} (root: {root})"),
            DebuggerEvent::ThreadCreated { thread } => write!(f, "thread created: {thread}"),
            DebuggerEvent::ThreadTerminated { thread } => write!(f, "thread terminated: {thread}"),
            DebuggerEvent::Suspended {
                thread,
                reason,
                frames,
            } => write!(f, "suspended: {thread} ({reason}) at {frames:?}"),
            DebuggerEvent::Resumed { thread, kind } => write!(f, "resumed: {thread} ({kind})"),
            DebuggerEvent::StackFrames { thread, frames } => {
                write!(f, "stack frames: {thread} {frames:?}")
            }
            DebuggerEvent::Variables { frame, variables } => {
                write!(f, "variables: {} ({} items)", frame.name(), variables.len())
            }
            DebuggerEvent::EvaluateExpression {
                expression, result, ..
            } => match result {
                Ok(_) => write!(f, "evaluated: {expression}"),
                Err(e) => write!(f, "evaluated: {expression} ({e})"),
            },
            DebuggerEvent::EngineTerminated => f.write_str("engine terminated"),
        }
    }
}

impl Display for ModelRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let thread_or_all = |thread: &Option<ThreadHandle>| {
            thread
                .as_ref()
                .map(|t| t.name().to_string())
                .unwrap_or_else(|| "all threads".to_string())
        };

        match self {
            ModelRequest::Suspend { thread } => write!(f, "suspend request: {}", thread_or_all(thread)),
            ModelRequest::Resume { thread, kind } => {
                write!(f, "resume request: {} ({kind})", thread_or_all(thread))
            }
            ModelRequest::GetStackFrames { thread } => write!(f, "stack frames request: {thread}"),
            ModelRequest::GetVariables { frame } => write!(f, "variables request: {}", frame.name()),
            ModelRequest::SetVariable {
                variable,
                expression,
                ..
            } => write!(f, "set variable request: {} = {expression}", variable.name()),
            ModelRequest::EvaluateExpression {
                expression, thread, ..
            } => write!(f, "evaluate request: {expression} on {thread}"),
            ModelRequest::Breakpoint {
                script,
                breakpoint,
                mode,
            } => write!(f, "breakpoint request: {mode} {breakpoint:?} in {script}"),
            ModelRequest::RemoveAllBreakpoints => f.write_str("remove all breakpoints request"),
            ModelRequest::Terminate => f.write_str("terminate request"),
            ModelRequest::Disconnect => f.write_str("disconnect request"),
        }
    }
}

impl Display for DispatchEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchEvent::Debugger(event) => event.fmt(f),
            DispatchEvent::Request(request) => request.fmt(f),
        }
    }
}
