//! Per-thread execution state of the interpreter side.

use crate::event::{ModelRequest, ResumeKind, SuspendReason};
use crate::script::{CallFrame, ThreadHandle};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

pub(super) struct ThreadState {
    /// Outermost frame first.
    pub(super) stack: Vec<CallFrame>,
    pub(super) resume_kind: ResumeKind,
    /// Stack depth at the last explicit resume.
    pub(super) resume_depth: usize,
    /// Line of the innermost frame at the last explicit resume, 0 for an empty stack.
    pub(super) resume_line: u32,
    pub(super) suspended: bool,
    pub(super) suspend_requested: bool,
    /// Requests served by the interpreter thread while it is suspended.
    pub(super) pending: VecDeque<ModelRequest>,
}

impl ThreadState {
    fn new() -> Self {
        Self {
            stack: vec![],
            resume_kind: ResumeKind::Unspecified,
            resume_depth: 0,
            resume_line: 0,
            suspended: false,
            suspend_requested: false,
            pending: VecDeque::new(),
        }
    }

    /// Call frames innermost first, the order used by events.
    pub(super) fn frames(&self) -> Vec<CallFrame> {
        self.stack.iter().rev().cloned().collect()
    }

    pub(super) fn top_line(&self) -> u32 {
        self.stack.last().map(|frame| frame.line()).unwrap_or(0)
    }

    /// Apply a resume request. An automatic resume keeps the previous step mode,
    /// anything else replaces it and remembers where execution resumed.
    pub(super) fn resume(&mut self, kind: ResumeKind) {
        if kind != ResumeKind::Unspecified {
            self.resume_kind = kind;
            self.resume_depth = self.stack.len();
            self.resume_line = self.top_line();
        }
        self.suspended = false;
    }

    /// Decide whether execution stops at the current line of the innermost frame.
    pub(super) fn stop_reason(&self, on_breakpoint: bool) -> Option<SuspendReason> {
        if self.stack.is_empty() {
            return None;
        }
        if on_breakpoint {
            return Some(SuspendReason::Breakpoint);
        }
        if self.suspend_requested {
            return Some(SuspendReason::ClientRequest);
        }

        let depth = self.stack.len();
        let step_end = match self.resume_kind {
            ResumeKind::StepInto => true,
            ResumeKind::StepOver => {
                depth < self.resume_depth
                    || (depth == self.resume_depth && self.top_line() != self.resume_line)
            }
            ResumeKind::StepReturn => depth < self.resume_depth,
            ResumeKind::Unspecified | ResumeKind::ClientRequest => false,
        };
        step_end.then_some(SuspendReason::StepEnd)
    }
}

/// State of one interpreter thread, shared between the interpreter thread (which blocks on
/// it while suspended) and the dispatcher thread (which wakes it up).
pub(super) struct ThreadSlot {
    pub(super) handle: ThreadHandle,
    pub(super) state: Mutex<ThreadState>,
    pub(super) wake: Condvar,
}

impl ThreadSlot {
    pub(super) fn new(handle: ThreadHandle) -> Self {
        Self {
            handle,
            state: Mutex::new(ThreadState::new()),
            wake: Condvar::new(),
        }
    }

    pub(super) fn resume(&self, kind: ResumeKind) {
        self.state.lock().resume(kind);
        self.wake.notify_all();
    }

    pub(super) fn enqueue(&self, request: ModelRequest) {
        self.state.lock().pending.push_back(request);
        self.wake.notify_all();
    }
}
