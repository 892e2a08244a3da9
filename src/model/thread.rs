use crate::error::Error;
use crate::event::{ModelRequest, ResumeKind, SuspendReason};
use crate::model::frame::StackFrame;
use crate::model::hook::{ChangeDetail, ModelElement};
use crate::model::DebugTarget;
use crate::script::{CallFrame, ThreadHandle};
use crate::event_trace;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadState {
    Running,
    Suspended,
    Stepping,
    Terminated,
}

struct ThreadInner {
    state: ThreadState,
    /// Innermost frame first.
    frames: Vec<Arc<StackFrame>>,
    suspend_reason: Option<SuspendReason>,
}

/// Logical execution flow inside the interpreter.
///
/// Commands (suspend, resume, step) only send requests, the state changes when the
/// interpreter confirms them with an event.
pub struct Thread {
    this: Weak<Thread>,
    target: Weak<DebugTarget>,
    handle: ThreadHandle,
    inner: Mutex<ThreadInner>,
}

impl Thread {
    pub(crate) fn new(target: Weak<DebugTarget>, handle: ThreadHandle) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            target,
            handle,
            inner: Mutex::new(ThreadInner {
                state: ThreadState::Running,
                frames: vec![],
                suspend_reason: None,
            }),
        })
    }

    pub fn target(&self) -> Option<Arc<DebugTarget>> {
        self.target.upgrade()
    }

    pub fn handle(&self) -> &ThreadHandle {
        &self.handle
    }

    pub fn name(&self) -> String {
        format!("Thread: {}", self.handle.name())
    }

    pub fn state(&self) -> ThreadState {
        self.inner.lock().state
    }

    pub fn is_suspended(&self) -> bool {
        self.state() == ThreadState::Suspended
    }

    pub fn is_stepping(&self) -> bool {
        self.state() == ThreadState::Stepping
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == ThreadState::Terminated
    }

    /// Reason of the last suspension.
    pub fn suspend_reason(&self) -> Option<SuspendReason> {
        self.inner.lock().suspend_reason
    }

    /// Stack frames, innermost first. Empty unless the thread is suspended or stepping.
    ///
    /// A suspended thread without frames requests them from the interpreter and returns
    /// an empty list, frames arrive later with a content change notification.
    pub fn stack_frames(&self) -> Vec<Arc<StackFrame>> {
        let (state, frames) = {
            let inner = self.inner.lock();
            (inner.state, inner.frames.clone())
        };

        match state {
            ThreadState::Suspended if frames.is_empty() => {
                self.post(ModelRequest::GetStackFrames {
                    thread: self.handle.clone(),
                });
                frames
            }
            ThreadState::Suspended | ThreadState::Stepping => frames,
            ThreadState::Running | ThreadState::Terminated => vec![],
        }
    }

    /// Frames as they are, without requesting missing ones.
    pub(crate) fn current_frames(&self) -> Vec<Arc<StackFrame>> {
        let inner = self.inner.lock();
        match inner.state {
            ThreadState::Suspended | ThreadState::Stepping => inner.frames.clone(),
            ThreadState::Running | ThreadState::Terminated => vec![],
        }
    }

    pub fn has_stack_frames(&self) -> bool {
        !self.stack_frames().is_empty()
    }

    pub fn top_stack_frame(&self) -> Option<Arc<StackFrame>> {
        self.stack_frames().into_iter().next()
    }

    pub fn can_suspend(&self) -> bool {
        !matches!(self.state(), ThreadState::Terminated | ThreadState::Suspended)
    }

    pub fn can_resume(&self) -> bool {
        self.is_suspended()
    }

    pub fn can_step_into(&self) -> bool {
        self.is_suspended()
    }

    pub fn can_step_over(&self) -> bool {
        self.is_suspended()
    }

    pub fn can_step_return(&self) -> bool {
        self.is_suspended()
    }

    /// Only the last live thread of a process may be terminated.
    pub fn can_terminate(&self) -> bool {
        if self.is_terminated() {
            return false;
        }
        self.target()
            .and_then(|target| target.process())
            .map(|process| process.live_thread_count() == 1)
            .unwrap_or(false)
    }

    pub fn suspend(&self) {
        self.post(ModelRequest::Suspend {
            thread: Some(self.handle.clone()),
        });
    }

    pub fn resume(&self) {
        self.request_resume(ResumeKind::ClientRequest);
    }

    pub fn step_into(&self) {
        self.request_resume(ResumeKind::StepInto);
    }

    pub fn step_over(&self) {
        self.request_resume(ResumeKind::StepOver);
    }

    pub fn step_return(&self) {
        self.request_resume(ResumeKind::StepReturn);
    }

    /// Request interpreter termination, allowed for the last live thread only.
    pub fn terminate(&self) -> Result<(), Error> {
        if !self.can_terminate() {
            return Err(Error::TerminateUnsupported(self.name()));
        }
        self.post(ModelRequest::Terminate);
        Ok(())
    }

    pub(crate) fn request_resume(&self, kind: ResumeKind) {
        self.post(ModelRequest::Resume {
            thread: Some(self.handle.clone()),
            kind,
        });
    }

    fn post(&self, request: ModelRequest) {
        if let Some(target) = self.target() {
            target.post(request);
        }
    }

    /// Apply a suspended event.
    pub(crate) fn on_suspended(&self, reason: SuspendReason, descriptors: Vec<CallFrame>) {
        {
            let mut inner = self.inner.lock();
            if inner.state == ThreadState::Terminated {
                return;
            }
            inner.state = ThreadState::Suspended;
            inner.suspend_reason = Some(reason);
        }
        self.set_stack_frames(descriptors);

        if let (Some(this), Some(target)) = (self.this.upgrade(), self.target()) {
            target.hook().on_suspend(&this, reason);
        }
    }

    /// Apply a resumed event. Frames are kept until the next suspension.
    pub(crate) fn on_resumed(&self, kind: ResumeKind) {
        {
            let mut inner = self.inner.lock();
            if inner.state == ThreadState::Terminated {
                return;
            }
            inner.state = if kind.is_step() {
                ThreadState::Stepping
            } else {
                ThreadState::Running
            };
        }

        if let (Some(this), Some(target)) = (self.this.upgrade(), self.target()) {
            target.hook().on_resume(&this, kind);
        }
    }

    /// Mark thread terminated and drop its frames, return `false` if it was already
    /// terminated. No notifications are fired.
    pub(crate) fn set_terminated(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == ThreadState::Terminated {
            return false;
        }
        inner.state = ThreadState::Terminated;
        inner.frames.clear();
        true
    }

    /// Replace stack frames with the interpreter's authoritative list (innermost first).
    ///
    /// Frames wrapping a descriptor that is still on the stack are reused and marked dirty,
    /// frames for new descriptors are created, frames whose descriptor left the stack are
    /// terminated. One content change notification is fired for the thread.
    ///
    /// A terminated thread keeps no frames, late frame lists are ignored.
    pub(crate) fn set_stack_frames(&self, descriptors: Vec<CallFrame>) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        if self.is_terminated() {
            event_trace!(target: "model", "{}: frames of terminated thread ignored", self.name());
            return;
        }

        let mut old_frames = self.inner.lock().frames.clone();
        let mut frames = Vec::with_capacity(descriptors.len());
        let mut reused = vec![];
        let mut created = vec![];

        for descriptor in descriptors {
            match old_frames
                .iter()
                .position(|frame| frame.descriptor() == &descriptor)
            {
                Some(pos) => {
                    let frame = old_frames.remove(pos);
                    reused.push(frame.clone());
                    frames.push(frame);
                }
                None => {
                    let frame = StackFrame::new(&this, descriptor);
                    created.push(frame.clone());
                    frames.push(frame);
                }
            }
        }

        event_trace!(
            target: "model",
            "{}: {} frames ({} reused, {} new, {} gone)",
            self.name(),
            frames.len(),
            reused.len(),
            created.len(),
            old_frames.len()
        );
        self.inner.lock().frames = frames;

        reused.iter().for_each(|frame| frame.set_dirty());
        created.iter().for_each(|frame| frame.fire_create());
        old_frames.iter().for_each(|frame| frame.fire_terminate());

        if let Some(target) = self.target() {
            target
                .hook()
                .on_change(&ModelElement::Thread(this), ChangeDetail::Content);
        }
    }
}
