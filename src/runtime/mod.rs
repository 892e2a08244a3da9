//! Interpreter-side peer of the debug model.
//!
//! [`ScriptDebugger`] is driven by two parties: the interpreter calls the execution
//! notifications ([`ScriptDebugger::process_line`] and friends) on its own threads, the
//! dispatcher delivers [`ModelRequest`]s. A suspended interpreter thread blocks inside the
//! notification call until a resume request arrives, serving frame, variable and evaluation
//! requests in the meantime.

mod state;

use crate::breakpoint::Breakpoint;
use crate::config::LaunchConfig;
use crate::dispatcher::{DispatcherHandle, EventProcessor};
use crate::error::{Error, EvalError};
use crate::event::{BreakpointMode, DebuggerEvent, ModelRequest, ResumeKind};
use crate::model::value::RawValue;
use crate::model::variable::Variable;
use crate::script::{CallFrame, Script, ThreadHandle};
use crate::{event_trace, weak_error};
use parking_lot::{Mutex, MutexGuard};
use state::{ThreadSlot, ThreadState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

/// What an interpreter provides to the debugger.
///
/// All methods are called on the interpreter thread that owns the frame, while that thread
/// is suspended.
pub trait DebugEngine: Send + Sync {
    /// Variables visible in a call frame.
    fn variables(&self, frame: &CallFrame) -> anyhow::Result<Vec<Arc<Variable>>>;

    /// Evaluate an expression in the scope of a call frame.
    fn inject(&self, frame: &CallFrame, expression: &str) -> Result<RawValue, EvalError>;

    /// Assign a variable visible in a call frame.
    fn set_variable(&self, frame: &CallFrame, name: &str, value: RawValue) -> anyhow::Result<()>;

    /// Stop script execution.
    fn terminate(&self) -> anyhow::Result<()>;
}

/// Generic script debugger, engine specific knowledge lives behind [`DebugEngine`].
pub struct ScriptDebugger {
    engine: Arc<dyn DebugEngine>,
    show_dynamic_code: bool,
    dispatcher: Mutex<Option<DispatcherHandle>>,
    threads: Mutex<HashMap<ThreadId, Arc<ThreadSlot>>>,
    breakpoints: Mutex<HashMap<Script, Vec<Breakpoint>>>,
    terminated: AtomicBool,
}

impl ScriptDebugger {
    pub fn new(engine: Arc<dyn DebugEngine>, config: LaunchConfig) -> Arc<Self> {
        Arc::new(Self {
            engine,
            show_dynamic_code: config.show_dynamic_code,
            dispatcher: Mutex::default(),
            threads: Mutex::default(),
            breakpoints: Mutex::default(),
            terminated: AtomicBool::new(false),
        })
    }

    /// Handle of the calling interpreter thread.
    pub fn current_thread(&self) -> ThreadHandle {
        self.current_slot().handle.clone()
    }

    /// Call stack of the calling interpreter thread, innermost frame first.
    pub fn stack(&self) -> Vec<CallFrame> {
        self.current_slot().state.lock().frames()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Scripts that are visible to the user. Dynamic code is tracked only on demand.
    pub fn is_tracked(&self, script: &Script) -> bool {
        !script.is_dynamic() || self.show_dynamic_code
    }

    /// Whether an enabled breakpoint is set at a script line.
    pub fn is_active_breakpoint(&self, script: &Script, line: u32) -> bool {
        self.breakpoints
            .lock()
            .get(script)
            .is_some_and(|breakpoints| {
                breakpoints
                    .iter()
                    .any(|bp| bp.is_enabled() && bp.line() == line)
            })
    }

    // --------------------------------- execution notifications ------------------------------------

    pub fn engine_started(&self) {
        self.fire(DebuggerEvent::EngineStarted);
    }

    /// Interpreter finished. Model is notified and the debugger detaches.
    pub fn engine_finished(&self) {
        self.fire(DebuggerEvent::EngineTerminated);
        self.detach();
        self.threads.lock().clear();
    }

    /// Announce the calling thread to the model.
    pub fn thread_started(&self) {
        let handle = self.current_thread();
        self.fire(DebuggerEvent::ThreadCreated { thread: handle });
    }

    pub fn thread_finished(&self) {
        let slot = self.threads.lock().remove(&std::thread::current().id());
        if let Some(slot) = slot {
            self.fire(DebuggerEvent::ThreadTerminated {
                thread: slot.handle.clone(),
            });
        }
    }

    /// A script is about to run on the calling thread. Tracked scripts suspend until the
    /// model decides how execution continues.
    pub fn script_started(&self, script: &Script) {
        if !self.is_tracked(script) {
            return;
        }

        let slot = self.current_slot();
        let root = slot.state.lock().stack.is_empty();
        self.suspend(&slot, |_| DebuggerEvent::ScriptReady {
            script: script.clone(),
            thread: slot.handle.clone(),
            root,
        });
    }

    pub fn push_frame(&self, frame: CallFrame) {
        self.current_slot().state.lock().stack.push(frame);
    }

    pub fn pop_frame(&self) -> Option<CallFrame> {
        self.current_slot().state.lock().stack.pop()
    }

    /// The calling thread is about to execute a line of the innermost frame.
    ///
    /// Suspends on an enabled breakpoint, on a pending suspend request or when a step
    /// request is complete.
    pub fn process_line(&self, script: &Script, line: u32) {
        if !self.is_tracked(script) || line < 1 {
            return;
        }

        let on_breakpoint = self.is_active_breakpoint(script, line);
        let slot = self.current_slot();
        let reason = {
            let mut state = slot.state.lock();
            let Some(top) = state.stack.last() else {
                return;
            };
            top.set_line(line);
            let reason = state.stop_reason(on_breakpoint);
            if reason.is_some() {
                state.suspend_requested = false;
            }
            reason
        };

        if let Some(reason) = reason {
            event_trace!(target: "runtime", "{} stops at {}:{line} ({reason})", slot.handle, script.title());
            self.suspend(&slot, |state| DebuggerEvent::Suspended {
                thread: slot.handle.clone(),
                reason,
                frames: state.frames(),
            });
        }
    }

    // --------------------------------- internals --------------------------------------------------

    fn current_slot(&self) -> Arc<ThreadSlot> {
        let current = std::thread::current();
        self.threads
            .lock()
            .entry(current.id())
            .or_insert_with(|| {
                let name = current
                    .name()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| format!("{:?}", current.id()));
                Arc::new(ThreadSlot::new(ThreadHandle::new(name)))
            })
            .clone()
    }

    fn slots(&self) -> Vec<Arc<ThreadSlot>> {
        self.threads.lock().values().cloned().collect()
    }

    fn find_slot(&self, handle: &ThreadHandle) -> Option<Arc<ThreadSlot>> {
        self.threads
            .lock()
            .values()
            .find(|slot| &slot.handle == handle)
            .cloned()
    }

    fn dispatcher(&self) -> Option<DispatcherHandle> {
        self.dispatcher.lock().clone()
    }

    fn fire(&self, event: DebuggerEvent) {
        if let Some(dispatcher) = self.dispatcher() {
            dispatcher.post(event);
        }
    }

    /// Block the calling thread until a resume request arrives.
    ///
    /// Nobody could wake a detached debugger, so it never suspends.
    fn suspend(&self, slot: &ThreadSlot, event: impl FnOnce(&ThreadState) -> DebuggerEvent) {
        let Some(dispatcher) = self.dispatcher() else {
            return;
        };

        let mut state = slot.state.lock();
        state.suspended = true;
        // posted under the lock, a resume request can not overtake the suspend event
        dispatcher.post(event(&state));
        event_trace!(target: "runtime", "{} suspended", slot.handle);

        while state.suspended {
            while let Some(request) = state.pending.pop_front() {
                let frames = state.frames();
                MutexGuard::unlocked(&mut state, || self.serve(slot, request, frames));
            }
            if state.suspended {
                slot.wake.wait(&mut state);
            }
        }

        if !state.pending.is_empty() {
            event_trace!(target: "runtime", "{} drops {} stale requests", slot.handle, state.pending.len());
            state.pending.clear();
        }
        let kind = state.resume_kind;
        drop(state);

        event_trace!(target: "runtime", "{} resumed ({kind})", slot.handle);
        self.fire(DebuggerEvent::Resumed {
            thread: slot.handle.clone(),
            kind,
        });
    }

    /// Serve a request on the suspended interpreter thread.
    fn serve(&self, slot: &ThreadSlot, request: ModelRequest, frames: Vec<CallFrame>) {
        match request {
            ModelRequest::GetStackFrames { .. } => {
                self.fire(DebuggerEvent::StackFrames {
                    thread: slot.handle.clone(),
                    frames,
                });
            }
            ModelRequest::GetVariables { frame } => {
                let variables = weak_error!(
                    target: "runtime",
                    self.engine.variables(frame.descriptor()).map_err(Error::Engine),
                    "variables request:"
                );
                if let Some(variables) = variables {
                    self.fire(DebuggerEvent::Variables { frame, variables });
                }
            }
            ModelRequest::SetVariable {
                context,
                variable,
                expression,
            } => {
                let Some(frame) = context.frame() else {
                    log::warn!(target: "runtime", "set variable {}: no stack frame context", variable.name());
                    return;
                };
                let descriptor = frame.descriptor();

                weak_error!(
                    target: "runtime",
                    self.assign(descriptor, variable.name(), &expression),
                    "set variable request:"
                );

                let variables = weak_error!(
                    target: "runtime",
                    self.engine.variables(descriptor).map_err(Error::Engine),
                    "variables request:"
                );
                if let Some(variables) = variables {
                    self.fire(DebuggerEvent::Variables { frame, variables });
                }
            }
            ModelRequest::EvaluateExpression {
                expression,
                frame,
                listener,
                ..
            } => {
                let result = self.engine.inject(frame.descriptor(), &expression);
                self.fire(DebuggerEvent::EvaluateExpression {
                    expression,
                    frame,
                    result,
                    listener,
                });
            }
            other => {
                event_trace!(target: "runtime", "{other} is not served by a suspended thread")
            }
        }
    }

    /// Evaluate `expression` in the frame scope and assign the result to a variable.
    fn assign(&self, frame: &CallFrame, name: &str, expression: &str) -> Result<(), Error> {
        self.engine
            .inject(frame, expression)
            .map_err(anyhow::Error::from)
            .and_then(|value| self.engine.set_variable(frame, name, value))
            .map_err(|e| {
                Error::Engine(e.context(format!(
                    "could not change variable <{name}> to \"{expression}\""
                )))
            })
    }

    fn resume(&self, thread: Option<ThreadHandle>, kind: ResumeKind) {
        match thread {
            Some(handle) => match self.find_slot(&handle) {
                Some(slot) => slot.resume(kind),
                None => log::debug!(target: "runtime", "resume request for unknown thread {handle}"),
            },
            None => self.slots().iter().for_each(|slot| slot.resume(kind)),
        }
    }

    fn request_suspend(&self, thread: Option<ThreadHandle>) {
        let slots = match thread {
            Some(handle) => self.find_slot(&handle).into_iter().collect(),
            None => self.slots(),
        };
        for slot in slots {
            slot.state.lock().suspend_requested = true;
        }
    }

    fn update_breakpoints(&self, script: Script, breakpoint: Breakpoint, mode: BreakpointMode) {
        let mut breakpoints = self.breakpoints.lock();
        let script_breakpoints = breakpoints.entry(script).or_default();
        match mode {
            BreakpointMode::Add => script_breakpoints.push(breakpoint),
            BreakpointMode::Remove => {
                if let Some(pos) = script_breakpoints.iter().position(|bp| bp == &breakpoint) {
                    script_breakpoints.remove(pos);
                }
            }
        }
    }

    /// Route a request to the suspended thread it addresses.
    fn enqueue(&self, thread: &ThreadHandle, request: ModelRequest) {
        match self.find_slot(thread) {
            Some(slot) => slot.enqueue(request),
            None => log::debug!(target: "runtime", "drop {request}, unknown thread {thread}"),
        }
    }

    /// Release all suspended threads and stop emitting events.
    fn detach(&self) {
        self.terminated.store(true, Ordering::Release);
        *self.dispatcher.lock() = None;
        self.breakpoints.lock().clear();

        for slot in self.slots() {
            slot.resume(ResumeKind::ClientRequest);
        }
        log::debug!(target: "runtime", "debugger detached");
    }
}

impl EventProcessor<ModelRequest> for ScriptDebugger {
    fn set_dispatcher(&self, dispatcher: Option<DispatcherHandle>) {
        *self.dispatcher.lock() = dispatcher;
    }

    fn handle_event(&self, request: ModelRequest) {
        if self.is_terminated() {
            return;
        }
        event_trace!(target: "runtime", "process {request}");

        match request {
            ModelRequest::Resume { thread, kind } => self.resume(thread, kind),
            ModelRequest::Suspend { thread } => self.request_suspend(thread),
            ModelRequest::Breakpoint {
                script,
                breakpoint,
                mode,
            } => self.update_breakpoints(script, breakpoint, mode),
            ModelRequest::RemoveAllBreakpoints => self.breakpoints.lock().clear(),
            ModelRequest::Terminate => {
                self.breakpoints.lock().clear();
                weak_error!(
                    target: "runtime",
                    self.engine.terminate().map_err(Error::Engine),
                    "terminate request:"
                );
                self.fire(DebuggerEvent::EngineTerminated);
                self.detach();
            }
            ModelRequest::Disconnect => self.detach(),
            ModelRequest::GetStackFrames { ref thread } => {
                let thread = thread.clone();
                self.enqueue(&thread, request);
            }
            ModelRequest::GetVariables { ref frame } => {
                let thread = frame.thread_handle().clone();
                self.enqueue(&thread, request);
            }
            ModelRequest::SetVariable { ref context, .. } => match context.frame() {
                Some(frame) => {
                    let thread = frame.thread_handle().clone();
                    self.enqueue(&thread, request);
                }
                None => log::debug!(target: "runtime", "drop {request}, no stack frame context"),
            },
            ModelRequest::EvaluateExpression { ref thread, .. } => {
                let thread = thread.clone();
                self.enqueue(&thread, request);
            }
        }
    }
}
