use crate::breakpoint::{Breakpoint, BreakpointListener, BreakpointManager, ListenerId};
use crate::config::LaunchConfig;
use crate::dispatcher::{DispatcherHandle, EventProcessor};
use crate::error::Error;
use crate::event::{BreakpointMode, DebuggerEvent, ModelRequest, ResumeKind};
use crate::event_trace;
use crate::model::hook::{EventHook, ModelElement, NopHook};
use crate::model::process::Process;
use crate::model::session::{Session, SessionId};
use crate::model::thread::Thread;
use crate::model::value::RawValue;
use crate::model::watch::WatchExpressionResult;
use crate::model::Parent;
use crate::script::{CallFrame, Script, ThreadHandle};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

const TARGET_NAME: &str = "Script Debugger";

/// Root of the debug model for one debug session.
///
/// Interpreter events are applied one at a time: event handling, breakpoint routing and
/// termination run under a single per-target lock.
pub struct DebugTarget {
    this: Weak<DebugTarget>,
    session: Session,
    event_lock: ReentrantMutex<()>,
    process: Mutex<Option<Arc<Process>>>,
    breakpoint_listener: Mutex<Option<ListenerId>>,
    terminated: AtomicBool,
}

pub struct DebugTargetBuilder<H: EventHook + 'static = NopHook> {
    config: LaunchConfig,
    hooks: H,
    breakpoints: Option<Arc<BreakpointManager>>,
}

impl DebugTargetBuilder {
    pub fn new() -> Self {
        Self {
            config: LaunchConfig::default(),
            hooks: NopHook {},
            breakpoints: None,
        }
    }
}

impl Default for DebugTargetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: EventHook + 'static> DebugTargetBuilder<H> {
    pub fn with_config(self, config: LaunchConfig) -> Self {
        Self { config, ..self }
    }

    /// Set model notification hooks.
    pub fn with_hooks<H1: EventHook + 'static>(self, hooks: H1) -> DebugTargetBuilder<H1> {
        DebugTargetBuilder {
            config: self.config,
            hooks,
            breakpoints: self.breakpoints,
        }
    }

    /// Use a breakpoint manager shared with the host, by default the target has its own.
    pub fn with_breakpoints(self, breakpoints: Arc<BreakpointManager>) -> Self {
        Self {
            breakpoints: Some(breakpoints),
            ..self
        }
    }

    pub fn build(self) -> Arc<DebugTarget> {
        let breakpoints = self.breakpoints.unwrap_or_else(BreakpointManager::new);
        let target = Arc::new_cyclic(|this| DebugTarget {
            this: this.clone(),
            session: Session::new(self.config, breakpoints, Box::new(self.hooks)),
            event_lock: ReentrantMutex::new(()),
            process: Mutex::default(),
            breakpoint_listener: Mutex::default(),
            terminated: AtomicBool::new(false),
        });

        let listener: Weak<dyn BreakpointListener> = target.this.clone();
        let listener_id = target.session.breakpoints.add_listener(listener);
        *target.breakpoint_listener.lock() = Some(listener_id);

        log::debug!(target: "model", "debug session {} created", target.session.id);
        target.hook().on_create(&ModelElement::Target(target.clone()));
        target
    }
}

impl DebugTarget {
    pub fn name(&self) -> &'static str {
        TARGET_NAME
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id
    }

    pub fn config(&self) -> LaunchConfig {
        self.session.config
    }

    pub fn breakpoints(&self) -> &Arc<BreakpointManager> {
        &self.session.breakpoints
    }

    pub(crate) fn hook(&self) -> &dyn EventHook {
        self.session.hook.as_ref()
    }

    /// The process, exists once the interpreter has started.
    pub fn process(&self) -> Option<Arc<Process>> {
        self.process.lock().clone()
    }

    pub fn threads(&self) -> Vec<Arc<Thread>> {
        self.process()
            .map(|process| process.threads())
            .unwrap_or_default()
    }

    pub fn has_threads(&self) -> bool {
        !self.threads().is_empty()
    }

    /// Enqueue a request for the interpreter side.
    pub fn post(&self, request: ModelRequest) {
        self.session.post(request);
    }

    /// Stable per-session display id of a string or object, by identity.
    pub fn unique_object_id(&self, value: &RawValue) -> Option<u32> {
        self.session.object_ids.lock().id_of(value)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub fn can_terminate(&self) -> bool {
        !self.is_terminated()
    }

    /// Ask the interpreter to terminate, the model terminates when it confirms.
    pub fn terminate(&self) {
        self.post(ModelRequest::Terminate);
    }

    pub fn can_disconnect(&self) -> bool {
        self.can_terminate()
    }

    pub fn is_disconnected(&self) -> bool {
        self.is_terminated()
    }

    /// Detach from the interpreter: breakpoints are removed, suspended threads resumed and
    /// the model is terminated immediately while the script keeps running.
    pub fn disconnect(&self) {
        let _guard = self.event_lock.lock();
        if self.is_terminated() {
            return;
        }

        self.post(ModelRequest::RemoveAllBreakpoints);
        for thread in self.threads() {
            if thread.is_suspended() {
                thread.request_resume(ResumeKind::ClientRequest);
            }
        }
        self.post(ModelRequest::Disconnect);
        self.cleanup_on_termination();
    }

    pub fn supports_storage_retrieval(&self) -> bool {
        false
    }

    pub fn memory_block(&self, _start_address: u64, _length: u64) -> Result<Vec<u8>, Error> {
        Err(Error::MemoryRetrievalUnsupported(TARGET_NAME))
    }

    fn sole_thread(&self) -> Option<Arc<Thread>> {
        let mut threads = self.threads();
        if threads.len() == 1 {
            threads.pop()
        } else {
            None
        }
    }

    pub fn can_resume(&self) -> bool {
        self.sole_thread().is_some_and(|t| t.can_resume())
    }

    pub fn can_suspend(&self) -> bool {
        self.sole_thread().is_some_and(|t| t.can_suspend())
    }

    pub fn can_step_into(&self) -> bool {
        self.sole_thread().is_some_and(|t| t.can_step_into())
    }

    pub fn can_step_over(&self) -> bool {
        self.sole_thread().is_some_and(|t| t.can_step_over())
    }

    pub fn can_step_return(&self) -> bool {
        self.sole_thread().is_some_and(|t| t.can_step_return())
    }

    pub fn is_suspended(&self) -> bool {
        self.sole_thread().is_some_and(|t| t.is_suspended())
    }

    pub fn is_stepping(&self) -> bool {
        self.sole_thread().is_some_and(|t| t.is_stepping())
    }

    pub fn resume(&self) {
        if let Some(thread) = self.sole_thread() {
            thread.resume();
        }
    }

    pub fn suspend(&self) {
        if let Some(thread) = self.sole_thread() {
            thread.suspend();
        }
    }

    pub fn step_into(&self) {
        if let Some(thread) = self.sole_thread() {
            thread.step_into();
        }
    }

    pub fn step_over(&self) {
        if let Some(thread) = self.sole_thread() {
            thread.step_over();
        }
    }

    pub fn step_return(&self) {
        if let Some(thread) = self.sole_thread() {
            thread.step_return();
        }
    }

    /// Terminate the whole model tree. Runs once, later calls do nothing.
    pub(crate) fn cleanup_on_termination(&self) {
        let _guard = self.event_lock.lock();
        let dispatcher = self.session.dispatcher.lock().take();
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        if dispatcher.is_none() {
            log::debug!(target: "model", "terminate detached session {}", self.session.id);
        }

        if let Some(listener_id) = self.breakpoint_listener.lock().take() {
            self.session.breakpoints.remove_listener(listener_id);
        }

        if let Some(process) = self.process() {
            for thread in process.threads() {
                thread.set_terminated();
            }
            process.set_terminated();
        }
        self.session.scripts.lock().clear();

        log::debug!(target: "model", "debug session {} terminated", self.session.id);
        if let Some(this) = self.this.upgrade() {
            self.hook().on_terminate(&ModelElement::Target(this));
        }
    }

    fn ensure_process(&self) -> Arc<Process> {
        let (process, created) = {
            let mut process = self.process.lock();
            match process.as_ref() {
                Some(process) => (process.clone(), false),
                None => {
                    let new_process = Process::new(self.this.clone());
                    *process = Some(new_process.clone());
                    (new_process, true)
                }
            }
        };

        if created {
            if let Some(element) = process.as_element() {
                self.hook().on_create(&element);
            }
        }
        process
    }

    fn find_or_create_thread(&self, handle: &ThreadHandle) -> Arc<Thread> {
        self.ensure_process().find_or_create_thread(handle).0
    }

    /// Drop dynamic code frames unless they are enabled for the session.
    fn filter_frames(&self, frames: Vec<CallFrame>) -> Vec<CallFrame> {
        if self.session.config.show_dynamic_code {
            return frames;
        }
        frames
            .into_iter()
            .filter(|frame| !frame.script().is_dynamic())
            .collect()
    }

    pub(crate) fn register_script(&self, script: &Script) {
        self.session.scripts.lock().register(script);
    }

    /// Send every registered breakpoint of a script resource to the interpreter.
    pub(crate) fn apply_deferred_breakpoints(&self, script: &Script) {
        let Some(resource) = script.resource() else {
            return;
        };
        for breakpoint in self.session.breakpoints.breakpoints_for(resource) {
            self.post(ModelRequest::Breakpoint {
                script: script.clone(),
                breakpoint,
                mode: BreakpointMode::Add,
            });
        }
    }

    /// Find a loaded script for a resource: registry first, then frames of all threads.
    fn resolve_script(&self, breakpoint: &Breakpoint) -> Option<Script> {
        let resource = breakpoint.resource();
        if let Some(script) = self.session.scripts.lock().lookup(resource) {
            return Some(script.clone());
        }

        self.threads()
            .iter()
            .flat_map(|thread| thread.current_frames())
            .map(|frame| frame.script().clone())
            .find(|script| script.resource() == Some(resource))
    }

    fn handle_breakpoint_change(&self, breakpoint: &Breakpoint, modes: &[BreakpointMode]) {
        let _guard = self.event_lock.lock();
        if self.is_terminated() {
            return;
        }

        match self.resolve_script(breakpoint) {
            Some(script) => {
                for &mode in modes {
                    self.post(ModelRequest::Breakpoint {
                        script: script.clone(),
                        breakpoint: breakpoint.clone(),
                        mode,
                    });
                }
            }
            None => {
                event_trace!(target: "model", "breakpoint {breakpoint:?} not routed, script not loaded")
            }
        }
    }
}

impl BreakpointListener for DebugTarget {
    fn breakpoint_added(&self, breakpoint: &Breakpoint) {
        self.handle_breakpoint_change(breakpoint, &[BreakpointMode::Add]);
    }

    fn breakpoint_removed(&self, breakpoint: &Breakpoint) {
        self.handle_breakpoint_change(breakpoint, &[BreakpointMode::Remove]);
    }

    fn breakpoint_changed(&self, breakpoint: &Breakpoint) {
        self.handle_breakpoint_change(breakpoint, &[BreakpointMode::Remove, BreakpointMode::Add]);
    }
}

impl EventProcessor<DebuggerEvent> for DebugTarget {
    fn set_dispatcher(&self, dispatcher: Option<DispatcherHandle>) {
        *self.session.dispatcher.lock() = dispatcher;
    }

    fn handle_event(&self, event: DebuggerEvent) {
        let _guard = self.event_lock.lock();
        if !self.session.is_attached() {
            return;
        }
        event_trace!(target: "model", "process {event}");

        match event {
            DebuggerEvent::EngineStarted => {
                self.ensure_process();
            }
            DebuggerEvent::ScriptReady {
                script,
                thread,
                root,
            } => {
                self.ensure_process().on_script_ready(&script, &thread, root);
            }
            DebuggerEvent::ThreadCreated { thread } => {
                self.ensure_process().on_thread_created(&thread);
            }
            DebuggerEvent::ThreadTerminated { thread } => {
                self.ensure_process().on_thread_terminated(&thread);
            }
            DebuggerEvent::Suspended {
                thread,
                reason,
                frames,
            } => {
                let frames = self.filter_frames(frames);
                self.find_or_create_thread(&thread).on_suspended(reason, frames);
            }
            DebuggerEvent::Resumed { thread, kind } => {
                self.find_or_create_thread(&thread).on_resumed(kind);
            }
            DebuggerEvent::StackFrames { thread, frames } => {
                let frames = self.filter_frames(frames);
                self.find_or_create_thread(&thread).set_stack_frames(frames);
            }
            DebuggerEvent::Variables { frame, variables } => {
                frame.set_variables(variables);
            }
            DebuggerEvent::EvaluateExpression {
                expression,
                frame,
                result,
                listener,
            } => {
                if self.has_threads() {
                    let result = WatchExpressionResult::new(expression, result, Parent::from(&frame));
                    listener.watch_evaluation_finished(result);
                }
            }
            DebuggerEvent::EngineTerminated => self.cleanup_on_termination(),
        }
    }
}
