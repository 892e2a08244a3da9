use crate::event::{ModelRequest, ResumeKind};
use crate::model::hook::{ChangeDetail, ModelElement};
use crate::model::thread::Thread;
use crate::model::DebugTarget;
use crate::script::{Script, ThreadHandle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};

struct ProcessInner {
    threads: Vec<Arc<Thread>>,
    attributes: HashMap<String, String>,
    terminated: bool,
}

/// Running script execution as a whole, owner of all threads.
pub struct Process {
    this: Weak<Process>,
    target: Weak<DebugTarget>,
    inner: Mutex<ProcessInner>,
}

impl Process {
    pub(crate) fn new(target: Weak<DebugTarget>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            target,
            inner: Mutex::new(ProcessInner {
                threads: vec![],
                attributes: HashMap::new(),
                terminated: false,
            }),
        })
    }

    pub fn target(&self) -> Option<Arc<DebugTarget>> {
        self.target.upgrade()
    }

    pub fn label(&self) -> &'static str {
        "virtual script process"
    }

    pub fn exit_value(&self) -> i32 {
        0
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.inner.lock().attributes.get(key).cloned()
    }

    /// Set a process attribute, a state change is fired if the value differs.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let previous = self.inner.lock().attributes.insert(key.into(), value.clone());
        if previous.as_ref() == Some(&value) {
            return;
        }
        if let (Some(target), Some(element)) = (self.target(), self.as_element()) {
            target.hook().on_change(&element, ChangeDetail::State);
        }
    }

    pub fn threads(&self) -> Vec<Arc<Thread>> {
        self.inner.lock().threads.clone()
    }

    pub fn live_thread_count(&self) -> usize {
        self.inner
            .lock()
            .threads
            .iter()
            .filter(|thread| !thread.is_terminated())
            .count()
    }

    pub fn find_thread(&self, handle: &ThreadHandle) -> Option<Arc<Thread>> {
        self.inner
            .lock()
            .threads
            .iter()
            .find(|thread| thread.handle() == handle)
            .cloned()
    }

    /// Register a new thread for a handle and fire a creation notification.
    ///
    /// Callers look the handle up with [`Process::find_thread`] first, use
    /// [`Process::find_or_create_thread`] to do both.
    pub fn create_thread(&self, handle: ThreadHandle) -> Arc<Thread> {
        let thread = Thread::new(self.target.clone(), handle);
        self.inner.lock().threads.push(thread.clone());

        if let Some(target) = self.target() {
            target.hook().on_create(&ModelElement::Thread(thread.clone()));
        }
        thread
    }

    /// Return the thread for a handle, creating it on first sight. Second element of the
    /// result is `true` if the thread was created.
    pub fn find_or_create_thread(&self, handle: &ThreadHandle) -> (Arc<Thread>, bool) {
        match self.find_thread(handle) {
            Some(thread) => (thread, false),
            None => (self.create_thread(handle.clone()), true),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.lock().terminated
    }

    pub fn can_terminate(&self) -> bool {
        !self.is_terminated()
    }

    pub fn terminate(&self) {
        if let Some(target) = self.target() {
            target.post(ModelRequest::Terminate);
        }
    }

    pub(crate) fn set_terminated(&self) {
        self.inner.lock().terminated = true;
    }

    /// A tracked script is ready to run on an interpreter thread that waits for resume.
    pub(crate) fn on_script_ready(&self, script: &Script, handle: &ThreadHandle, root: bool) {
        let Some(target) = self.target() else {
            return;
        };

        let (thread, created) = self.find_or_create_thread(handle);
        if !created {
            target
                .hook()
                .on_change(&ModelElement::Thread(thread.clone()), ChangeDetail::Content);
        }

        target.register_script(script);
        target.apply_deferred_breakpoints(script);

        let config = target.config();
        let stop_on_load =
            config.suspend_on_script_load && (config.show_dynamic_code || !script.is_dynamic());
        let kind = if stop_on_load || (root && config.suspend_on_startup) {
            ResumeKind::StepInto
        } else if thread.is_stepping() {
            ResumeKind::Unspecified
        } else {
            ResumeKind::ClientRequest
        };
        thread.request_resume(kind);
    }

    pub(crate) fn on_thread_created(&self, handle: &ThreadHandle) {
        self.find_or_create_thread(handle);
    }

    pub(crate) fn on_thread_terminated(&self, handle: &ThreadHandle) {
        let (thread, _) = self.find_or_create_thread(handle);
        if thread.set_terminated() {
            if let Some(target) = self.target() {
                target.hook().on_terminate(&ModelElement::Thread(thread));
            }
        }
    }

    pub(crate) fn as_element(&self) -> Option<ModelElement> {
        self.this.upgrade().map(ModelElement::Process)
    }
}

impl Display for Process {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
