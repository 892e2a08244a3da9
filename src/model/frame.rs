use crate::event::ModelRequest;
use crate::model::hook::{ChangeDetail, EventHook, ModelElement};
use crate::model::variable::Variable;
use crate::model::{DebugTarget, Parent, Thread};
use crate::script::{CallFrame, Script, ThreadHandle};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

struct FrameState {
    variables: Vec<Arc<Variable>>,
    dirty: bool,
}

/// One execution context of a suspended thread.
///
/// Identity of a stack frame is the identity of the call-frame descriptor it wraps,
/// the model keeps the same instance while the descriptor stays on the stack.
pub struct StackFrame {
    this: Weak<StackFrame>,
    thread: Weak<Thread>,
    thread_handle: ThreadHandle,
    descriptor: CallFrame,
    state: Mutex<FrameState>,
}

impl StackFrame {
    pub(crate) fn new(thread: &Arc<Thread>, descriptor: CallFrame) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            thread: Arc::downgrade(thread),
            thread_handle: thread.handle().clone(),
            descriptor,
            state: Mutex::new(FrameState {
                variables: vec![],
                dirty: true,
            }),
        })
    }

    pub fn thread(&self) -> Option<Arc<Thread>> {
        self.thread.upgrade()
    }

    pub fn thread_handle(&self) -> &ThreadHandle {
        &self.thread_handle
    }

    pub fn target(&self) -> Option<Arc<DebugTarget>> {
        self.thread()?.target()
    }

    pub fn descriptor(&self) -> &CallFrame {
        &self.descriptor
    }

    pub fn script(&self) -> &Script {
        self.descriptor.script()
    }

    pub fn line_number(&self) -> u32 {
        self.descriptor.line()
    }

    /// Frame name, a function name or the script title.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Current variables. A dirty frame requests fresh variables from the interpreter and
    /// returns the previous (possibly empty) list, new variables arrive with a content
    /// change notification.
    pub fn variables(&self) -> Vec<Arc<Variable>> {
        let (variables, dirty) = {
            let state = self.state.lock();
            (state.variables.clone(), state.dirty)
        };

        if dirty {
            if let (Some(this), Some(target)) = (self.this.upgrade(), self.target()) {
                target.post(ModelRequest::GetVariables { frame: this });
            }
        }
        variables
    }

    pub fn has_variables(&self) -> bool {
        !self.variables().is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Force variables re-fetch on next access.
    pub fn set_dirty(&self) {
        self.state.lock().dirty = true;
        self.fire_change(ChangeDetail::Content);
    }

    /// Merge variables reported by the interpreter.
    ///
    /// A known variable (same name) keeps its instance and gets the new value, so that its
    /// change flag reflects the difference. Unknown variables are adopted by this frame.
    pub fn set_variables(&self, variables: Vec<Arc<Variable>>) {
        let old_variables = self.state.lock().variables.clone();

        let mut merged = Vec::with_capacity(variables.len());
        for variable in variables {
            match old_variables.iter().find(|old| old.name() == variable.name()) {
                Some(existing) => {
                    existing.update(variable.value());
                    merged.push(existing.clone());
                }
                None => {
                    variable.set_parent(Parent::Frame(self.this.clone()));
                    merged.push(variable);
                }
            }
        }
        merged.sort_by(|v1, v2| v1.name().cmp(v2.name()));

        {
            let mut state = self.state.lock();
            state.variables = merged;
            state.dirty = false;
        }
        self.fire_change(ChangeDetail::Content);
    }

    pub(crate) fn fire_change(&self, detail: ChangeDetail) {
        self.notify(|hook, element| hook.on_change(element, detail));
    }

    pub(crate) fn fire_terminate(&self) {
        self.notify(|hook, element| hook.on_terminate(element));
    }

    pub(crate) fn fire_create(&self) {
        self.notify(|hook, element| hook.on_create(element));
    }

    fn notify(&self, f: impl FnOnce(&dyn EventHook, &ModelElement)) {
        let (Some(this), Some(target)) = (self.this.upgrade(), self.target()) else {
            return;
        };
        f(target.hook(), &ModelElement::Frame(this));
    }
}
