//! Session-scoped state of a debug target.

use crate::breakpoint::BreakpointManager;
use crate::config::LaunchConfig;
use crate::dispatcher::DispatcherHandle;
use crate::event::ModelRequest;
use crate::event_trace;
use crate::model::hook::EventHook;
use crate::model::value::RawValue;
use crate::script::ScriptRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Unique debug session handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Display ids of runtime objects, by identity.
///
/// Objects that got an id are kept alive until the session ends, so that an identity is
/// never reused by another object.
#[derive(Default)]
pub struct ObjectIds {
    ids: HashMap<usize, u32>,
    keep_alive: Vec<RawValue>,
}

impl ObjectIds {
    /// Return the id of a string or object value. First seen value gets the next sequential id.
    pub fn id_of(&mut self, value: &RawValue) -> Option<u32> {
        let identity = value.identity()?;
        let next_id = self.ids.len() as u32;
        let id = *self.ids.entry(identity).or_insert_with(|| {
            self.keep_alive.push(value.clone());
            next_id
        });
        Some(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.keep_alive.clear();
    }
}

pub(crate) struct Session {
    pub(crate) id: SessionId,
    pub(crate) config: LaunchConfig,
    pub(crate) dispatcher: Mutex<Option<DispatcherHandle>>,
    pub(crate) object_ids: Mutex<ObjectIds>,
    pub(crate) scripts: Mutex<ScriptRegistry>,
    pub(crate) breakpoints: Arc<BreakpointManager>,
    pub(crate) hook: Box<dyn EventHook>,
}

impl Session {
    pub(crate) fn new(
        config: LaunchConfig,
        breakpoints: Arc<BreakpointManager>,
        hook: Box<dyn EventHook>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            config,
            dispatcher: Mutex::default(),
            object_ids: Mutex::default(),
            scripts: Mutex::default(),
            breakpoints,
            hook,
        }
    }

    /// Enqueue a request for the interpreter side. Dropped if the session is not attached
    /// to a dispatcher (not started yet or already terminated).
    pub(crate) fn post(&self, request: ModelRequest) {
        match self.dispatcher.lock().as_ref() {
            Some(dispatcher) => dispatcher.post(request),
            None => event_trace!(target: "model", "drop {request}, session detached"),
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.dispatcher.lock().is_some()
    }
}
