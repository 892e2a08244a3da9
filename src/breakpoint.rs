//! Host-side line breakpoints and their change notifications.

use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

struct BreakpointInner {
    resource: PathBuf,
    line: u32,
    enabled: AtomicBool,
}

/// Line breakpoint set by the user on a workspace resource.
#[derive(Clone)]
pub struct Breakpoint(Arc<BreakpointInner>);

impl PartialEq for Breakpoint {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Breakpoint {}

impl Breakpoint {
    pub fn new(resource: impl Into<PathBuf>, line: u32) -> Self {
        Self(Arc::new(BreakpointInner {
            resource: resource.into(),
            line,
            enabled: AtomicBool::new(true),
        }))
    }

    pub fn resource(&self) -> &Path {
        &self.0.resource
    }

    pub fn line(&self) -> u32 {
        self.0.line
    }

    pub fn is_enabled(&self) -> bool {
        self.0.enabled.load(Ordering::Acquire)
    }
}

impl Debug for Breakpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}{}",
            self.0.resource.display(),
            self.0.line,
            if self.is_enabled() { "" } else { " (disabled)" }
        )
    }
}

/// Subscriber for breakpoint changes.
pub trait BreakpointListener: Send + Sync {
    fn breakpoint_added(&self, breakpoint: &Breakpoint);

    fn breakpoint_removed(&self, breakpoint: &Breakpoint);

    /// Breakpoint attributes (like enabled flag) changed.
    fn breakpoint_changed(&self, breakpoint: &Breakpoint);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Registry of all breakpoints known to the host, shared across debug sessions.
#[derive(Default)]
pub struct BreakpointManager {
    breakpoints: Mutex<Vec<Breakpoint>>,
    listeners: Mutex<Vec<(ListenerId, Weak<dyn BreakpointListener>)>>,
    next_listener_id: AtomicU64,
}

impl BreakpointManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a breakpoint. Registering the same breakpoint twice does nothing.
    pub fn add(&self, breakpoint: &Breakpoint) {
        {
            let mut breakpoints = self.breakpoints.lock();
            if breakpoints.contains(breakpoint) {
                return;
            }
            breakpoints.push(breakpoint.clone());
        }
        self.notify(|l| l.breakpoint_added(breakpoint));
    }

    /// Unregister a breakpoint, return `false` if it was not registered.
    pub fn remove(&self, breakpoint: &Breakpoint) -> bool {
        let removed = {
            let mut breakpoints = self.breakpoints.lock();
            let len_before = breakpoints.len();
            breakpoints.retain(|bp| bp != breakpoint);
            len_before != breakpoints.len()
        };

        if removed {
            self.notify(|l| l.breakpoint_removed(breakpoint));
        }
        removed
    }

    /// Enable or disable a breakpoint. Listeners are notified only about real changes.
    pub fn set_enabled(&self, breakpoint: &Breakpoint, enabled: bool) {
        let prev = breakpoint.0.enabled.swap(enabled, Ordering::AcqRel);
        if prev != enabled && self.breakpoints.lock().contains(breakpoint) {
            self.notify(|l| l.breakpoint_changed(breakpoint));
        }
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.lock().clone()
    }

    /// All breakpoints set on a resource.
    pub fn breakpoints_for(&self, resource: &Path) -> Vec<Breakpoint> {
        self.breakpoints
            .lock()
            .iter()
            .filter(|bp| bp.resource() == resource)
            .cloned()
            .collect()
    }

    pub fn add_listener(&self, listener: Weak<dyn BreakpointListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(listener_id, _)| *listener_id != id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn notify(&self, f: impl Fn(&dyn BreakpointListener)) {
        // listeners are called without holding the lock, they are free to query the manager
        let listeners: Vec<_> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|(_, l)| l.strong_count() > 0);
            listeners.iter().filter_map(|(_, l)| l.upgrade()).collect()
        };

        for listener in listeners {
            f(listener.as_ref());
        }
    }
}
