//! Ordered asynchronous event queue between the interpreter side and the debug model.

use crate::event::{DebuggerEvent, DispatchEvent, ModelRequest};
use crate::{event_trace, weak_error};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Consumer of dispatched events.
pub trait EventProcessor<E>: Send + Sync {
    /// Attach to (or, with `None`, detach from) a dispatcher. Processors post their own
    /// events through the handle.
    fn set_dispatcher(&self, dispatcher: Option<DispatcherHandle>);

    fn handle_event(&self, event: E);
}

enum Envelope {
    Event(DispatchEvent),
    Shutdown,
}

/// Producer side of the dispatcher queue. Cheap to clone.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: Sender<Envelope>,
}

impl DispatcherHandle {
    /// Enqueue an event. Never blocks and never runs a handler on the caller's stack,
    /// does nothing if the dispatcher is already shut down.
    pub fn post(&self, event: impl Into<DispatchEvent>) {
        let event = event.into();
        event_trace!(target: "dispatcher", "queue {event}");
        _ = self.tx.send(Envelope::Event(event));
    }
}

struct Routes {
    model: Arc<dyn EventProcessor<DebuggerEvent>>,
    runtime: Arc<dyn EventProcessor<ModelRequest>>,
}

impl Routes {
    fn route(&self, event: DispatchEvent) {
        event_trace!(target: "dispatcher", "route {event}");

        let result = catch_unwind(AssertUnwindSafe(|| match event {
            DispatchEvent::Debugger(event) => self.model.handle_event(event),
            DispatchEvent::Request(request) => self.runtime.handle_event(request),
        }));

        if let Err(panic) = result {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!(target: "dispatcher", "event handler panicked: {msg}");
        }
    }
}

enum Mode {
    Threaded(Option<JoinHandle<()>>),
    Manual {
        rx: Mutex<Option<Receiver<Envelope>>>,
        routes: Routes,
    },
}

/// Event dispatcher. Events are delivered one at a time, in submission order.
///
/// Interpreter events are routed to the model processor, model requests to the runtime
/// processor.
pub struct Dispatcher {
    handle: DispatcherHandle,
    mode: Mode,
}

impl Dispatcher {
    /// Create a dispatcher that runs its loop on a dedicated thread.
    pub fn spawn(
        model: Arc<dyn EventProcessor<DebuggerEvent>>,
        runtime: Arc<dyn EventProcessor<ModelRequest>>,
    ) -> std::io::Result<Self> {
        let (tx, rx) = channel();
        let handle = DispatcherHandle { tx };
        let routes = Self::attach(&handle, model, runtime);

        let join_handle = std::thread::Builder::new()
            .name("event-dispatcher".to_string())
            .spawn(move || {
                while let Ok(Envelope::Event(event)) = rx.recv() {
                    routes.route(event);
                }
                log::debug!(target: "dispatcher", "dispatch loop stopped");
            })?;

        Ok(Self {
            handle,
            mode: Mode::Threaded(Some(join_handle)),
        })
    }

    /// Create a dispatcher whose queue is drained by the owner with [`Dispatcher::pump`].
    pub fn manual(
        model: Arc<dyn EventProcessor<DebuggerEvent>>,
        runtime: Arc<dyn EventProcessor<ModelRequest>>,
    ) -> Self {
        let (tx, rx) = channel();
        let handle = DispatcherHandle { tx };
        let routes = Self::attach(&handle, model, runtime);

        Self {
            handle,
            mode: Mode::Manual {
                rx: Mutex::new(Some(rx)),
                routes,
            },
        }
    }

    fn attach(
        handle: &DispatcherHandle,
        model: Arc<dyn EventProcessor<DebuggerEvent>>,
        runtime: Arc<dyn EventProcessor<ModelRequest>>,
    ) -> Routes {
        model.set_dispatcher(Some(handle.clone()));
        runtime.set_dispatcher(Some(handle.clone()));
        Routes { model, runtime }
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    /// Process queued events, including events queued by handlers while pumping.
    /// Returns the number of processed events. Always 0 for a threaded dispatcher.
    pub fn pump(&self) -> usize {
        let Mode::Manual { rx, routes } = &self.mode else {
            return 0;
        };

        let mut rx = rx.lock();
        let mut processed = 0;
        while let Some(receiver) = rx.as_ref() {
            match receiver.try_recv() {
                Ok(Envelope::Event(event)) => {
                    routes.route(event);
                    processed += 1;
                }
                // dropping the receiver turns later posts into no-ops
                Ok(Envelope::Shutdown) => *rx = None,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        processed
    }

    /// Stop dispatching. Events queued before the call are still delivered by a threaded
    /// dispatcher, a manual dispatcher stops at the shutdown marker.
    pub fn shutdown(&mut self) {
        _ = self.handle.tx.send(Envelope::Shutdown);
        if let Mode::Threaded(join_handle) = &mut self.mode {
            if let Some(join_handle) = join_handle.take() {
                if join_handle.thread().id() != std::thread::current().id() {
                    weak_error!(
                        target: "dispatcher",
                        join_handle
                            .join()
                            .map_err(|_| anyhow::anyhow!("dispatch thread panicked")),
                        "shutdown:"
                    );
                }
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
