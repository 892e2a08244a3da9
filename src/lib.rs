//! Debug bridge for scripting hosts.
//!
//! A running interpreter reports execution events (script ready, suspended, resumed, ...)
//! through an ordered [`dispatcher::Dispatcher`]. The [`model::DebugTarget`] turns them into
//! a queryable tree of process, threads, stack frames and variables for a debugging front end.
//! Every user command issued against that tree travels back to the interpreter as a request
//! event, [`runtime::ScriptDebugger`] is the generic interpreter-side peer serving them.

pub mod breakpoint;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod log;
pub mod model;
pub mod runtime;
pub mod script;

pub use error::Error;
