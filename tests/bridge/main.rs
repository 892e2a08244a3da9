
mod breakpoints;
mod runtime;
mod threads;

use crate::common::{ManualSession, Note};
use scriptbridge::config::LaunchConfig;
use scriptbridge::event::DebuggerEvent;
use scriptbridge::script::{Script, ThreadHandle};

#[test]
fn test_process_created_once() {
    let session = ManualSession::new(LaunchConfig::default());
    assert!(session.target.process().is_none());
    assert_eq!(
        session.info.notes(),
        vec![Note::Create("Target(Script Debugger)".to_string())]
    );

    session.send(DebuggerEvent::EngineStarted);
    session.send(DebuggerEvent::EngineStarted);
    let process = session.target.process().unwrap();
    assert_eq!(process.label(), "virtual script process");
    assert_eq!(
        session
            .info
            .count(&Note::Create("Process(virtual script process)".to_string())),
        1
    );

    session.send(DebuggerEvent::ScriptReady {
        script: Script::from_file("/ws/main.js"),
        thread: ThreadHandle::new("main"),
        root: true,
    });
    assert!(std::sync::Arc::ptr_eq(
        &process,
        &session.target.process().unwrap()
    ));
}

#[test]
fn test_idempotent_termination() {
    let session = ManualSession::new(LaunchConfig::default());
    let main = ThreadHandle::new("main");
    session.send(DebuggerEvent::EngineStarted);
    session.send(DebuggerEvent::ThreadCreated {
        thread: main.clone(),
    });
    let thread = session.target.threads()[0].clone();

    session.send(DebuggerEvent::EngineTerminated);
    session.target.disconnect();
    session.send(DebuggerEvent::EngineTerminated);

    let target_terminated = Note::Terminate("Target(Script Debugger)".to_string());
    assert_eq!(session.info.count(&target_terminated), 1);
    assert!(session.target.is_terminated());
    assert!(session.target.is_disconnected());
    assert!(!session.target.can_terminate());
    assert!(thread.is_terminated());
    assert!(session.target.process().unwrap().is_terminated());
    assert_eq!(session.target.breakpoints().listener_count(), 0);

    // detached target drops requests
    session.requests.take();
    thread.resume();
    session.target.terminate();
    session.pump();
    assert!(session.requests.take().is_empty());
}

#[test]
fn test_disconnect() {
    let session = ManualSession::new(LaunchConfig::default());
    let main = ThreadHandle::new("main");
    let worker = ThreadHandle::new("worker");
    let script = Script::from_file("/ws/main.js");

    session.send(DebuggerEvent::EngineStarted);
    session.send(DebuggerEvent::ThreadCreated {
        thread: worker.clone(),
    });
    session.send(DebuggerEvent::Suspended {
        thread: main.clone(),
        reason: scriptbridge::event::SuspendReason::Breakpoint,
        frames: vec![scriptbridge::script::CallFrame::file(script, 2)],
    });
    session.requests.take();

    assert!(session.target.can_disconnect());
    session.target.disconnect();
    session.pump();

    assert_eq!(
        session.requests.take_names(),
        vec![
            "remove all breakpoints request",
            "resume request: main (CLIENT_REQUEST)",
            "disconnect request",
        ]
    );
    let target_terminated = Note::Terminate("Target(Script Debugger)".to_string());
    assert_eq!(session.info.count(&target_terminated), 1);

    session.send(DebuggerEvent::EngineTerminated);
    assert_eq!(session.info.count(&target_terminated), 1);
}

#[test]
fn test_memory_retrieval_unsupported() {
    let session = ManualSession::new(LaunchConfig::default());
    assert!(!session.target.supports_storage_retrieval());
    assert!(matches!(
        session.target.memory_block(0, 16),
        Err(scriptbridge::Error::MemoryRetrievalUnsupported("Script Debugger"))
    ));
}

#[test]
fn test_process_attribute_change() {
    let session = ManualSession::new(LaunchConfig::default());
    session.send(DebuggerEvent::EngineStarted);
    let process = session.target.process().unwrap();
    let changed = Note::Change(
        "Process(virtual script process)".to_string(),
        scriptbridge::model::ChangeDetail::State,
    );

    process.set_attribute("engine", "rhai");
    process.set_attribute("engine", "rhai");
    assert_eq!(process.attribute("engine").as_deref(), Some("rhai"));
    assert_eq!(session.info.count(&changed), 1);

    process.set_attribute("engine", "lua");
    assert_eq!(process.attribute("engine").as_deref(), Some("lua"));
    assert_eq!(session.info.count(&changed), 2);
}
