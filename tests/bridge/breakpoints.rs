use crate::common::{ManualSession, RequestRecorder};
use scriptbridge::breakpoint::{Breakpoint, BreakpointManager};
use scriptbridge::config::LaunchConfig;
use scriptbridge::dispatcher::Dispatcher;
use scriptbridge::event::{BreakpointMode, DebuggerEvent, ModelRequest, SuspendReason};
use scriptbridge::model::DebugTargetBuilder;
use scriptbridge::script::{CallFrame, Script, ThreadHandle};
use std::sync::Arc;

fn breakpoint_requests(session: &ManualSession) -> Vec<(Script, Breakpoint, BreakpointMode)> {
    session
        .requests
        .take()
        .into_iter()
        .filter_map(|request| match request {
            ModelRequest::Breakpoint {
                script,
                breakpoint,
                mode,
            } => Some((script, breakpoint, mode)),
            _ => None,
        })
        .collect()
}

fn session_with_script(resource: &str) -> (ManualSession, Script) {
    let session = ManualSession::new(LaunchConfig::default());
    let script = Script::from_file(resource);
    session.send(DebuggerEvent::EngineStarted);
    session.send(DebuggerEvent::ScriptReady {
        script: script.clone(),
        thread: ThreadHandle::new("main"),
        root: true,
    });
    session.requests.take();
    (session, script)
}

#[test]
fn test_breakpoint_routing() {
    let (session, s1) = session_with_script("/ws/s1.js");
    let breakpoints = session.target.breakpoints().clone();

    let bp = Breakpoint::new("/ws/s1.js", 3);
    breakpoints.add(&bp);
    session.pump();
    let requests = breakpoint_requests(&session);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, s1);
    assert_eq!(requests[0].1, bp);
    assert_eq!(requests[0].2, BreakpointMode::Add);

    // s2 is not loaded
    breakpoints.add(&Breakpoint::new("/ws/s2.js", 3));
    breakpoints.add(&Breakpoint::new("/ws/other.js", 1));
    session.pump();
    assert!(session.requests.take().is_empty());

    assert!(breakpoints.remove(&bp));
    session.pump();
    let requests = breakpoint_requests(&session);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].2, BreakpointMode::Remove);
}

#[test]
fn test_breakpoint_change_is_remove_then_add() {
    let (session, _) = session_with_script("/ws/s1.js");
    let breakpoints = session.target.breakpoints().clone();
    let bp = Breakpoint::new("/ws/s1.js", 3);
    breakpoints.add(&bp);
    session.pump();
    session.requests.take();

    breakpoints.set_enabled(&bp, false);
    session.pump();
    assert!(!bp.is_enabled());
    let modes: Vec<_> = breakpoint_requests(&session)
        .into_iter()
        .map(|(_, _, mode)| mode)
        .collect();
    assert_eq!(modes, vec![BreakpointMode::Remove, BreakpointMode::Add]);

    // no change, no notification
    breakpoints.set_enabled(&bp, false);
    session.pump();
    assert!(session.requests.take().is_empty());
}

#[test]
fn test_breakpoint_resolved_by_frames() {
    let session = ManualSession::new(LaunchConfig::default());
    let script = Script::from_file("/ws/inline.js");
    session.send(DebuggerEvent::EngineStarted);
    session.send(DebuggerEvent::Suspended {
        thread: ThreadHandle::new("main"),
        reason: SuspendReason::ClientRequest,
        frames: vec![CallFrame::file(script.clone(), 4)],
    });
    session.requests.take();

    session
        .target
        .breakpoints()
        .add(&Breakpoint::new("/ws/inline.js", 9));
    session.pump();
    let requests = breakpoint_requests(&session);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, script);
}

#[test]
fn test_deferred_breakpoints() {
    let breakpoints = BreakpointManager::new();
    let early = Breakpoint::new("/ws/lib.js", 10);
    breakpoints.add(&early);

    let requests = Arc::new(RequestRecorder::default());
    let target = DebugTargetBuilder::new()
        .with_breakpoints(breakpoints.clone())
        .build();
    let dispatcher = Dispatcher::manual(target.clone(), requests.clone());
    let handle = dispatcher.handle();

    let late = Breakpoint::new("/ws/lib.js", 20);
    breakpoints.add(&late);
    dispatcher.pump();
    assert!(requests.take().is_empty());

    let lib = Script::from_file("/ws/lib.js");
    handle.post(DebuggerEvent::EngineStarted);
    handle.post(DebuggerEvent::ScriptReady {
        script: lib.clone(),
        thread: ThreadHandle::new("main"),
        root: false,
    });
    dispatcher.pump();

    let names = requests.take_names();
    assert_eq!(names.len(), 3);
    assert!(names[0].starts_with("breakpoint request: add"));
    assert!(names[1].starts_with("breakpoint request: add"));
    assert_eq!(names[2], "resume request: main (CLIENT_REQUEST)");
}

#[test]
fn test_unsubscribed_after_termination() {
    let (session, _) = session_with_script("/ws/s1.js");
    let breakpoints = session.target.breakpoints().clone();
    assert_eq!(breakpoints.listener_count(), 1);

    session.send(DebuggerEvent::EngineTerminated);
    assert_eq!(breakpoints.listener_count(), 0);

    breakpoints.add(&Breakpoint::new("/ws/s1.js", 1));
    session.pump();
    assert!(session.requests.take().is_empty());
}

#[test]
fn test_shared_manager_outlives_target() {
    let breakpoints = BreakpointManager::new();
    {
        let _target = DebugTargetBuilder::new()
            .with_breakpoints(breakpoints.clone())
            .build();
        assert_eq!(breakpoints.listener_count(), 1);
    }
    breakpoints.add(&Breakpoint::new("/ws/s1.js", 1));
    assert_eq!(breakpoints.listener_count(), 0);
    assert_eq!(breakpoints.breakpoints().len(), 1);
}
