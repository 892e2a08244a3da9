use crate::common::{ManualSession, Note};
use scriptbridge::config::LaunchConfig;
use scriptbridge::event::{DebuggerEvent, ResumeKind, SuspendReason};
use scriptbridge::model::{ChangeDetail, ThreadState};
use scriptbridge::script::{CallFrame, Script, ThreadHandle};
use scriptbridge::Error;
use std::sync::Arc;

fn started(config: LaunchConfig) -> ManualSession {
    let session = ManualSession::new(config);
    session.send(DebuggerEvent::EngineStarted);
    session
}

#[test]
fn test_frame_identity_reuse() {
    let session = started(LaunchConfig::default());
    let main = ThreadHandle::new("main");
    let script = Script::from_file("/ws/main.js");
    let a = CallFrame::function(script.clone(), 5, "a");
    let b = CallFrame::function(script.clone(), 12, "b");
    let c = CallFrame::file(script.clone(), 30);

    session.send(DebuggerEvent::Suspended {
        thread: main.clone(),
        reason: SuspendReason::Breakpoint,
        frames: vec![a.clone(), b.clone(), c.clone()],
    });
    let thread = session.target.threads()[0].clone();
    let before = thread.stack_frames();
    assert_eq!(before.len(), 3);
    assert_eq!(before[0].name(), "a");
    assert_eq!(before[2].name(), "main.js");

    // b moved to another line, a returned and d was called
    b.set_line(13);
    let d = CallFrame::function(script, 20, "d");
    session.info.clear();
    session.send(DebuggerEvent::Suspended {
        thread: main,
        reason: SuspendReason::StepEnd,
        frames: vec![d, b, c],
    });

    let after = thread.stack_frames();
    assert_eq!(after.len(), 3);
    assert!(Arc::ptr_eq(&before[1], &after[1]));
    assert!(Arc::ptr_eq(&before[2], &after[2]));
    assert!(!Arc::ptr_eq(&before[0], &after[0]));
    assert_eq!(after[1].line_number(), 13);
    assert!(after[1].is_dirty());

    let notes = session.info.notes();
    assert!(notes.contains(&Note::Terminate("Frame(a:5)".to_string())));
    assert!(notes.contains(&Note::Create("Frame(d:20)".to_string())));
    assert!(notes.contains(&Note::Change(
        "Thread(Thread: main)".to_string(),
        ChangeDetail::Content
    )));
    assert_eq!(
        notes
            .iter()
            .filter(|n| matches!(n, Note::Terminate(_)))
            .count(),
        1
    );
}

#[test]
fn test_step_over_round_trip() {
    let session = started(LaunchConfig::default());
    let main = ThreadHandle::new("main");
    let script = Script::from_file("/ws/main.js");
    let top = CallFrame::file(script, 3);

    session.send(DebuggerEvent::Suspended {
        thread: main.clone(),
        reason: SuspendReason::Breakpoint,
        frames: vec![top.clone()],
    });
    let thread = session.target.threads()[0].clone();
    let frame = thread.top_stack_frame().unwrap();
    session.requests.take();

    assert!(thread.can_step_over());
    thread.step_over();
    assert!(thread.is_suspended());
    session.pump();
    assert!(thread.is_suspended());
    assert!(!thread.is_stepping());
    assert_eq!(
        session.requests.take_names(),
        vec!["resume request: main (STEP_OVER)"]
    );

    session.send(DebuggerEvent::Resumed {
        thread: main.clone(),
        kind: ResumeKind::StepOver,
    });
    assert!(thread.is_stepping());
    assert!(!thread.can_step_over());
    assert_eq!(session.info.count(&Note::Resume("Thread: main".to_string(), ResumeKind::StepOver)), 1);

    top.set_line(4);
    session.send(DebuggerEvent::Suspended {
        thread: main,
        reason: SuspendReason::StepEnd,
        frames: vec![top],
    });
    assert_eq!(thread.state(), ThreadState::Suspended);
    assert_eq!(thread.suspend_reason(), Some(SuspendReason::StepEnd));
    let frames = thread.stack_frames();
    assert_eq!(frames.len(), 1);
    assert!(Arc::ptr_eq(&frame, &frames[0]));
    assert_eq!(frames[0].line_number(), 4);
}

#[test]
fn test_single_thread_termination_guard() {
    let session = started(LaunchConfig::default());
    let main = ThreadHandle::new("main");
    let worker = ThreadHandle::new("worker");

    session.send(DebuggerEvent::ThreadCreated {
        thread: main.clone(),
    });
    let main_thread = session.target.threads()[0].clone();
    assert!(main_thread.can_terminate());

    session.send(DebuggerEvent::ThreadCreated {
        thread: worker.clone(),
    });
    let worker_thread = session.target.process().unwrap().find_thread(&worker).unwrap();
    assert!(!main_thread.can_terminate());
    assert!(!worker_thread.can_terminate());
    assert!(matches!(
        main_thread.terminate(),
        Err(Error::TerminateUnsupported(_))
    ));

    session.send(DebuggerEvent::ThreadTerminated { thread: worker });
    assert!(worker_thread.is_terminated());
    assert!(main_thread.can_terminate());
    assert_eq!(
        session
            .info
            .count(&Note::Terminate("Thread(Thread: worker)".to_string())),
        1
    );

    session.requests.take();
    main_thread.terminate().unwrap();
    session.pump();
    assert_eq!(session.requests.take_names(), vec!["terminate request"]);
}

#[test]
fn test_script_ready_resumes_automatically() {
    let session = started(LaunchConfig::default());
    let main = ThreadHandle::new("main");

    session.send(DebuggerEvent::ScriptReady {
        script: Script::from_file("/ws/main.js"),
        thread: main.clone(),
        root: true,
    });
    assert_eq!(
        session.requests.take_names(),
        vec!["resume request: main (CLIENT_REQUEST)"]
    );

    // stepping thread keeps its step mode
    session.send(DebuggerEvent::Resumed {
        thread: main.clone(),
        kind: ResumeKind::StepInto,
    });
    session.send(DebuggerEvent::ScriptReady {
        script: Script::from_file("/ws/lib.js"),
        thread: main,
        root: false,
    });
    assert_eq!(
        session.requests.take_names(),
        vec!["resume request: main (UNSPECIFIED)"]
    );
}

#[test]
fn test_script_ready_suspend_options() {
    let on_startup = started(LaunchConfig {
        suspend_on_startup: true,
        ..LaunchConfig::default()
    });
    let main = ThreadHandle::new("main");
    on_startup.send(DebuggerEvent::ScriptReady {
        script: Script::from_file("/ws/main.js"),
        thread: main.clone(),
        root: true,
    });
    on_startup.send(DebuggerEvent::ScriptReady {
        script: Script::from_file("/ws/lib.js"),
        thread: main.clone(),
        root: false,
    });
    assert_eq!(
        on_startup.requests.take_names(),
        vec![
            "resume request: main (STEP_INTO)",
            "resume request: main (CLIENT_REQUEST)"
        ]
    );

    let on_load = started(LaunchConfig {
        suspend_on_script_load: true,
        ..LaunchConfig::default()
    });
    on_load.send(DebuggerEvent::ScriptReady {
        script: Script::from_file("/ws/lib.js"),
        thread: main.clone(),
        root: false,
    });
    on_load.send(DebuggerEvent::ScriptReady {
        script: Script::dynamic("wrapper"),
        thread: main.clone(),
        root: false,
    });
    assert_eq!(
        on_load.requests.take_names(),
        vec![
            "resume request: main (STEP_INTO)",
            "resume request: main (CLIENT_REQUEST)"
        ]
    );
}

#[test]
fn test_lazy_stack_frames() {
    let session = started(LaunchConfig::default());
    let main = ThreadHandle::new("main");
    let script = Script::from_file("/ws/main.js");

    session.send(DebuggerEvent::Suspended {
        thread: main.clone(),
        reason: SuspendReason::ClientRequest,
        frames: vec![],
    });
    let thread = session.target.threads()[0].clone();
    session.requests.take();

    assert!(thread.stack_frames().is_empty());
    session.pump();
    assert_eq!(
        session.requests.take_names(),
        vec!["stack frames request: main"]
    );

    session.send(DebuggerEvent::StackFrames {
        thread: main,
        frames: vec![CallFrame::file(script, 7)],
    });
    assert!(thread.is_suspended());
    assert_eq!(thread.top_stack_frame().unwrap().line_number(), 7);
    assert!(session.requests.take().is_empty());
}

#[test]
fn test_dynamic_frames_hidden() {
    let main = ThreadHandle::new("main");
    let script = Script::from_file("/ws/main.js");
    let frames = vec![
        CallFrame::function(Script::dynamic("wrapper"), 1, "eval"),
        CallFrame::file(script, 2),
    ];

    let hidden = started(LaunchConfig::default());
    hidden.send(DebuggerEvent::Suspended {
        thread: main.clone(),
        reason: SuspendReason::Breakpoint,
        frames: frames.clone(),
    });
    assert_eq!(hidden.target.threads()[0].stack_frames().len(), 1);

    let shown = started(LaunchConfig {
        show_dynamic_code: true,
        ..LaunchConfig::default()
    });
    shown.send(DebuggerEvent::Suspended {
        thread: main,
        reason: SuspendReason::Breakpoint,
        frames,
    });
    assert_eq!(shown.target.threads()[0].stack_frames().len(), 2);
}

#[test]
fn test_target_delegates_to_sole_thread() {
    let session = started(LaunchConfig::default());
    let main = ThreadHandle::new("main");
    assert!(!session.target.can_resume());

    session.send(DebuggerEvent::Suspended {
        thread: main.clone(),
        reason: SuspendReason::Breakpoint,
        frames: vec![CallFrame::file(Script::from_file("/ws/main.js"), 1)],
    });
    session.requests.take();
    assert!(session.target.is_suspended());
    assert!(session.target.can_resume() && session.target.can_step_into());
    session.target.step_into();
    session.pump();
    assert_eq!(
        session.requests.take_names(),
        vec!["resume request: main (STEP_INTO)"]
    );

    session.send(DebuggerEvent::ThreadCreated {
        thread: ThreadHandle::new("worker"),
    });
    assert!(!session.target.can_resume());
    session.target.resume();
    session.pump();
    assert!(session.requests.take().is_empty());
}

#[test]
fn test_terminated_thread_ignores_late_frames() {
    let session = started(LaunchConfig::default());
    let main = ThreadHandle::new("main");
    let script = Script::from_file("/ws/main.js");

    session.send(DebuggerEvent::Suspended {
        thread: main.clone(),
        reason: SuspendReason::Breakpoint,
        frames: vec![CallFrame::file(script.clone(), 1)],
    });
    session.send(DebuggerEvent::ThreadTerminated {
        thread: main.clone(),
    });
    let thread = session.target.threads()[0].clone();
    assert!(thread.is_terminated());
    assert!(!thread.has_stack_frames());

    session.info.clear();
    session.send(DebuggerEvent::StackFrames {
        thread: main,
        frames: vec![CallFrame::file(script, 2)],
    });
    assert_eq!(thread.state(), ThreadState::Terminated);
    assert!(!thread.has_stack_frames());
    assert!(session.info.notes().is_empty());
}

#[test]
fn test_unseen_thread_terminated() {
    let session = started(LaunchConfig::default());
    let worker = ThreadHandle::new("worker");

    session.send(DebuggerEvent::ThreadTerminated {
        thread: worker.clone(),
    });
    let threads = session.target.threads();
    assert_eq!(threads.len(), 1);
    assert!(threads[0].is_terminated());
    assert_eq!(
        session.info.count(&Note::Create("Thread(Thread: worker)".to_string())),
        1
    );
    assert_eq!(
        session
            .info
            .count(&Note::Terminate("Thread(Thread: worker)".to_string())),
        1
    );

    session.send(DebuggerEvent::ThreadTerminated { thread: worker });
    assert_eq!(session.target.threads().len(), 1);
    assert_eq!(
        session
            .info
            .count(&Note::Terminate("Thread(Thread: worker)".to_string())),
        1
    );
}
