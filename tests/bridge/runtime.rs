use crate::common::{wait_until, FakeEngine, Note, Op, TestHooks, TestInfo};
use parking_lot::Mutex;
use scriptbridge::breakpoint::Breakpoint;
use scriptbridge::config::LaunchConfig;
use scriptbridge::dispatcher::Dispatcher;
use scriptbridge::event::SuspendReason;
use scriptbridge::model::{
    DebugTarget, DebugTargetBuilder, ModelElement, Thread, WatchExpressionDelegate,
    WatchExpressionResult, WatchListener,
};
use scriptbridge::runtime::ScriptDebugger;
use scriptbridge::script::Script;
use std::sync::Arc;
use std::thread::JoinHandle;

struct Run {
    target: Arc<DebugTarget>,
    engine: Arc<FakeEngine>,
    info: TestInfo,
    dispatcher: Dispatcher,
    interpreter: Option<JoinHandle<()>>,
}

impl Run {
    /// Start a debug session, `setup` runs before the interpreter thread is started.
    fn start(
        config: LaunchConfig,
        ops: Vec<Op>,
        setup: impl FnOnce(&Arc<DebugTarget>, &FakeEngine),
    ) -> Self {
        let info = TestInfo::default();
        let target = DebugTargetBuilder::new()
            .with_config(config)
            .with_hooks(TestHooks::new(info.clone()))
            .build();
        let engine = Arc::new(FakeEngine::default());
        let debugger = ScriptDebugger::new(engine.clone(), config);
        let dispatcher = Dispatcher::spawn(target.clone(), debugger.clone()).unwrap();
        setup(&target, &engine);

        let interpreter = {
            let engine = engine.clone();
            std::thread::Builder::new()
                .name("interpreter".to_string())
                .spawn(move || {
                    let script = Script::from_file("/ws/main.js");
                    engine.run(&debugger, &script, &ops);
                })
                .unwrap()
        };

        Self {
            target,
            engine,
            info,
            dispatcher,
            interpreter: Some(interpreter),
        }
    }

    fn thread(&self) -> Arc<Thread> {
        assert!(wait_until(|| self.target.has_threads()));
        self.target.threads()[0].clone()
    }

    fn wait_suspended(&self, thread: &Thread, reason: SuspendReason) {
        assert!(wait_until(
            || thread.is_suspended() && thread.suspend_reason() == Some(reason)
        ));
    }

    fn finish(mut self) -> (Arc<DebugTarget>, Arc<FakeEngine>, TestInfo) {
        assert!(wait_until(|| self.target.is_terminated()));
        if let Some(interpreter) = self.interpreter.take() {
            interpreter.join().unwrap();
        }
        self.dispatcher.shutdown();
        (self.target, self.engine, self.info)
    }
}

fn lines(range: std::ops::RangeInclusive<u32>) -> Vec<Op> {
    range.map(Op::Line).collect()
}

#[test]
fn test_run_to_end() {
    let run = Run::start(LaunchConfig::default(), lines(1..=5), |_, _| {});
    let (target, engine, info) = run.finish();

    assert!(target.process().unwrap().is_terminated());
    assert!(target.threads().iter().all(|t| t.is_terminated()));
    assert_eq!(
        engine.variables.lock().get("line"),
        Some(&scriptbridge::model::value::RawValue::from(5_i32))
    );
    assert_eq!(
        info.count(&Note::Terminate("Target(Script Debugger)".to_string())),
        1
    );
    assert!(!info
        .notes()
        .iter()
        .any(|note| matches!(note, Note::Suspend(_, _))));
}

#[test]
fn test_breakpoint_and_inspection() {
    let run = Run::start(LaunchConfig::default(), lines(1..=5), |target, engine| {
        engine.set("x", 10_i32);
        target.breakpoints().add(&Breakpoint::new("/ws/main.js", 3));
    });
    let thread = run.thread();
    run.wait_suspended(&thread, SuspendReason::Breakpoint);

    let frame = thread.top_stack_frame().unwrap();
    assert_eq!(frame.line_number(), 3);
    assert_eq!(frame.name(), "main.js");

    frame.variables();
    assert!(wait_until(|| !frame.is_dirty()));
    let names: Vec<_> = frame
        .variables()
        .iter()
        .map(|v| v.to_string())
        .collect();
    assert_eq!(names, vec!["line:2", "x:10"]);

    // watch expression
    let results = Arc::new(Mutex::new(vec![]));
    let listener: Arc<dyn WatchListener> = {
        let results = results.clone();
        Arc::new(move |result: WatchExpressionResult| results.lock().push(result))
    };
    let delegate = WatchExpressionDelegate::default();
    let context = ModelElement::Frame(frame.clone());
    delegate.evaluate("x", &context, listener.clone()).unwrap();
    delegate.evaluate("y", &context, listener).unwrap();
    assert!(wait_until(|| results.lock().len() == 2));
    {
        let results = results.lock();
        assert_eq!(results[0].value().value_string(), "10");
        assert!(results[1].has_errors());
        assert_eq!(results[1].error_messages(), vec!["y is not defined"]);
    }

    // assignment of an interpreter variable
    let x = frame.variables()[1].clone();
    x.set_value("7").unwrap();
    assert!(wait_until(|| x.value().value_string() == "7"));
    assert!(x.has_value_changed());
    assert_eq!(
        run.engine.variables.lock().get("x"),
        Some(&scriptbridge::model::value::RawValue::from(7_i32))
    );

    thread.resume();
    let (target, _, info) = run.finish();
    assert!(target.is_terminated());
    assert_eq!(
        info.count(&Note::Suspend(
            "Thread: interpreter".to_string(),
            SuspendReason::Breakpoint
        )),
        1
    );
}

#[test]
fn test_step_over_function_call() {
    let ops = vec![
        Op::Line(1),
        Op::Line(2),
        Op::Call("f"),
        Op::Line(10),
        Op::Line(11),
        Op::Return,
        Op::Line(3),
        Op::Line(4),
    ];
    let run = Run::start(LaunchConfig::default(), ops, |target, _| {
        target.breakpoints().add(&Breakpoint::new("/ws/main.js", 2));
    });
    let thread = run.thread();
    run.wait_suspended(&thread, SuspendReason::Breakpoint);
    let top = thread.top_stack_frame().unwrap();
    assert_eq!(top.line_number(), 2);

    // the call to f happens on line 2, stepping over it stops on line 3
    thread.step_over();
    run.wait_suspended(&thread, SuspendReason::StepEnd);
    let frames = thread.stack_frames();
    assert_eq!(frames.len(), 1);
    assert!(Arc::ptr_eq(&top, &frames[0]));
    assert_eq!(frames[0].line_number(), 3);

    thread.resume();
    run.finish();
}

#[test]
fn test_step_into_and_return() {
    let ops = vec![
        Op::Line(1),
        Op::Call("f"),
        Op::Line(10),
        Op::Line(11),
        Op::Return,
        Op::Line(2),
    ];
    let config = LaunchConfig {
        suspend_on_startup: true,
        ..LaunchConfig::default()
    };
    let run = Run::start(config, ops, |_, _| {});
    let thread = run.thread();

    // suspend on startup stops at the first line
    run.wait_suspended(&thread, SuspendReason::StepEnd);
    assert_eq!(thread.top_stack_frame().unwrap().line_number(), 1);

    thread.step_into();
    assert!(wait_until(|| thread.is_suspended()
        && thread
            .top_stack_frame()
            .is_some_and(|frame| frame.name() == "f")));
    assert_eq!(thread.stack_frames().len(), 2);

    thread.step_return();
    assert!(wait_until(|| thread.is_suspended()
        && thread
            .top_stack_frame()
            .is_some_and(|frame| frame.line_number() == 2)));
    assert_eq!(thread.stack_frames().len(), 1);

    thread.resume();
    run.finish();
}

#[test]
fn test_client_suspend() {
    let run = Run::start(LaunchConfig::default(), vec![Op::Line(1), Op::Forever(5)], |_, _| {});
    let thread = run.thread();

    assert!(wait_until(|| thread.can_suspend()));
    thread.suspend();
    run.wait_suspended(&thread, SuspendReason::ClientRequest);

    run.target.terminate();
    let (target, engine, info) = run.finish();
    assert!(target.is_terminated());
    assert!(engine.terminated.load(std::sync::atomic::Ordering::Acquire));
    assert_eq!(
        info.count(&Note::Terminate("Target(Script Debugger)".to_string())),
        1
    );
}

#[test]
fn test_disconnect_releases_interpreter() {
    let run = Run::start(LaunchConfig::default(), lines(1..=5), |target, _| {
        target.breakpoints().add(&Breakpoint::new("/ws/main.js", 2));
        target.breakpoints().add(&Breakpoint::new("/ws/main.js", 4));
    });
    let thread = run.thread();
    run.wait_suspended(&thread, SuspendReason::Breakpoint);

    run.target.disconnect();
    let (target, engine, info) = run.finish();
    assert!(target.is_disconnected());
    // the script ran to the end without stopping at the second breakpoint
    assert_eq!(
        engine.variables.lock().get("line"),
        Some(&scriptbridge::model::value::RawValue::from(5_i32))
    );
    assert!(!engine.terminated.load(std::sync::atomic::Ordering::Acquire));
    assert_eq!(
        info.count(&Note::Suspend(
            "Thread: interpreter".to_string(),
            SuspendReason::Breakpoint
        )),
        1
    );
}
