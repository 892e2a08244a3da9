//! Interpreter-side identities: scripts, thread handles and call-frame descriptors.
//!
//! All three are compared by identity, not by content: two scripts with the same title
//! are different scripts, a thread handle maps to exactly one interpreter thread and a
//! call-frame descriptor lives as long as the activation it describes.

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

macro_rules! identity_eq {
    ($ty: ty) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                (Arc::as_ptr(&self.0) as *const () as usize).hash(state)
            }
        }
    };
}

struct ScriptInner {
    title: String,
    resource: Option<PathBuf>,
    dynamic: bool,
}

/// A unit of code executed by the interpreter.
#[derive(Clone)]
pub struct Script(Arc<ScriptInner>);

identity_eq!(Script);

impl Script {
    /// Script backed by a workspace resource (a user source file).
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Self(Arc::new(ScriptInner {
            title,
            resource: Some(path),
            dynamic: false,
        }))
    }

    /// Dynamically generated code (bootstrap, wrappers, injected snippets).
    pub fn dynamic(title: impl Into<String>) -> Self {
        Self(Arc::new(ScriptInner {
            title: title.into(),
            resource: None,
            dynamic: true,
        }))
    }

    /// In-memory script without a backing resource that still counts as user code.
    pub fn snippet(title: impl Into<String>) -> Self {
        Self(Arc::new(ScriptInner {
            title: title.into(),
            resource: None,
            dynamic: false,
        }))
    }

    pub fn title(&self) -> &str {
        &self.0.title
    }

    pub fn resource(&self) -> Option<&Path> {
        self.0.resource.as_deref()
    }

    pub fn is_dynamic(&self) -> bool {
        self.0.dynamic
    }
}

impl Display for Script {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

impl Debug for Script {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("title", &self.0.title)
            .field("resource", &self.0.resource)
            .field("dynamic", &self.0.dynamic)
            .finish()
    }
}

/// Opaque handle of an interpreter thread.
#[derive(Clone)]
pub struct ThreadHandle(Arc<str>);

identity_eq!(ThreadHandle);

impl ThreadHandle {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for ThreadHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for ThreadHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ThreadHandle({}@{:p})", self.0, Arc::as_ptr(&self.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Top level code of a script.
    File,
    /// A function call.
    Function,
}

struct CallFrameInner {
    script: Script,
    line: AtomicU32,
    kind: FrameKind,
    name: Option<String>,
}

/// Interpreter-reported call-frame descriptor.
///
/// Shared between the interpreter (which moves its line number while the activation
/// executes) and the model (which keys stack frame reuse on it).
#[derive(Clone)]
pub struct CallFrame(Arc<CallFrameInner>);

identity_eq!(CallFrame);

impl CallFrame {
    pub fn new(script: Script, line: u32, kind: FrameKind, name: Option<String>) -> Self {
        Self(Arc::new(CallFrameInner {
            script,
            line: AtomicU32::new(line),
            kind,
            name,
        }))
    }

    pub fn file(script: Script, line: u32) -> Self {
        Self::new(script, line, FrameKind::File, None)
    }

    pub fn function(script: Script, line: u32, name: impl Into<String>) -> Self {
        Self::new(script, line, FrameKind::Function, Some(name.into()))
    }

    pub fn script(&self) -> &Script {
        &self.0.script
    }

    pub fn line(&self) -> u32 {
        self.0.line.load(Ordering::Acquire)
    }

    pub fn set_line(&self, line: u32) {
        self.0.line.store(line, Ordering::Release)
    }

    pub fn kind(&self) -> FrameKind {
        self.0.kind
    }

    /// Frame name, defaults to the script title.
    pub fn name(&self) -> &str {
        self.0.name.as_deref().unwrap_or_else(|| self.0.script.title())
    }
}

impl Debug for CallFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({})", self.script().title(), self.line(), self.name())
    }
}

/// Scripts reported ready during a session, by resource.
#[derive(Default)]
pub struct ScriptRegistry {
    by_resource: HashMap<PathBuf, Script>,
}

impl ScriptRegistry {
    /// Record a ready script. Scripts without a resource are not addressable by
    /// breakpoints and are ignored. A reloaded resource replaces its previous script.
    pub fn register(&mut self, script: &Script) {
        if let Some(resource) = script.resource() {
            self.by_resource
                .insert(resource.to_path_buf(), script.clone());
        }
    }

    pub fn lookup(&self, resource: &Path) -> Option<&Script> {
        self.by_resource.get(resource)
    }

    pub fn clear(&mut self) {
        self.by_resource.clear();
    }
}
