use crate::error::Error;
use crate::event::ModelRequest;
use crate::model::hook::ChangeDetail;
use crate::model::value::{FieldInfo, ObjectRef, RawValue, Slot, SlotType, Value};
use crate::model::Parent;
use parking_lot::Mutex;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Where variable content is stored.
enum Origin {
    /// Binding owned by the interpreter.
    Native,
    /// Field of a host object.
    Field { owner: ObjectRef, info: FieldInfo },
    /// Element of a host array.
    Element {
        owner: ObjectRef,
        index: usize,
        element: SlotType,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum OriginKind {
    NativeBinding,
    ReflectedField,
    ReflectedArrayElement,
}

struct VariableState {
    parent: Parent,
    value: Arc<Value>,
    changed: bool,
}

/// Named binding to a [`Value`].
pub struct Variable {
    name: String,
    origin: Origin,
    declared_type: Option<String>,
    state: Mutex<VariableState>,
}

impl Variable {
    /// Create interpreter-native variable.
    pub fn new(
        name: impl Into<String>,
        raw: RawValue,
        parent: Parent,
        declared_type: Option<String>,
    ) -> Arc<Self> {
        Self::with_origin(name.into(), Origin::Native, raw, parent, declared_type)
    }

    /// Create interpreter-native variable not bound to any debug element yet,
    /// the stack frame that receives it becomes its parent.
    pub fn native(name: impl Into<String>, raw: impl Into<RawValue>) -> Arc<Self> {
        Self::new(name, raw.into(), Parent::Detached, None)
    }

    /// Create interpreter-native variable with a display string rendered by the interpreter.
    pub fn rendered(
        name: impl Into<String>,
        raw: impl Into<RawValue>,
        value_string: impl Into<String>,
    ) -> Arc<Self> {
        let variable = Self::native(name, raw);
        variable.value().set_value_string(value_string);
        variable
    }

    pub(crate) fn field(owner: ObjectRef, info: FieldInfo, parent: Parent) -> Arc<Self> {
        let raw = owner.read(Slot::Field(&info.name)).unwrap_or_default();
        Self::with_origin(info.name.clone(), Origin::Field { owner, info }, raw, parent, None)
    }

    pub(crate) fn element(owner: ObjectRef, index: usize, element: SlotType, parent: Parent) -> Arc<Self> {
        let raw = owner.read(Slot::Element(index)).unwrap_or_default();
        Self::with_origin(
            format!("[{index}]"),
            Origin::Element {
                owner,
                index,
                element,
            },
            raw,
            parent,
            None,
        )
    }

    fn with_origin(
        name: String,
        origin: Origin,
        raw: RawValue,
        parent: Parent,
        declared_type: Option<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            origin,
            declared_type,
            state: Mutex::new(VariableState {
                value: Value::new(parent.clone(), raw),
                parent,
                changed: false,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Arc<Value> {
        self.state.lock().value.clone()
    }

    pub fn parent(&self) -> Parent {
        self.state.lock().parent.clone()
    }

    pub fn origin_kind(&self) -> OriginKind {
        match self.origin {
            Origin::Native => OriginKind::NativeBinding,
            Origin::Field { .. } => OriginKind::ReflectedField,
            Origin::Element { .. } => OriginKind::ReflectedArrayElement,
        }
    }

    /// Field metadata (visibility, modifiers) of a reflected field.
    pub fn field_info(&self) -> Option<&FieldInfo> {
        match &self.origin {
            Origin::Field { info, .. } => Some(info),
            _ => None,
        }
    }

    pub fn has_value_changed(&self) -> bool {
        self.state.lock().changed
    }

    pub fn reference_type_name(&self) -> String {
        match &self.origin {
            Origin::Field { info, .. } => info.declared.name().to_string(),
            Origin::Element { element, .. } => element.name().to_string(),
            Origin::Native => match &self.declared_type {
                Some(declared) => declared.clone(),
                None => self.value().reference_type_name(),
            },
        }
    }

    pub fn set_parent(&self, parent: Parent) {
        let value = {
            let mut state = self.state.lock();
            state.parent = parent.clone();
            state.value.clone()
        };
        value.set_parent(parent);
    }

    /// Replace the value. Variable is marked as changed if the display string of the new
    /// value differs from the display string of the previous one, nested content is not
    /// compared.
    pub fn update(&self, value: Arc<Value>) {
        let (parent, old_value) = {
            let state = self.state.lock();
            (state.parent.clone(), state.value.clone())
        };

        value.set_parent(parent);
        let changed = old_value.value_string() != value.value_string();

        let mut state = self.state.lock();
        state.changed = changed;
        state.value = value;
    }

    pub fn supports_value_modification(&self) -> bool {
        match &self.origin {
            Origin::Native => true,
            Origin::Field { info, .. } => info.declared.is_simple() && !info.is_final,
            Origin::Element { element, .. } => element.is_simple(),
        }
    }

    /// Check that an expression can be assigned without writing it.
    pub fn verify_value(&self, expression: &str) -> bool {
        match &self.origin {
            Origin::Native => true,
            Origin::Field { info, .. } => {
                self.supports_value_modification() && info.declared.convert(expression).is_ok()
            }
            Origin::Element { element, .. } => {
                self.supports_value_modification() && element.convert(expression).is_ok()
            }
        }
    }

    /// Assign a new value given as an expression.
    ///
    /// Native bindings are changed by the interpreter: a request is sent and the new value
    /// arrives later with a variables event. Host object slots are converted and written
    /// immediately, on failure the slot keeps its previous content.
    pub fn set_value(self: &Arc<Self>, expression: &str) -> Result<(), Error> {
        let parent = self.parent();

        let (owner, slot, declared) = match &self.origin {
            Origin::Native => {
                let target = parent.target().ok_or(Error::SessionTerminated)?;
                target.post(ModelRequest::SetVariable {
                    context: parent,
                    variable: self.clone(),
                    expression: expression.to_string(),
                });
                return Ok(());
            }
            Origin::Field { owner, info } => (owner, Slot::Field(&info.name), &info.declared),
            Origin::Element {
                owner,
                index,
                element,
            } => (owner, Slot::Element(*index), element),
        };

        if !self.supports_value_modification() {
            return Err(Error::UnsupportedTarget(self.name.clone()));
        }

        let new_value = declared.convert(expression)?;
        owner.write(slot, new_value.clone())?;
        self.value().update(new_value);

        if let Some(frame) = parent.frame() {
            frame.fire_change(ChangeDetail::Content);
        }
        Ok(())
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.value().value_string())
    }
}
