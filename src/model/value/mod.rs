pub mod host;
pub mod inspect;

pub use inspect::{
    FieldInfo, Inspect, Layout, ObjectRef, RawValue, Scalar, Slot, SlotType, Visibility,
};

use crate::model::variable::Variable;
use crate::model::Parent;
use itertools::Itertools;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::Arc;

struct ValueState {
    parent: Parent,
    raw: RawValue,
    children: Option<Vec<Arc<Variable>>>,
    value_string: Option<String>,
}

/// Current content of a variable slot.
///
/// Children are enumerated lazily, at most once, and cached until replaced with
/// [`Value::set_variables`] or dropped by [`Value::update`].
pub struct Value {
    state: Mutex<ValueState>,
}

impl Value {
    pub fn new(parent: Parent, raw: RawValue) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ValueState {
                parent,
                raw,
                children: None,
                value_string: None,
            }),
        })
    }

    /// Value with a display string rendered by the runtime.
    pub fn with_value_string(parent: Parent, raw: RawValue, value_string: impl Into<String>) -> Arc<Self> {
        let value = Self::new(parent, raw);
        value.set_value_string(value_string);
        value
    }

    pub fn raw(&self) -> RawValue {
        self.state.lock().raw.clone()
    }

    pub fn parent(&self) -> Parent {
        self.state.lock().parent.clone()
    }

    /// Move the value (and already enumerated children) to another parent element.
    pub fn set_parent(&self, parent: Parent) {
        let children = {
            let mut state = self.state.lock();
            state.parent = parent.clone();
            state.children.clone()
        };

        for child in children.into_iter().flatten() {
            child.set_parent(parent.clone());
        }
    }

    pub fn set_value_string(&self, value_string: impl Into<String>) {
        self.state.lock().value_string = Some(value_string.into());
    }

    pub fn is_allocated(&self) -> bool {
        !self.state.lock().raw.is_null()
    }

    pub fn reference_type_name(&self) -> String {
        match &self.state.lock().raw {
            RawValue::Null => String::new(),
            RawValue::Scalar(scalar) => scalar.type_name().to_string(),
            RawValue::Str(_) => SlotType::Str.name().to_string(),
            RawValue::Object(obj) => obj.type_name(),
        }
    }

    /// Human-readable value: scalars as is, strings and objects with their display id.
    pub fn value_string(&self) -> String {
        let (raw, parent) = {
            let state = self.state.lock();
            if let Some(ref value_string) = state.value_string {
                return value_string.clone();
            }
            (state.raw.clone(), state.parent.clone())
        };

        let unique_id = || match parent.target() {
            Some(target) => target
                .unique_object_id(&raw)
                .map(|id| id.to_string())
                .unwrap_or_default(),
            None => "<none>".to_string(),
        };

        match &raw {
            RawValue::Null => "null".to_string(),
            RawValue::Scalar(scalar) => scalar.to_string(),
            RawValue::Str(s) => format!("\"{s}\" (id={})", unique_id()),
            RawValue::Object(obj) => match obj.layout() {
                Layout::Array { element, len } => format!("{element}[{len}] (id={})", unique_id()),
                _ => format!("{} (id={})", obj.type_name(), unique_id()),
            },
        }
    }

    /// Child variables, enumerated on first call.
    pub fn variables(&self) -> Vec<Arc<Variable>> {
        let mut state = self.state.lock();
        if state.children.is_none() {
            let children = enumerate_children(&state.raw, &state.parent);
            state.children = Some(children);
        }
        state.children.clone().unwrap_or_default()
    }

    /// Return `true` if value may have children. Before the first enumeration non-scalar
    /// values pretend to have children.
    pub fn has_variables(&self) -> bool {
        {
            let state = self.state.lock();
            match state.raw {
                RawValue::Null | RawValue::Scalar(_) | RawValue::Str(_) => return false,
                RawValue::Object(_) if state.children.is_none() => return true,
                RawValue::Object(_) => {}
            }
        }
        !self.variables().is_empty()
    }

    /// Replace children with a list provided by the runtime.
    pub fn set_variables(&self, mut variables: Vec<Arc<Variable>>) {
        sort_variables(&mut variables);
        self.state.lock().children = Some(variables);
    }

    /// Replace the underlying runtime value, cached children and display string are dropped.
    pub fn update(&self, raw: RawValue) {
        let mut state = self.state.lock();
        state.raw = raw;
        state.children = None;
        state.value_string = None;
    }
}

fn enumerate_children(raw: &RawValue, parent: &Parent) -> Vec<Arc<Variable>> {
    let RawValue::Object(obj) = raw else {
        return vec![];
    };

    let mut variables = match obj.layout() {
        Layout::Array { element, len } => (0..len)
            .map(|index| Variable::element(obj.clone(), index, element.clone(), parent.clone()))
            .collect_vec(),
        Layout::Collection { items } => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| Variable::new(format!("[{index}]"), item, parent.clone(), None))
            .collect_vec(),
        Layout::Record { fields } => fields
            .into_iter()
            .filter(|field| !field.is_static)
            .map(|field| Variable::field(obj.clone(), field, parent.clone()))
            .collect_vec(),
        Layout::Opaque => vec![],
    };

    sort_variables(&mut variables);
    variables
}

fn index_of(name: &str) -> Option<usize> {
    name.strip_prefix('[')?.strip_suffix(']')?.parse().ok()
}

/// Sort variables by name, `[i]` names are compared by numeric index.
pub(crate) fn sort_variables(variables: &mut [Arc<Variable>]) {
    variables.sort_by(|v1, v2| compare_names(v1.name(), v2.name()));
}

fn compare_names(name1: &str, name2: &str) -> Ordering {
    match (index_of(name1), index_of(name2)) {
        (Some(idx1), Some(idx2)) => idx1.cmp(&idx2),
        _ => name1.cmp(name2),
    }
}
