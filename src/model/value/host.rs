//! Ready-made inspectable host objects: arrays, lists and records.

use crate::error::Error;
use crate::model::value::inspect::{FieldInfo, Inspect, Layout, RawValue, Slot, SlotType};
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Fixed-length array with a declared element type.
pub struct HostArray {
    element: SlotType,
    items: Mutex<Vec<RawValue>>,
}

impl HostArray {
    pub fn new<V: Into<RawValue>>(element: SlotType, items: impl IntoIterator<Item = V>) -> Self {
        Self {
            element,
            items: Mutex::new(items.into_iter().map(Into::into).collect()),
        }
    }

    pub fn get(&self, index: usize) -> Option<RawValue> {
        self.items.lock().get(index).cloned()
    }
}

impl Inspect for HostArray {
    fn type_name(&self) -> String {
        format!("{}[]", self.element)
    }

    fn layout(&self) -> Layout {
        Layout::Array {
            element: self.element.clone(),
            len: self.items.lock().len(),
        }
    }

    fn read(&self, slot: Slot<'_>) -> Option<RawValue> {
        match slot {
            Slot::Element(idx) => self.get(idx),
            Slot::Field(_) => None,
        }
    }

    fn write(&self, slot: Slot<'_>, value: RawValue) -> Result<(), Error> {
        let Slot::Element(idx) = slot else {
            return Err(Error::UnsupportedTarget(slot.to_string()));
        };
        let mut items = self.items.lock();
        let item = items
            .get_mut(idx)
            .ok_or_else(|| Error::UnsupportedTarget(slot.to_string()))?;
        *item = value;
        Ok(())
    }
}

/// Growable ordered collection, like a list of a host language.
pub struct HostList {
    type_name: String,
    items: Mutex<Vec<RawValue>>,
}

impl HostList {
    pub fn new<V: Into<RawValue>>(
        type_name: impl Into<String>,
        items: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            items: Mutex::new(items.into_iter().map(Into::into).collect()),
        }
    }

    pub fn push(&self, item: impl Into<RawValue>) {
        self.items.lock().push(item.into());
    }
}

impl Inspect for HostList {
    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn layout(&self) -> Layout {
        Layout::Collection {
            items: self.items.lock().clone(),
        }
    }

    fn read(&self, slot: Slot<'_>) -> Option<RawValue> {
        match slot {
            Slot::Element(idx) => self.items.lock().get(idx).cloned(),
            Slot::Field(_) => None,
        }
    }
}

/// Object with named fields.
///
/// Fields of inherited types come after own fields; an own field shadows an inherited one
/// with the same name.
pub struct HostRecord {
    type_name: String,
    fields: Mutex<IndexMap<String, (FieldInfo, RawValue)>>,
}

impl HostRecord {
    pub fn builder(type_name: impl Into<String>) -> HostRecordBuilder {
        HostRecordBuilder {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<RawValue> {
        self.fields.lock().get(name).map(|(_, value)| value.clone())
    }
}

impl Inspect for HostRecord {
    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn layout(&self) -> Layout {
        Layout::Record {
            fields: self
                .fields
                .lock()
                .values()
                .map(|(info, _)| info.clone())
                .collect(),
        }
    }

    fn read(&self, slot: Slot<'_>) -> Option<RawValue> {
        match slot {
            Slot::Field(name) => self.get(name),
            Slot::Element(_) => None,
        }
    }

    fn write(&self, slot: Slot<'_>, value: RawValue) -> Result<(), Error> {
        let Slot::Field(name) = slot else {
            return Err(Error::UnsupportedTarget(slot.to_string()));
        };
        let mut fields = self.fields.lock();
        match fields.get_mut(name) {
            Some((info, current)) if !info.is_final => {
                *current = value;
                Ok(())
            }
            _ => Err(Error::UnsupportedTarget(name.to_string())),
        }
    }
}

pub struct HostRecordBuilder {
    type_name: String,
    fields: IndexMap<String, (FieldInfo, RawValue)>,
}

impl HostRecordBuilder {
    /// Add a public mutable field.
    pub fn field(self, name: &str, declared: SlotType, value: impl Into<RawValue>) -> Self {
        self.field_with(FieldInfo::new(name, declared), value)
    }

    pub fn final_field(self, name: &str, declared: SlotType, value: impl Into<RawValue>) -> Self {
        self.field_with(FieldInfo::new(name, declared).as_final(), value)
    }

    pub fn static_field(self, name: &str, declared: SlotType, value: impl Into<RawValue>) -> Self {
        self.field_with(FieldInfo::new(name, declared).as_static(), value)
    }

    pub fn field_with(mut self, info: FieldInfo, value: impl Into<RawValue>) -> Self {
        self.fields
            .insert(info.name.clone(), (info, value.into()));
        self
    }

    /// Inherit all fields of a base type that are not declared yet.
    pub fn inherit(mut self, base: &HostRecord) -> Self {
        for (name, field) in base.fields.lock().iter() {
            if !self.fields.contains_key(name) {
                self.fields.insert(name.clone(), field.clone());
            }
        }
        self
    }

    pub fn build(self) -> HostRecord {
        HostRecord {
            type_name: self.type_name,
            fields: Mutex::new(self.fields),
        }
    }
}
