//! Capability seam between the model and host runtime objects.
//!
//! Runtimes expose their objects through [`Inspect`]: a type name, a [`Layout`] telling how
//! to enumerate children and slot-level read/write. No reflection is involved, a runtime with
//! its own introspection implements the trait directly.

use crate::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// Primitive runtime value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    Int(i32),
    Short(i16),
    Byte(i8),
    Char(char),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Int(_) => "int",
            Scalar::Short(_) => "short",
            Scalar::Byte(_) => "byte",
            Scalar::Char(_) => "char",
            Scalar::Long(_) => "long",
            Scalar::Float(_) => "float",
            Scalar::Double(_) => "double",
            Scalar::Bool(_) => "bool",
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Short(v) => write!(f, "{v}"),
            Scalar::Byte(v) => write!(f, "{v}"),
            Scalar::Char(v) => write!(f, "{v}"),
            Scalar::Long(v) => write!(f, "{v}"),
            // debug representation keeps the fraction part: `1.0`, not `1`
            Scalar::Float(v) => write!(f, "{v:?}"),
            Scalar::Double(v) => write!(f, "{v:?}"),
            Scalar::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Reference to a runtime object, compared by identity.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Inspect>);

impl ObjectRef {
    pub fn new(object: impl Inspect + 'static) -> Self {
        Self(Arc::new(object))
    }

    pub fn from_arc(object: Arc<dyn Inspect>) -> Self {
        Self(object)
    }

    /// Identity of referenced object, stable while the reference is alive.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl Deref for ObjectRef {
    type Target = dyn Inspect;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Debug for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{:#x}", self.0.type_name(), self.identity())
    }
}

/// Content of a variable slot as seen by the runtime.
#[derive(Clone, Debug, Default)]
pub enum RawValue {
    #[default]
    Null,
    Scalar(Scalar),
    Str(Arc<str>),
    Object(ObjectRef),
}

impl RawValue {
    pub fn string(s: impl AsRef<str>) -> Self {
        RawValue::Str(Arc::from(s.as_ref()))
    }

    pub fn object(object: impl Inspect + 'static) -> Self {
        RawValue::Object(ObjectRef::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, RawValue::Scalar(_))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            RawValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Identity of a heap value (string or object), `None` for null and scalars.
    pub fn identity(&self) -> Option<usize> {
        match self {
            RawValue::Str(s) => Some(Arc::as_ptr(s) as *const () as usize),
            RawValue::Object(obj) => Some(obj.identity()),
            RawValue::Null | RawValue::Scalar(_) => None,
        }
    }
}

/// Strings are compared by content, objects by identity.
impl PartialEq for RawValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RawValue::Null, RawValue::Null) => true,
            (RawValue::Scalar(s1), RawValue::Scalar(s2)) => s1 == s2,
            (RawValue::Str(s1), RawValue::Str(s2)) => s1 == s2,
            (RawValue::Object(o1), RawValue::Object(o2)) => o1 == o2,
            _ => false,
        }
    }
}

macro_rules! scalar_from {
    ($($t: ty => $variant: ident),*) => {
        $(
            impl From<$t> for RawValue {
                fn from(v: $t) -> Self {
                    RawValue::Scalar(Scalar::$variant(v))
                }
            }
        )*
    };
}

scalar_from!(i32 => Int, i16 => Short, i8 => Byte, char => Char, i64 => Long, f32 => Float, f64 => Double, bool => Bool);

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::string(s)
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Str(Arc::from(s))
    }
}

impl From<ObjectRef> for RawValue {
    fn from(obj: ObjectRef) -> Self {
        RawValue::Object(obj)
    }
}

/// Declared type of a slot (field or array element).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotType {
    Int,
    Short,
    Byte,
    Char,
    Long,
    Float,
    Double,
    Bool,
    Str,
    Object(String),
}

impl SlotType {
    pub fn name(&self) -> &str {
        match self {
            SlotType::Int => "int",
            SlotType::Short => "short",
            SlotType::Byte => "byte",
            SlotType::Char => "char",
            SlotType::Long => "long",
            SlotType::Float => "float",
            SlotType::Double => "double",
            SlotType::Bool => "bool",
            SlotType::Str => "String",
            SlotType::Object(name) => name,
        }
    }

    /// Return `true` if value of this type can be written from a user expression.
    pub fn is_simple(&self) -> bool {
        !matches!(self, SlotType::Object(_))
    }

    /// Parse user expression into a value of this type.
    ///
    /// Boolean parsing is lenient: any text except case-insensitive `true` yields `false`.
    pub fn convert(&self, expression: &str) -> Result<RawValue, Error> {
        let unsupported = || Error::UnsupportedConversion {
            expression: expression.to_string(),
            target: self.name().to_string(),
        };

        let value = match self {
            SlotType::Int => expression.parse::<i32>().map_err(|_| unsupported())?.into(),
            SlotType::Short => expression.parse::<i16>().map_err(|_| unsupported())?.into(),
            SlotType::Byte => expression.parse::<i8>().map_err(|_| unsupported())?.into(),
            SlotType::Char => {
                let mut chars = expression.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c.into(),
                    _ => return Err(unsupported()),
                }
            }
            SlotType::Long => expression.parse::<i64>().map_err(|_| unsupported())?.into(),
            SlotType::Float => expression
                .trim()
                .parse::<f32>()
                .map_err(|_| unsupported())?
                .into(),
            SlotType::Double => expression
                .trim()
                .parse::<f64>()
                .map_err(|_| unsupported())?
                .into(),
            SlotType::Bool => expression.eq_ignore_ascii_case("true").into(),
            SlotType::Str => RawValue::string(expression),
            SlotType::Object(_) => return Err(unsupported()),
        };
        Ok(value)
    }
}

impl Display for SlotType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
    Package,
}

#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub name: String,
    pub declared: SlotType,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_final: bool,
}

impl FieldInfo {
    /// Public, mutable instance field.
    pub fn new(name: impl Into<String>, declared: SlotType) -> Self {
        Self {
            name: name.into(),
            declared,
            visibility: Visibility::Public,
            is_static: false,
            is_final: false,
        }
    }

    pub fn with_visibility(self, visibility: Visibility) -> Self {
        Self { visibility, ..self }
    }

    pub fn as_final(self) -> Self {
        Self {
            is_final: true,
            ..self
        }
    }

    pub fn as_static(self) -> Self {
        Self {
            is_static: true,
            ..self
        }
    }
}

/// How children of an object are enumerated.
pub enum Layout {
    /// Fixed size indexable storage of a declared element type.
    Array { element: SlotType, len: usize },
    /// Ordered collection, items are exposed as they are.
    Collection { items: Vec<RawValue> },
    /// Object with named fields (declared and inherited).
    Record { fields: Vec<FieldInfo> },
    /// No inspectable children.
    Opaque,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot<'a> {
    Element(usize),
    Field(&'a str),
}

impl Display for Slot<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Element(idx) => write!(f, "[{idx}]"),
            Slot::Field(name) => f.write_str(name),
        }
    }
}

/// Inspectable runtime object.
pub trait Inspect: Send + Sync {
    /// Simple type name (`Point`, `int[]`).
    fn type_name(&self) -> String;

    fn layout(&self) -> Layout;

    /// Read slot content, `None` if object has no such slot.
    fn read(&self, slot: Slot<'_>) -> Option<RawValue>;

    /// Write slot content. Values are already converted to the declared slot type.
    fn write(&self, slot: Slot<'_>, _value: RawValue) -> Result<(), Error> {
        Err(Error::UnsupportedTarget(slot.to_string()))
    }
}
