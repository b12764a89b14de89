//! RDF term kinds and typed cell values read from a result cursor.

use std::fmt;

use serde::Serialize;

use crate::error::{TrackerError, TrackerResult};

/// Kind of RDF term bound to a column (`TrackerSparqlValueType`).
///
/// The discriminant is the native enum code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ValueType {
    /// No term bound (e.g. an unmatched `OPTIONAL`).
    Unbound = 0,
    /// IRI reference.
    Uri = 1,
    /// Plain or language-tagged literal.
    String = 2,
    /// `xsd:integer` literal.
    Integer = 3,
    /// `xsd:double` literal.
    Double = 4,
    /// `xsd:dateTime` literal.
    DateTime = 5,
    /// Blank node.
    BlankNode = 6,
    /// `xsd:boolean` literal.
    Boolean = 7,
}

impl ValueType {
    /// Every variant, ordered by code.
    pub const ALL: [Self; 8] = [
        Self::Unbound,
        Self::Uri,
        Self::String,
        Self::Integer,
        Self::Double,
        Self::DateTime,
        Self::BlankNode,
        Self::Boolean,
    ];

    /// Decodes a native enum code.
    ///
    /// # Errors
    ///
    /// [`TrackerError::ProtocolViolation`] for any code outside `0..=7`.
    pub fn from_code(code: i32) -> TrackerResult<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or_else(|| {
                TrackerError::ProtocolViolation(format!("unknown value type code {code}"))
            })
    }

    /// Native enum code of this variant.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for ValueType {
    type Error = TrackerError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<ValueType> for i32 {
    fn from(value: ValueType) -> Self {
        value.code()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unbound => "unbound",
            Self::Uri => "uri",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::DateTime => "datetime",
            Self::BlankNode => "blank-node",
            Self::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A cell read through the getter that matches its [`ValueType`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Nothing bound.
    Unbound,
    /// IRI reference.
    Uri(String),
    /// Literal text.
    String(String),
    /// Integer literal.
    Integer(i64),
    /// Double literal.
    Double(f64),
    /// `xsd:dateTime` in its lexical form, as returned by the engine.
    DateTime(String),
    /// Blank node label.
    BlankNode(String),
    /// Boolean literal.
    Boolean(bool),
}

impl Value {
    /// Kind of this value.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Unbound => ValueType::Unbound,
            Self::Uri(_) => ValueType::Uri,
            Self::String(_) => ValueType::String,
            Self::Integer(_) => ValueType::Integer,
            Self::Double(_) => ValueType::Double,
            Self::DateTime(_) => ValueType::DateTime,
            Self::BlankNode(_) => ValueType::BlankNode,
            Self::Boolean(_) => ValueType::Boolean,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => Ok(()),
            Self::Uri(v) => write!(f, "<{v}>"),
            Self::String(v) | Self::DateTime(v) => f.write_str(v),
            Self::BlankNode(v) => write!(f, "_:{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}

/// A named, typed cell of the current row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    /// SPARQL variable name, without the leading `?`.
    pub name: String,
    /// The bound value.
    pub value: Value,
}

impl Binding {
    /// Kind of the bound value.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        self.value.value_type()
    }
}
