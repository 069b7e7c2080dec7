//! Leaf value coercion
//!
//! Attribute values and element text have no identity of their own. Marking
//! one wraps its primitive value in an `AnnotatableValue` that remembers the
//! leaf position it came from, so the value can serve as a marking anchor.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

use crate::document::TreePosition;
use crate::error::{MarkingError, Result};

/// Primitive value kinds a leaf can be read as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Boolean,
    Integer,
    Long,
    Float,
    Bytes,
    Text,
    Date,
    DateTime,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Bytes => "bytes",
            ValueKind::Text => "text",
            ValueKind::Date => "date",
            ValueKind::DateTime => "datetime",
        };
        write!(f, "{}", name)
    }
}

/// A typed leaf value
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl Primitive {
    pub fn kind(&self) -> ValueKind {
        match self {
            Primitive::Bool(_) => ValueKind::Boolean,
            Primitive::Int(_) => ValueKind::Integer,
            Primitive::Long(_) => ValueKind::Long,
            Primitive::Float(_) => ValueKind::Float,
            Primitive::Bytes(_) => ValueKind::Bytes,
            Primitive::Text(_) => ValueKind::Text,
            Primitive::Date(_) => ValueKind::Date,
            Primitive::DateTime(_) => ValueKind::DateTime,
        }
    }

    /// Read `raw` as the given kind
    pub fn parse_as(raw: &str, kind: ValueKind) -> Result<Primitive> {
        let fail = || MarkingError::Coercion {
            value: raw.to_string(),
            kind,
        };
        let trimmed = raw.trim();

        let value = match kind {
            ValueKind::Boolean => match trimmed {
                "true" | "1" => Primitive::Bool(true),
                "false" | "0" => Primitive::Bool(false),
                _ => return Err(fail()),
            },
            ValueKind::Integer => Primitive::Int(trimmed.parse().map_err(|_| fail())?),
            ValueKind::Long => Primitive::Long(trimmed.parse().map_err(|_| fail())?),
            ValueKind::Float => {
                if !trimmed.chars().any(|c| c.is_ascii_digit()) {
                    return Err(fail());
                }
                Primitive::Float(trimmed.parse().map_err(|_| fail())?)
            }
            ValueKind::Bytes => Primitive::Bytes(raw.as_bytes().to_vec()),
            ValueKind::Text => Primitive::Text(raw.to_string()),
            ValueKind::Date => {
                Primitive::Date(NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| fail())?)
            }
            ValueKind::DateTime => {
                Primitive::DateTime(DateTime::parse_from_rfc3339(trimmed).map_err(|_| fail())?)
            }
        };

        Ok(value)
    }

    /// Infer the narrowest kind that reads `raw` without loss.
    ///
    /// Bytes are never inferred; anything unrecognised is text.
    pub fn infer(raw: &str) -> Primitive {
        const ORDER: [ValueKind; 6] = [
            ValueKind::Integer,
            ValueKind::Long,
            ValueKind::Float,
            ValueKind::DateTime,
            ValueKind::Date,
            ValueKind::Text,
        ];

        match raw.trim() {
            "true" => return Primitive::Bool(true),
            "false" => return Primitive::Bool(false),
            _ => {}
        }

        ORDER
            .iter()
            .find_map(|kind| Primitive::parse_as(raw, *kind).ok())
            .unwrap_or_else(|| Primitive::Text(raw.to_string()))
    }
}

impl From<bool> for Primitive {
    fn from(v: bool) -> Self {
        Primitive::Bool(v)
    }
}

impl From<i32> for Primitive {
    fn from(v: i32) -> Self {
        Primitive::Int(v)
    }
}

impl From<i64> for Primitive {
    fn from(v: i64) -> Self {
        Primitive::Long(v)
    }
}

impl From<f64> for Primitive {
    fn from(v: f64) -> Self {
        Primitive::Float(v)
    }
}

impl From<Vec<u8>> for Primitive {
    fn from(v: Vec<u8>) -> Self {
        Primitive::Bytes(v)
    }
}

impl From<String> for Primitive {
    fn from(v: String) -> Self {
        Primitive::Text(v)
    }
}

impl From<&str> for Primitive {
    fn from(v: &str) -> Self {
        Primitive::Text(v.to_string())
    }
}

impl From<NaiveDate> for Primitive {
    fn from(v: NaiveDate) -> Self {
        Primitive::Date(v)
    }
}

impl From<DateTime<FixedOffset>> for Primitive {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Primitive::DateTime(v)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Bool(v) => write!(f, "{}", v),
            Primitive::Int(v) => write!(f, "{}", v),
            Primitive::Long(v) => write!(f, "{}", v),
            Primitive::Float(v) => write!(f, "{}", v),
            Primitive::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
            Primitive::Text(v) => write!(f, "{}", v),
            Primitive::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Primitive::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

/// A leaf value wrapped so it can be used as a marking anchor
///
/// The wrapper keeps the exact lexical form it was read from, so writing it
/// back into the tree leaves the document unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatableValue {
    position: TreePosition,
    raw: String,
    value: Primitive,
}

impl AnnotatableValue {
    /// Wrap the raw leaf value at `position`, inferring its kind unless one is given
    pub fn coerce(position: TreePosition, raw: &str, kind: Option<ValueKind>) -> Result<Self> {
        let value = match kind {
            Some(kind) => Primitive::parse_as(raw, kind)?,
            None => Primitive::infer(raw),
        };
        Ok(Self {
            position,
            raw: raw.to_string(),
            value,
        })
    }

    /// The leaf this value was read from
    pub fn position(&self) -> &TreePosition {
        &self.position
    }

    pub fn value(&self) -> &Primitive {
        &self.value
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }
}

impl Deref for AnnotatableValue {
    type Target = Primitive;

    fn deref(&self) -> &Primitive {
        &self.value
    }
}

impl From<&AnnotatableValue> for TreePosition {
    fn from(value: &AnnotatableValue) -> Self {
        value.position.clone()
    }
}

impl fmt::Display for AnnotatableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq<str> for AnnotatableValue {
    fn eq(&self, other: &str) -> bool {
        self.raw == other
    }
}

impl PartialEq<&str> for AnnotatableValue {
    fn eq(&self, other: &&str) -> bool {
        self.raw == *other
    }
}

impl PartialEq<Primitive> for AnnotatableValue {
    fn eq(&self, other: &Primitive) -> bool {
        self.value == *other
    }
}
