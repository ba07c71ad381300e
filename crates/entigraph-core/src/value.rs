//! # Primitive Value Model
//!
//! The closed set of scalar kinds a primitive entity can wrap:
//! integer, real, boolean, string, timestamp and enumeration member, plus
//! `Null` for absence.
//!
//! ## Ordering
//!
//! Two orders coexist:
//! - [`Primitive::compare`] is the *relational* order. It is only defined
//!   between two values of the same comparable kind (integer, real,
//!   timestamp) and fails with `IncomparableTypes` otherwise.
//! - The `Ord` impl is the *canonical sort key*. It is total across kinds
//!   (kind rank first, then value) and exists so that a bag of mixed
//!   primitives can be linearized deterministically.

use crate::GraphError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

// =============================================================================
// PRIMITIVE KIND
// =============================================================================

/// Declared kind of a primitive field or parameter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Integer,
    Real,
    Boolean,
    Text,
    /// Milliseconds since the Unix epoch.
    Timestamp,
    /// Member of the named enumeration.
    Enum(String),
}

impl PrimitiveKind {
    /// Resolve a kind from its type name.
    ///
    /// Accepts the canonical names produced by `Display` plus common aliases.
    /// Enumerations are written `enum:<Name>`.
    pub fn from_name(name: &str) -> Result<Self, GraphError> {
        match name {
            "int" | "integer" | "long" => Ok(Self::Integer),
            "real" | "float" | "double" => Ok(Self::Real),
            "bool" | "boolean" => Ok(Self::Boolean),
            "string" | "text" => Ok(Self::Text),
            "timestamp" | "date" => Ok(Self::Timestamp),
            _ => match name.strip_prefix("enum:") {
                Some(enum_type) if !enum_type.is_empty() => Ok(Self::Enum(enum_type.to_string())),
                _ => Err(GraphError::UnsupportedPrimitiveType(name.to_string())),
            },
        }
    }

    /// Whether values of this kind support relational comparison.
    #[must_use]
    pub fn is_comparable(&self) -> bool {
        matches!(self, Self::Integer | Self::Real | Self::Timestamp)
    }

    /// Parse a textual literal into a value of this kind.
    pub fn parse(&self, raw: &str) -> Result<Primitive, GraphError> {
        let invalid = || GraphError::InvalidPrimitiveLiteral {
            kind: self.to_string(),
            raw: raw.to_string(),
        };
        match self {
            Self::Integer => raw.trim().parse().map(Primitive::Integer).map_err(|_| invalid()),
            Self::Real => raw.trim().parse().map(Primitive::Real).map_err(|_| invalid()),
            Self::Boolean => match raw.trim() {
                "true" => Ok(Primitive::Boolean(true)),
                "false" => Ok(Primitive::Boolean(false)),
                _ => Err(invalid()),
            },
            Self::Text => Ok(Primitive::Text(raw.to_string())),
            Self::Timestamp => {
                let digits = raw.trim();
                let digits = digits.strip_prefix('@').unwrap_or(digits);
                digits.parse().map(Primitive::Timestamp).map_err(|_| invalid())
            }
            Self::Enum(enum_type) => {
                let member = raw
                    .strip_prefix(enum_type.as_str())
                    .and_then(|rest| rest.strip_prefix('.'))
                    .unwrap_or(raw);
                if member.is_empty() {
                    return Err(invalid());
                }
                Ok(Primitive::Enum {
                    enum_type: enum_type.clone(),
                    member: member.to_string(),
                })
            }
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("int"),
            Self::Real => f.write_str("real"),
            Self::Boolean => f.write_str("bool"),
            Self::Text => f.write_str("string"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Enum(name) => write!(f, "enum:{name}"),
        }
    }
}

// =============================================================================
// PRIMITIVE VALUE
// =============================================================================

/// An immutable scalar value with value identity.
///
/// Two primitives holding equal values are interchangeable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Primitive {
    /// Absence of a value.
    Null,
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Enum { enum_type: String, member: String },
}

impl Primitive {
    /// Kind of this value; `None` for `Null`.
    #[must_use]
    pub fn kind(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(PrimitiveKind::Integer),
            Self::Real(_) => Some(PrimitiveKind::Real),
            Self::Boolean(_) => Some(PrimitiveKind::Boolean),
            Self::Text(_) => Some(PrimitiveKind::Text),
            Self::Timestamp(_) => Some(PrimitiveKind::Timestamp),
            Self::Enum { enum_type, .. } => Some(PrimitiveKind::Enum(enum_type.clone())),
        }
    }

    /// Name of this value's kind, `"null"` for `Null`.
    #[must_use]
    pub fn kind_name(&self) -> String {
        self.kind().map_or_else(|| "null".to_string(), |k| k.to_string())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value may be stored in a slot declared as `kind`.
    ///
    /// Kinds must match exactly; `Null` fits every kind.
    #[must_use]
    pub fn is_assignable_to(&self, kind: &PrimitiveKind) -> bool {
        match (self, kind) {
            (Self::Null, _) => true,
            (Self::Enum { enum_type, .. }, PrimitiveKind::Enum(expected)) => enum_type == expected,
            _ => self.kind().as_ref() == Some(kind),
        }
    }

    /// Relational comparison, defined only within one comparable kind.
    pub fn compare(&self, other: &Self) -> Result<Ordering, GraphError> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) | (Self::Timestamp(a), Self::Timestamp(b)) => {
                Ok(a.cmp(b))
            }
            (Self::Real(a), Self::Real(b)) => Ok(normalize(*a).total_cmp(&normalize(*b))),
            _ => Err(GraphError::IncomparableTypes(
                self.kind_name(),
                other.kind_name(),
            )),
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Position of this value's kind in the canonical sort order.
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean(_) => 1,
            Self::Integer(_) => 2,
            Self::Real(_) => 3,
            Self::Timestamp(_) => 4,
            Self::Text(_) => 5,
            Self::Enum { .. } => 6,
        }
    }
}

/// Collapse `-0.0` onto `0.0` and every NaN onto one NaN so that equality,
/// hashing and ordering of reals agree.
fn normalize(v: f64) -> f64 {
    if v.is_nan() {
        f64::NAN
    } else if v == 0.0 {
        0.0
    } else {
        v
    }
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Primitive {}

impl Hash for Primitive {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Integer(v) | Self::Timestamp(v) => v.hash(state),
            Self::Real(v) => normalize(*v).to_bits().hash(state),
            Self::Boolean(v) => v.hash(state),
            Self::Text(v) => v.hash(state),
            Self::Enum { enum_type, member } => {
                enum_type.hash(state);
                member.hash(state);
            }
        }
    }
}

impl PartialOrd for Primitive {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Primitive {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) | (Self::Timestamp(a), Self::Timestamp(b)) => {
                a.cmp(b)
            }
            (Self::Real(a), Self::Real(b)) => normalize(*a).total_cmp(&normalize(*b)),
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (
                Self::Enum {
                    enum_type: ta,
                    member: ma,
                },
                Self::Enum {
                    enum_type: tb,
                    member: mb,
                },
            ) => ta.cmp(tb).then_with(|| ma.cmp(mb)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{:?}", normalize(*v)),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Timestamp(v) => write!(f, "@{v}"),
            Self::Enum { enum_type, member } => write!(f, "{enum_type}.{member}"),
        }
    }
}

impl From<i64> for Primitive {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Primitive {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Primitive {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for Primitive {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Primitive {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Primitive {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn kind_from_name_rejects_unknown() {
        assert_eq!(
            PrimitiveKind::from_name("int").expect("int"),
            PrimitiveKind::Integer
        );
        assert_eq!(
            PrimitiveKind::from_name("enum:Level").expect("enum"),
            PrimitiveKind::Enum("Level".to_string())
        );
        assert!(matches!(
            PrimitiveKind::from_name("decimal"),
            Err(GraphError::UnsupportedPrimitiveType(_))
        ));
        assert!(matches!(
            PrimitiveKind::from_name("enum:"),
            Err(GraphError::UnsupportedPrimitiveType(_))
        ));
    }

    #[test]
    fn parse_literals() {
        assert_eq!(
            PrimitiveKind::Integer.parse("42").expect("int"),
            Primitive::Integer(42)
        );
        assert!(PrimitiveKind::Integer.parse("not-a-number").is_err());
        assert_eq!(
            PrimitiveKind::Timestamp.parse("@1000").expect("ts"),
            Primitive::Timestamp(1000)
        );
        assert_eq!(
            PrimitiveKind::Enum("Level".into())
                .parse("Level.SENIOR")
                .expect("enum")
                .to_string(),
            "Level.SENIOR"
        );
    }

    #[test]
    fn compare_same_kind() {
        let a = Primitive::Integer(1);
        let b = Primitive::Integer(2);
        assert_eq!(a.compare(&b).expect("cmp"), Ordering::Less);

        let x = Primitive::Real(2.5);
        let y = Primitive::Real(-1.0);
        assert_eq!(x.compare(&y).expect("cmp"), Ordering::Greater);
    }

    #[test]
    fn compare_across_kinds_fails() {
        let a = Primitive::Integer(1);
        let b = Primitive::Real(1.0);
        assert!(matches!(
            a.compare(&b),
            Err(GraphError::IncomparableTypes(_, _))
        ));

        let t = Primitive::Text("a".into());
        assert!(t.compare(&t).is_err());
    }

    #[test]
    fn real_zero_and_nan_are_canonical() {
        assert_eq!(Primitive::Real(0.0), Primitive::Real(-0.0));
        assert_eq!(Primitive::Real(f64::NAN), Primitive::Real(f64::NAN));
        assert_eq!(Primitive::Real(-0.0).to_string(), "0.0");
    }

    #[test]
    fn assignability_is_exact() {
        assert!(Primitive::Integer(3).is_assignable_to(&PrimitiveKind::Integer));
        assert!(!Primitive::Integer(3).is_assignable_to(&PrimitiveKind::Real));
        assert!(!Primitive::Text("3".into()).is_assignable_to(&PrimitiveKind::Integer));
        assert!(Primitive::Null.is_assignable_to(&PrimitiveKind::Text));
        let member = Primitive::Enum {
            enum_type: "Level".into(),
            member: "JUNIOR".into(),
        };
        assert!(member.is_assignable_to(&PrimitiveKind::Enum("Level".into())));
        assert!(!member.is_assignable_to(&PrimitiveKind::Enum("Grade".into())));
    }

    #[test]
    fn canonical_order_linearizes_mixed_bag() {
        let bag: BTreeSet<Primitive> = [
            Primitive::Text("b".into()),
            Primitive::Integer(5),
            Primitive::Null,
            Primitive::Text("a".into()),
            Primitive::Integer(-1),
            Primitive::Boolean(true),
        ]
        .into_iter()
        .collect();

        let rendered: Vec<String> = bag.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["null", "true", "-1", "5", "a", "b"]);
    }
}
