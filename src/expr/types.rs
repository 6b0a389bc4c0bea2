//! Value types of the expression language
//!
//! The linter core never inspects these beyond the `assignable` predicate,
//! the structural constructors, and `Display`; keeping that contract narrow
//! is what allows the whole engine to stay swappable.

use std::collections::HashMap;
use std::fmt;

/// An object type. A *strict* object rejects access to properties it does
/// not declare; an object with a mapped element type accepts any property
/// name and yields that element type (a fully open object maps to `Any`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectType {
    pub props: HashMap<String, ExprType>,
    mapped: Option<Box<ExprType>>,
}

impl ObjectType {
    /// An object type that rejects unknown property access.
    pub fn strict() -> Self {
        Self::default()
    }

    /// An object type accepting any property, each typed `Any`.
    pub fn open() -> Self {
        Self::map(ExprType::Any)
    }

    /// An object type accepting any property of the given element type.
    pub fn map(elem: ExprType) -> Self {
        Self {
            props: HashMap::new(),
            mapped: Some(Box::new(elem)),
        }
    }

    /// A strict object with the given properties. Property names are case
    /// insensitive and stored folded.
    pub fn with_props<I, K>(props: I) -> Self
    where
        I: IntoIterator<Item = (K, ExprType)>,
        K: AsRef<str>,
    {
        Self {
            props: props
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_lowercase(), v))
                .collect(),
            mapped: None,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.mapped.is_none()
    }

    /// Makes the object accept unknown properties as `Any`.
    pub fn loosen(&mut self) {
        self.mapped = Some(Box::new(ExprType::Any));
    }

    /// Type of a property access, or `None` when the strict object does not
    /// declare the property. `name` must already be case folded.
    pub fn prop(&self, name: &str) -> Option<ExprType> {
        match self.props.get(name) {
            Some(ty) => Some(ty.clone()),
            None => self.mapped.as_deref().cloned(),
        }
    }

    /// Element type for dynamic (index) access, if any is known.
    pub fn elem(&self) -> ExprType {
        match &self.mapped {
            Some(elem) => (**elem).clone(),
            None => ExprType::Any,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.props.is_empty() {
            return match &self.mapped {
                Some(elem) if **elem == ExprType::Any => f.write_str("object"),
                Some(elem) => write!(f, "{{string => {elem}}}"),
                None => f.write_str("{}"),
            };
        }
        let mut names: Vec<&String> = self.props.keys().collect();
        names.sort();
        let body: Vec<String> = names
            .iter()
            .map(|n| format!("{n}: {}", self.props[*n]))
            .collect();
        write!(f, "{{{}}}", body.join("; "))
    }
}

/// Resolved type of an expression value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExprType {
    /// Unconstrained; assignable in both directions.
    #[default]
    Any,
    Null,
    Bool,
    Number,
    String,
    Object(ObjectType),
    Array(Box<ExprType>),
}

impl ExprType {
    /// Whether a value of type `other` can be used where `self` is expected.
    pub fn assignable(&self, other: &ExprType) -> bool {
        use ExprType::*;
        match (self, other) {
            (Any, _) | (_, Any) => true,
            // anything with a string representation coerces into a string
            (String, String | Number | Bool) => true,
            (Null, Null) | (Bool, Bool) | (Number, Number) => true,
            (Object(_), Object(_)) => true,
            (Array(a), Array(b)) => a.assignable(b),
            _ => false,
        }
    }
}

impl fmt::Display for ExprType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprType::Any => f.write_str("any"),
            ExprType::Null => f.write_str("null"),
            ExprType::Bool => f.write_str("bool"),
            ExprType::Number => f.write_str("number"),
            ExprType::String => f.write_str("string"),
            ExprType::Object(o) => o.fmt(f),
            ExprType::Array(elem) => write!(f, "array<{elem}>"),
        }
    }
}
