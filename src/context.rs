//! Binding contexts and path resolution over host data.
//!
//! Host data is a `serde_json::Value` tree. The only two ways the rest of the
//! crate looks into it are [`lookup`] (one member by name) and [`entries`]
//! (ordered enumeration). Everything that cannot be found resolves to
//! "missing" (`None`), never to an error.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::ast::{Path, Segment};

/// One link of the binding chain. Children borrow their parent, so a chain
/// lives exactly as long as the render call that built it.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    value: &'a Value,
    parent: Option<&'a Scope<'a>>,
    root: &'a Value,
    key: Option<&'a str>,
    index: Option<usize>,
    step: Option<(usize, usize)>, // (position, length) while enumerating
}

impl<'a> Scope<'a> {
    pub fn root(value: &'a Value) -> Self {
        Self {
            value,
            parent: None,
            root: value,
            key: None,
            index: None,
            step: None,
        }
    }

    /// Rebinds to `value`, keeping `self` reachable through `..`.
    pub fn child<'b>(&'b self, value: &'b Value) -> Scope<'b> {
        Scope {
            value,
            parent: Some(self),
            root: self.root,
            key: None,
            index: None,
            step: None,
        }
    }

    /// Scope for one element of a sequence.
    pub fn item<'b>(&'b self, value: &'b Value, index: usize, len: usize) -> Scope<'b> {
        Scope {
            index: Some(index),
            step: Some((index, len)),
            ..self.child(value)
        }
    }

    /// Scope for one member of a keyed collection.
    pub fn entry<'b>(
        &'b self,
        value: &'b Value,
        key: &'b str,
        position: usize,
        len: usize,
    ) -> Scope<'b> {
        Scope {
            key: Some(key),
            step: Some((position, len)),
            ..self.child(value)
        }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn parent(&self) -> Option<&'a Scope<'a>> {
        self.parent
    }

    pub fn root_value(&self) -> &'a Value {
        self.root
    }

    pub fn key(&self) -> Option<&'a str> {
        self.key
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Resolves `path` starting from this scope. `None` means missing.
    pub fn resolve(&self, path: &Path) -> Option<Cow<'a, Value>> {
        let mut scope: &Scope<'a> = self;
        let mut current = Some(Cow::Borrowed(self.value));

        for segment in &path.segments {
            current = match segment {
                Segment::This => current,
                Segment::Root => {
                    while let Some(parent) = scope.parent {
                        scope = parent;
                    }
                    Some(Cow::Borrowed(self.root))
                }
                Segment::Parent => {
                    scope = scope.parent?;
                    Some(Cow::Borrowed(scope.value))
                }
                Segment::Key => scope.key.map(|k| Cow::Owned(Value::String(k.to_string()))),
                Segment::Index => scope.index.map(|i| Cow::Owned(Value::from(i))),
                Segment::First => scope.step.map(|(i, _)| Cow::Owned(Value::Bool(i == 0))),
                Segment::Last => scope
                    .step
                    .map(|(i, len)| Cow::Owned(Value::Bool(i + 1 == len))),
                Segment::Name(name) => member(current?, name),
            };
        }
        current
    }
}

fn member<'a>(value: Cow<'a, Value>, name: &str) -> Option<Cow<'a, Value>> {
    match value {
        Cow::Borrowed(v) => lookup(v, name).map(Cow::Borrowed),
        Cow::Owned(v) => lookup(&v, name).cloned().map(Cow::Owned),
    }
}

/// Property lookup: a named member of an object, or a numeric position in
/// a sequence. Any other shape has no members.
pub fn lookup<'v>(value: &'v Value, name: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(name),
        Value::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

pub enum Entries<'v> {
    Sequence(&'v [Value]),
    Keyed(&'v Map<String, Value>),
}

/// Iteration capability: sequences enumerate by position, objects by member
/// name in insertion order. Scalars are not enumerable.
pub fn entries(value: &Value) -> Option<Entries<'_>> {
    match value {
        Value::Array(items) => Some(Entries::Sequence(items)),
        Value::Object(map) => Some(Entries::Keyed(map)),
        _ => None,
    }
}

/// Falsy: missing, `null`, `false`, any zero, `""`, `[]` and `{}`.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// The text a value interpolates as. `null` is empty; sequences join their
/// elements with commas.
pub fn display(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s),
        Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        // Integral floats print without a trailing `.0`.
        Value::Number(n) => Cow::Owned(match n.as_f64() {
            Some(f) if n.is_f64() => f.to_string(),
            _ => n.to_string(),
        }),
        Value::Array(items) => Cow::Owned(
            items
                .iter()
                .map(display)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Cow::Owned(value.to_string()),
    }
}
