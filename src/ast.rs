use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Name(String),
    This,   // this, .
    Parent, // ..
    Root,   // @root
    Key,    // @key
    Index,  // @index
    First,  // @first
    Last,   // @last
}

#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub segments: Vec<Segment>,
}

impl Path {
    /// The single plain name this path consists of, if any.
    pub fn as_name(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [Segment::Name(name)] => Some(name.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Path(Path),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    If,
    Unless, // #unless and ^name
    Each,
    With,
    /// `{{#name}}`: a block helper if one is registered at render time,
    /// otherwise an implicit section.
    Section,
    /// `{{#name args...}}`: always a registered block helper.
    Helper,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    StaticText(String),
    Path {
        path: Path,
        escaped: bool,
    },
    /// `{{5}}`, `{{"text"}}`, `{{true}}`
    Literal {
        value: Value,
        escaped: bool,
    },
    HelperCall {
        name: String,
        args: Vec<Param>,
        escaped: bool,
    },
    Block {
        kind: BlockKind,
        name: String,
        args: Vec<Param>,
        consequent: Vec<Node>,
        alternate: Option<Vec<Node>>,
    },
    Partial {
        name: String,
        context: Option<Param>,
    },
}

pub type Template = Vec<Node>;
