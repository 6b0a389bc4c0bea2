//! Positioned raw YAML node tree
//!
//! yaml-rust2 only exposes source markers on its event stream, so this module
//! replays the marked events into a small node tree that keeps a 1-based
//! position, the resolved core-schema tag, and the scalar style for every
//! node. The metadata parser dispatches on this tree instead of on untyped
//! `serde_yaml` values, which drop positions.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

pub use yaml_rust2::scanner::ScanError;

use crate::ast::Pos;

/// Resolved core-schema tag of a scalar node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YamlTag {
    Null,
    Bool,
    Int,
    Float,
    Str,
}

impl fmt::Display for YamlTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            YamlTag::Null => "!!null",
            YamlTag::Bool => "!!bool",
            YamlTag::Int => "!!int",
            YamlTag::Float => "!!float",
            YamlTag::Str => "!!str",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar {
        value: String,
        tag: YamlTag,
        quoted: bool,
    },
    /// Key/value pairs in document order.
    Mapping(Vec<(Node, Node)>),
    Sequence(Vec<Node>),
}

/// One node of the raw document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: Pos,
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Scalar { .. } => "scalar",
            NodeKind::Mapping(_) => "mapping",
            NodeKind::Sequence(_) => "sequence",
        }
    }

    /// The tag shown in diagnostics.
    pub fn tag_name(&self) -> String {
        match &self.kind {
            NodeKind::Scalar { tag, .. } => tag.to_string(),
            NodeKind::Mapping(_) => "!!map".to_string(),
            NodeKind::Sequence(_) => "!!seq".to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Scalar {
                tag: YamlTag::Null,
                ..
            }
        )
    }

    pub fn as_scalar(&self) -> Option<(&str, YamlTag, bool)> {
        match &self.kind {
            NodeKind::Scalar { value, tag, quoted } => Some((value, *tag, *quoted)),
            _ => None,
        }
    }
}

static NULL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(~|null|Null|NULL|)$").unwrap());
static BOOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(true|True|TRUE|false|False|FALSE)$").unwrap());
static INT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([-+]?[0-9]+|0o[0-7]+|0x[0-9a-fA-F]+)$").unwrap());
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?|[-+]?\.(inf|Inf|INF)|\.(nan|NaN|NAN))$").unwrap()
});

/// Core-schema tag resolution for plain scalars.
fn resolve_plain_tag(value: &str) -> YamlTag {
    if NULL_RE.is_match(value) {
        YamlTag::Null
    } else if BOOL_RE.is_match(value) {
        YamlTag::Bool
    } else if INT_RE.is_match(value) {
        YamlTag::Int
    } else if FLOAT_RE.is_match(value) {
        YamlTag::Float
    } else {
        YamlTag::Str
    }
}

fn explicit_tag(tag: &Tag) -> Option<YamlTag> {
    if tag.handle != "tag:yaml.org,2002:" {
        return None;
    }
    match tag.suffix.as_str() {
        "null" => Some(YamlTag::Null),
        "bool" => Some(YamlTag::Bool),
        "int" => Some(YamlTag::Int),
        "float" => Some(YamlTag::Float),
        "str" => Some(YamlTag::Str),
        _ => None,
    }
}

fn scalar_node(value: String, style: TScalarStyle, tag: Option<Tag>, pos: Pos) -> Node {
    let quoted = matches!(
        style,
        TScalarStyle::SingleQuoted | TScalarStyle::DoubleQuoted
    );
    let resolved = match tag.as_ref().and_then(explicit_tag) {
        Some(t) => t,
        None if matches!(style, TScalarStyle::Plain) => resolve_plain_tag(&value),
        None => YamlTag::Str,
    };
    Node {
        kind: NodeKind::Scalar {
            value,
            tag: resolved,
            quoted,
        },
        pos,
    }
}

struct Container {
    mapping: bool,
    aid: usize,
    pos: Pos,
    items: Vec<Node>,
}

#[derive(Default)]
struct TreeBuilder {
    root: Option<Node>,
    stack: Vec<Container>,
    anchors: HashMap<usize, Node>,
}

impl TreeBuilder {
    fn put(&mut self, node: Node, aid: usize) {
        if aid > 0 {
            self.anchors.insert(aid, node.clone());
        }
        match self.stack.last_mut() {
            Some(c) => c.items.push(node),
            None => {
                if self.root.is_none() {
                    self.root = Some(node);
                }
            }
        }
    }

    fn close_container(&mut self) {
        let Some(c) = self.stack.pop() else {
            return;
        };
        let kind = if c.mapping {
            let mut pairs = Vec::with_capacity(c.items.len() / 2);
            let mut items = c.items.into_iter();
            while let (Some(k), Some(v)) = (items.next(), items.next()) {
                pairs.push((k, v));
            }
            NodeKind::Mapping(pairs)
        } else {
            NodeKind::Sequence(c.items)
        };
        self.put(Node { kind, pos: c.pos }, c.aid);
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        // Marker columns are 0-based; positions in diagnostics are 1-based.
        let pos = Pos::new(mark.line(), mark.col() + 1);
        match ev {
            Event::Scalar(value, style, aid, tag) => {
                self.put(scalar_node(value, style, tag, pos), aid);
            }
            Event::MappingStart(aid, ..) => self.stack.push(Container {
                mapping: true,
                aid,
                pos,
                items: Vec::new(),
            }),
            Event::SequenceStart(aid, ..) => self.stack.push(Container {
                mapping: false,
                aid,
                pos,
                items: Vec::new(),
            }),
            Event::MappingEnd | Event::SequenceEnd => self.close_container(),
            Event::Alias(aid) => {
                let node = self.anchors.get(&aid).cloned().unwrap_or(Node {
                    kind: NodeKind::Scalar {
                        value: String::new(),
                        tag: YamlTag::Null,
                        quoted: false,
                    },
                    pos,
                });
                self.put(node, 0);
            }
            _ => {}
        }
    }
}

/// Loads the first document of `src` into a positioned node tree.
/// Returns `None` for an empty stream.
pub fn load(src: &str) -> Result<Option<Node>, ScanError> {
    let mut parser = Parser::new_from_str(src);
    let mut builder = TreeBuilder::default();
    parser.load(&mut builder, false)?;
    Ok(builder.root)
}
