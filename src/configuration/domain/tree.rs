//! Typed settings tree.
//!
//! A tree node is either a text value or a map of child nodes. Text values
//! are parsed once into literal segments and `${a.b}` path references;
//! tokens without a dot (`${CACHE_TAG:-latest}`) stay literal and are left
//! for variable substitution at compile time.

use super::ConfigurationDomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dotted path into a settings tree, such as `providers.llm.api_key`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigPath(Vec<String>);

impl ConfigPath {
    /// Parses a dotted path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationDomainError::InvalidPath`] when the path is
    /// empty or a segment contains characters outside `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationDomainError> {
        let trimmed = raw.trim();
        let segments: Vec<String> = trimmed.split('.').map(ToOwned::to_owned).collect();
        if trimmed.is_empty() || !segments.iter().all(|segment| is_segment(segment)) {
            return Err(ConfigurationDomainError::InvalidPath(raw.to_owned()));
        }
        Ok(Self(segments))
    }

    /// Returns the first segment.
    #[must_use]
    pub fn root(&self) -> &str {
        self.0.first().map_or("", String::as_str)
    }

    /// Returns the path without its first segment, if anything remains.
    #[must_use]
    pub fn tail(&self) -> Option<Self> {
        match self.0.split_first() {
            Some((_, rest)) if !rest.is_empty() => Some(Self(rest.to_vec())),
            _ => None,
        }
    }

    /// Returns a path with `segment` prepended.
    #[must_use]
    pub fn under(&self, segment: &str) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.push(segment.to_owned());
        segments.extend(self.0.iter().cloned());
        Self(segments)
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    fn single(segment: &str) -> Self {
        Self(vec![segment.to_owned()])
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0.join("."))
    }
}

impl TryFrom<&str> for ConfigPath {
    type Error = ConfigurationDomainError;

    fn try_from(value: &str) -> Result<Self, ConfigurationDomainError> {
        Self::parse(value)
    }
}

fn is_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-'))
}

/// A piece of a text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSegment {
    /// Literal text, possibly containing variable tokens.
    Literal(String),
    /// A `${a.b}` reference to another tree value.
    Reference(ConfigPath),
}

/// A text value parsed into literal and reference segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ConfigText {
    raw: String,
    segments: Vec<TextSegment>,
}

impl ConfigText {
    /// Parses a text value.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let text = raw.into();
        let segments = parse_segments(&text);
        Self {
            raw: text,
            segments,
        }
    }

    /// Returns the unparsed text.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[TextSegment] {
        &self.segments
    }

    /// Returns the paths this value references, in order of appearance.
    pub fn references(&self) -> impl Iterator<Item = &ConfigPath> {
        self.segments.iter().filter_map(|segment| match segment {
            TextSegment::Reference(path) => Some(path),
            TextSegment::Literal(_) => None,
        })
    }
}

impl From<String> for ConfigText {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<ConfigText> for String {
    fn from(value: ConfigText) -> Self {
        value.raw
    }
}

fn parse_segments(raw: &str) -> Vec<TextSegment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = raw;

    while let Some(position) = rest.find('$') {
        let (before, tail) = rest.split_at(position);
        literal.push_str(before);

        if let Some(after) = tail.strip_prefix("$$") {
            literal.push_str("$$");
            rest = after;
            continue;
        }

        let reference = tail
            .strip_prefix("${")
            .and_then(|body| body.split_once('}'))
            .filter(|(path, _)| path.contains('.'))
            .and_then(|(path, after)| ConfigPath::parse(path).ok().map(|parsed| (parsed, after)));

        match reference {
            Some((path, after)) => {
                if !literal.is_empty() {
                    segments.push(TextSegment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(TextSegment::Reference(path));
                rest = after;
            }
            None => {
                literal.push('$');
                rest = tail.strip_prefix('$').unwrap_or_default();
            }
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(TextSegment::Literal(literal));
    }
    segments
}

/// A settings tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigNode {
    /// A text value.
    Value(ConfigText),
    /// Named child nodes.
    Map(BTreeMap<String, ConfigNode>),
}

impl ConfigNode {
    /// Creates a text value node.
    #[must_use]
    pub fn value(raw: impl Into<String>) -> Self {
        Self::Value(ConfigText::new(raw))
    }

    /// Returns the text value, if this node is a leaf.
    #[must_use]
    pub const fn as_text(&self) -> Option<&ConfigText> {
        match self {
            Self::Value(text) => Some(text),
            Self::Map(_) => None,
        }
    }
}

impl From<&str> for ConfigNode {
    fn from(value: &str) -> Self {
        Self::value(value)
    }
}

impl From<String> for ConfigNode {
    fn from(value: String) -> Self {
        Self::value(value)
    }
}

impl From<u16> for ConfigNode {
    fn from(value: u16) -> Self {
        Self::value(value.to_string())
    }
}

/// A settings tree: the override map of a configuration, or a shared
/// settings layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree {
    root: BTreeMap<String, ConfigNode>,
}

impl ConfigTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a flat tree of text values.
    pub fn from_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            root: values
                .into_iter()
                .map(|(name, value)| (name.into(), ConfigNode::value(value)))
                .collect(),
        }
    }

    /// Returns whether the tree has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Returns the node at `path`.
    #[must_use]
    pub fn get(&self, path: &ConfigPath) -> Option<&ConfigNode> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.root.get(first)?;
        for segment in rest {
            match node {
                ConfigNode::Map(children) => node = children.get(segment)?,
                ConfigNode::Value(_) => return None,
            }
        }
        Some(node)
    }

    /// Returns the raw text at a top-level key.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.root
            .get(key)
            .and_then(ConfigNode::as_text)
            .map(ConfigText::raw)
    }

    /// Sets the node at `path`, replacing any value in the way with a map.
    ///
    /// Returns whether the tree changed.
    pub fn set(&mut self, path: &ConfigPath, node: ConfigNode) -> bool {
        let Some((last, parents)) = path.segments().split_last() else {
            return false;
        };

        let mut children = &mut self.root;
        for segment in parents {
            let entry = children
                .entry(segment.clone())
                .or_insert_with(|| ConfigNode::Map(BTreeMap::new()));
            if matches!(entry, ConfigNode::Value(_)) {
                *entry = ConfigNode::Map(BTreeMap::new());
            }
            children = match entry {
                ConfigNode::Map(map) => map,
                ConfigNode::Value(_) => return false,
            };
        }

        if children.get(last) == Some(&node) {
            return false;
        }
        children.insert(last.clone(), node);
        true
    }

    /// Removes the node at `path`, pruning maps left empty.
    pub fn remove(&mut self, path: &ConfigPath) -> Option<ConfigNode> {
        remove_from(&mut self.root, path.segments())
    }

    /// Deep-merges `overlay` onto a copy of this tree; the overlay wins per
    /// key, recursively for nested maps.
    #[must_use]
    pub fn merged(&self, overlay: &Self) -> Self {
        let mut root = self.root.clone();
        merge_into(&mut root, &overlay.root);
        Self { root }
    }

    /// Returns the tree with `subtree` mounted at the top-level key `mount`.
    #[must_use]
    pub fn with_mount(&self, mount: &str, subtree: &Self) -> Self {
        let mut root = self.root.clone();
        root.insert(mount.to_owned(), ConfigNode::Map(subtree.root.clone()));
        Self { root }
    }

    /// Returns the top-level text values, in key order.
    pub fn top_level_values(&self) -> impl Iterator<Item = (&str, &ConfigText)> {
        self.root
            .iter()
            .filter_map(|(key, node)| node.as_text().map(|text| (key.as_str(), text)))
    }

    /// Returns the path of every top-level text value.
    #[must_use]
    pub fn top_level_paths(&self) -> Vec<ConfigPath> {
        self.top_level_values()
            .map(|(key, _)| ConfigPath::single(key))
            .collect()
    }
}

fn merge_into(base: &mut BTreeMap<String, ConfigNode>, overlay: &BTreeMap<String, ConfigNode>) {
    for (key, node) in overlay {
        match (base.get_mut(key), node) {
            (Some(ConfigNode::Map(existing)), ConfigNode::Map(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), node.clone());
            }
        }
    }
}

fn remove_from(children: &mut BTreeMap<String, ConfigNode>, path: &[String]) -> Option<ConfigNode> {
    match path {
        [] => None,
        [last] => children.remove(last),
        [first, rest @ ..] => {
            let ConfigNode::Map(nested) = children.get_mut(first)? else {
                return None;
            };
            let removed = remove_from(nested, rest);
            if nested.is_empty() {
                children.remove(first);
            }
            removed
        }
    }
}
