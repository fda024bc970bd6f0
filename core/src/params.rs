//! Nested parameter trees built from flat `key[sub][leaf]=value` pairs.

use regex::Regex;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

fn segment_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("static pattern"))
}

/// Split a key such as `order[0][column]` into its path segments.
/// Anything that is not a word character is ignored, so unbalanced
/// brackets never fail.
pub fn path_segments(key: &str) -> Vec<&str> {
    segment_pattern().find_iter(key).map(|m| m.as_str()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl ParamValue {
    pub fn coerce(raw: &str) -> Self {
        if let Ok(n) = raw.parse::<i64>() {
            return ParamValue::Int(n);
        }
        match raw {
            "true" => ParamValue::Bool(true),
            "false" => ParamValue::Bool(false),
            _ => ParamValue::Str(raw.to_string()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamNode {
    Scalar(ParamValue),
    /// The same leaf key supplied more than once, in arrival order.
    Sequence(Vec<ParamValue>),
    Map(ParamTree),
}

impl ParamNode {
    pub fn as_scalar(&self) -> Option<&ParamValue> {
        match self {
            ParamNode::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ParamTree> {
        match self {
            ParamNode::Map(t) => Some(t),
            _ => None,
        }
    }
}

/// Numeric segments stay string keys; `order[0]` is reached with `"0"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamTree(BTreeMap<String, ParamNode>);

impl ParamTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut tree = ParamTree::new();
        for (k, v) in pairs {
            tree.insert(k.as_ref(), v.as_ref());
        }
        tree
    }

    /// Decode an urlencoded query string (no leading `?`).
    pub fn from_query_string(qs: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(qs.trim_start_matches('?').as_bytes()))
    }

    pub fn insert(&mut self, key: &str, raw: &str) {
        let segments = path_segments(key);
        let Some((leaf, parents)) = segments.split_last() else {
            debug!(key, "dropping parameter without a usable name");
            return;
        };

        let mut node = &mut self.0;
        for seg in parents {
            let entry = node
                .entry((*seg).to_string())
                .or_insert_with(|| ParamNode::Map(ParamTree::new()));
            match entry {
                ParamNode::Map(child) => node = &mut child.0,
                _ => {
                    debug!(key, segment = *seg, "dropping parameter nested under a scalar");
                    return;
                }
            }
        }

        let value = ParamValue::coerce(raw);
        match node.entry((*leaf).to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(ParamNode::Scalar(value));
            }
            Entry::Occupied(mut slot) => {
                let slot = slot.get_mut();
                let previous = std::mem::replace(slot, ParamNode::Sequence(Vec::new()));
                *slot = match previous {
                    ParamNode::Scalar(first) => ParamNode::Sequence(vec![first, value]),
                    ParamNode::Sequence(mut values) => {
                        values.push(value);
                        ParamNode::Sequence(values)
                    }
                    map @ ParamNode::Map(_) => {
                        debug!(key, "dropping scalar that collides with a nested parameter");
                        map
                    }
                };
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamNode> {
        self.0.get(key)
    }

    pub fn lookup(&self, path: &[&str]) -> Option<&ParamNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.get(first)?;
        for seg in rest {
            node = node.as_map()?.get(seg)?;
        }
        Some(node)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamNode)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
