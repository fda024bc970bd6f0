//! Translation of a DataTables server-side request into a [`QueryPlan`].

use crate::params::{ParamNode, ParamTree, ParamValue};
use crate::{Error, Record};
use std::cmp::Ordering;
use std::fmt;

/// Grid columns, in the order the client indexes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Url,
    Ipv4,
    HeaderV4,
    Ipv6,
    HeaderV6,
}

impl Column {
    pub const ALL: [Column; 6] =
        [Column::Id, Column::Url, Column::Ipv4, Column::HeaderV4, Column::Ipv6, Column::HeaderV6];

    pub fn from_index(idx: i64) -> Option<Column> {
        usize::try_from(idx).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Column name in the record table.
    pub fn name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Url => "url",
            Column::Ipv4 => "ipv4",
            Column::HeaderV4 => "header_v4",
            Column::Ipv6 => "ipv6",
            Column::HeaderV6 => "header_v6",
        }
    }

    /// Ascending comparison of two records on this column; nulls first.
    pub fn compare(self, a: &Record, b: &Record) -> Ordering {
        match self {
            Column::Id => a.id.cmp(&b.id),
            Column::Url => a.url.cmp(&b.url),
            Column::Ipv4 => a.ipv4.cmp(&b.ipv4),
            Column::HeaderV4 => a.header_v4.cmp(&b.header_v4),
            Column::Ipv6 => a.ipv6.cmp(&b.ipv6),
            Column::HeaderV6 => a.header_v6.cmp(&b.header_v6),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub column: Column,
    pub direction: Direction,
    /// Trimmed search text; empty disables filtering.
    pub search: String,
    pub start: u64,
    /// Zero yields an empty page.
    pub length: u64,
    /// Echoed back to the client as a number.
    pub draw: i64,
}

impl QueryPlan {
    pub fn new(column: Column, direction: Direction, start: u64, length: u64, draw: i64) -> Self {
        QueryPlan { column, direction, search: String::new(), start, length, draw }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into().trim().to_string();
        self
    }
}

fn render(path: &[&str]) -> String {
    let mut s = path[0].to_string();
    for seg in &path[1..] {
        s.push('[');
        s.push_str(seg);
        s.push(']');
    }
    s
}

fn required<'t>(tree: &'t ParamTree, path: &[&str]) -> Result<&'t ParamValue, Error> {
    match tree.lookup(path) {
        Some(ParamNode::Scalar(v)) => Ok(v),
        Some(ParamNode::Sequence(_)) => Err(Error::malformed(format!("`{}` given more than once", render(path)))),
        Some(ParamNode::Map(_)) => Err(Error::malformed(format!("`{}` must be a value", render(path)))),
        None => Err(Error::malformed(format!("missing `{}`", render(path)))),
    }
}

fn required_int(tree: &ParamTree, path: &[&str]) -> Result<i64, Error> {
    let v = required(tree, path)?;
    v.as_int()
        .ok_or_else(|| Error::malformed(format!("`{}` must be an integer, got `{v}`", render(path))))
}

/// Validate every field the data endpoint needs. Nothing is executed here.
pub fn translate(tree: &ParamTree) -> Result<QueryPlan, Error> {
    let draw = required_int(tree, &["draw"])?;

    let start = required_int(tree, &["start"])?;
    let start = u64::try_from(start).map_err(|_| Error::malformed(format!("`start` must not be negative, got {start}")))?;
    let length = required_int(tree, &["length"])?.max(0) as u64;

    let idx = required_int(tree, &["order", "0", "column"])?;
    let column = Column::from_index(idx)
        .ok_or_else(|| Error::malformed(format!("order column {idx} out of range 0..{}", Column::ALL.len())))?;
    let direction = match required(tree, &["order", "0", "dir"])?.as_str() {
        Some("asc") => Direction::Asc,
        Some("desc") => Direction::Desc,
        _ => return Err(Error::malformed("`order[0][dir]` must be `asc` or `desc`")),
    };

    let search = match tree.lookup(&["search", "value"]) {
        None => String::new(),
        Some(_) => required(tree, &["search", "value"])?.to_string(),
    };

    Ok(QueryPlan::new(column, direction, start, length, draw).with_search(search))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("draw", "3"),
            ("columns[0][data]", "0"),
            ("columns[0][searchable]", "true"),
            ("order[0][column]", "1"),
            ("order[0][dir]", "asc"),
            ("start", "0"),
            ("length", "10"),
            ("search[value]", "  quic  "),
            ("search[regex]", "false"),
        ]
    }

    fn with(key: &str, value: Option<&str>) -> ParamTree {
        let mut pairs: Vec<(String, String)> = base()
            .into_iter()
            .filter(|(k, _)| *k != key)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(value) = value {
            pairs.push((key.to_string(), value.to_string()));
        }
        ParamTree::from_pairs(pairs)
    }

    #[test]
    fn translates_full_request() {
        let plan = translate(&ParamTree::from_pairs(base())).unwrap();
        assert_eq!(plan.column, Column::Url);
        assert_eq!(plan.direction, Direction::Asc);
        assert_eq!(plan.search, "quic");
        assert_eq!((plan.start, plan.length, plan.draw), (0, 10, 3));
    }

    #[test]
    fn search_defaults_to_empty() {
        let plan = translate(&with("search[value]", None)).unwrap();
        assert_eq!(plan.search, "");
    }

    #[test]
    fn numeric_search_keeps_its_text() {
        let plan = translate(&with("search[value]", Some("443"))).unwrap();
        assert_eq!(plan.search, "443");
    }

    #[test]
    fn descending_order() {
        let plan = translate(&with("order[0][dir]", Some("desc"))).unwrap();
        assert_eq!(plan.direction, Direction::Desc);
    }

    #[test]
    fn non_positive_length_is_empty_page() {
        let plan = translate(&with("length", Some("-1"))).unwrap();
        assert_eq!(plan.length, 0);
    }

    #[test]
    fn out_of_range_column_is_malformed() {
        let err = translate(&with("order[0][column]", Some("99"))).unwrap_err();
        assert!(matches!(err, Error::MalformedQuery(_)));
        let err = translate(&with("order[0][column]", Some("-1"))).unwrap_err();
        assert!(matches!(err, Error::MalformedQuery(_)));
    }

    #[test]
    fn missing_required_fields_are_malformed() {
        for key in ["draw", "start", "length", "order[0][column]", "order[0][dir]"] {
            let err = translate(&with(key, None)).unwrap_err();
            assert!(matches!(err, Error::MalformedQuery(_)), "{key}: {err}");
        }
    }

    #[test]
    fn non_numeric_fields_are_malformed() {
        for key in ["draw", "start", "length", "order[0][column]"] {
            let err = translate(&with(key, Some("<script>"))).unwrap_err();
            assert!(matches!(err, Error::MalformedQuery(_)), "{key}: {err}");
        }
    }

    #[test]
    fn negative_start_and_bad_direction_are_malformed() {
        assert!(translate(&with("start", Some("-5"))).is_err());
        assert!(translate(&with("order[0][dir]", Some("sideways"))).is_err());
    }

    #[test]
    fn repeated_draw_is_malformed() {
        let mut pairs = base();
        pairs.push(("draw", "4"));
        assert!(matches!(translate(&ParamTree::from_pairs(pairs)), Err(Error::MalformedQuery(_))));
    }
}
