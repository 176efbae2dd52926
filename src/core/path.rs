//! Purpose: Parse dotted/bracketed path expressions into ordered node descriptors.
//! Exports: `parse_path`, `Node`, `NodeKind`, `Key`, `join`, `is_within`, `relative`, `rebase`.
//! Role: Single grammar for every component that needs to decompose a path.
//! Invariants: Exactly the last descriptor is `Leaf`; the root is never indexed.
//! Invariants: Every `Node::path` is a byte prefix of the parsed input.

use std::fmt;

use crate::core::error::Error;

/// Name of a single step: an object key or an array index.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Container shape implied by the token that follows a node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    Composite,
    Indexed,
    Leaf,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    pub name: Key,
    pub path: String,
    pub parent_name: Option<Key>,
    pub parent_path: Option<String>,
    pub parent_kind: Option<NodeKind>,
    pub kind: NodeKind,
}

impl Node {
    /// The text this node appends to its parent path (`.name`, `[n]`, or the root name).
    pub fn token(&self) -> &str {
        match &self.parent_path {
            Some(parent) => &self.path[parent.len()..],
            None => &self.path,
        }
    }
}

pub fn parse_path(input: &str) -> Result<Vec<Node>, Error> {
    if input.is_empty() {
        return Err(Error::invalid_path(input, "empty path"));
    }
    if input.starts_with('[') {
        return Err(Error::invalid_path(input, "root segment cannot be indexed")
            .with_hint("Start the path with a plain name, e.g. `app[0]`."));
    }

    let bytes = input.as_bytes();
    let mut steps: Vec<(Key, usize)> = Vec::new();

    let end = scan_name(input, 0)?;
    steps.push((Key::Name(input[..end].to_string()), end));
    let mut pos = end;

    while pos < bytes.len() {
        match bytes[pos] {
            b'.' => {
                let start = pos + 1;
                let end = scan_name(input, start)?;
                steps.push((Key::Name(input[start..end].to_string()), end));
                pos = end;
            }
            b'[' => {
                let start = pos + 1;
                let close = input[start..]
                    .find(']')
                    .ok_or_else(|| Error::invalid_path(input, "unterminated index"))?;
                let digits = &input[start..start + close];
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::invalid_path(
                        input,
                        format!("index must be a non-negative integer, got `{digits}`"),
                    ));
                }
                let index = digits
                    .parse::<usize>()
                    .map_err(|err| Error::invalid_path(input, "index out of range").with_source(err))?;
                pos = start + close + 1;
                steps.push((Key::Index(index), pos));
            }
            _ => {
                return Err(Error::invalid_path(
                    input,
                    format!("expected `.` or `[` at offset {pos}"),
                ));
            }
        }
    }

    let mut nodes: Vec<Node> = Vec::with_capacity(steps.len());
    for (i, (name, end)) in steps.iter().enumerate() {
        let kind = if i + 1 == steps.len() {
            NodeKind::Leaf
        } else if bytes[*end] == b'[' {
            NodeKind::Indexed
        } else {
            NodeKind::Composite
        };
        let parent = nodes.last();
        let node = Node {
            name: name.clone(),
            path: input[..*end].to_string(),
            parent_name: parent.map(|p| p.name.clone()),
            parent_path: parent.map(|p| p.path.clone()),
            parent_kind: parent.map(|p| p.kind),
            kind,
        };
        nodes.push(node);
    }
    Ok(nodes)
}

fn scan_name(input: &str, start: usize) -> Result<usize, Error> {
    let rest = &input[start..];
    let len = rest.find(['.', '[']).unwrap_or(rest.len());
    let name = &rest[..len];
    if name.is_empty() {
        return Err(Error::invalid_path(
            input,
            format!("empty segment at offset {start}"),
        ));
    }
    if name.contains(']') {
        return Err(Error::invalid_path(input, "unexpected `]`"));
    }
    Ok(start + len)
}

/// Build the path of a child: `parent.name` or `parent[index]`.
pub fn join(parent: &str, key: &Key) -> String {
    match key {
        Key::Name(name) if parent.is_empty() => name.clone(),
        Key::Name(name) => format!("{parent}.{name}"),
        Key::Index(index) => format!("{parent}[{index}]"),
    }
}

/// True when `path` equals `prefix` or lies beneath it on a segment boundary.
pub fn is_within(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('.') || rest.starts_with('['),
        None => false,
    }
}

/// The part of `path` below `prefix`, without the joining `.`; empty when they are equal.
pub fn relative<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    if !is_within(path, prefix) {
        return None;
    }
    let rest = &path[prefix.len()..];
    Some(rest.strip_prefix('.').unwrap_or(rest))
}

/// Inverse of `relative`: re-attach a relative path under `prefix`.
pub fn rebase(prefix: &str, relative: &str) -> String {
    if relative.is_empty() {
        prefix.to_string()
    } else if prefix.is_empty() {
        relative.to_string()
    } else if relative.starts_with('[') {
        format!("{prefix}{relative}")
    } else {
        format!("{prefix}.{relative}")
    }
}

#[cfg(test)]
mod tests {
    use super::{Key, NodeKind, is_within, join, parse_path, rebase, relative};
    use crate::core::error::ErrorKind;

    fn names(path: &str) -> Vec<Key> {
        parse_path(path)
            .expect("parse")
            .into_iter()
            .map(|node| node.name)
            .collect()
    }

    #[test]
    fn objects_only() {
        let nodes = parse_path("a.bb.c.d.e").expect("parse");
        assert_eq!(nodes.len(), 5);
        for node in &nodes[..4] {
            assert_eq!(node.kind, NodeKind::Composite);
        }
        assert_eq!(nodes[4].kind, NodeKind::Leaf);
        assert_eq!(nodes[4].path, "a.bb.c.d.e");
        assert_eq!(nodes[4].parent_path.as_deref(), Some("a.bb.c.d"));
    }

    #[test]
    fn objects_and_arrays() {
        let nodes = parse_path("a.bb.c[0].d.e").expect("parse");
        let kinds: Vec<NodeKind> = nodes.iter().map(|node| node.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Composite,
                NodeKind::Composite,
                NodeKind::Indexed,
                NodeKind::Composite,
                NodeKind::Composite,
                NodeKind::Leaf,
            ]
        );
        assert_eq!(
            names("a.bb.c[0].d.e"),
            vec![
                Key::Name("a".into()),
                Key::Name("bb".into()),
                Key::Name("c".into()),
                Key::Index(0),
                Key::Name("d".into()),
                Key::Name("e".into()),
            ]
        );
    }

    #[test]
    fn array_at_the_end() {
        let nodes = parse_path("a.b.c.d.e[0]").expect("parse");
        assert_eq!(nodes.len(), 6);
        assert_eq!(nodes[4].kind, NodeKind::Indexed);
        let leaf = &nodes[5];
        assert_eq!(leaf.name, Key::Index(0));
        assert_eq!(leaf.path, "a.b.c.d.e[0]");
        assert_eq!(leaf.parent_path.as_deref(), Some("a.b.c.d.e"));
        assert_eq!(leaf.token(), "[0]");
    }

    #[test]
    fn chained_indexes() {
        let nodes = parse_path("a.bb.c[0][0].dd.e").expect("parse");
        assert_eq!(nodes.len(), 7);
        assert_eq!(nodes[2].path, "a.bb.c");
        assert_eq!(nodes[2].kind, NodeKind::Indexed);
        assert_eq!(nodes[3].path, "a.bb.c[0]");
        assert_eq!(nodes[3].parent_path.as_deref(), Some("a.bb.c"));
        assert_eq!(nodes[3].kind, NodeKind::Indexed);
        assert_eq!(nodes[4].kind, NodeKind::Composite);
        assert_eq!(nodes[6].parent_path.as_deref(), Some("a.bb.c[0][0].dd"));
    }

    #[test]
    fn multi_digit_indexes_and_parent_kinds() {
        let nodes = parse_path("app.aa[10]").expect("parse");
        assert_eq!(nodes[0].parent_kind, None);
        assert_eq!(nodes[1].kind, NodeKind::Indexed);
        assert_eq!(nodes[1].parent_kind, Some(NodeKind::Composite));
        assert_eq!(nodes[2].name, Key::Index(10));
        assert_eq!(nodes[2].parent_kind, Some(NodeKind::Indexed));
        assert_eq!(nodes[2].parent_name, Some(Key::Name("aa".into())));
    }

    #[test]
    fn single_segment_is_a_leaf() {
        let nodes = parse_path("test_number").expect("parse");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind, NodeKind::Leaf);
        assert_eq!(nodes[0].token(), "test_number");
    }

    #[test]
    fn numeric_object_keys_stay_names() {
        assert_eq!(
            names("dumb_object.2"),
            vec![Key::Name("dumb_object".into()), Key::Name("2".into())]
        );
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", "[10]", "a..b", "a.", "a[", "a[]", "a[x]", "a[-1]", "a[0]b", "a]b"] {
            let err = parse_path(bad).expect_err(bad);
            assert_eq!(err.kind(), ErrorKind::InvalidPath, "{bad}");
        }
    }

    #[test]
    fn join_builds_child_paths() {
        assert_eq!(join("app", &Key::Name("list".into())), "app.list");
        assert_eq!(join("app.list", &Key::Index(3)), "app.list[3]");
        assert_eq!(join("", &Key::Name("a".into())), "a");
    }

    #[test]
    fn within_respects_segment_boundaries() {
        assert!(is_within("location", "location"));
        assert!(is_within("location.city", "location"));
        assert!(is_within("location[0]", "location"));
        assert!(!is_within("locationPrevious", "location"));
        assert!(is_within("anything", ""));
    }

    #[test]
    fn relative_and_rebase_agree() {
        assert_eq!(relative("app.a.b", "app"), Some("a.b"));
        assert_eq!(relative("app[2]", "app"), Some("[2]"));
        assert_eq!(relative("app", "app"), Some(""));
        assert_eq!(relative("apple.a", "app"), None);

        for path in ["app.a.b", "app[2].x", "app"] {
            let rest = relative(path, "app").expect("within");
            assert_eq!(rebase("app", rest), path);
        }
        assert_eq!(rebase("", "a.b"), "a.b");
    }
}
