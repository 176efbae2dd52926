// Value-graph walking for parsed paths: lookup, shape-aware assignment, deletion.
use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};
use crate::core::path::{Key, Node, NodeKind, parse_path};

/// How an assignment treats an index past the end of an array.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Gaps {
    Reject,
    /// Fill with `null`, but never more than `max_gap` slots in one write.
    PadWithNull { max_gap: usize },
}

pub fn lookup<'v>(value: &'v Value, nodes: &[Node]) -> Option<&'v Value> {
    let mut current = value;
    for node in nodes {
        current = step(current, &node.name)?;
    }
    Some(current)
}

/// Parse `path` and look it up under `value`; malformed paths read as missing.
pub fn lookup_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let nodes = parse_path(path).ok()?;
    lookup(value, &nodes)
}

fn step<'v>(value: &'v Value, key: &Key) -> Option<&'v Value> {
    match (value, key) {
        (Value::Object(map), Key::Name(name)) => map.get(name),
        (Value::Array(items), Key::Index(index)) => items.get(*index),
        _ => None,
    }
}

fn step_mut<'v>(value: &'v mut Value, key: &Key) -> Option<&'v mut Value> {
    match (value, key) {
        (Value::Object(map), Key::Name(name)) => map.get_mut(name),
        (Value::Array(items), Key::Index(index)) => items.get_mut(*index),
        _ => None,
    }
}

/// Write `value` at `nodes`, creating missing containers. Returns the replaced value.
pub(crate) fn assign(
    root: &mut Value,
    nodes: &[Node],
    value: Value,
    gaps: Gaps,
) -> Result<Option<Value>, Error> {
    let Some((leaf, parents)) = nodes.split_last() else {
        return Err(Error::new(ErrorKind::InvalidPath).with_message("empty path"));
    };

    let mut current = root;
    for node in parents {
        current = descend_or_create(current, node, gaps)?;
    }

    match (current, &leaf.name) {
        (Value::Object(map), Key::Name(name)) => Ok(map.insert(name.clone(), value)),
        (Value::Array(items), Key::Index(index)) => {
            let index = *index;
            if index < items.len() {
                return Ok(Some(std::mem::replace(&mut items[index], value)));
            }
            pad(items, index, gaps, &leaf.path)?;
            items.push(value);
            Ok(None)
        }
        (_, _) => Err(mismatch(leaf)),
    }
}

fn descend_or_create<'v>(
    container: &'v mut Value,
    node: &Node,
    gaps: Gaps,
) -> Result<&'v mut Value, Error> {
    let child = match (container, &node.name) {
        (Value::Object(map), Key::Name(name)) => map
            .entry(name.clone())
            .or_insert_with(|| empty_container(node.kind)),
        (Value::Array(items), Key::Index(index)) => {
            let index = *index;
            if index >= items.len() {
                pad(items, index, gaps, &node.path)?;
                items.push(empty_container(node.kind));
            }
            &mut items[index]
        }
        (_, _) => return Err(mismatch(node)),
    };

    let fits = match node.kind {
        NodeKind::Composite => child.is_object(),
        NodeKind::Indexed => child.is_array(),
        NodeKind::Leaf => false,
    };
    if child.is_null() {
        *child = empty_container(node.kind);
    } else if !fits {
        return Err(Error::new(ErrorKind::TypeMismatch)
            .with_message(format!("`{}` holds a value of the wrong shape", node.path))
            .with_state_path(&node.path));
    }
    Ok(child)
}

fn pad(items: &mut Vec<Value>, index: usize, gaps: Gaps, path: &str) -> Result<(), Error> {
    if index == items.len() {
        return Ok(());
    }
    match gaps {
        Gaps::Reject => Err(Error::invalid_path(
            path,
            format!("index {index} leaves a gap after {} elements", items.len()),
        )),
        Gaps::PadWithNull { max_gap } => {
            let gap = index - items.len();
            if gap > max_gap {
                return Err(Error::invalid_path(
                    path,
                    format!("index {index} would pad {gap} null slots (limit {max_gap})"),
                ));
            }
            items.resize(index, Value::Null);
            Ok(())
        }
    }
}

fn empty_container(kind: NodeKind) -> Value {
    match kind {
        NodeKind::Indexed => Value::Array(Vec::new()),
        NodeKind::Composite | NodeKind::Leaf => Value::Object(Map::new()),
    }
}

fn mismatch(node: &Node) -> Error {
    let parent = node.parent_path.as_deref().unwrap_or("<root>");
    let expected = match node.name {
        Key::Name(_) => "an object",
        Key::Index(_) => "an array",
    };
    Error::new(ErrorKind::TypeMismatch)
        .with_message(format!("`{parent}` is not {expected}"))
        .with_state_path(&node.path)
}

fn parent_mut<'v>(root: &'v mut Value, parents: &[Node]) -> Option<&'v mut Value> {
    let mut current = root;
    for node in parents {
        current = step_mut(current, &node.name)?;
    }
    Some(current)
}

/// Remove the leaf from its parent container; arrays shift down.
///
/// A missing intermediate container is an error, a missing leaf is not.
pub(crate) fn delete(root: &mut Value, nodes: &[Node]) -> Result<Option<Value>, Error> {
    let Some((leaf, parents)) = nodes.split_last() else {
        return Ok(None);
    };
    let Some(parent) = parent_mut(root, parents) else {
        return Err(Error::invalid_path(&leaf.path, "undefined target in remove")
            .with_hint("Every segment above the removed node must exist."));
    };
    match (parent, &leaf.name) {
        (Value::Object(map), Key::Name(name)) => Ok(map.shift_remove(name)),
        (Value::Array(items), Key::Index(index)) if *index < items.len() => {
            Ok(Some(items.remove(*index)))
        }
        _ => Ok(None),
    }
}

/// Put the leaf back into the "no value" state: object entries are removed,
/// array slots are nulled so sibling indexes keep their meaning.
pub(crate) fn clear(root: &mut Value, nodes: &[Node]) -> Option<Value> {
    let (leaf, parents) = nodes.split_last()?;
    match (parent_mut(root, parents)?, &leaf.name) {
        (Value::Object(map), Key::Name(name)) => map.shift_remove(name),
        (Value::Array(items), Key::Index(index)) => items
            .get_mut(*index)
            .map(|slot| std::mem::replace(slot, Value::Null)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Gaps, assign, clear, delete, lookup, lookup_path};
    use crate::core::error::ErrorKind;
    use crate::core::path::parse_path;
    use serde_json::{Value, json};

    fn set(root: &mut Value, path: &str, value: Value) -> Result<Option<Value>, crate::core::error::Error> {
        let nodes = parse_path(path).expect("parse");
        assign(root, &nodes, value, Gaps::Reject)
    }

    #[test]
    fn creates_containers_of_the_right_shape() {
        let mut root = json!({});
        set(&mut root, "app.list[0].name", json!("first")).expect("assign");
        set(&mut root, "app.grid[0][0]", json!(1)).expect("assign");
        assert_eq!(
            root,
            json!({"app": {"list": [{"name": "first"}], "grid": [[1]]}})
        );
    }

    #[test]
    fn assign_returns_the_replaced_value() {
        let mut root = json!({"app": {"a": 1}});
        let previous = set(&mut root, "app.a", json!(2)).expect("assign");
        assert_eq!(previous, Some(json!(1)));
        let previous = set(&mut root, "app.b", json!(3)).expect("assign");
        assert_eq!(previous, None);
    }

    #[test]
    fn gaps_are_rejected_unless_padding() {
        let mut root = json!({"app": {"list": []}});
        let err = set(&mut root, "app.list[2]", json!("x")).expect_err("gap");
        assert_eq!(err.kind(), ErrorKind::InvalidPath);

        let nodes = parse_path("app.list[2].id").expect("parse");
        assign(&mut root, &nodes, json!(7), Gaps::PadWithNull { max_gap: 2 }).expect("pad");
        assert_eq!(root, json!({"app": {"list": [null, null, {"id": 7}]}}));

        let nodes = parse_path("app.list[6]").expect("parse");
        let err = assign(&mut root, &nodes, json!(1), Gaps::PadWithNull { max_gap: 2 })
            .expect_err("gap over the limit");
        assert_eq!(err.kind(), ErrorKind::InvalidPath);

        let nodes = parse_path("app.list[18446744073709551614]").expect("parse");
        let err = assign(&mut root, &nodes, json!(1), Gaps::PadWithNull { max_gap: 2 })
            .expect_err("huge index");
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
        assert_eq!(root["app"]["list"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn scalars_are_not_silently_replaced() {
        let mut root = json!({"app": {"count": 3, "gone": null}});
        let err = set(&mut root, "app.count.inner", json!(1)).expect_err("scalar");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        let err = set(&mut root, "app[0]", json!(1)).expect_err("object as array");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        set(&mut root, "app.gone.inner", json!(1)).expect("null is replaced");
        assert_eq!(lookup_path(&root, "app.gone.inner"), Some(&json!(1)));
    }

    #[test]
    fn lookup_stops_at_missing_steps() {
        let root = json!({"app": {"list": ["a"], "obj": {"k": false}}});
        assert_eq!(lookup_path(&root, "app.list[0]"), Some(&json!("a")));
        assert_eq!(lookup_path(&root, "app.list[1]"), None);
        assert_eq!(lookup_path(&root, "app.obj.k"), Some(&json!(false)));
        assert_eq!(lookup_path(&root, "app.obj.k.deeper"), None);
        assert_eq!(lookup_path(&root, "app.obj[0]"), None);

        let nodes = parse_path("app.obj").expect("parse");
        assert_eq!(lookup(&root, &nodes[1..]), None);
        assert_eq!(lookup(&root["app"], &nodes[1..]), Some(&json!({"k": false})));
    }

    #[test]
    fn delete_shifts_arrays_and_keeps_key_order() {
        let mut root = json!({"app": {"list": ["a", "b", "c"], "x": 1, "y": 2, "z": 3}});
        let nodes = parse_path("app.list[1]").expect("parse");
        assert_eq!(delete(&mut root, &nodes).expect("delete"), Some(json!("b")));
        assert_eq!(root["app"]["list"], json!(["a", "c"]));

        let nodes = parse_path("app.x").expect("parse");
        delete(&mut root, &nodes).expect("delete");
        let keys: Vec<&String> = root["app"].as_object().expect("object").keys().collect();
        assert_eq!(keys, ["list", "y", "z"]);
    }

    #[test]
    fn delete_through_missing_parent_fails() {
        let mut root = json!({"app": {}});
        let nodes = parse_path("app.nope.leaf").expect("parse");
        let err = delete(&mut root, &nodes).expect_err("missing parent");
        assert_eq!(err.kind(), ErrorKind::InvalidPath);

        let nodes = parse_path("app.missing").expect("parse");
        assert_eq!(delete(&mut root, &nodes).expect("missing leaf"), None);
    }

    #[test]
    fn clear_nulls_array_slots() {
        let mut root = json!({"app": {"list": [1, 2], "k": "v"}});
        let nodes = parse_path("app.list[0]").expect("parse");
        assert_eq!(clear(&mut root, &nodes), Some(json!(1)));
        let nodes = parse_path("app.k").expect("parse");
        assert_eq!(clear(&mut root, &nodes), Some(json!("v")));
        assert_eq!(root, json!({"app": {"list": [null, 2]}}));
    }
}
