//! Dot-path lookup and depth-first key search over JSON data.

use serde_json::Value;

/// A single step of a dot path.
///
/// # Examples
/// - `user.email` → `[Field("user"), Field("email")]`
/// - `items.0.title` → `[Field("items"), Index(0), Field("title")]`
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment<'p> {
    /// Object field access by name
    Field(&'p str),

    /// Array element access by index; also tried as a field name on objects
    Index(usize),
}

/// Split a dot path into segments. Numeric segments become indices.
pub fn parse_path(path: &str) -> Vec<PathSegment<'_>> {
    path.split('.')
        .map(|segment| match segment.parse::<usize>() {
            Ok(i) => PathSegment::Index(i),
            Err(_) => PathSegment::Field(segment),
        })
        .collect()
}

fn step<'v>(value: &'v Value, segment: &PathSegment<'_>) -> Option<&'v Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Field(name)) => map.get(*name),
        (Value::Object(map), PathSegment::Index(i)) => map.get(&i.to_string()),
        (Value::Array(items), PathSegment::Index(i)) => items.get(*i),
        _ => None,
    }
}

/// Resolve `path` against `data` by sequential descent.
///
/// Returns `None` as soon as a step is missing, and when the final value is
/// `null`: both mean "not resolved" to the callers.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shapeql::path::get_by_path;
///
/// let data = json!({"user": {"tags": ["a", "b"]}});
/// assert_eq!(get_by_path(&data, "user.tags.1"), Some(&json!("b")));
/// assert_eq!(get_by_path(&data, "user.name.first"), None);
/// ```
pub fn get_by_path<'v>(data: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return None;
    }
    parse_path(path)
        .iter()
        .try_fold(data, |current, segment| step(current, segment))
        .filter(|value| !value.is_null())
}

/// Find `key` anywhere inside `reference`.
///
/// Pre-order, depth-first: `reference[key]` first, then each own value that
/// is an object or array, in enumeration order. The first non-null match
/// wins. When several branches share the key name the answer is simply the
/// first one in that order.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shapeql::path::auto_resolve;
///
/// let data = json!({"profile": {"info": {"email": "x@y.com"}}});
/// assert_eq!(auto_resolve(&data, "email"), Some(&json!("x@y.com")));
/// ```
pub fn auto_resolve<'v>(reference: &'v Value, key: &str) -> Option<&'v Value> {
    let children: Box<dyn Iterator<Item = &'v Value>> = match reference {
        Value::Object(map) => {
            if let Some(found) = map.get(key).filter(|v| !v.is_null()) {
                return Some(found);
            }
            Box::new(map.values())
        }
        Value::Array(items) => {
            if let Some(found) = key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .filter(|v| !v.is_null())
            {
                return Some(found);
            }
            Box::new(items.iter())
        }
        _ => return None,
    };

    children
        .filter(|child| child.is_object() || child.is_array())
        .find_map(|child| auto_resolve(child, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("items.0.title"),
            vec![
                PathSegment::Field("items"),
                PathSegment::Index(0),
                PathSegment::Field("title")
            ]
        );
    }

    #[test]
    fn test_get_by_path_short_circuits() {
        let data = json!({"a": {"b": null}});
        assert_eq!(get_by_path(&data, "a.b"), None);
        assert_eq!(get_by_path(&data, "a.b.c"), None);
        assert_eq!(get_by_path(&data, "a"), Some(&json!({"b": null})));
        assert_eq!(get_by_path(&data, ""), None);
    }

    #[test]
    fn test_numeric_segment_on_object_is_a_key() {
        let data = json!({"codes": {"404": "not found"}});
        assert_eq!(get_by_path(&data, "codes.404"), Some(&json!("not found")));
    }

    #[test]
    fn test_auto_resolve_prefers_direct_key() {
        let data = json!({"nested": {"id": 2}, "id": 1});
        assert_eq!(auto_resolve(&data, "id"), Some(&json!(1)));
    }

    #[test]
    fn test_auto_resolve_is_pre_order_in_insertion_order() {
        let data = json!({
            "first": {"deep": {"name": "deep-first"}},
            "second": {"name": "shallow-second"}
        });
        assert_eq!(auto_resolve(&data, "name"), Some(&json!("deep-first")));
    }

    #[test]
    fn test_auto_resolve_descends_into_arrays_and_skips_nulls() {
        let data = json!({"email": null, "users": [{"id": 1}, {"email": "b@c.d"}]});
        assert_eq!(auto_resolve(&data, "email"), Some(&json!("b@c.d")));
        assert_eq!(auto_resolve(&data, "missing"), None);
        assert_eq!(auto_resolve(&json!("scalar"), "x"), None);
    }
}
