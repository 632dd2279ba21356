use std::{collections::HashMap, sync::LazyLock};

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

static BARE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.]+$").expect("path pattern is valid"));

/// Prefix marking a fragment spread, both in query text and as a tree key.
pub const SPREAD_PREFIX: &str = "...";

/// Named fragments available to spreads.
pub type Fragments = HashMap<String, QueryTree>;

/// Compiled query: output key → how to produce it.
///
/// Keys keep insertion order. Order matters when fragments are merged
/// (an explicitly declared key beats one supplied by a fragment).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryTree(IndexMap<String, FieldSpec>);

/// How one output key is produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldSpec {
    /// Bare name or dot path, resolved by lookup
    ///
    /// # Examples
    /// ```text
    /// email
    /// contact: profile.email
    /// ```
    Literal(String),

    /// Expression evaluated against the scope
    ///
    /// # Examples
    /// ```text
    /// fullName: first + ' ' + last
    /// ```
    Computed(String),

    /// Field with conditions, defaults, transforms, pagination or nesting
    Directive(Directive),

    /// Placeholder for a named fragment, expanded before shaping
    ///
    /// # Examples
    /// ```text
    /// ...userFields
    /// ```
    FragmentSpread(String),
}

/// Field specification carrying directive metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    /// Source path, expression or `||` fallback chain; defaults to the key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// `@skip(if: "...")`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_if: Option<String>,

    /// `@include(if: "...")`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_if: Option<String>,

    /// `@default(value: "...")`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// `@transform(fn: "...")`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,

    /// Block argument `filter: "..."`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Block argument `limit: N`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Block argument `skip: N`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,

    /// Sub-query applied to an object value or to each array item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<QueryTree>,
}

impl QueryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, spec: FieldSpec) -> Option<FieldSpec> {
        self.0.insert(key.into(), spec)
    }

    /// Add a spread of `fragment` at the current position.
    pub fn insert_spread(&mut self, fragment: impl Into<String>) {
        let name = fragment.into();
        self.0
            .insert(format!("{SPREAD_PREFIX}{name}"), FieldSpec::FragmentSpread(name));
    }

    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, FieldSpec> {
        self.0.iter()
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut FieldSpec> {
        self.0.get_mut(key)
    }

    /// Whether any level of this tree still holds a fragment spread.
    pub fn contains_spreads(&self) -> bool {
        self.0.values().any(|spec| match spec {
            FieldSpec::FragmentSpread(_) => true,
            FieldSpec::Directive(Directive {
                nested: Some(tree), ..
            }) => tree.contains_spreads(),
            _ => false,
        })
    }

    /// Deepest level of nesting; a flat tree has depth 1.
    pub fn depth(&self) -> usize {
        1 + self
            .0
            .values()
            .filter_map(|spec| match spec {
                FieldSpec::Directive(Directive {
                    nested: Some(tree), ..
                }) => Some(tree.depth()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Build a tree from the JSON-object form of a query.
    ///
    /// - a string value is a path, a `||` fallback chain or an expression;
    /// - `true` selects the key itself;
    /// - an object with any of `path`, `skipIf`, `includeIf`, `default`,
    ///   `transform`, `filter`, `limit`, `skip`, `fields` is a directive,
    ///   `fields` holding its sub-query;
    /// - any other object is a nested sub-query;
    /// - a `...name` key is a fragment spread.
    ///
    /// Entries of any other shape are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use serde_json::json;
    /// use shapeql::{FieldSpec, QueryTree};
    ///
    /// let tree = QueryTree::from_json(&json!({
    ///     "name": "name",
    ///     "email": "contact.email",
    ///     "label": "name + '!'",
    /// }));
    /// assert_eq!(tree.get("email"), Some(&FieldSpec::Literal("contact.email".into())));
    /// assert_eq!(tree.get("label"), Some(&FieldSpec::Computed("name + '!'".into())));
    /// ```
    pub fn from_json(query: &Value) -> Self {
        let mut tree = QueryTree::new();
        let Some(entries) = query.as_object() else {
            return tree;
        };

        for (key, value) in entries {
            if let Some(name) = key.strip_prefix(SPREAD_PREFIX) {
                tree.insert_spread(name);
                continue;
            }
            let spec = match value {
                Value::String(source) => FieldSpec::classify(source),
                Value::Bool(true) => FieldSpec::Literal(key.clone()),
                Value::Object(map) if DIRECTIVE_KEYS.iter().any(|k| map.contains_key(*k)) => {
                    FieldSpec::Directive(Directive::from_json(map))
                }
                Value::Object(_) => FieldSpec::Directive(Directive {
                    nested: Some(QueryTree::from_json(value)),
                    ..Directive::default()
                }),
                _ => continue,
            };
            tree.insert(key.clone(), spec);
        }
        tree
    }
}

const DIRECTIVE_KEYS: [&str; 9] = [
    "path",
    "skipIf",
    "includeIf",
    "default",
    "transform",
    "filter",
    "limit",
    "skip",
    "fields",
];

impl Directive {
    fn from_json(map: &serde_json::Map<String, Value>) -> Self {
        let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        let count = |key: &str| {
            map.get(key).and_then(|v| match v {
                Value::Number(n) => n.as_u64().map(|n| n as usize),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
        };

        Directive {
            path: text("path"),
            skip_if: text("skipIf"),
            include_if: text("includeIf"),
            default: map.get("default").cloned(),
            transform: text("transform"),
            filter: text("filter"),
            limit: count("limit"),
            skip: count("skip"),
            nested: map.get("fields").map(QueryTree::from_json),
        }
    }
}

impl FieldSpec {
    /// Classify a field source: bare dot path → `Literal`, top-level `||`
    /// chain → `Directive` with that path, anything else → `Computed`.
    pub fn classify(source: &str) -> Self {
        let source = source.trim();
        if is_bare_path(source) {
            FieldSpec::Literal(source.to_string())
        } else if split_fallbacks(source).len() > 1 {
            FieldSpec::Directive(Directive {
                path: Some(source.to_string()),
                ..Directive::default()
            })
        } else {
            FieldSpec::Computed(source.to_string())
        }
    }
}

impl<'a> IntoIterator for &'a QueryTree {
    type Item = (&'a String, &'a FieldSpec);
    type IntoIter = indexmap::map::Iter<'a, String, FieldSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for QueryTree {
    type Item = (String, FieldSpec);
    type IntoIter = indexmap::map::IntoIter<String, FieldSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldSpec)> for QueryTree {
    fn from_iter<I: IntoIterator<Item = (K, FieldSpec)>>(iter: I) -> Self {
        QueryTree(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Build the fragment registry from a JSON object of name → query object.
pub fn fragments_from_json(fragments: &Value) -> Fragments {
    fragments
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(name, query)| (name.clone(), QueryTree::from_json(query)))
                .collect()
        })
        .unwrap_or_default()
}

/// A plain dot path: word characters and dots, no operators.
pub fn is_bare_path(source: &str) -> bool {
    BARE_PATH.is_match(source)
}

/// Split `source` on `||` outside quotes, parentheses and brackets.
///
/// Alternatives are trimmed. A source without a top-level `||` comes back
/// as a single element.
pub fn split_fallbacks(source: &str) -> Vec<&str> {
    let bytes = source.as_bytes();
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                b'|' if depth == 0 && bytes.get(i + 1) == Some(&b'|') => {
                    parts.push(source[start..i].trim());
                    i += 1;
                    start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    parts.push(source[start..].trim());
    parts
}

/// What a caller can pass as a query.
#[derive(Debug, Clone, Copy)]
pub enum Query<'a> {
    /// Query text, compiled on use
    Text(&'a str),
    /// Pre-compiled tree
    Tree(&'a QueryTree),
}

impl<'a> From<&'a str> for Query<'a> {
    fn from(text: &'a str) -> Self {
        Query::Text(text)
    }
}

impl<'a> From<&'a String> for Query<'a> {
    fn from(text: &'a String) -> Self {
        Query::Text(text)
    }
}

impl<'a> From<&'a QueryTree> for Query<'a> {
    fn from(tree: &'a QueryTree) -> Self {
        Query::Tree(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_fallbacks_respects_quotes_and_groups() {
        assert_eq!(split_fallbacks(r#"a || b || "X""#), vec!["a", "b", "\"X\""]);
        assert_eq!(split_fallbacks("'a||b' || c"), vec!["'a||b'", "c"]);
        assert_eq!(split_fallbacks("(a || b) && c"), vec!["(a || b) && c"]);
        assert_eq!(split_fallbacks("plain"), vec!["plain"]);
    }

    #[test]
    fn test_classify() {
        assert_eq!(FieldSpec::classify("a.b_c"), FieldSpec::Literal("a.b_c".into()));
        assert_eq!(FieldSpec::classify("a + 1"), FieldSpec::Computed("a + 1".into()));
        assert!(matches!(
            FieldSpec::classify("a || 'x'"),
            FieldSpec::Directive(Directive { path: Some(_), .. })
        ));
    }

    #[test]
    fn test_from_json_directive_and_nesting() {
        let tree = QueryTree::from_json(&json!({
            "title": true,
            "posts": {"limit": "2", "fields": {"title": "title"}},
            "author": {"name": "name"},
            "...common": true,
            "ignored": 42
        }));

        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["title", "posts", "author", "...common"]);
        match tree.get("posts") {
            Some(FieldSpec::Directive(d)) => {
                assert_eq!(d.limit, Some(2));
                assert!(d.nested.as_ref().is_some_and(|t| t.contains_key("title")));
            }
            other => panic!("expected directive, got {:?}", other),
        }
        assert!(tree.contains_spreads());
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut tree = QueryTree::new();
        tree.insert("name", FieldSpec::Literal("name".into()));
        assert_eq!(serde_json::to_value(&tree).unwrap(), json!({"name": {"literal": "name"}}));
    }
}
