//! Fragment spread expansion.
//!
//! A spread is replaced by the entries of the named fragment, itself fully
//! expanded. Keys declared directly in the containing block win over keys a
//! fragment supplies, wherever the spread sits; among several spreads the
//! first one to supply a key wins. When both sides describe the same nested
//! block their sub-queries are merged by the same rule.

use std::mem;

use tracing::{debug, warn};

use crate::{
    error::{Result, ShapeError},
    query::{Directive, FieldSpec, Fragments, QueryTree},
};

/// Expand every fragment spread in `tree`, at any depth.
///
/// Spreads naming an unknown fragment contribute nothing. A fragment that
/// reaches itself again is reported as [`ShapeError::FragmentCycle`].
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shapeql::{Fragments, QueryTree, compile, expand};
///
/// let mut fragments = Fragments::new();
/// fragments.insert("contact".into(), QueryTree::from_json(&json!({"email": "email", "phone": "phone"})));
///
/// let tree = expand(&compile("name\n...contact\nphone: mobile"), &fragments).unwrap();
/// assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["name", "email", "phone"]);
/// ```
pub fn expand(tree: &QueryTree, fragments: &Fragments) -> Result<QueryTree> {
    Expander {
        fragments,
        active: Vec::new(),
    }
    .expand_tree(tree)
}

struct Expander<'f> {
    fragments: &'f Fragments,
    /// Fragments currently being expanded, outermost first
    active: Vec<String>,
}

impl Expander<'_> {
    fn expand_tree(&mut self, tree: &QueryTree) -> Result<QueryTree> {
        let mut out = QueryTree::new();

        for (key, spec) in tree {
            match spec {
                FieldSpec::FragmentSpread(name) => {
                    let Some(fragment) = self.fragments.get(name) else {
                        debug!(fragment = %name, "unknown fragment, spread dropped");
                        continue;
                    };
                    if self.active.contains(name) {
                        let mut chain = self.active.clone();
                        chain.push(name.clone());
                        warn!(chain = %chain.join(" -> "), "fragment cycle");
                        return Err(ShapeError::FragmentCycle(chain));
                    }

                    self.active.push(name.clone());
                    let expanded = self.expand_tree(fragment)?;
                    self.active.pop();

                    for (fragment_key, fragment_spec) in expanded {
                        merge_entry(&mut out, fragment_key, fragment_spec, false);
                    }
                }
                FieldSpec::Directive(
                    directive @ Directive {
                        nested: Some(nested),
                        ..
                    },
                ) => {
                    let spec = FieldSpec::Directive(Directive {
                        nested: Some(self.expand_tree(nested)?),
                        ..directive.clone()
                    });
                    merge_entry(&mut out, key.clone(), spec, true);
                }
                other => merge_entry(&mut out, key.clone(), other.clone(), true),
            }
        }
        Ok(out)
    }
}

/// Put `incoming` under `key`; on collision the winner's settings are kept
/// and nested sub-queries are merged.
fn merge_entry(out: &mut QueryTree, key: String, incoming: FieldSpec, incoming_wins: bool) {
    if !out.contains_key(&key) {
        out.insert(key, incoming);
        return;
    }
    let Some(existing) = out.get_mut(&key) else {
        return;
    };
    let current = mem::replace(existing, FieldSpec::Literal(String::new()));
    *existing = if incoming_wins {
        overlay(incoming, current)
    } else {
        overlay(current, incoming)
    };
}

fn overlay(primary: FieldSpec, secondary: FieldSpec) -> FieldSpec {
    match (primary, secondary) {
        (
            FieldSpec::Directive(mut primary),
            FieldSpec::Directive(Directive {
                nested: Some(secondary_nested),
                ..
            }),
        ) => {
            if let Some(primary_nested) = primary.nested.take() {
                let mut merged = primary_nested;
                for (key, spec) in secondary_nested {
                    merge_entry(&mut merged, key, spec, false);
                }
                primary.nested = Some(merged);
            }
            FieldSpec::Directive(primary)
        }
        (primary, _) => primary,
    }
}
