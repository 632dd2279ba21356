//! The shaping engine: walks a [`QueryTree`] over JSON data.
//!
//! Per key the pipeline is fixed: skip check, include check, resolve,
//! default, transform, then array pipeline (filter, skip, limit, nested),
//! object recursion or pass-through. Every failure is absorbed where it
//! happens; the output always carries every key of the tree.

use std::borrow::Cow;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::{
    compiler::compile,
    error::Result,
    evaluator::{EvalContext, Evaluator},
    fragments::expand,
    path::{auto_resolve, get_by_path},
    query::{Directive, FieldSpec, Fragments, Query, QueryTree, split_fallbacks},
    value::ValueExt,
};

/// Options for a shaping pass
#[derive(Debug, Clone)]
pub struct ShapeOptions {
    /// Search the whole root for a key when direct lookup fails
    pub auto_resolve: bool,
    /// Deepest query level the engine descends to; deeper blocks yield `null`
    pub max_depth: Option<usize>,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        ShapeOptions {
            auto_resolve: true,
            max_depth: None,
        }
    }
}

impl ShapeOptions {
    pub fn with_auto_resolve(mut self, enabled: bool) -> Self {
        self.auto_resolve = enabled;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Reusable shaping configuration: options plus a fragment registry.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shapeql::{ShapeOptions, Shaper};
///
/// let data = json!({
///     "user": {"name": "Ada", "posts": [{"title": "a"}, {"title": "b"}, {"title": "c"}]}
/// });
/// let shaper = Shaper::new().with_options(ShapeOptions::default().with_auto_resolve(false));
///
/// let out = shaper.shape(&data, "user {\n name\n posts(limit: 2) { title }\n}").unwrap();
/// assert_eq!(
///     out,
///     json!({"user": {"name": "Ada", "posts": [{"title": "a"}, {"title": "b"}]}})
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Shaper<'f> {
    fragments: Option<&'f Fragments>,
    options: ShapeOptions,
    evaluator: Evaluator,
}

impl<'f> Shaper<'f> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragments(mut self, fragments: &'f Fragments) -> Self {
        self.fragments = Some(fragments);
        self
    }

    pub fn with_options(mut self, options: ShapeOptions) -> Self {
        self.options = options;
        self
    }

    /// Shape `data` with `query`, given as text or as a compiled tree.
    ///
    /// Spreads still present in the tree are expanded first. The only
    /// error is a fragment cycle.
    pub fn shape<'q>(&self, data: &Value, query: impl Into<Query<'q>>) -> Result<Value> {
        let compiled;
        let tree = match query.into() {
            Query::Text(text) => {
                compiled = compile(text);
                &compiled
            }
            Query::Tree(tree) => tree,
        };

        let expanded;
        let tree = if tree.contains_spreads() {
            let empty = Fragments::new();
            expanded = expand(tree, self.fragments.unwrap_or(&empty))?;
            &expanded
        } else {
            tree
        };

        debug!(fields = tree.len(), depth = tree.depth(), "shaping");
        let ctx = EvalContext::new(data, data);
        Ok(self.shape_level(tree, &ctx, 1))
    }

    fn shape_level(&self, tree: &QueryTree, ctx: &EvalContext<'_>, depth: usize) -> Value {
        let mut out = Map::new();
        for (key, spec) in tree {
            let value = match spec {
                FieldSpec::Literal(path) => self.resolve_literal(path, ctx).into_owned(),
                FieldSpec::Computed(expr) => self.eval(expr, ctx),
                FieldSpec::Directive(directive) => self.shape_directive(key, directive, ctx, depth),
                // Trees are expanded before shaping; a leftover spread has no output key
                FieldSpec::FragmentSpread(_) => continue,
            };
            out.insert(key.clone(), value);
        }
        Value::Object(out)
    }

    fn shape_directive(
        &self,
        key: &str,
        directive: &Directive,
        ctx: &EvalContext<'_>,
        depth: usize,
    ) -> Value {
        if let Some(condition) = &directive.skip_if
            && self.eval(condition, ctx).is_truthy()
        {
            return Value::Null;
        }
        if let Some(condition) = &directive.include_if
            && !self.eval(condition, ctx).is_truthy()
        {
            return Value::Null;
        }

        let mut value = match &directive.path {
            Some(path) => self.resolve_chain(path, ctx),
            None => ctx
                .current
                .get(key)
                .filter(|v| !v.is_null())
                .or_else(|| self.auto_resolve(ctx.root, key))
                .map_or(Cow::Owned(Value::Null), Cow::Borrowed),
        };

        if value.is_null()
            && let Some(default) = &directive.default
        {
            value = Cow::Owned(default.clone());
        }

        if let Some(transform) = &directive.transform
            && !value.is_null()
        {
            match self.evaluator.eval_transform(transform, ctx, &value) {
                Ok(transformed) => value = Cow::Owned(transformed),
                Err(e) => trace!(key, transform = %transform, error = %e, "transform failed, value kept"),
            }
        }

        if let Value::Array(items) = &*value {
            return self.shape_array(key, directive, items, ctx, depth);
        }
        match &directive.nested {
            Some(nested) if value.is_object() => self.shape_child(key, nested, &value, ctx, depth),
            // null, or a scalar where a block was expected
            Some(_) => Value::Null,
            None => value.into_owned(),
        }
    }

    /// filter, then skip, then limit, then the nested query per item.
    fn shape_array(
        &self,
        key: &str,
        directive: &Directive,
        items: &[Value],
        ctx: &EvalContext<'_>,
        depth: usize,
    ) -> Value {
        let mut kept: Vec<&Value> = items.iter().collect();

        if let Some(filter) = &directive.filter {
            kept.retain(|item| {
                let item_ctx = EvalContext::new(ctx.root, item);
                self.eval(filter, &item_ctx) == Value::Bool(true)
            });
        }

        let kept = kept
            .into_iter()
            .skip(directive.skip.unwrap_or(0))
            .take(directive.limit.unwrap_or(usize::MAX));

        let shaped = match &directive.nested {
            Some(nested) => kept
                .map(|item| self.shape_child(key, nested, item, ctx, depth))
                .collect(),
            None => kept.cloned().collect(),
        };
        Value::Array(shaped)
    }

    fn shape_child(
        &self,
        key: &str,
        nested: &QueryTree,
        data: &Value,
        ctx: &EvalContext<'_>,
        depth: usize,
    ) -> Value {
        if self.options.max_depth.is_some_and(|max| depth >= max) {
            trace!(key, depth, "max depth reached");
            return Value::Null;
        }
        let child_ctx = EvalContext::new(ctx.root, data).with_parent_key(Some(key));
        self.shape_level(nested, &child_ctx, depth + 1)
    }

    /// Current data, then root, then a search of the root.
    fn resolve_literal<'c>(&self, path: &str, ctx: &EvalContext<'c>) -> Cow<'c, Value> {
        get_by_path(ctx.current, path)
            .or_else(|| get_by_path(ctx.root, path))
            .or_else(|| self.auto_resolve(ctx.root, path))
            .map_or(Cow::Owned(Value::Null), Cow::Borrowed)
    }

    /// First non-null alternative of `a || b || "literal"`.
    fn resolve_chain<'c>(&self, path: &str, ctx: &EvalContext<'c>) -> Cow<'c, Value> {
        for alternative in split_fallbacks(path) {
            if alternative.is_empty() {
                continue;
            }
            if let Some(literal) = quoted_literal(alternative) {
                return Cow::Owned(Value::String(literal.to_string()));
            }
            if let Some(found) = get_by_path(ctx.current, alternative)
                .or_else(|| self.auto_resolve(ctx.root, alternative))
            {
                return Cow::Borrowed(found);
            }
            let evaluated = self.eval(alternative, ctx);
            if !evaluated.is_null() {
                return Cow::Owned(evaluated);
            }
        }
        Cow::Owned(Value::Null)
    }

    fn auto_resolve<'v>(&self, root: &'v Value, key: &str) -> Option<&'v Value> {
        if self.options.auto_resolve {
            auto_resolve(root, key)
        } else {
            None
        }
    }

    fn eval(&self, expr: &str, ctx: &EvalContext<'_>) -> Value {
        self.evaluator.eval_str(expr, ctx).unwrap_or_else(|e| {
            trace!(expr, error = %e, "expression failed");
            Value::Null
        })
    }
}

/// `"text"` or `'text'` with no other quote of the same kind inside.
fn quoted_literal(source: &str) -> Option<&str> {
    let quote = source.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = source.strip_prefix(quote)?.strip_suffix(quote)?;
    (!inner.contains(quote)).then_some(inner)
}
