//! A small declarative language for reshaping JSON.
//!
//! A query names the output fields; each one is a path into the data, a
//! computed expression or a field with directives (`@skip`, `@include`,
//! `@default`, `@transform`, `filter`, `limit`, `skip`) and an optional
//! nested block. Queries come as text or as JSON and may spread reusable
//! fragments.
//!
//! ```
//! use serde_json::json;
//!
//! let data = json!({
//!     "user": {"first": "Ada", "last": "Lovelace"},
//!     "posts": [
//!         {"title": "Notes", "published": true},
//!         {"title": "Draft", "published": false}
//!     ]
//! });
//!
//! let query = r#"
//! name: user.first + ' ' + user.last
//! posts(filter: "published") {
//!   title @transform(fn: "value.toUpperCase()")
//! }
//! "#;
//!
//! let out = shapeql::shape(&data, query, None).unwrap();
//! assert_eq!(out, json!({"name": "Ada Lovelace", "posts": [{"title": "NOTES"}]}));
//! ```

pub mod ast;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod fragments;
pub mod lexer;
pub mod parser;
pub mod path;
pub mod query;
pub mod shaper;
pub mod value;

pub use ast::{BinOp, Expr, Token, UnaryOp};
pub use compiler::{Compiler, Diagnostic, DiagnosticKind, compile, compile_with_diagnostics};
pub use error::{Result, ShapeError};
pub use evaluator::{EvalContext, EvalError, Evaluator, evaluate, try_evaluate};
pub use fragments::expand;
pub use lexer::{LexError, Lexer, Position};
pub use parser::{ParseError, Parser, parse_expr};
pub use query::{Directive, FieldSpec, Fragments, Query, QueryTree, fragments_from_json};
pub use shaper::{ShapeOptions, Shaper};
pub use value::ValueExt;

use serde_json::Value;

/// Shape `data` with `query` using default options.
///
/// `query` is query text, or a tree built with [`compile`] or
/// [`QueryTree::from_json`]. Field-level failures become `null`; the only
/// error is a fragment cycle.
pub fn shape<'q>(
    data: &Value,
    query: impl Into<Query<'q>>,
    fragments: Option<&Fragments>,
) -> Result<Value> {
    let shaper = match fragments {
        Some(fragments) => Shaper::new().with_fragments(fragments),
        None => Shaper::new(),
    };
    shaper.shape(data, query)
}
