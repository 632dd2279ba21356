//! # Expression Language - Abstract Syntax Tree
//!
//! Syntax tree of the small expression language embedded in shaping queries.
//! Expressions compute field values, decide `@skip` / `@include`, filter
//! array items and transform resolved values.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, lookups, access, operations)
//! - **[operators]** - Binary and unary operators
//!
//! ## Quick Start
//!
//! ```text
//! firstName + ' ' + lastName
//! user?.profile?.email ?? 'n/a'
//! tags.length > 2 ? tags.slice(0, 2).join(', ') : tags.join(', ')
//! ```
//!
//! ## Scope
//!
//! Identifiers resolve against a layered scope: extra bindings (such as
//! `value` inside a transform), then the parent key alias, then the keys of
//! the current data, then the keys of the root data.
//!
//! ## Failure
//!
//! An undefined identifier, a property read on `null` or a type mismatch is a
//! failure. Callers in the shaping engine turn failures into `null`.
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::Expr;
pub use operators::{BinOp, UnaryOp};
pub use tokens::Token;
