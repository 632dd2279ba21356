use crate::ast::{BinOp, UnaryOp};

/// Abstract Syntax Tree node of an embedded expression.
///
/// Expressions appear as computed fields, as `@skip`/`@include` conditions,
/// as block `filter` arguments and as `@transform` bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Literal floating point number
    Float(f64),

    /// Literal integer
    Integer(i64),

    /// String literal
    ///
    /// # Example
    /// ```text
    /// 'hello'
    /// ```
    String(String),

    /// Boolean literal
    Boolean(bool),

    /// `null` / `undefined`
    Null,

    /// Array literal
    ///
    /// # Example
    /// ```text
    /// [first, last]
    /// ```
    Array(Vec<Expr>),

    // References
    /// Scope lookup by name
    ///
    /// # Example
    /// ```text
    /// firstName
    /// ```
    Identifier(String),

    // Access
    /// Property access
    ///
    /// # Examples
    /// ```text
    /// user.name
    /// user?.name
    /// ```
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },

    /// Computed index access
    ///
    /// # Examples
    /// ```text
    /// items[0]
    /// user['first name']
    /// ```
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },

    /// Built-in method call on a receiver
    ///
    /// # Examples
    /// ```text
    /// name.toUpperCase()
    /// tags.join(', ')
    /// ```
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        optional: bool,
    },

    /// Boundary of an access chain containing `?.`.
    ///
    /// A short-circuit raised anywhere inside the chain stops here and
    /// yields `null`.
    OptionalChain(Box<Expr>),

    // Operations
    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Prefix operation
    UnaryOp { op: UnaryOp, operand: Box<Expr> },

    /// Conditional expression
    ///
    /// # Example
    /// ```text
    /// age >= 18 ? 'adult' : 'minor'
    /// ```
    Conditional {
        condition: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}
