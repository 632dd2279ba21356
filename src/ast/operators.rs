/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    // Comparison
    /// Loose equal (`==`)
    Equal,
    /// Loose not equal (`!=`)
    NotEqual,
    /// Strict equal (`===`)
    StrictEqual,
    /// Strict not equal (`!==`)
    StrictNotEqual,
    /// Less than (`<`)
    LessThan,
    /// Greater than (`>`)
    GreaterThan,
    /// Less than or equal (`<=`)
    LessEqual,
    /// Greater than or equal (`>=`)
    GreaterEqual,

    // Arithmetic
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
    /// Remainder (`%`)
    Modulo,

    // Logical
    /// Logical AND (`&&`), yields one of its operands
    And,
    /// Logical OR (`||`), yields one of its operands
    Or,

    // Null-coalescing
    /// Null-coalescing (`??`)
    NullCoalesce,
}

/// Unary prefix operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Logical negation (`!`)
    Not,
    /// Numeric negation (`-`)
    Negate,
}
