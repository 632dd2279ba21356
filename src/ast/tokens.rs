/// Lexical tokens of the embedded expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Floating point number
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 0.5
    /// ```
    Float(f64),

    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0
    /// ```
    Integer(i64),

    /// String literal enclosed in single or double quotes
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'item #1'
    /// ```
    String(String),

    /// Boolean values
    Boolean(bool),

    /// `null` or `undefined`
    Null,

    /// Name looked up in the evaluation scope, or a property after `.`
    ///
    /// Starts with a letter, `_` or `$`, followed by letters, digits, `_` or `$`.
    ///
    /// # Examples
    /// ```text
    /// user
    /// first_name
    /// $total
    /// ```
    Identifier(String),

    // Operators
    /// Addition or string concatenation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    /// Loose equality (`==`)
    EqEq,
    /// Strict equality (`===`)
    EqEqEq,
    /// Loose inequality (`!=`)
    NotEq,
    /// Strict inequality (`!==`)
    NotEqEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    /// Logical AND (`&&`)
    AndAnd,
    /// Logical OR (`||`)
    OrOr,
    /// Nullish coalescing (`??`)
    QuestionQuestion,
    /// Logical NOT (`!`)
    Bang,

    /// Ternary condition marker (`?`)
    Question,
    /// Optional member access (`?.`)
    ///
    /// # Examples
    /// ```text
    /// user?.profile?.email
    /// ```
    QuestionDot,

    // Delimiters
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,

    /// End of input
    Eof,
}
