//! Abstract syntax tree produced by the parser.
//!
//! Nodes borrow their tokens from the scanner's output (`'a`), so the tree
//! is cheap to build and carries exact source locations for diagnostics.
//! Function declarations are reference counted: the same node is shared by
//! the statement that declares it and by every closure created from it.

use std::rc::Rc;

use crate::token::Token;

/// Identity of an expression node that refers to a variable binding
/// (`Variable`, `Assign`, `This`, `Super`).  Handed out by the parser,
/// used by the resolver to record scope depths.
pub type ExprId = usize;

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal, stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    True,

    False,

    Nil,
}

/// Every kind of *expression* in Lox.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    /// `name = value`
    Assign {
        id: ExprId,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    /// Infix operator: arithmetic, comparison, equality.
    Binary {
        left: Box<Expr<'a>>,
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// `callee(arguments…)`
    Call {
        callee: Box<Expr<'a>>,
        /// The closing `)`, retained for error reporting.
        paren: &'a Token<'a>,
        arguments: Vec<Expr<'a>>,
    },

    /// `object.name`
    Get {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
    },

    /// `( expression )`
    Grouping(Box<Expr<'a>>),

    Literal(LiteralValue),

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr<'a>>,
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// `object.name = value`
    Set {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    /// `super.method`
    Super {
        id: ExprId,
        keyword: &'a Token<'a>,
        method: &'a Token<'a>,
    },

    This {
        id: ExprId,
        keyword: &'a Token<'a>,
    },

    /// Prefix `!` or `-`.
    Unary {
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    Variable {
        id: ExprId,
        name: &'a Token<'a>,
    },
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl<'a> {
    pub name: &'a Token<'a>,

    /// Parameter name tokens (at most 255 are accepted without a diagnostic).
    pub params: Vec<&'a Token<'a>>,

    pub body: Vec<Stmt<'a>>,
}

/// Every kind of *statement*.  A program is a sequence of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt<'a> {
    /// `{ … }`
    Block(Vec<Stmt<'a>>),

    Class {
        name: &'a Token<'a>,
        /// Always an [`Expr::Variable`] when present.
        superclass: Option<Expr<'a>>,
        methods: Vec<Rc<FunctionDecl<'a>>>,
    },

    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr<'a>),

    Function(Rc<FunctionDecl<'a>>),

    If {
        condition: Expr<'a>,
        then_branch: Box<Stmt<'a>>,
        else_branch: Option<Box<Stmt<'a>>>,
    },

    Return {
        /// The `return` keyword, for error locations.
        keyword: &'a Token<'a>,
        /// Absent ⇒ `nil` is returned.
        value: Option<Expr<'a>>,
    },

    Var {
        name: &'a Token<'a>,
        initializer: Option<Expr<'a>>,
    },

    /// `while` loop; `for` loops are desugared into this.
    While {
        condition: Expr<'a>,
        body: Box<Stmt<'a>>,
    },
}
