//! Static resolver pass for the **Lox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<&str,bool>` tracking declared/defined).
//! 2. Report static errors (redeclaration, self‑referencing initializer,
//!    misplaced `return` / `this` / `super`, value returned from `init`).
//! 3. Tell the interpreter, for *each* local variable reference, how many
//!    scopes out its binding lives.  References found in no scope are left
//!    unrecorded and become dynamic global lookups.
//!
//! Errors are collected, never fatal: the walk always completes.

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::class::INITIALIZER;
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::stack::ensure_sufficient_stack;
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;

/// What kind of function body we are inside.  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

/// What kind of class body we are inside.  Used to validate `this`/`super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances by calling back into the interpreter.
pub struct Resolver<'a, 'interp> {
    interpreter: &'interp mut Interpreter<'a>,
    scopes: Vec<HashMap<&'a str, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
    errors: Vec<LoxError>,
}

impl<'a, 'interp> Resolver<'a, 'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter<'a>) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            errors: Vec::new(),
        }
    }

    /// Walk all top‑level statements and return the static errors found.
    pub fn resolve(mut self, statements: &[Stmt<'a>]) -> Vec<LoxError> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_stmts(statements);

        info!("Resolve pass finished with {} error(s)", self.errors.len());

        self.errors
    }

    fn resolve_stmts(&mut self, statements: &[Stmt<'a>]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt<'a>) {
        ensure_sufficient_stack(|| self.visit_stmt(stmt))
    }

    fn visit_stmt(&mut self, stmt: &Stmt<'a>) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                debug!("Resolving class '{}'", name.lexeme);

                let enclosing_class = self.current_class;
                self.current_class = ClassType::Class;

                self.declare(*name);
                self.define(*name);

                if let Some(superclass) = superclass {
                    if let Expr::Variable {
                        name: super_name, ..
                    } = superclass
                    {
                        if super_name.lexeme == name.lexeme {
                            self.error(super_name, "A class can't inherit from itself.");
                        }
                    }

                    self.current_class = ClassType::Subclass;
                    self.resolve_expr(superclass);

                    self.begin_scope();
                    self.bind_implicit("super");
                }

                self.begin_scope();
                self.bind_implicit("this");

                for method in methods {
                    let kind = if method.name.lexeme == INITIALIZER {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };

                    self.resolve_function(method, kind);
                }

                self.end_scope();

                if superclass.is_some() {
                    self.end_scope();
                }

                self.current_class = enclosing_class;
            }

            Stmt::Expression(expr) => self.resolve_expr(expr),

            Stmt::Function(declaration) => {
                // The name is visible inside its own body, enabling recursion.
                self.declare(declaration.name);
                self.define(declaration.name);
                self.resolve_function(declaration, FunctionType::Function);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch.as_deref() {
                    self.resolve_stmt(else_branch);
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }

                    self.resolve_expr(expr);
                }
            }

            Stmt::Var { name, initializer } => {
                self.declare(*name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(*name);
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr<'a>) {
        ensure_sufficient_stack(|| self.visit_expr(expr))
    }

    fn visit_expr(&mut self, expr: &Expr<'a>) {
        match expr {
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name.lexeme);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Literal(_) => {}

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.")
                    }
                    ClassType::Class => self.error(
                        keyword,
                        "Can't use 'super' in a class with no superclass.",
                    ),
                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword.lexeme);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                }

                self.resolve_local(*id, keyword.lexeme);
            }

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme) == Some(&false) {
                        self.error(name, "Can't read local variable in its own initializer.");
                    }
                }

                self.resolve_local(*id, name.lexeme);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function’s parameters + body.
    fn resolve_function(&mut self, declaration: &FunctionDecl<'a>, kind: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &declaration.params {
            self.declare(*param);
            self.define(*param);
        }
        self.resolve_stmts(&declaration.body);
        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Redeclaring in the same local scope is reported, but the new
    /// declaration still takes effect.  Globals are never tracked.
    fn declare(&mut self, name: &'a Token<'a>) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        let duplicate: bool = scope.insert(name.lexeme, false).is_some();

        if duplicate {
            self.error(name, "Already a variable with this name in this scope.");
        }
    }

    fn define(&mut self, name: &'a Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, true);
        }
    }

    /// Bind `this` / `super` in the innermost scope.
    fn bind_implicit(&mut self, name: &'static str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    fn error(&mut self, token: &Token<'_>, message: &str) {
        debug!("Resolve error at line {}: {}", token.line, message);

        self.errors.push(LoxError::resolve(token, message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record the reference `id` as a local at depth `d`, or leave it
    /// unrecorded (global) if no scope declares `name`.
    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                debug!("Resolved '{}' at depth {}", name, depth);
                self.interpreter.resolve(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name);
    }
}
