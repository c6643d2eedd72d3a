/*!
Recursive‑descent parser: token slice → statement list.

Complexity
----------
* **n** = number of tokens (including the sole EOF).

| Phase / function              | Cost | Rationale                                                 |
|-------------------------------|-----:|-----------------------------------------------------------|
| `Parser::parse` main loop     | Θ(n) | Each token is consumed once via `advance()`.              |
| Error recovery `synchronize()`| O(k) | Discards tokens up to the next statement boundary.        |

### Logging Policy

| Location                     | Level  | Purpose                                   |
|------------------------------|--------|-------------------------------------------|
| `Parser::new`, `parse`       | `info` | Lifecycle milestones.                     |
| `declaration`, `statement`   | `debug`| High‑level descent into grammar branches. |
| Error paths                  | `debug`| Context before recording a diagnostic.    |

Errors never abort the whole parse.  A failing declaration is recorded,
the parser resynchronises at the next statement boundary and carries on, so
one run reports every independent syntax error.  Some problems (an invalid
assignment target, more than 255 arguments) are recorded without even
unwinding the current declaration.

Nesting depth is bounded only by memory: `declaration`, `statement`,
`expression` and `unary` run under
[`ensure_sufficient_stack`](crate::stack::ensure_sufficient_stack).

--------------------------------------------------------------------------------
Grammar (EBNF)
--------------

```text
program        → declaration* EOF ;
declaration    → classDecl | funDecl | varDecl | statement ;
classDecl      → "class" IDENT ( "<" IDENT )? "{" function* "}" ;
funDecl        → "fun" function ;
function       → IDENT "(" parameters? ")" block ;
varDecl        → "var" IDENT ( "=" expression )? ";" ;
statement      → exprStmt | forStmt | ifStmt | printStmt
               | returnStmt | whileStmt | block ;
exprStmt       → expression ";" ;
forStmt        → "for" "(" ( varDecl | exprStmt | ";" )
                 expression? ";" expression? ")" statement ;
ifStmt         → "if" "(" expression ")" statement ( "else" statement )? ;
printStmt      → "print" operand‑start expression ";" ;   (sugar for print(expr);)
returnStmt     → "return" expression? ";" ;
whileStmt      → "while" "(" expression ")" statement ;
block          → "{" declaration* "}" ;
parameters     → IDENT ( "," IDENT )* ;
expression     → assignment ;
assignment     → ( call "." )? IDENT "=" assignment | logic_or ;
logic_or       → logic_and ( "or" logic_and )* ;
logic_and      → equality ( "and" equality )* ;
equality       → comparison ( ( "!=" | "==" ) comparison )* ;
comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term           → factor ( ( "-" | "+" ) factor )* ;
factor         → unary ( ( "/" | "*" ) unary )* ;
unary          → ( "!" | "-" ) unary | call ;
call           → primary ( "(" arguments? ")" | "." IDENT )* ;
arguments      → expression ( "," expression )* ;
primary        → NUMBER | STRING | "true" | "false" | "nil" | "this"
               | IDENT | "(" expression ")" | "super" "." IDENT ;
```
*/

use std::rc::Rc;

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::error::{LoxError, Result};
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenType};

use log::{debug, info};

/// Upper bound on parameters and call arguments.
pub const MAX_ARITY: usize = 255;

/// Top‑level parser over an immutable slice of tokens.  The slice must end
/// with an `EOF` token, as produced by [`crate::scanner::scan_tokens`].
pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    current: usize,
    next_id: ExprId,
    errors: Vec<LoxError>,
}

impl<'a> Parser<'a> {
    /// Construct a new parser.
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        Self {
            tokens,
            current: 0,
            next_id: 0,
            errors: Vec::new(),
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program.  Returns every declaration that parsed
    /// cleanly together with all syntax diagnostics.
    pub fn parse(mut self) -> (Vec<Stmt<'a>>, Vec<LoxError>) {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt<'a>> = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        info!(
            "Parsed {} statement(s) with {} error(s)",
            statements.len(),
            self.errors.len()
        );

        (statements, self.errors)
    }

    // ──────────────────────── declaration rules ───────────────────

    /// Parse one declaration, recording and recovering from any error.
    fn declaration(&mut self) -> Option<Stmt<'a>> {
        ensure_sufficient_stack(|| self.parse_declaration())
    }

    fn parse_declaration(&mut self) -> Option<Stmt<'a>> {
        debug!("Entering declaration");

        let result = if self.matches(TokenType::CLASS) {
            self.class_declaration()
        } else if self.matches(TokenType::FUN) {
            self.function("function").map(Stmt::Function)
        } else if self.matches(TokenType::VAR) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                debug!("Parse error, synchronizing: {}", e);
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt<'a>> {
        let name: &'a Token<'a> = self.consume(TokenType::IDENTIFIER, "Expected class name.")?;

        let superclass: Option<Expr<'a>> = if self.matches(TokenType::LESS) {
            let super_name = self.consume(TokenType::IDENTIFIER, "Expected superclass name.")?;

            Some(Expr::Variable {
                id: self.fresh_id(),
                name: super_name,
            })
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expected '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionDecl<'a>>> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expected '}' after class body.")?;

        debug!("Parsed class '{}' with {} method(s)", name.lexeme, methods.len());

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    /// `IDENT "(" parameters? ")" block`, shared by functions and methods.
    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl<'a>>> {
        let name: &'a Token<'a> =
            self.consume(TokenType::IDENTIFIER, &format!("Expected {} name.", kind))?;

        self.consume(
            TokenType::LEFT_PAREN,
            &format!("Expected '(' after {} name.", kind),
        )?;

        let mut params: Vec<&'a Token<'a>> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARITY {
                    let err = LoxError::parse(self.peek(), "Can't have more than 255 parameters.");
                    self.errors.push(err);
                }

                params.push(self.consume(TokenType::IDENTIFIER, "Expected parameter name.")?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after parameters.")?;
        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expected '{{' before {} body.", kind),
        )?;

        let body: Vec<Stmt<'a>> = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<Stmt<'a>> {
        let name: &'a Token<'a> = self.consume(TokenType::IDENTIFIER, "Expected variable name.")?;

        let initializer: Option<Expr<'a>> = if self.matches(TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expected ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt<'a>> {
        ensure_sufficient_stack(|| self.parse_statement())
    }

    fn parse_statement(&mut self) -> Result<Stmt<'a>> {
        debug!("Entering statement at line {}", self.peek().line);

        if self.matches(TokenType::FOR) {
            self.for_statement()
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::WHILE) {
            self.while_statement()
        } else if self.matches(TokenType::LEFT_BRACE) {
            Ok(Stmt::Block(self.block()?))
        } else if self.at_print_statement() {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    /// `for` has no node of its own: it becomes an optional initializer
    /// followed by a `while` whose body runs the increment last.
    fn for_statement(&mut self) -> Result<Stmt<'a>> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'for'.")?;

        let initializer: Option<Stmt<'a>> = if self.matches(TokenType::SEMICOLON) {
            None
        } else if self.matches(TokenType::VAR) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr<'a>> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expected ';' after loop condition.")?;

        let increment: Option<Expr<'a>> = if !self.check(TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after for clauses.")?;

        let mut body: Stmt<'a> = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition: Expr<'a> = condition.unwrap_or(Expr::Literal(LiteralValue::True));

        let mut desugared: Stmt<'a> = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            desugared = Stmt::Block(vec![initializer, desugared]);
        }

        Ok(desugared)
    }

    fn if_statement(&mut self) -> Result<Stmt<'a>> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'if'.")?;
        let condition: Expr<'a> = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after if condition.")?;

        let then_branch: Box<Stmt<'a>> = Box::new(self.statement()?);
        let else_branch: Option<Box<Stmt<'a>>> = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    /// `print` is an ordinary global function; written without parentheses
    /// it is rewritten to the call `print(expr);`.
    fn print_statement(&mut self) -> Result<Stmt<'a>> {
        let print: &'a Token<'a> = self.advance();
        let value: Expr<'a> = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expected ';' after value.")?;

        let callee: Expr<'a> = Expr::Variable {
            id: self.fresh_id(),
            name: print,
        };

        Ok(Stmt::Expression(Expr::Call {
            callee: Box::new(callee),
            paren: print,
            arguments: vec![value],
        }))
    }

    fn return_statement(&mut self) -> Result<Stmt<'a>> {
        let keyword: &'a Token<'a> = self.previous();
        let value: Option<Expr<'a>> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expected ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt<'a>> {
        self.consume(TokenType::LEFT_PAREN, "Expected '(' after 'while'.")?;
        let condition: Expr<'a> = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expected ')' after condition.")?;
        let body: Box<Stmt<'a>> = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn expression_statement(&mut self) -> Result<Stmt<'a>> {
        let expr: Expr<'a> = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expected ';' after expression.")?;

        Ok(Stmt::Expression(expr))
    }

    /// Declarations up to the closing `}`.  Errors inside the block are
    /// recorded and recovered from in place.
    fn block(&mut self) -> Result<Vec<Stmt<'a>>> {
        let mut statements: Vec<Stmt<'a>> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expected '}' after block.")?;

        Ok(statements)
    }

    // ─────────────────────── expression rules ─────────────────────

    fn expression(&mut self) -> Result<Expr<'a>> {
        ensure_sufficient_stack(|| self.assignment())
    }

    fn assignment(&mut self) -> Result<Expr<'a>> {
        let expr: Expr<'a> = self.logical_or()?;

        if self.matches(TokenType::EQUAL) {
            let equals: &'a Token<'a> = self.previous();
            let value: Expr<'a> = self.expression()?;

            return Ok(match expr {
                Expr::Variable { name, .. } => Expr::Assign {
                    id: self.fresh_id(),
                    name,
                    value: Box::new(value),
                },

                Expr::Get { object, name } => Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                },

                // Reported, but the left side stands so parsing continues.
                other => {
                    debug!("Invalid assignment target at line {}", equals.line);
                    self.errors
                        .push(LoxError::parse(equals, "Invalid assignment target."));
                    other
                }
            });
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr<'a>> {
        let mut expr: Expr<'a> = self.logical_and()?;

        while self.matches(TokenType::OR) {
            let operator: &'a Token<'a> = self.previous();
            let right: Expr<'a> = self.logical_and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr<'a>> {
        let mut expr: Expr<'a> = self.equality()?;

        while self.matches(TokenType::AND) {
            let operator: &'a Token<'a> = self.previous();
            let right: Expr<'a> = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// Left‑associative binary level: `next ( op next )*`.
    fn binary_level(
        &mut self,
        operators: &[TokenType],
        next: fn(&mut Self) -> Result<Expr<'a>>,
    ) -> Result<Expr<'a>> {
        let mut expr: Expr<'a> = next(self)?;

        while operators.iter().any(|op| self.check(op.clone())) {
            let operator: &'a Token<'a> = self.advance();
            let right: Expr<'a> = next(self)?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr<'a>> {
        self.binary_level(
            &[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr<'a>> {
        self.binary_level(
            &[
                TokenType::GREATER,
                TokenType::GREATER_EQUAL,
                TokenType::LESS,
                TokenType::LESS_EQUAL,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr<'a>> {
        self.binary_level(&[TokenType::MINUS, TokenType::PLUS], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr<'a>> {
        self.binary_level(&[TokenType::STAR, TokenType::SLASH], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr<'a>> {
        ensure_sufficient_stack(|| self.parse_unary())
    }

    fn parse_unary(&mut self) -> Result<Expr<'a>> {
        if self.matches(TokenType::BANG) || self.matches(TokenType::MINUS) {
            let operator: &'a Token<'a> = self.previous();
            let right: Expr<'a> = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr<'a>> {
        let mut expr: Expr<'a> = self.primary()?;

        loop {
            if self.matches(TokenType::LEFT_PAREN) {
                expr = self.finish_call(expr)?;
            } else if self.matches(TokenType::DOT) {
                let name: &'a Token<'a> =
                    self.consume(TokenType::IDENTIFIER, "Expected property name after '.'.")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr<'a>) -> Result<Expr<'a>> {
        let mut arguments: Vec<Expr<'a>> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    let err = LoxError::parse(self.peek(), "Can't have more than 255 arguments.");
                    self.errors.push(err);
                }

                arguments.push(self.expression()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        let paren: &'a Token<'a> =
            self.consume(TokenType::RIGHT_PAREN, "Expected ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr<'a>> {
        if self.matches(TokenType::FALSE) {
            return Ok(Expr::Literal(LiteralValue::False));
        }
        if self.matches(TokenType::TRUE) {
            return Ok(Expr::Literal(LiteralValue::True));
        }
        if self.matches(TokenType::NIL) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }

        match &self.peek().token_type {
            TokenType::NUMBER(n) => {
                let n: f64 = *n;
                self.advance();
                return Ok(Expr::Literal(LiteralValue::Number(n)));
            }

            TokenType::STRING(s) => {
                let s: String = s.clone();
                self.advance();
                return Ok(Expr::Literal(LiteralValue::Str(s)));
            }

            _ => {}
        }

        if self.matches(TokenType::SUPER) {
            let keyword: &'a Token<'a> = self.previous();
            self.consume(TokenType::DOT, "Expected '.' after 'super'.")?;
            let method: &'a Token<'a> =
                self.consume(TokenType::IDENTIFIER, "Expected superclass method name.")?;

            return Ok(Expr::Super {
                id: self.fresh_id(),
                keyword,
                method,
            });
        }

        if self.matches(TokenType::THIS) {
            return Ok(Expr::This {
                id: self.fresh_id(),
                keyword: self.previous(),
            });
        }

        if self.matches(TokenType::IDENTIFIER) {
            return Ok(Expr::Variable {
                id: self.fresh_id(),
                name: self.previous(),
            });
        }

        if self.matches(TokenType::LEFT_PAREN) {
            let expr: Expr<'a> = self.expression()?;

            self.consume(TokenType::RIGHT_PAREN, "Expected ')' after expression.")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(LoxError::parse(self.peek(), "Expected expression."))
    }

    // ────────────────────── utility helpers ───────────────────────

    fn fresh_id(&mut self) -> ExprId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// `print` followed by something that can start an operand, other than
    /// `(` which keeps the ordinary call reading.
    fn at_print_statement(&self) -> bool {
        let token: &Token<'a> = self.peek();

        if token.token_type != TokenType::IDENTIFIER || token.lexeme != "print" {
            return false;
        }

        match self.tokens.get(self.current + 1) {
            Some(next) => matches!(
                next.token_type,
                TokenType::NUMBER(_)
                    | TokenType::STRING(_)
                    | TokenType::IDENTIFIER
                    | TokenType::TRUE
                    | TokenType::FALSE
                    | TokenType::NIL
                    | TokenType::THIS
                    | TokenType::SUPER
                    | TokenType::BANG
                    | TokenType::MINUS
            ),
            None => false,
        }
    }

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();

            return true;
        }

        false
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<&'a Token<'a>> {
        if self.check(ttype) {
            return Ok(self.advance());
        }

        debug!("consume failed at line {}: {}", self.peek().line, message);

        Err(LoxError::parse(self.peek(), message))
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == ttype
    }

    #[inline(always)]
    fn advance(&mut self) -> &'a Token<'a> {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::EOF)
    }

    #[inline(always)]
    fn peek(&self) -> &'a Token<'a> {
        &self.tokens[self.current]
    }

    #[inline(always)]
    fn previous(&self) -> &'a Token<'a> {
        &self.tokens[self.current - 1]
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        self.advance(); // the token that caused the error

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::SEMICOLON) {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::RETURN => return,
                _ => {}
            }

            self.advance();
        }
    }
}
