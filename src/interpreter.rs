//! Tree‑walking evaluator.
//!
//! Statements are executed directly against the AST.  Variables resolved to
//! a local scope by the [`crate::resolver::Resolver`] are reached by walking
//! exactly that many environment links; everything else is a global looked
//! up by name.  A `return` travels back to the calling function as
//! [`Flow::Return`], never as an error.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::callable::{LoxFunction, NativeFunction};
use crate::class::{LoxClass, LoxInstance, INITIALIZER};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// User call frames allowed before reporting a stack overflow.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

/// How a statement finished.
#[derive(Debug)]
pub enum Flow<'a> {
    Normal,
    Return(Value<'a>),
}

pub struct Interpreter<'a> {
    globals: EnvRef<'a>,
    environment: EnvRef<'a>,
    locals: HashMap<ExprId, usize>,
    output: Box<dyn Write>,
    input: Box<dyn Read>,
    call_depth: usize,
    max_call_depth: usize,
}

impl<'a> Default for Interpreter<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Interpreter<'a> {
    /// Interpreter printing to standard output.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Interpreter printing to `output` and reading standard input, with
    /// the built‑ins defined.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef<'a> = Rc::new(std::cell::RefCell::new(Environment::new()));

        for native in [
            NativeFunction {
                name: "clock",
                arity: 0,
                func: native_clock,
            },
            NativeFunction {
                name: "print",
                arity: 1,
                func: native_print,
            },
            NativeFunction {
                name: "read",
                arity: 0,
                func: native_read,
            },
        ] {
            debug!("Defining native function '{}'", native.name);

            globals
                .borrow_mut()
                .define(native.name, Value::NativeFunction(Rc::new(native)));
        }

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
            input: Box::new(io::stdin()),
            call_depth: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Replace the source `read()` draws from.
    pub fn with_input(mut self, input: Box<dyn Read>) -> Self {
        self.input = input;
        self
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn globals(&self) -> &EnvRef<'a> {
        &self.globals
    }

    /// Record that the reference `id` lives `depth` scopes out.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Depth recorded for `id`, or `None` for a global.
    pub fn local_depth(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    /// Emit one line through the output sink.
    pub fn write_line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)
    }

    /// Execute a program, stopping at the first runtime error.
    pub fn interpret(&mut self, statements: &[Stmt<'a>]) -> Result<()> {
        info!("Interpreting {} statement(s)", statements.len());

        let mut result: Result<()> = Ok(());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}

                Ok(Flow::Return(_)) => {
                    debug!("Return reached top level; stopping");
                    break;
                }

                Err(e) => {
                    debug!("Runtime error: {}", e);
                    result = Err(e);
                    break;
                }
            }
        }

        self.output.flush()?;

        if result.is_ok() {
            info!("Interpretation completed successfully");
        }

        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt<'a>) -> Result<Flow<'a>> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt<'a>) -> Result<Flow<'a>> {
        match stmt {
            Stmt::Block(statements) => {
                debug!("Entering block with {} statements", statements.len());

                let environment: EnvRef<'a> = Environment::child_of(&self.environment);
                self.execute_block(statements, environment)
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                debug!("Defining class '{}'", name.lexeme);

                let superclass: Option<Rc<LoxClass<'a>>> = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Class(class) => Some(class),
                        _ => {
                            return Err(LoxError::runtime(
                                name.line,
                                "Superclass must be a class.",
                            ))
                        }
                    },
                    None => None,
                };

                self.environment.borrow_mut().define(name.lexeme, Value::Nil);

                // Methods of a subclass close over a scope holding `super`.
                let method_env: EnvRef<'a> = match &superclass {
                    Some(class) => {
                        let env: EnvRef<'a> = Environment::child_of(&self.environment);
                        env.borrow_mut()
                            .define("super", Value::Class(Rc::clone(class)));
                        env
                    }
                    None => Rc::clone(&self.environment),
                };

                let table: HashMap<String, LoxFunction<'a>> = methods
                    .iter()
                    .map(|method| {
                        let function = LoxFunction::new(
                            Rc::clone(method),
                            Rc::clone(&method_env),
                            method.name.lexeme == INITIALIZER,
                        );

                        (method.name.lexeme.to_string(), function)
                    })
                    .collect();

                let class = LoxClass::new(name.lexeme, superclass, table);

                self.environment.borrow_mut().assign(
                    name.lexeme,
                    Value::Class(Rc::new(class)),
                    name.line,
                )?;

                info!("Class '{}' defined with {} method(s)", name.lexeme, methods.len());

                Ok(Flow::Normal)
            }

            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                let name: &'a str = declaration.name.lexeme;
                debug!("Defining function '{}'", name);

                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment
                    .borrow_mut()
                    .define(name, Value::Function(Rc::new(function)));

                Ok(Flow::Normal)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::Return { value, .. } => {
                let value: Value<'a> = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);

                Ok(Flow::Return(value))
            }

            Stmt::Var { name, initializer } => {
                let value: Value<'a> = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define(name.lexeme, value);

                Ok(Flow::Normal)
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }

                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` inside `environment`, restoring the current scope
    /// afterwards whatever the outcome.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt<'a>],
        environment: EnvRef<'a>,
    ) -> Result<Flow<'a>> {
        let previous: EnvRef<'a> = std::mem::replace(&mut self.environment, environment);

        let mut result: Result<Flow<'a>> = Ok(Flow::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;

        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr<'a>) -> Result<Value<'a>> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr<'a>) -> Result<Value<'a>> {
        match expr {
            Expr::Assign { id, name, value } => {
                let value: Value<'a> = self.evaluate(value)?;

                match self.local_depth(*id) {
                    Some(depth) => Environment::assign_at(
                        &self.environment,
                        depth,
                        name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                    None => self
                        .globals
                        .borrow_mut()
                        .assign(name.lexeme, value.clone(), name.line)?,
                }

                Ok(value)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value<'a> = self.evaluate(left)?;
                let right: Value<'a> = self.evaluate(right)?;

                binary(operator, left, right)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value<'a> = self.evaluate(callee)?;

                let mut values: Vec<Value<'a>> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.call_value(callee, values, paren)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value<'a> = self.evaluate(left)?;

                let decided: bool = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if decided {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name.line, "Only instances have fields."));
                };

                let value: Value<'a> = self.evaluate(value)?;
                instance.set(name.lexeme, value.clone());

                Ok(value)
            }

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Unary { operator, right } => {
                let right: Value<'a> = self.evaluate(right)?;

                match (&operator.token_type, right) {
                    (TokenType::MINUS, Value::Number(n)) => Ok(Value::Number(-n)),
                    (TokenType::MINUS, _) => Err(LoxError::runtime(
                        operator.line,
                        "Operand must be a number.",
                    )),
                    (_, value) => Ok(Value::Bool(!value.is_truthy())),
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token<'_>) -> Result<Value<'a>> {
        match self.local_depth(id) {
            Some(depth) => Environment::get_at(&self.environment, depth, name.lexeme, name.line),
            None => self.globals.borrow().get(name.lexeme, name.line),
        }
    }

    /// `super.method`: the superclass sits `depth` scopes out and `this`
    /// one scope closer.
    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token<'_>,
        method: &Token<'_>,
    ) -> Result<Value<'a>> {
        let depth: usize = self.local_depth(id).ok_or_else(|| {
            LoxError::runtime(keyword.line, "Can't use 'super' outside of a subclass.")
        })?;

        let superclass: Value<'a> =
            Environment::get_at(&self.environment, depth, "super", keyword.line)?;
        let object: Value<'a> = Environment::get_at(
            &self.environment,
            depth.saturating_sub(1),
            "this",
            keyword.line,
        )?;

        let (Value::Class(superclass), Value::Instance(instance)) = (superclass, object) else {
            return Err(LoxError::runtime(
                keyword.line,
                "Invalid 'super' binding.",
            ));
        };

        match superclass.find_method(method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(LoxError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    fn call_value(
        &mut self,
        callee: Value<'a>,
        arguments: Vec<Value<'a>>,
        paren: &Token<'_>,
    ) -> Result<Value<'a>> {
        let arity: usize = match &callee {
            Value::NativeFunction(native) => native.arity,
            Value::Function(function) => function.arity(),
            Value::Class(class) => class.arity(),
            other => {
                debug!("Attempted to call a {}", other.type_name());
                return Err(not_callable(paren));
            }
        };

        if arguments.len() != arity {
            return Err(LoxError::runtime(
                paren.line,
                format!("Expected {} arguments but got {}.", arity, arguments.len()),
            ));
        }

        if self.call_depth >= self.max_call_depth {
            return Err(LoxError::StackOverflow { line: paren.line });
        }

        self.call_depth += 1;

        let result: Result<Value<'a>> = match callee {
            Value::NativeFunction(native) => {
                debug!("Calling native function '{}'", native.name);

                (native.func)(self, &arguments)
                    .map_err(|message| LoxError::runtime(paren.line, message))
            }

            Value::Function(function) => function.call(self, arguments),

            Value::Class(class) => self.instantiate(class, arguments),

            _ => Err(not_callable(paren)),
        };

        self.call_depth -= 1;

        result
    }

    /// Allocate an instance and run `init` on it, if any class in the
    /// chain defines one.  Always yields the instance.
    fn instantiate(&mut self, class: Rc<LoxClass<'a>>, arguments: Vec<Value<'a>>) -> Result<Value<'a>> {
        debug!("Instantiating class '{}'", class.name());

        let instance: Rc<LoxInstance<'a>> = Rc::new(LoxInstance::new(Rc::clone(&class)));

        if let Some(initializer) = class.find_method(INITIALIZER) {
            initializer
                .bind(Rc::clone(&instance))
                .call(self, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

fn binary<'a>(operator: &Token<'_>, left: Value<'a>, right: Value<'a>) -> Result<Value<'a>> {
    match operator.token_type {
        TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left == right)),
        TokenType::BANG_EQUAL => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    if operator.token_type == TokenType::PLUS {
        if let (Value::String(a), Value::String(b)) = (&left, &right) {
            return Ok(Value::String(format!("{}{}", a, b)));
        }
    }

    let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
        let message: &str = if operator.token_type == TokenType::PLUS {
            "Operands must be two numbers or two strings."
        } else {
            "Operands must be numbers."
        };

        debug!(
            "Type error for '{}': {} and {}",
            operator.lexeme,
            left.type_name(),
            right.type_name()
        );

        return Err(LoxError::runtime(operator.line, message));
    };

    let (a, b) = (*a, *b);

    Ok(match operator.token_type {
        TokenType::PLUS => Value::Number(a + b),
        TokenType::MINUS => Value::Number(a - b),
        TokenType::STAR => Value::Number(a * b),
        TokenType::SLASH => Value::Number(a / b),
        TokenType::GREATER => Value::Bool(a > b),
        TokenType::GREATER_EQUAL => Value::Bool(a >= b),
        TokenType::LESS => Value::Bool(a < b),
        TokenType::LESS_EQUAL => Value::Bool(a <= b),
        _ => {
            return Err(LoxError::runtime(
                operator.line,
                format!("Invalid binary operator '{}'.", operator.lexeme),
            ))
        }
    })
}

fn not_callable(paren: &Token<'_>) -> LoxError {
    LoxError::runtime(paren.line, "Can only call functions and classes.")
}

// ─────────────────────────────────────────────────────────────────────────────
// Built‑ins
// ─────────────────────────────────────────────────────────────────────────────

/// Milliseconds since the Unix epoch.
fn native_clock<'a>(
    _interpreter: &mut Interpreter<'a>,
    _arguments: &[Value<'a>],
) -> std::result::Result<Value<'a>, String> {
    Ok(Value::Number(Utc::now().timestamp_millis() as f64))
}

fn native_print<'a>(
    interpreter: &mut Interpreter<'a>,
    arguments: &[Value<'a>],
) -> std::result::Result<Value<'a>, String> {
    let text: String = arguments.first().map(Value::to_string).unwrap_or_default();

    interpreter
        .write_line(&text)
        .map_err(|e| format!("Failed to write output: {}", e))?;

    Ok(Value::Nil)
}

/// Next byte of input as a number, or `-1` once input is exhausted.
fn native_read<'a>(
    interpreter: &mut Interpreter<'a>,
    _arguments: &[Value<'a>],
) -> std::result::Result<Value<'a>, String> {
    // Pending prompts must be visible before blocking on input.
    interpreter
        .output
        .flush()
        .map_err(|e| format!("Failed to write output: {}", e))?;

    let mut byte: [u8; 1] = [0];

    match interpreter.input.read(&mut byte) {
        Ok(0) => Ok(Value::Number(-1.0)),
        Ok(_) => Ok(Value::Number(f64::from(byte[0]))),
        Err(e) => Err(format!("Failed to read input: {}", e)),
    }
}
