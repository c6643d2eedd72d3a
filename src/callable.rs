//! Function values: user functions (closures) and native built‑ins.

use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::class::LoxInstance;
use crate::environment::{EnvRef, Environment};
use crate::error::Result;
use crate::interpreter::{Flow, Interpreter};
use crate::value::Value;

/// Signature of a host function.  A returned `Err` message becomes a runtime
/// error located at the call site.
pub type NativeFn<'a> =
    fn(&mut Interpreter<'a>, &[Value<'a>]) -> std::result::Result<Value<'a>, String>;

/// A function implemented by the host.
pub struct NativeFunction<'a> {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn<'a>,
}

/// A user function paired with the environment it was declared in.
pub struct LoxFunction<'a> {
    declaration: Rc<FunctionDecl<'a>>,
    closure: EnvRef<'a>,
    is_initializer: bool,
}

impl<'a> LoxFunction<'a> {
    pub fn new(declaration: Rc<FunctionDecl<'a>>, closure: EnvRef<'a>, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &'a str {
        self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// A copy of this method whose closure has `this` bound to `instance`.
    /// Produced afresh on every property access.
    pub fn bind(&self, instance: Rc<LoxInstance<'a>>) -> LoxFunction<'a> {
        let environment: EnvRef<'a> = Environment::child_of(&self.closure);

        environment
            .borrow_mut()
            .define("this", Value::Instance(instance));

        LoxFunction::new(
            Rc::clone(&self.declaration),
            environment,
            self.is_initializer,
        )
    }

    /// Run the body in a new scope holding the parameters.  Initializers
    /// always yield the bound instance.
    pub fn call(&self, interpreter: &mut Interpreter<'a>, arguments: Vec<Value<'a>>) -> Result<Value<'a>> {
        debug!("Calling user-defined function '{}'", self.name());

        let environment: EnvRef<'a> = Environment::child_of(&self.closure);

        {
            let mut scope = environment.borrow_mut();

            for (param, argument) in self.declaration.params.iter().zip(arguments) {
                scope.define(param.lexeme, argument);
            }
        }

        let flow: Flow<'a> = interpreter.execute_block(&self.declaration.body, environment)?;

        if self.is_initializer {
            return Environment::get_at(&self.closure, 0, "this", self.declaration.name.line);
        }

        Ok(match flow {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        })
    }
}
