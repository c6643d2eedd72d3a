//! Classes and their instances.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::callable::LoxFunction;
use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// Name of the method run when a class is called.
pub const INITIALIZER: &str = "init";

pub struct LoxClass<'a> {
    name: &'a str,
    superclass: Option<Rc<LoxClass<'a>>>,
    methods: HashMap<String, LoxFunction<'a>>,
}

impl<'a> LoxClass<'a> {
    pub fn new(
        name: &'a str,
        superclass: Option<Rc<LoxClass<'a>>>,
        methods: HashMap<String, LoxFunction<'a>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn superclass(&self) -> Option<&Rc<LoxClass<'a>>> {
        self.superclass.as_ref()
    }

    /// Look in this class first, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<&LoxFunction<'a>> {
        match self.methods.get(name) {
            Some(method) => Some(method),
            None => self.superclass.as_ref()?.find_method(name),
        }
    }

    /// Calling a class takes whatever its initializer takes.
    pub fn arity(&self) -> usize {
        self.find_method(INITIALIZER)
            .map(LoxFunction::arity)
            .unwrap_or(0)
    }
}

/// An object: its class plus fields created on first assignment.
pub struct LoxInstance<'a> {
    class: Rc<LoxClass<'a>>,
    fields: RefCell<HashMap<String, Value<'a>>>,
}

impl<'a> LoxInstance<'a> {
    pub fn new(class: Rc<LoxClass<'a>>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn class(&self) -> &Rc<LoxClass<'a>> {
        &self.class
    }

    /// Field first, then a method bound to this instance.
    pub fn get(self: &Rc<Self>, name: &Token<'_>) -> Result<Value<'a>> {
        if let Some(value) = self.fields.borrow().get(name.lexeme) {
            return Ok(value.clone());
        }

        match self.class.find_method(name.lexeme) {
            Some(method) => Ok(Value::Function(Rc::new(method.bind(Rc::clone(self))))),
            None => Err(LoxError::runtime(
                name.line,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    /// Create or overwrite a field.  Methods are never consulted.
    pub fn set(&self, name: &str, value: Value<'a>) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}
