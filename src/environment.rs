//! Lexical environments: one node per scope, chained to the enclosing scope.
//!
//! Nodes are shared (`Rc<RefCell<_>>`): a block or call owns its scope while
//! it runs, and every closure created inside keeps it alive afterwards.

use crate::error::{LoxError, Result};
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to an environment node.
pub type EnvRef<'a> = Rc<RefCell<Environment<'a>>>;

#[derive(Debug, Default)]
pub struct Environment<'a> {
    values: HashMap<String, Value<'a>>,
    enclosing: Option<EnvRef<'a>>,
}

impl<'a> Environment<'a> {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef<'a>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap a fresh child of `enclosing` in a shared handle.
    pub fn child_of(enclosing: &EnvRef<'a>) -> EnvRef<'a> {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(enclosing))))
    }

    pub fn enclosing(&self) -> Option<EnvRef<'a>> {
        self.enclosing.clone()
    }

    /// Bind `name` in this scope.  Redefinition simply overwrites.
    pub fn define(&mut self, name: &str, value: Value<'a>) {
        self.values.insert(name.to_string(), value);
    }

    /// Value bound directly in this scope, without consulting parents.
    pub fn get_local(&self, name: &str) -> Option<Value<'a>> {
        self.values.get(name).cloned()
    }

    /// Search this scope, then each enclosing one.
    pub fn get(&self, name: &str, line: usize) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(undefined_variable(name, line))
        }
    }

    /// Overwrite the nearest existing binding of `name`.
    pub fn assign(&mut self, name: &str, value: Value<'a>, line: usize) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(undefined_variable(name, line))
        }
    }

    /// Follow exactly `distance` parent links from `env`.
    pub fn ancestor(env: &EnvRef<'a>, distance: usize) -> Option<EnvRef<'a>> {
        let mut current: EnvRef<'a> = Rc::clone(env);

        for _ in 0..distance {
            let next: EnvRef<'a> = current.borrow().enclosing.clone()?;
            current = next;
        }

        Some(current)
    }

    /// Read `name` from the scope `distance` hops out, with no search.
    pub fn get_at(env: &EnvRef<'a>, distance: usize, name: &str, line: usize) -> Result<Value<'a>> {
        debug!("get_at distance={} name={}", distance, name);

        Self::ancestor(env, distance)
            .and_then(|scope| scope.borrow().get_local(name))
            .ok_or_else(|| undefined_variable(name, line))
    }

    /// Write `name` in the scope `distance` hops out, with no search.
    pub fn assign_at(
        env: &EnvRef<'a>,
        distance: usize,
        name: &str,
        value: Value<'a>,
        line: usize,
    ) -> Result<()> {
        debug!("assign_at distance={} name={}", distance, name);

        let scope: EnvRef<'a> =
            Self::ancestor(env, distance).ok_or_else(|| undefined_variable(name, line))?;

        scope.borrow_mut().define(name, value);

        Ok(())
    }
}

fn undefined_variable(name: &str, line: usize) -> LoxError {
    LoxError::runtime(line, format!("Undefined variable '{}'.", name))
}
