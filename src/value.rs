use std::fmt;
use std::rc::Rc;

use crate::callable::{LoxFunction, NativeFunction};
use crate::class::{LoxClass, LoxInstance};

/// Runtime value.  Scalars are held inline; callables and instances are
/// reference counted and compare by identity.
#[derive(Clone)]
pub enum Value<'a> {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    NativeFunction(Rc<NativeFunction<'a>>),
    Function(Rc<LoxFunction<'a>>),
    Class(Rc<LoxClass<'a>>),
    Instance(Rc<LoxInstance<'a>>),
}

impl<'a> Value<'a> {
    /// `nil` and `false` are falsy; everything else, `0` and `""` included,
    /// is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Short description of the value's kind, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::NativeFunction(_) | Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
        }
    }
}

impl<'a> PartialEq for Value<'a> {
    /// Value equality for scalars, identity for everything else.  Never
    /// coerces across kinds, so `0 == false` is `false`.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::NativeFunction(a), Value::NativeFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Render a number the way `print` shows it: shortest decimal form, no
/// trailing `.0`, and `nan` / `inf` / `-inf` for the non‑finite values.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n == f64::INFINITY {
        "inf".to_string()
    } else if n == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        // Rust's `Display` for f64 is already the shortest round‑trip form
        // and never uses exponent notation.
        format!("{}", n)
    }
}

impl<'a> fmt::Display for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => write!(f, "{}", format_number(*n)),

            Value::String(s) => write!(f, "{}", s),

            Value::NativeFunction(native) => write!(f, "<native fn {}>", native.name),

            Value::Function(function) => write!(f, "<fn {}>", function.name()),

            Value::Class(class) => write!(f, "{}", class.name()),

            Value::Instance(instance) => write!(f, "{} instance", instance.class().name()),
        }
    }
}

impl<'a> fmt::Debug for Value<'a> {
    // Closures can reach themselves through their environment, so debug
    // output stays shallow.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}
