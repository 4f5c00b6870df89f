//! User-defined functions and methods.
//!
//! Each call gets a fresh activation record chained onto the captured
//! closure environment, so recursive and re-entrant calls to the same
//! declaration never clobber each other's locals.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::class::LoxInstance;
use crate::environment::{EnvRef, Environment};
use crate::errors::RuntimeError;
use crate::evaluator::{Evaluator, Signal};
use crate::value::{LoxCallable, Value};

#[derive(Debug)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: EnvRef,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    /// Produces a copy of this function whose closure is a fresh scope
    /// binding `this` to `instance`, chained onto the original closure.
    /// Used both for `object.method` lookups and for `super.method` binding
    /// (where the caller substitutes a different closure before calling).
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let env = Environment::with_enclosing(Rc::clone(&self.closure));
        env.borrow_mut().define("this", Value::Instance(instance));
        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: env,
            is_initializer: self.is_initializer,
        }
    }
}

impl LoxCallable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(&self, evaluator: &mut Evaluator, arguments: Vec<Value>) -> Result<Value, RuntimeError> {
        let env = Environment::with_enclosing(Rc::clone(&self.closure));
        for (param, arg) in self.declaration.params.iter().zip(arguments.into_iter()) {
            env.borrow_mut().define(param.lexeme.clone(), arg);
        }

        let signal = evaluator.execute_block(&self.declaration.body, env)?;

        // `init` always yields the bound instance, regardless of any
        // explicit bare `return;` inside it.
        if self.is_initializer {
            return Environment::get_at(&self.closure, 0, "this");
        }

        match signal {
            Signal::Return(value) => Ok(value),
            Signal::Normal => Ok(Value::Nil),
        }
    }

    fn display_name(&self) -> String {
        format!("<fn {}>", self.name())
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::LoxClass;
    use crate::lexer::{Token, TokenLiteral, TokenType};
    use std::collections::HashMap;

    fn tok(lexeme: &str) -> Token {
        Token::new(TokenType::Identifier, lexeme.to_string(), TokenLiteral::None, 1)
    }

    fn empty_decl(name: &str, params: Vec<&str>) -> Rc<FunctionDecl> {
        Rc::new(FunctionDecl {
            name: tok(name),
            params: params.into_iter().map(tok).collect(),
            body: vec![],
        })
    }

    #[test]
    fn arity_matches_declared_params() {
        let f = LoxFunction::new(empty_decl("f", vec!["a", "b"]), Environment::new_global(), false);
        assert_eq!(f.arity(), 2);
    }

    #[test]
    fn bind_defines_this_in_a_fresh_enclosing_scope() {
        let class = Rc::new(LoxClass::new("C".into(), None, HashMap::new()));
        let instance = Rc::new(RefCell::new(LoxInstance::new(class)));
        let f = LoxFunction::new(empty_decl("m", vec![]), Environment::new_global(), false);
        let bound = f.bind(Rc::clone(&instance));

        let this = Environment::get_at(&bound.closure, 0, "this").unwrap();
        match this {
            Value::Instance(i) => assert!(Rc::ptr_eq(&i, &instance)),
            _ => panic!("expected an instance"),
        }
    }

    #[test]
    fn display_name_matches_lox_convention() {
        let f = LoxFunction::new(empty_decl("greet", vec![]), Environment::new_global(), false);
        assert_eq!(f.display_name(), "<fn greet>");
    }
}
