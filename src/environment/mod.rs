//! Lexical environments. A function closure holds a reference to the
//! environment active at its creation; several closures may share one. That
//! aliasing is why this is `Rc<RefCell<Environment>>` rather than the
//! teacher's single-owner `Option<Box<Environment>>` chain — see DESIGN.md.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::RuntimeError;
use crate::lexer::Token;
use crate::value::Value;

pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new_global() -> EnvRef {
        Rc::new(RefCell::new(Environment::default()))
    }

    pub fn with_enclosing(enclosing: EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }))
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(env: &EnvRef, name: &Token) -> Result<Value, RuntimeError> {
        let mut current = Rc::clone(env);
        loop {
            let next = {
                let frame = current.borrow();
                if let Some(value) = frame.values.get(&name.lexeme) {
                    return Ok(value.clone());
                }
                frame.enclosing.clone()
            };
            match next {
                Some(parent) => current = parent,
                None => {
                    return Err(RuntimeError::new(
                        name.clone(),
                        format!("Undefined variable '{}'.", name.lexeme),
                    ));
                }
            }
        }
    }

    pub fn assign(env: &EnvRef, name: &Token, value: Value) -> Result<(), RuntimeError> {
        let mut current = Rc::clone(env);
        loop {
            let next = {
                let mut frame = current.borrow_mut();
                if frame.values.contains_key(&name.lexeme) {
                    frame.values.insert(name.lexeme.clone(), value);
                    return Ok(());
                }
                frame.enclosing.clone()
            };
            match next {
                Some(parent) => current = parent,
                None => {
                    return Err(RuntimeError::new(
                        name.clone(),
                        format!("Undefined variable '{}'.", name.lexeme),
                    ));
                }
            }
        }
    }

    fn ancestor(env: &EnvRef, distance: usize) -> EnvRef {
        let mut current = Rc::clone(env);
        for _ in 0..distance {
            let parent = current
                .borrow()
                .enclosing
                .clone()
                .expect("resolver recorded a depth deeper than the live environment chain");
            current = parent;
        }
        current
    }

    pub fn get_at(env: &EnvRef, distance: usize, name: &str) -> Result<Value, RuntimeError> {
        let target = Environment::ancestor(env, distance);
        let value = target.borrow().values.get(name).cloned();
        value.ok_or_else(|| {
            RuntimeError::new(Token::synthetic(name), format!("Undefined variable '{name}'."))
        })
    }

    pub fn assign_at(env: &EnvRef, distance: usize, name: &Token, value: Value) {
        let target = Environment::ancestor(env, distance);
        target.borrow_mut().values.insert(name.lexeme.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenType;

    fn tok(lexeme: &str) -> Token {
        Token::new(TokenType::Identifier, lexeme.to_string(), crate::lexer::TokenLiteral::None, 1)
    }

    #[test]
    fn shadowed_inner_define_does_not_leak_outward() {
        let globals = Environment::new_global();
        globals.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&globals));
        inner.borrow_mut().define("a", Value::Number(2.0));

        assert_eq!(Environment::get(&inner, &tok("a")).unwrap().to_string(), "2");
        assert_eq!(Environment::get(&globals, &tok("a")).unwrap().to_string(), "1");
    }

    #[test]
    fn assign_writes_through_to_defining_scope() {
        let globals = Environment::new_global();
        globals.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&globals));

        Environment::assign(&inner, &tok("a"), Value::Number(9.0)).unwrap();
        assert_eq!(Environment::get(&globals, &tok("a")).unwrap().to_string(), "9");
    }

    #[test]
    fn undefined_get_and_assign_are_runtime_errors() {
        let globals = Environment::new_global();
        assert!(Environment::get(&globals, &tok("missing")).is_err());
        assert!(Environment::assign(&globals, &tok("missing"), Value::Nil).is_err());
    }

    #[test]
    fn closures_sharing_one_environment_observe_each_others_writes() {
        let globals = Environment::new_global();
        let shared = Environment::with_enclosing(globals);
        shared.borrow_mut().define("x", Value::Number(1.0));

        let closure_a = Rc::clone(&shared);
        let closure_b = Rc::clone(&shared);
        closure_a.borrow_mut().define("x", Value::Number(2.0));

        assert_eq!(closure_b.borrow().values.get("x").unwrap().to_string(), "2");
    }
}
