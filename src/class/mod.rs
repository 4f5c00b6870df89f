//! Class values and instances. Single inheritance: a class's superclass
//! chain is walked linearly by `find_method`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::errors::RuntimeError;
use crate::evaluator::Evaluator;
use crate::function::LoxFunction;
use crate::lexer::Token;
use crate::value::Value;

#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Walks from this class up through its superclass chain, returning the
    /// first method matching `name`.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }
        self.superclass.as_ref().and_then(|sc| sc.find_method(name))
    }

    /// Arity of `init` if the class (or a superclass) declares one, else 0.
    pub fn arity(&self) -> usize {
        self.find_method("init").map(|f| f.arity()).unwrap_or(0)
    }

    /// Instantiate, binding and running `init` (if present) with `arguments`.
    /// Takes `self` wrapped in its owning `Rc` — `&Rc<Self>` isn't a legal
    /// method receiver, so this is a plain associated function instead.
    pub fn call(
        this: &Rc<LoxClass>,
        evaluator: &mut Evaluator,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(this))));
        if let Some(initializer) = this.find_method("init") {
            initializer
                .bind(Rc::clone(&instance))
                .call(evaluator, arguments)?;
        }
        Ok(Value::Instance(instance))
    }
}

impl fmt::Display for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

#[derive(Debug)]
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    /// Fields shadow methods: a field lookup that misses falls through to
    /// the class's method table, bound to `this_ref`.
    pub fn get(this_ref: &Rc<RefCell<LoxInstance>>, name: &Token) -> Result<Value, RuntimeError> {
        {
            let instance = this_ref.borrow();
            if let Some(value) = instance.fields.get(&name.lexeme) {
                return Ok(value.clone());
            }
        }

        let method = this_ref.borrow().class.find_method(&name.lexeme);
        match method {
            Some(method) => Ok(Value::Callable(Rc::new(method.bind(Rc::clone(this_ref))))),
            None => Err(RuntimeError::new(
                name.clone(),
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

impl fmt::Display for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<instance {}>", self.class.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FunctionDecl;
    use crate::environment::Environment;
    use crate::lexer::TokenType;

    fn tok(lexeme: &str) -> Token {
        Token::new(
            TokenType::Identifier,
            lexeme.to_string(),
            crate::lexer::TokenLiteral::None,
            1,
        )
    }

    fn method_named(name: &str) -> Rc<LoxFunction> {
        let decl = Rc::new(FunctionDecl {
            name: tok(name),
            params: vec![],
            body: vec![],
        });
        Rc::new(LoxFunction::new(decl, Environment::new_global(), name == "init"))
    }

    #[test]
    fn find_method_walks_superclass_chain() {
        let base = Rc::new(LoxClass::new(
            "Base".into(),
            None,
            HashMap::from([("greet".to_string(), method_named("greet"))]),
        ));
        let derived = LoxClass::new("Derived".into(), Some(Rc::clone(&base)), HashMap::new());

        assert!(derived.find_method("greet").is_some());
        assert!(derived.find_method("missing").is_none());
    }

    #[test]
    fn arity_comes_from_init_or_defaults_to_zero() {
        let no_init = LoxClass::new("Plain".into(), None, HashMap::new());
        assert_eq!(no_init.arity(), 0);

        let decl = Rc::new(FunctionDecl {
            name: tok("init"),
            params: vec![tok("a"), tok("b")],
            body: vec![],
        });
        let with_init = LoxClass::new(
            "WithInit".into(),
            None,
            HashMap::from([(
                "init".to_string(),
                Rc::new(LoxFunction::new(decl, Environment::new_global(), true)),
            )]),
        );
        assert_eq!(with_init.arity(), 2);
    }

    #[test]
    fn instance_get_on_missing_property_errors() {
        let class = Rc::new(LoxClass::new("Empty".into(), None, HashMap::new()));
        let instance = Rc::new(RefCell::new(LoxInstance::new(class)));
        assert!(LoxInstance::get(&instance, &tok("nope")).is_err());
    }

    #[test]
    fn instance_set_then_get_roundtrips() {
        let class = Rc::new(LoxClass::new("Empty".into(), None, HashMap::new()));
        let instance = Rc::new(RefCell::new(LoxInstance::new(class)));
        instance.borrow_mut().set(&tok("n"), Value::Number(5.0));
        assert_eq!(LoxInstance::get(&instance, &tok("n")).unwrap().to_string(), "5");
    }
}
