//! Tree-walking evaluator. Executes the AST directly rather than compiling
//! it, threading a `Signal` alongside `RuntimeError` so `return` can unwind
//! the call stack without being mistaken for an error.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::{EnvRef, Environment};
use crate::errors::{self, RuntimeError};
use crate::function::LoxFunction;
use crate::lexer::{Token, TokenType};
use crate::value::{native_clock, Value};

/// Distinguishes a statement that ran to completion from one that hit a
/// `return`. Kept separate from `Result`'s error channel per design — a
/// `return` is control flow, not a failure.
#[derive(Debug)]
pub enum Signal {
    Normal,
    Return(Value),
}

pub struct Evaluator {
    pub globals: EnvRef,
    environment: EnvRef,
    locals: HashMap<ExprId, usize>,
}

impl Evaluator {
    pub fn new() -> Self {
        let globals = Environment::new_global();
        globals.borrow_mut().define("clock", native_clock());
        Evaluator {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    pub fn interpret(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            match self.execute(stmt) {
                Ok(_) => {}
                Err(err) => {
                    errors::runtime_error(&err);
                    return;
                }
            }
        }
    }

    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, &name.lexeme),
            None => Environment::get(&self.globals, name),
        }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Grouping { expression, .. } => self.evaluate(expression),
            Expr::Variable { id, name } => self.look_up_variable(name, *id),
            Expr::Unary { operator, right, .. } => self.eval_unary(operator, right),
            Expr::Binary { left, operator, right, .. } => self.eval_binary(left, operator, right),
            Expr::Logical { left, operator, right, .. } => self.eval_logical(left, operator, right),
            Expr::Assign { id, name, value } => self.eval_assign(*id, name, value),
            Expr::Call { callee, paren, arguments, .. } => self.eval_call(callee, paren, arguments),
            Expr::Get { object, name, .. } => self.eval_get(object, name),
            Expr::Set { object, name, value, .. } => self.eval_set(object, name, value),
            Expr::This { id, keyword } => self.look_up_variable(keyword, *id),
            Expr::Super { id, keyword, method } => self.eval_super(*id, keyword, method),
        }
    }

    fn eval_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let right = self.evaluate(right)?;
        match operator.token_type {
            TokenType::Minus => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::new(operator.clone(), "Operand must be a number.")),
            },
            TokenType::Bang => Ok(Value::Bool(!right.is_truthy())),
            _ => unreachable!("parser only produces Minus/Bang unary operators"),
        }
    }

    fn eval_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        let number_operands = |op: &Token| -> Result<(f64, f64), RuntimeError> {
            match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
                _ => Err(RuntimeError::new(op.clone(), "Operands must be numbers.")),
            }
        };

        match operator.token_type {
            TokenType::Minus => number_operands(operator).map(|(a, b)| Value::Number(a - b)),
            TokenType::Slash => {
                let (a, b) = number_operands(operator)?;
                if b == 0.0 {
                    return Err(RuntimeError::new(operator.clone(), "Division by zero."));
                }
                Ok(Value::Number(a / b))
            }
            TokenType::Star => number_operands(operator).map(|(a, b)| Value::Number(a * b)),
            TokenType::Plus => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::string(format!("{a}{b}"))),
                _ => Err(RuntimeError::new(
                    operator.clone(),
                    "Operands must be two numbers or two strings.",
                )),
            },
            TokenType::Greater => number_operands(operator).map(|(a, b)| Value::Bool(a > b)),
            TokenType::GreaterEqual => number_operands(operator).map(|(a, b)| Value::Bool(a >= b)),
            TokenType::Less => number_operands(operator).map(|(a, b)| Value::Bool(a < b)),
            TokenType::LessEqual => number_operands(operator).map(|(a, b)| Value::Bool(a <= b)),
            TokenType::BangEqual => Ok(Value::Bool(!left.is_equal(&right))),
            TokenType::EqualEqual => Ok(Value::Bool(left.is_equal(&right))),
            _ => unreachable!("parser only produces arithmetic/comparison/equality binary operators"),
        }
    }

    fn eval_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;
        match operator.token_type {
            TokenType::Or if left.is_truthy() => Ok(left),
            TokenType::Or => self.evaluate(right),
            TokenType::And if !left.is_truthy() => Ok(left),
            TokenType::And => self.evaluate(right),
            _ => unreachable!("parser only produces And/Or logical operators"),
        }
    }

    fn eval_assign(&mut self, id: ExprId, name: &Token, value: &Expr) -> Result<Value, RuntimeError> {
        let value = self.evaluate(value)?;
        match self.locals.get(&id) {
            Some(&distance) => {
                Environment::assign_at(&self.environment, distance, name, value.clone());
            }
            None => Environment::assign(&self.globals, name, value.clone())?,
        }
        Ok(value)
    }

    fn eval_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value, RuntimeError> {
        let callee = self.evaluate(callee)?;
        let mut args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.evaluate(arg)?);
        }

        let (arity, name) = match &callee {
            Value::Callable(c) => (c.arity(), c.display_name()),
            Value::Class(c) => (c.arity(), c.name.clone()),
            _ => {
                return Err(RuntimeError::new(
                    paren.clone(),
                    "Can only call functions and classes.",
                ))
            }
        };

        if args.len() != arity {
            return Err(RuntimeError::new(
                paren.clone(),
                format!("Expected {arity} arguments but got {}.", args.len()),
            ));
        }

        match callee {
            Value::Callable(c) => c.call(self, args),
            Value::Class(c) => LoxClass::call(&c, self, args),
            _ => unreachable!("checked above, name={name}"),
        }
    }

    fn eval_get(&mut self, object: &Expr, name: &Token) -> Result<Value, RuntimeError> {
        match self.evaluate(object)? {
            Value::Instance(instance) => LoxInstance::get(&instance, name),
            _ => Err(RuntimeError::new(name.clone(), "Only instances have properties.")),
        }
    }

    fn eval_set(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Value, RuntimeError> {
        match self.evaluate(object)? {
            Value::Instance(instance) => {
                let value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }
            _ => Err(RuntimeError::new(name.clone(), "Only instances have fields.")),
        }
    }

    fn eval_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value, RuntimeError> {
        let distance = *self
            .locals
            .get(&id)
            .expect("resolver always records a distance for `super`");
        let superclass = match Environment::get_at(&self.environment, distance, "super")? {
            Value::Class(c) => c,
            _ => unreachable!("resolver only ever binds `super` to a class"),
        };

        // `this` always lives one scope closer to the call site than the
        // `super` binding, because the resolver opens the `this` scope
        // after the `super` scope when a method body is walked.
        let this = match Environment::get_at(&self.environment, distance - 1, "this")? {
            Value::Instance(i) => i,
            _ => unreachable!("resolver only ever binds `this` to an instance"),
        };

        match superclass.find_method(&method.lexeme) {
            Some(m) => Ok(Value::Callable(Rc::new(m.bind(this)))),
            None => Err(RuntimeError::new(
                keyword.clone(),
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Signal::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                println!("{value}");
                Ok(Signal::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.borrow_mut().define(name.lexeme.clone(), value);
                Ok(Signal::Normal)
            }
            Stmt::Block(statements) => {
                let env = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, env)
            }
            Stmt::If { condition, then_branch, else_branch } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Signal::Normal => {}
                        signal @ Signal::Return(_) => return Ok(signal),
                    }
                }
                Ok(Signal::Normal)
            }
            Stmt::Function(decl) => {
                let function = LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                self.environment
                    .borrow_mut()
                    .define(decl.name.lexeme.clone(), Value::Callable(Rc::new(function)));
                Ok(Signal::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Signal::Return(value))
            }
            Stmt::Class { name, superclass, methods } => self.execute_class(name, superclass, methods),
        }
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: &Option<Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<Signal, RuntimeError> {
        let superclass = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(c) => Some(c),
                _ => {
                    let tok = match expr {
                        Expr::Variable { name, .. } => name.clone(),
                        _ => name.clone(),
                    };
                    return Err(RuntimeError::new(tok, "Superclass must be a class."));
                }
            },
            None => None,
        };

        self.environment.borrow_mut().define(name.lexeme.clone(), Value::Nil);

        // methods resolve `super` through an extra enclosing scope, even
        // when there is no superclass expression in source — the resolver
        // only opens this scope when `superclass` is `Some`.
        let method_env = match &superclass {
            Some(sc) => {
                let env = Environment::with_enclosing(Rc::clone(&self.environment));
                env.borrow_mut().define("super", Value::Class(Rc::clone(sc)));
                env
            }
            None => Rc::clone(&self.environment),
        };

        let mut method_table = HashMap::new();
        for method in methods {
            let function = LoxFunction::new(
                Rc::clone(method),
                Rc::clone(&method_env),
                method.name.lexeme == "init",
            );
            method_table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = Rc::new(LoxClass::new(name.lexeme.clone(), superclass, method_table));
        Environment::assign(&self.environment, name, Value::Class(class))?;
        Ok(Signal::Normal)
    }

    /// Runs `statements` in `env`, restoring the previously active
    /// environment afterward even if a `RuntimeError` or `return` signal
    /// unwinds out partway through.
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvRef) -> Result<Signal, RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, env);
        let mut result = Ok(Signal::Normal);
        for stmt in statements {
            match self.execute(stmt) {
                Ok(Signal::Normal) => continue,
                other => {
                    result = other;
                    break;
                }
            }
        }
        self.environment = previous;
        result
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors;
    use crate::lexer::Scanner;
    use crate::parser::Parser;
    use crate::resolver::Resolver;

    fn run(source: &str) -> Evaluator {
        errors::reset_flags();
        let tokens = Scanner::new(source).scan_tokens();
        let mut parser = Parser::new(tokens);
        let statements = parser.parse();
        let mut evaluator = Evaluator::new();
        let mut resolver = Resolver::new();
        let locals = resolver.resolve(&statements);
        for (id, depth) in locals {
            evaluator.resolve(id, depth);
        }
        evaluator.interpret(&statements);
        evaluator
    }

    #[test]
    fn arithmetic_and_string_concatenation() {
        run("var a = 1 + 2; var b = \"x\" + \"y\";");
        // no panics and no reported runtime error is the behavior under test
        assert!(!errors::had_runtime_error());
    }

    #[test]
    fn mismatched_plus_operands_is_a_runtime_error() {
        run("1 + \"a\";");
        assert!(errors::had_runtime_error());
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        run("print 1 / 0;");
        assert!(errors::had_runtime_error());
    }

    #[test]
    fn equality_never_raises_on_mismatched_types() {
        run("print 1 == \"1\"; print nil != false;");
        assert!(!errors::had_runtime_error());
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        // returns a function that always adds the captured `n`
        run(
            r#"
            fun makeAdder(n) {
                fun add(x) { return x + n; }
                return add;
            }
            var addFive = makeAdder(5);
            var result = addFive(2);
            "#,
        );
        assert!(!errors::had_runtime_error());
    }

    #[test]
    fn class_instantiation_and_method_dispatch() {
        run(
            r#"
            class Greeter {
                init(name) { this.name = name; }
                greet() { return "hi " + this.name; }
            }
            var g = Greeter("Ada");
            var msg = g.greet();
            "#,
        );
        assert!(!errors::had_runtime_error());
    }

    #[test]
    fn super_call_binds_this_to_original_instance() {
        run(
            r#"
            class A {
                whoAmI() { return "A"; }
            }
            class B < A {
                whoAmI() { return super.whoAmI(); }
            }
            var b = B();
            var result = b.whoAmI();
            "#,
        );
        assert!(!errors::had_runtime_error());
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        run("print x;");
        assert!(errors::had_runtime_error());
    }
}
