//! Static pass between parsing and evaluation. Walks every scope once,
//! recording how many environments out a variable reference resolves to
//! (keyed by the referencing expression's `ExprId`) so the evaluator never
//! has to search at call time, and catches a handful of errors that are
//! cheaper to reject statically than to let blow up at runtime.

use std::collections::HashMap;

use crate::ast::{Expr, ExprId, Stmt};
use crate::errors::error_at_token;
use crate::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>,
    locals: HashMap<ExprId, usize>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Resolves an entire program and hands back the scope-distance table
    /// the evaluator should seed itself with.
    pub fn resolve(mut self, statements: &[Stmt]) -> HashMap<ExprId, usize> {
        self.resolve_stmts(statements);
        self.locals
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                error_at_token(name, "Already a variable with this name in this scope.");
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                self.locals.insert(id, depth);
                return;
            }
        }
        // not found in any local scope: assumed global, left unresolved
    }

    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], kind: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(&param.lexeme);
        }
        self.resolve_stmts(body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(expr) => self.resolve_expr(expr),
            Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(&name.lexeme);
            }
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }
            Stmt::If { condition, then_branch, else_branch } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::Function(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name.lexeme);
                self.resolve_function(&decl.params, &decl.body, FunctionType::Function);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    error_at_token(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        error_at_token(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Class { name, superclass, methods } => {
                self.resolve_class(name, superclass, methods);
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: &Option<Expr>,
        methods: &[std::rc::Rc<crate::ast::FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(&name.lexeme);

        if let Some(Expr::Variable { name: super_name, .. }) = superclass {
            if super_name.lexeme == name.lexeme {
                error_at_token(super_name, "A class can't inherit from itself.");
            }
        }

        if let Some(superclass_expr) = superclass {
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass_expr);
            self.begin_scope();
            self.define_in_current("super");
        }

        self.begin_scope();
        self.define_in_current("this");

        for method in methods {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(&method.params, &method.body, kind);
        }

        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn define_in_current(&mut self, name: &str) {
        self.scopes
            .last_mut()
            .expect("begin_scope was just called")
            .insert(name.to_string(), true);
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal { .. } => {}
            Expr::Grouping { expression, .. } => self.resolve_expr(expression),
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        error_at_token(name, "Can't read local variable in its own initializer.");
                    }
                }
                self.resolve_local(*id, &name.lexeme);
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, &name.lexeme);
            }
            Expr::Call { callee, arguments, .. } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    error_at_token(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(*id, "this");
            }
            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        error_at_token(keyword, "Can't use 'super' outside of a class.");
                        return;
                    }
                    ClassType::Class => {
                        error_at_token(keyword, "Can't use 'super' in a class with no superclass.");
                        return;
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, "super");
            }
        }
    }
}

impl Default for Resolver {
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

    fn resolve(source: &str) -> HashMap<ExprId, usize> {
        errors::reset_flags();
        let tokens = Scanner::new(source).scan_tokens();
        let mut parser = Parser::new(tokens);
        let statements = parser.parse();
        Resolver::new().resolve(&statements)
    }

    #[test]
    fn local_shadowing_is_allowed_across_nested_scopes() {
        resolve("var a = 1; { var a = 2; print a; }");
        assert!(!errors::had_error());
    }

    #[test]
    fn redeclaring_in_the_same_scope_is_an_error() {
        resolve("{ var a = 1; var a = 2; }");
        assert!(errors::had_error());
    }

    #[test]
    fn self_reference_in_initializer_is_an_error() {
        resolve("var a = 1; { var a = a; }");
        assert!(errors::had_error());
    }

    #[test]
    fn return_outside_function_is_an_error() {
        resolve("return 1;");
        assert!(errors::had_error());
    }

    #[test]
    fn return_value_from_initializer_is_an_error() {
        resolve("class C { init() { return 1; } }");
        assert!(errors::had_error());
    }

    #[test]
    fn this_outside_class_is_an_error() {
        resolve("print this;");
        assert!(errors::had_error());
    }

    #[test]
    fn super_without_superclass_is_an_error() {
        resolve("class C { m() { return super.m(); } }");
        assert!(errors::had_error());
    }

    #[test]
    fn class_inheriting_from_itself_is_an_error() {
        resolve("class C < C {}");
        assert!(errors::had_error());
    }

    #[test]
    fn local_reads_resolve_to_a_nonzero_depth() {
        let locals = resolve("fun f() { var a = 1; { print a; } }");
        assert!(locals.values().any(|&depth| depth > 0));
    }
}
