//! Recursive-descent parser. Each grammar rule below is one precedence
//! level; primary() bottoms out the recursion. Every expression the parser
//! builds gets a fresh `ExprId` on construction.
//!
//! Grammar (highest to lowest precedence):
//!   primary   → NUMBER | STRING | "true" | "false" | "nil" | "this"
//!             | "(" expression ")" | IDENTIFIER | "super" "." IDENTIFIER
//!   call      → primary ( "(" arguments? ")" | "." IDENTIFIER )*
//!   unary     → ( "!" | "-" ) unary | call
//!   factor    → unary ( ( "/" | "*" ) unary )*
//!   term      → factor ( ( "-" | "+" ) factor )*
//!   comparison→ term ( ( ">" | ">=" | "<" | "<=" ) term )*
//!   equality  → comparison ( ( "!=" | "==" ) comparison )*
//!   and       → equality ( "and" equality )*
//!   or        → and ( "or" and )*
//!   assignment→ ( call "." )? IDENTIFIER "=" assignment | or
//!   expression→ assignment

use std::rc::Rc;

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::errors::{error_at_token, ParseError};
use crate::lexer::{Token, TokenType};
use crate::value::Value;

const MAX_ARGS: usize = 255;

pub mod printer;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_id: ExprId,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> ExprId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Parses the whole token stream into a program. Statements that fail
    /// to parse are dropped after synchronizing, so later statements still
    /// get a chance to report their own errors.
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        statements
    }

    // ---- statements ----

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_token(&[TokenType::Class]) {
            self.class_declaration()
        } else if self.match_token(&[TokenType::Fun]) {
            self.function_declaration("function").map(Stmt::Function)
        } else if self.match_token(&[TokenType::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(ParseError) => {
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;

        let superclass = if self.match_token(&[TokenType::Less]) {
            let super_name = self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(Expr::Variable {
                id: self.next_id(),
                name: super_name,
            })
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function_declaration("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class { name, superclass, methods })
    }

    fn function_declaration(&mut self, kind: &str) -> Result<Rc<FunctionDecl>, ParseError> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {kind} name."))?;
        self.consume(TokenType::LeftParen, &format!("Expect '(' after {kind} name."))?;

        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    error_at_token(self.peek(), &format!("Can't have more than {MAX_ARGS} parameters."));
                }
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !self.match_token(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(TokenType::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if self.match_token(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.match_token(&[TokenType::For]) {
            return self.for_statement();
        }
        if self.match_token(&[TokenType::If]) {
            return self.if_statement();
        }
        if self.match_token(&[TokenType::Print]) {
            return self.print_statement();
        }
        if self.match_token(&[TokenType::Return]) {
            return self.return_statement();
        }
        if self.match_token(&[TokenType::While]) {
            return self.while_statement();
        }
        if self.match_token(&[TokenType::LeftBrace]) {
            return Ok(Stmt::Block(self.block()?));
        }
        self.expression_statement()
    }

    /// `for` is sugar: desugars into a `while` wrapped in a block that
    /// scopes the initializer, with the increment appended to the body.
    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_token(&[TokenType::Semicolon]) {
            None
        } else if self.match_token(&[TokenType::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or(Expr::Literal {
            id: self.next_id(),
            value: Value::Bool(true),
        });
        body = Stmt::While { condition, body: Box::new(body) };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn print_statement(&mut self) -> Result<Stmt, ParseError> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    /// Parses the left side as an `or`-expression, then if an `=` follows,
    /// re-checks that the left side is a valid assignment target (a bare
    /// variable or a `.` property access) and rewrites it into `Assign`/
    /// `Set`. Any other left side is a non-fatal error — parsing continues
    /// with the already-parsed left expression discarded.
    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.or()?;

        if self.match_token(&[TokenType::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: self.next_id(),
                    name,
                    value: Box::new(value),
                }),
                Expr::Get { object, name, .. } => Ok(Expr::Set {
                    id: self.next_id(),
                    object,
                    name,
                    value: Box::new(value),
                }),
                _ => {
                    error_at_token(&equals, "Invalid assignment target.");
                    Ok(expr)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.and()?;
        while self.match_token(&[TokenType::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                id: self.next_id(),
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;
        while self.match_token(&[TokenType::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                id: self.next_id(),
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.comparison()?;
        while self.match_token(&[TokenType::BangEqual, TokenType::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = self.binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.term()?;
        while self.match_token(&[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = self.binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.factor()?;
        while self.match_token(&[TokenType::Minus, TokenType::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = self.binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;
        while self.match_token(&[TokenType::Slash, TokenType::Star]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = self.binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn binary(&mut self, left: Expr, operator: Token, right: Expr) -> Expr {
        Expr::Binary {
            id: self.next_id(),
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                id: self.next_id(),
                operator,
                right: Box::new(right),
            });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(&[TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(&[TokenType::Dot]) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get { id: self.next_id(), object: Box::new(expr), name };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    error_at_token(self.peek(), &format!("Can't have more than {MAX_ARGS} arguments."));
                }
                arguments.push(self.expression()?);
                if !self.match_token(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            id: self.next_id(),
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&[TokenType::False]) {
            return Ok(Expr::Literal { id: self.next_id(), value: Value::Bool(false) });
        }
        if self.match_token(&[TokenType::True]) {
            return Ok(Expr::Literal { id: self.next_id(), value: Value::Bool(true) });
        }
        if self.match_token(&[TokenType::Nil]) {
            return Ok(Expr::Literal { id: self.next_id(), value: Value::Nil });
        }
        if self.match_token(&[TokenType::Number]) {
            let n = match &self.previous().literal {
                crate::lexer::TokenLiteral::Number(n) => *n,
                _ => unreachable!("NUMBER token always carries a TokenLiteral::Number"),
            };
            return Ok(Expr::Literal { id: self.next_id(), value: Value::Number(n) });
        }
        if self.match_token(&[TokenType::String]) {
            let s = match &self.previous().literal {
                crate::lexer::TokenLiteral::Str(s) => s.clone(),
                _ => unreachable!("STRING token always carries a TokenLiteral::Str"),
            };
            return Ok(Expr::Literal { id: self.next_id(), value: Value::string(s) });
        }
        if self.match_token(&[TokenType::Super]) {
            let keyword = self.previous().clone();
            self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
            return Ok(Expr::Super { id: self.next_id(), keyword, method });
        }
        if self.match_token(&[TokenType::This]) {
            return Ok(Expr::This { id: self.next_id(), keyword: self.previous().clone() });
        }
        if self.match_token(&[TokenType::Identifier]) {
            return Ok(Expr::Variable { id: self.next_id(), name: self.previous().clone() });
        }
        if self.match_token(&[TokenType::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping { id: self.next_id(), expression: Box::new(expr) });
        }

        Err(self.error(self.peek().clone(), "Expect expression."))
    }

    // ---- token-stream plumbing ----

    fn match_token(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(*token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: TokenType) -> bool {
        !self.is_at_end() && self.peek().token_type == token_type
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<Token, ParseError> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek().clone(), message))
        }
    }

    fn error(&self, token: Token, message: &str) -> ParseError {
        error_at_token(&token, message);
        ParseError
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    /// Discards tokens until a likely statement boundary, so one syntax
    /// error doesn't cascade into a wall of spurious follow-on errors.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }

            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors;
    use crate::lexer::Scanner;

    fn parse(source: &str) -> Vec<Stmt> {
        errors::reset_flags();
        let tokens = Scanner::new(source).scan_tokens();
        Parser::new(tokens).parse()
    }

    #[test]
    fn precedence_groups_multiplication_tighter_than_addition() {
        let stmts = parse("1 + 2 * 3;");
        match &stmts[0] {
            Stmt::Expression(Expr::Binary { operator, right, .. }) => {
                assert_eq!(operator.token_type, TokenType::Plus);
                assert!(matches!(**right, Expr::Binary { .. }));
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn each_expression_gets_a_distinct_id() {
        let stmts = parse("1 + 2;");
        if let Stmt::Expression(Expr::Binary { id, left, right, .. }) = &stmts[0] {
            assert_ne!(*id, left.id());
            assert_ne!(*id, right.id());
            assert_ne!(left.id(), right.id());
        } else {
            panic!("expected a binary expression statement");
        }
    }

    #[test]
    fn assignment_to_non_target_reports_error_but_does_not_abort() {
        let stmts = parse("1 + 2 = 3;");
        assert!(errors::had_error());
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn for_loop_desugars_to_a_block_with_a_while() {
        let stmts = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        match &stmts[0] {
            Stmt::Block(inner) => {
                assert!(matches!(inner[0], Stmt::Var { .. }));
                assert!(matches!(inner[1], Stmt::While { .. }));
            }
            other => panic!("expected desugared block, got {other:?}"),
        }
    }

    #[test]
    fn missing_semicolon_is_a_parse_error_and_synchronizes() {
        let stmts = parse("var a = 1 var b = 2;");
        assert!(errors::had_error());
        // recovers enough to still parse the second declaration
        assert!(stmts.iter().any(|s| matches!(s, Stmt::Var { .. })));
    }

    #[test]
    fn class_with_superclass_parses_superclass_as_variable_expr() {
        let stmts = parse("class A {} class B < A {}");
        match &stmts[1] {
            Stmt::Class { superclass: Some(Expr::Variable { name, .. }), .. } => {
                assert_eq!(name.lexeme, "A");
            }
            other => panic!("expected class with superclass, got {other:?}"),
        }
    }
}
