//! Lisp-style pretty printer for expressions, useful for debugging the
//! parser's output independently of the evaluator.

use std::fmt::Write;

use crate::ast::Expr;

pub fn print(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn write_expr(out: &mut String, expr: &Expr) {
    match expr {
        Expr::Literal { value, .. } => {
            let _ = write!(out, "{value}");
        }
        Expr::Grouping { expression, .. } => parenthesize(out, "group", &[expression]),
        Expr::Unary { operator, right, .. } => {
            parenthesize_str(out, &operator.lexeme, &[right]);
        }
        Expr::Binary { left, operator, right, .. } => {
            parenthesize_str(out, &operator.lexeme, &[left, right]);
        }
        Expr::Logical { left, operator, right, .. } => {
            parenthesize_str(out, &operator.lexeme, &[left, right]);
        }
        Expr::Variable { name, .. } => {
            let _ = write!(out, "{}", name.lexeme);
        }
        Expr::Assign { name, value, .. } => {
            parenthesize_str(out, &format!("= {}", name.lexeme), &[value]);
        }
        Expr::Call { callee, arguments, .. } => {
            let mut parts: Vec<&Expr> = vec![callee];
            parts.extend(arguments.iter());
            parenthesize(out, "call", &parts);
        }
        Expr::Get { object, name, .. } => {
            parenthesize_str(out, &format!(". {}", name.lexeme), &[object]);
        }
        Expr::Set { object, name, value, .. } => {
            parenthesize_str(out, &format!("set {}", name.lexeme), &[object, value]);
        }
        Expr::This { .. } => {
            out.push_str("this");
        }
        Expr::Super { method, .. } => {
            let _ = write!(out, "(super.{})", method.lexeme);
        }
    }
}

fn parenthesize(out: &mut String, name: &str, exprs: &[&Expr]) {
    parenthesize_str(out, name, exprs);
}

fn parenthesize_str(out: &mut String, name: &str, exprs: &[&Expr]) {
    out.push('(');
    out.push_str(name);
    for expr in exprs {
        out.push(' ');
        write_expr(out, expr);
    }
    out.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;
    use crate::parser::Parser;

    fn parse_expr(source: &str) -> Expr {
        let tokens = Scanner::new(source).scan_tokens();
        let stmts = Parser::new(tokens).parse();
        match stmts.into_iter().next() {
            Some(crate::ast::Stmt::Expression(expr)) => expr,
            other => panic!("expected a single expression statement, got {other:?}"),
        }
    }

    #[test]
    fn nested_binary_prints_in_lisp_style() {
        let expr = parse_expr("1 + 2 * 3;");
        assert_eq!(print(&expr), "(+ 1 (* 2 3))");
    }

    #[test]
    fn grouping_prints_as_group() {
        let expr = parse_expr("(1 + 2);");
        assert_eq!(print(&expr), "(group (+ 1 2))");
    }

    #[test]
    fn unary_minus_prints_with_operator_lexeme() {
        let expr = parse_expr("-5;");
        assert_eq!(print(&expr), "(- 5)");
    }
}
