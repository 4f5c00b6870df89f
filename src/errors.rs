//! Error reporting host shared by the lexer, parser, resolver, and evaluator.
//!
//! Lex/parse/resolve problems go through `error`/`error_at_token` and flip
//! `HAD_ERROR`; runtime failures are carried as `RuntimeError` values and only
//! reported once they reach the top-level interpret call, via `runtime_error`.
//! `Return` never comes through here — see `crate::evaluator::Signal`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::lexer::Token;

static HAD_ERROR: AtomicBool = AtomicBool::new(false);
static HAD_RUNTIME_ERROR: AtomicBool = AtomicBool::new(false);

pub fn had_error() -> bool {
    HAD_ERROR.load(Ordering::Relaxed)
}

pub fn had_runtime_error() -> bool {
    HAD_RUNTIME_ERROR.load(Ordering::Relaxed)
}

/// Reset both flags. Called between REPL lines.
pub fn reset_flags() {
    HAD_ERROR.store(false, Ordering::Relaxed);
    HAD_RUNTIME_ERROR.store(false, Ordering::Relaxed);
}

/// A static error tied only to a source line (lexer, resolver).
pub fn error(line: usize, message: &str) {
    let text = format!("Error at line {line}: {message}");
    log::warn!("{text}");
    eprintln!("{text}");
    HAD_ERROR.store(true, Ordering::Relaxed);
}

/// A static error tied to the offending token (parser).
pub fn error_at_token(token: &Token, message: &str) {
    let text = format!("Error with token {token}: {message}");
    log::warn!("{text}");
    eprintln!("{text}");
    HAD_ERROR.store(true, Ordering::Relaxed);
}

pub fn runtime_error(err: &RuntimeError) {
    let text = format!("Runtime error at line {}: {}", err.token.line, err.message);
    log::error!("{text}");
    eprintln!("{text}");
    HAD_RUNTIME_ERROR.store(true, Ordering::Relaxed);
}

/// Sentinel raised by the parser on a syntax error. Carries no data — the
/// message was already reported to the host by the time this is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error")
    }
}

impl std::error::Error for ParseError {}

/// A runtime failure, carrying the offending token for line/context info.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: Token, message: impl Into<String>) -> Self {
        Self {
            token,
            message: message.into(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{TokenLiteral, TokenType};

    #[test]
    fn flags_reset_independently() {
        reset_flags();
        error(1, "boom");
        assert!(had_error());
        assert!(!had_runtime_error());
        reset_flags();
        assert!(!had_error());
    }

    #[test]
    fn runtime_error_sets_runtime_flag_only() {
        reset_flags();
        let tok = Token::new(TokenType::Identifier, "x".into(), TokenLiteral::None, 3);
        runtime_error(&RuntimeError::new(tok, "Undefined variable 'x'."));
        assert!(had_runtime_error());
        assert!(!had_error());
        reset_flags();
    }
}
