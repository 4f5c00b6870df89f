use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

use crate::errors::error;

/*
The scanner's job is to scan source code as a sequence of characters and group sequences of
characters together into lexemes. Each lexeme is then evaluated into a token for later analysis.

Tokens are the individual atoms of a programming language. Every atomic structure of the
language's grammar needs a token kind of its own.
*/

pub static KEYWORDS: Lazy<HashMap<&'static str, TokenType>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("and", TokenType::And);
    m.insert("class", TokenType::Class);
    m.insert("else", TokenType::Else);
    m.insert("false", TokenType::False);
    m.insert("for", TokenType::For);
    m.insert("fun", TokenType::Fun);
    m.insert("if", TokenType::If);
    m.insert("nil", TokenType::Nil);
    m.insert("or", TokenType::Or);
    m.insert("print", TokenType::Print);
    m.insert("return", TokenType::Return);
    m.insert("super", TokenType::Super);
    m.insert("this", TokenType::This);
    m.insert("true", TokenType::True);
    m.insert("var", TokenType::Var);
    m.insert("while", TokenType::While);
    m
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // single character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // one or two character tokens
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // literals
    Identifier,
    String,
    Number,

    // keywords
    And,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    Eof,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The literal payload a token carries. Only `NUMBER` and `STRING` tokens
/// carry one; every other token's literal is `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenLiteral {
    None,
    Number(f64),
    Str(String),
}

impl fmt::Display for TokenLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenLiteral::None => write!(f, "None"),
            TokenLiteral::Number(n) => write!(f, "{n}"),
            TokenLiteral::Str(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub literal: TokenLiteral,
    pub line: usize,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, literal: TokenLiteral, line: usize) -> Self {
        Self {
            token_type,
            lexeme,
            literal,
            line,
        }
    }

    /// A token with no real source position, used when the evaluator needs
    /// to report an error against a name that isn't backed by a concrete
    /// occurrence in the source (e.g. a missing `this`/`super` binding).
    pub fn synthetic(lexeme: &str) -> Self {
        Self {
            token_type: TokenType::Identifier,
            lexeme: lexeme.to_string(),
            literal: TokenLiteral::None,
            line: 0,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.token_type, self.lexeme, self.literal)
    }
}

/*
Single left-to-right scan, one character of consumed lookahead plus one more
of unconsumed lookahead. `start` marks the first character of the lexeme
currently being scanned; `current` marks the next character to consume.
*/
pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn scan_tokens(mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }
        self.tokens.push(Token::new(
            TokenType::Eof,
            String::new(),
            TokenLiteral::None,
            self.line,
        ));
        log::debug!("scanned {} tokens", self.tokens.len());
        self.tokens
    }

    fn advance(&mut self) -> char {
        let ch = self.source[self.current];
        self.current += 1;
        ch
    }

    fn scan_token(&mut self) {
        let ch = self.advance();
        match ch {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),
            '!' => {
                let token = if self.match_char('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(token);
            }
            '=' => {
                let token = if self.match_char('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(token);
            }
            '<' => {
                let token = if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(token);
            }
            '>' => {
                let token = if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(token);
            }
            '/' => {
                if self.match_char('/') {
                    // a line comment runs to, but does not consume, the newline
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            '"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if Self::is_alpha(c) => self.identifier(),
            _ => error(self.line, "Unexpected character."),
        }
    }

    fn is_alpha(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_'
    }

    fn is_alphanumeric(c: char) -> bool {
        Self::is_alpha(c) || c.is_ascii_digit()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> char {
        *self.source.get(self.current).unwrap_or(&'\0')
    }

    fn peek_next(&self) -> char {
        *self.source.get(self.current + 1).unwrap_or(&'\0')
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn string(&mut self) {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            error(self.line, "Unterminated string.");
            return;
        }

        self.advance(); // closing quote
        let value: String = self.source[self.start + 1..self.current - 1]
            .iter()
            .collect();
        self.add_token_with_literal(TokenType::String, TokenLiteral::Str(value));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance(); // consume the '.'
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let value: f64 = text.parse().expect("scanned number lexeme must parse");
        self.add_token_with_literal(TokenType::Number, TokenLiteral::Number(value));
    }

    fn identifier(&mut self) {
        while Self::is_alphanumeric(self.peek()) {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let token_type = KEYWORDS
            .get(text.as_str())
            .copied()
            .unwrap_or(TokenType::Identifier);
        self.add_token(token_type);
    }

    fn add_token(&mut self, token_type: TokenType) {
        self.add_token_with_literal(token_type, TokenLiteral::None);
    }

    fn add_token_with_literal(&mut self, token_type: TokenType, literal: TokenLiteral) {
        let text: String = self.source[self.start..self.current].iter().collect();
        self.tokens
            .push(Token::new(token_type, text, literal, self.line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors;

    fn scan(src: &str) -> Vec<Token> {
        errors::reset_flags();
        Scanner::new(src).scan_tokens()
    }

    #[test]
    fn eof_is_always_last() {
        let tokens = scan("1 + 2");
        assert_eq!(tokens.last().unwrap().token_type, TokenType::Eof);
    }

    #[test]
    fn numbers_with_and_without_fraction() {
        let tokens = scan("123 45.67 8.");
        assert_eq!(tokens[0].literal, TokenLiteral::Number(123.0));
        assert_eq!(tokens[1].literal, TokenLiteral::Number(45.67));
        // trailing dot without digits is not part of the number
        assert_eq!(tokens[2].literal, TokenLiteral::Number(8.0));
        assert_eq!(tokens[3].token_type, TokenType::Dot);
    }

    #[test]
    fn strings_span_newlines_and_track_line() {
        let tokens = scan("\"hello\nworld\" 1");
        assert_eq!(
            tokens[0].literal,
            TokenLiteral::Str("hello\nworld".to_string())
        );
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_string_reports_error_and_emits_nothing() {
        let tokens = scan("\"oops");
        assert!(errors::had_error());
        assert_eq!(tokens.len(), 1); // just EOF
    }

    #[test]
    fn two_char_operators_prefer_maximal_munch() {
        let tokens = scan("!= = == <=");
        assert_eq!(tokens[0].token_type, TokenType::BangEqual);
        assert_eq!(tokens[1].token_type, TokenType::Equal);
        assert_eq!(tokens[2].token_type, TokenType::EqualEqual);
        assert_eq!(tokens[3].token_type, TokenType::LessEqual);
    }

    #[test]
    fn keywords_vs_identifiers() {
        let tokens = scan("class classic");
        assert_eq!(tokens[0].token_type, TokenType::Class);
        assert_eq!(tokens[1].token_type, TokenType::Identifier);
    }

    #[test]
    fn line_comment_consumes_to_but_not_past_newline() {
        let tokens = scan("1 // comment\n2");
        assert_eq!(tokens[0].literal, TokenLiteral::Number(1.0));
        assert_eq!(tokens[1].literal, TokenLiteral::Number(2.0));
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unexpected_character_reports_but_keeps_scanning() {
        let tokens = scan("1 @ 2");
        assert!(errors::had_error());
        assert_eq!(tokens[0].literal, TokenLiteral::Number(1.0));
        assert_eq!(tokens[1].literal, TokenLiteral::Number(2.0));
    }
}
