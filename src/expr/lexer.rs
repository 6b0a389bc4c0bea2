//! Lexer for the `${{ }}` expression mini-language
//!
//! The token stream ends at the closing `}}` of the span; the number of
//! bytes consumed up to and including that terminator is reported through
//! [`Lexer::offset`], which is how the template scanner resumes after an
//! expression.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// A syntax or semantics error with a 1-based position relative to the
/// expression snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl ExprError {
    pub fn new(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            message: message.into(),
            line,
            col,
        }
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Star,
    Not,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    And,
    Or,
    /// The closing `}}` of the span.
    End,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(n) => format!("identifier {n:?}"),
            TokenKind::Int(i) => format!("integer literal {i}"),
            TokenKind::Float(f) => format!("float literal {f}"),
            TokenKind::Str(s) => format!("string literal {s:?}"),
            TokenKind::LParen => "\"(\"".to_string(),
            TokenKind::RParen => "\")\"".to_string(),
            TokenKind::LBracket => "\"[\"".to_string(),
            TokenKind::RBracket => "\"]\"".to_string(),
            TokenKind::Dot => "\".\"".to_string(),
            TokenKind::Comma => "\",\"".to_string(),
            TokenKind::Star => "\"*\"".to_string(),
            TokenKind::Not => "\"!\"".to_string(),
            TokenKind::Lt => "\"<\"".to_string(),
            TokenKind::LtEq => "\"<=\"".to_string(),
            TokenKind::Gt => "\">\"".to_string(),
            TokenKind::GtEq => "\">=\"".to_string(),
            TokenKind::Eq => "\"==\"".to_string(),
            TokenKind::NotEq => "\"!=\"".to_string(),
            TokenKind::And => "\"&&\"".to_string(),
            TokenKind::Or => "\"||\"".to_string(),
            TokenKind::End => "end of expression \"}}\"".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

pub struct Lexer<'a> {
    iter: Peekable<CharIndices<'a>>,
    line: usize,
    col: usize,
    /// Bytes consumed so far; after `End` this includes the `}}`.
    offset: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            iter: src.char_indices().peekable(),
            line: 1,
            col: 1,
            offset: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn bump(&mut self) -> Option<char> {
        let (i, c) = self.iter.next()?;
        self.offset = i + c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.iter.peek().map(|(_, c)| *c)
    }

    fn err(&self, message: impl Into<String>, line: usize, col: usize) -> ExprError {
        ExprError::new(message, line, col)
    }

    fn lex_ident(&mut self, first: char, line: usize, col: usize) -> Token {
        let mut name = String::new();
        name.push(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Ident(name),
            line,
            col,
        }
    }

    fn lex_number(&mut self, first: char, line: usize, col: usize) -> Result<Token, ExprError> {
        let mut text = String::new();
        text.push(first);
        let mut prev = first;
        while let Some(c) = self.peek() {
            let is_exp_sign = (c == '+' || c == '-') && (prev == 'e' || prev == 'E');
            if c.is_ascii_hexdigit() || c == '.' || c == 'x' || c == 'X' || is_exp_sign {
                text.push(c);
                self.bump();
                prev = c;
            } else {
                break;
            }
        }

        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("-0x")) {
            let value = i64::from_str_radix(hex, 16)
                .map_err(|_| self.err(format!("invalid integer literal {text:?}"), line, col))?;
            let value = if text.starts_with('-') { -value } else { value };
            return Ok(Token {
                kind: TokenKind::Int(value),
                line,
                col,
            });
        }

        if let Ok(i) = text.parse::<i64>() {
            return Ok(Token {
                kind: TokenKind::Int(i),
                line,
                col,
            });
        }
        match text.parse::<f64>() {
            Ok(f) => Ok(Token {
                kind: TokenKind::Float(f),
                line,
                col,
            }),
            Err(_) => Err(self.err(format!("invalid number literal {text:?}"), line, col)),
        }
    }

    fn lex_string(&mut self, line: usize, col: usize) -> Result<Token, ExprError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\'') => {
                    // '' escapes a single quote
                    if self.peek() == Some('\'') {
                        self.bump();
                        value.push('\'');
                    } else {
                        return Ok(Token {
                            kind: TokenKind::Str(value),
                            line,
                            col,
                        });
                    }
                }
                Some(c) => value.push(c),
                None => {
                    return Err(self.err("unexpected EOF while lexing string literal", line, col))
                }
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ExprError> {
        loop {
            let (line, col) = (self.line, self.col);
            let Some(c) = self.bump() else {
                return Err(self.err(
                    "unexpected EOF while lexing expression. expected \"}}\"",
                    line,
                    col,
                ));
            };
            let tok = |kind| {
                Ok(Token {
                    kind,
                    line,
                    col,
                })
            };
            return match c {
                ' ' | '\t' | '\r' | '\n' => continue,
                '(' => tok(TokenKind::LParen),
                ')' => tok(TokenKind::RParen),
                '[' => tok(TokenKind::LBracket),
                ']' => tok(TokenKind::RBracket),
                '.' => tok(TokenKind::Dot),
                ',' => tok(TokenKind::Comma),
                '*' => tok(TokenKind::Star),
                '\'' => self.lex_string(line, col),
                '!' => {
                    if self.peek() == Some('=') {
                        self.bump();
                        tok(TokenKind::NotEq)
                    } else {
                        tok(TokenKind::Not)
                    }
                }
                '<' => {
                    if self.peek() == Some('=') {
                        self.bump();
                        tok(TokenKind::LtEq)
                    } else {
                        tok(TokenKind::Lt)
                    }
                }
                '>' => {
                    if self.peek() == Some('=') {
                        self.bump();
                        tok(TokenKind::GtEq)
                    } else {
                        tok(TokenKind::Gt)
                    }
                }
                '=' => {
                    if self.peek() == Some('=') {
                        self.bump();
                        tok(TokenKind::Eq)
                    } else {
                        Err(self.err("unexpected character '='. did you mean \"==\"?", line, col))
                    }
                }
                '&' => {
                    if self.peek() == Some('&') {
                        self.bump();
                        tok(TokenKind::And)
                    } else {
                        Err(self.err("unexpected character '&'. did you mean \"&&\"?", line, col))
                    }
                }
                '|' => {
                    if self.peek() == Some('|') {
                        self.bump();
                        tok(TokenKind::Or)
                    } else {
                        Err(self.err("unexpected character '|'. did you mean \"||\"?", line, col))
                    }
                }
                '}' => {
                    if self.peek() == Some('}') {
                        self.bump();
                        tok(TokenKind::End)
                    } else {
                        Err(self.err("unexpected character '}'. expected \"}}\"", line, col))
                    }
                }
                c if c.is_ascii_alphabetic() || c == '_' => Ok(self.lex_ident(c, line, col)),
                c if c.is_ascii_digit() || c == '-' => self.lex_number(c, line, col),
                c => Err(self.err(
                    format!("unexpected character {c:?} while lexing expression"),
                    line,
                    col,
                )),
            };
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            let end = tok.kind == TokenKind::End;
            out.push(tok.kind);
            if end {
                return out;
            }
        }
    }

    #[test]
    fn test_lex_simple_call() {
        assert_eq!(
            kinds("success() }}"),
            vec![
                TokenKind::Ident("success".to_string()),
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_lex_property_chain() {
        assert_eq!(
            kinds("steps.build.outputs.path }}"),
            vec![
                TokenKind::Ident("steps".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("build".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("outputs".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("path".to_string()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_lex_operators_and_literals() {
        assert_eq!(
            kinds("!x && 'it''s' == 3.5 || a != -0x1f }}"),
            vec![
                TokenKind::Not,
                TokenKind::Ident("x".to_string()),
                TokenKind::And,
                TokenKind::Str("it's".to_string()),
                TokenKind::Eq,
                TokenKind::Float(3.5),
                TokenKind::Or,
                TokenKind::Ident("a".to_string()),
                TokenKind::NotEq,
                TokenKind::Int(-31),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_offset_points_after_terminator() {
        let src = "env.HOME }} trailing text";
        let mut lexer = Lexer::new(src);
        loop {
            if lexer.next_token().unwrap().kind == TokenKind::End {
                break;
            }
        }
        assert_eq!(&src[..lexer.offset()], "env.HOME }}");
        assert_eq!(&src[lexer.offset()..], " trailing text");
    }

    #[test]
    fn test_position_tracking_across_newlines() {
        let mut lexer = Lexer::new("a\n  && b }}");
        let a = lexer.next_token().unwrap();
        assert_eq!((a.line, a.col), (1, 1));
        let and = lexer.next_token().unwrap();
        assert_eq!((and.line, and.col), (2, 3));
        let b = lexer.next_token().unwrap();
        assert_eq!((b.line, b.col), (2, 6));
    }

    #[test]
    fn test_lone_ampersand_is_error() {
        let mut lexer = Lexer::new("a & b }}");
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        assert!(err.message.contains("did you mean \"&&\""));
        assert_eq!((err.line, err.col), (1, 3));
    }

    #[test]
    fn test_unterminated_expression() {
        let mut lexer = Lexer::new("foo ");
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        assert!(err.message.contains("unexpected EOF"));
    }

    #[test]
    fn test_ident_with_dash() {
        assert_eq!(
            kinds("inputs.keep-going }}"),
            vec![
                TokenKind::Ident("inputs".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("keep-going".to_string()),
                TokenKind::End,
            ]
        );
    }
}
