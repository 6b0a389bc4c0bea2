//! Recursive-descent parser for the `${{ }}` expression mini-language

use super::lexer::{ExprError, Lexer, Token, TokenKind};
use super::ExprPos;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Variable {
        name: String,
        pos: ExprPos,
    },
    StrLit {
        value: String,
        pos: ExprPos,
    },
    NumLit {
        value: f64,
        pos: ExprPos,
    },
    BoolLit {
        value: bool,
        pos: ExprPos,
    },
    NullLit {
        pos: ExprPos,
    },
    Not {
        operand: Box<ExprNode>,
        pos: ExprPos,
    },
    Compare {
        op: CompareOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
        pos: ExprPos,
    },
    Logical {
        op: LogicalOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
        pos: ExprPos,
    },
    FuncCall {
        name: String,
        args: Vec<ExprNode>,
        pos: ExprPos,
    },
    /// `receiver.property`; the property name is case folded.
    PropDeref {
        receiver: Box<ExprNode>,
        property: String,
        pos: ExprPos,
    },
    /// `receiver.*` or `receiver[*]`
    FilterDeref {
        receiver: Box<ExprNode>,
        pos: ExprPos,
    },
    /// `receiver[index]`
    Index {
        receiver: Box<ExprNode>,
        index: Box<ExprNode>,
        pos: ExprPos,
    },
}

impl ExprNode {
    pub fn pos(&self) -> ExprPos {
        match self {
            ExprNode::Variable { pos, .. }
            | ExprNode::StrLit { pos, .. }
            | ExprNode::NumLit { pos, .. }
            | ExprNode::BoolLit { pos, .. }
            | ExprNode::NullLit { pos }
            | ExprNode::Not { pos, .. }
            | ExprNode::Compare { pos, .. }
            | ExprNode::Logical { pos, .. }
            | ExprNode::FuncCall { pos, .. }
            | ExprNode::PropDeref { pos, .. }
            | ExprNode::FilterDeref { pos, .. }
            | ExprNode::Index { pos, .. } => *pos,
        }
    }
}

/// Parses one expression snippet up to its closing `}}`. The second value is
/// the byte offset just past the terminator, valid even on error, so the
/// template scanner can resume behind the span.
pub fn parse(src: &str) -> (Result<ExprNode, ExprError>, usize) {
    let mut lexer = Lexer::new(src);
    let result = parse_whole(&mut lexer);
    (result, lexer.offset())
}

fn parse_whole(lexer: &mut Lexer<'_>) -> Result<ExprNode, ExprError> {
    let tok = lexer.next_token()?;
    let mut parser = Parser { lexer, tok };
    let expr = parser.logical_or()?;
    match parser.tok.kind {
        TokenKind::End => Ok(expr),
        ref kind => Err(ExprError::new(
            format!(
                "unexpected token {} after expression. expected \"}}}}\"",
                kind.describe()
            ),
            parser.tok.line,
            parser.tok.col,
        )),
    }
}

struct Parser<'a, 'src> {
    lexer: &'a mut Lexer<'src>,
    tok: Token,
}

impl Parser<'_, '_> {
    fn advance(&mut self) -> Result<Token, ExprError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.tok, next))
    }

    fn pos(&self) -> ExprPos {
        ExprPos::new(self.tok.line, self.tok.col)
    }

    fn unexpected(&self, what: &str) -> ExprError {
        ExprError::new(
            format!(
                "unexpected token {} while parsing {what}",
                self.tok.kind.describe()
            ),
            self.tok.line,
            self.tok.col,
        )
    }

    fn logical_or(&mut self) -> Result<ExprNode, ExprError> {
        let mut left = self.logical_and()?;
        while self.tok.kind == TokenKind::Or {
            self.advance()?;
            let right = self.logical_and()?;
            let pos = left.pos();
            left = ExprNode::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<ExprNode, ExprError> {
        let mut left = self.comparison()?;
        while self.tok.kind == TokenKind::And {
            self.advance()?;
            let right = self.comparison()?;
            let pos = left.pos();
            left = ExprNode::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<ExprNode, ExprError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.tok.kind {
                TokenKind::Lt => CompareOp::Lt,
                TokenKind::LtEq => CompareOp::LtEq,
                TokenKind::Gt => CompareOp::Gt,
                TokenKind::GtEq => CompareOp::GtEq,
                TokenKind::Eq => CompareOp::Eq,
                TokenKind::NotEq => CompareOp::NotEq,
                _ => return Ok(left),
            };
            self.advance()?;
            let right = self.unary()?;
            let pos = left.pos();
            left = ExprNode::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos,
            };
        }
    }

    fn unary(&mut self) -> Result<ExprNode, ExprError> {
        if self.tok.kind == TokenKind::Not {
            let pos = self.pos();
            self.advance()?;
            let operand = self.unary()?;
            return Ok(ExprNode::Not {
                operand: Box::new(operand),
                pos,
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<ExprNode, ExprError> {
        let mut expr = self.primary()?;
        loop {
            match self.tok.kind {
                TokenKind::Dot => {
                    let pos = self.pos();
                    self.advance()?;
                    match self.tok.kind.clone() {
                        TokenKind::Ident(name) => {
                            self.advance()?;
                            expr = ExprNode::PropDeref {
                                receiver: Box::new(expr),
                                property: name.to_lowercase(),
                                pos,
                            };
                        }
                        TokenKind::Star => {
                            self.advance()?;
                            expr = ExprNode::FilterDeref {
                                receiver: Box::new(expr),
                                pos,
                            };
                        }
                        _ => {
                            return Err(self.unexpected("property name after \".\""));
                        }
                    }
                }
                TokenKind::LBracket => {
                    let pos = self.pos();
                    self.advance()?;
                    if self.tok.kind == TokenKind::Star {
                        self.advance()?;
                        self.expect_rbracket()?;
                        expr = ExprNode::FilterDeref {
                            receiver: Box::new(expr),
                            pos,
                        };
                    } else {
                        let index = self.logical_or()?;
                        self.expect_rbracket()?;
                        expr = ExprNode::Index {
                            receiver: Box::new(expr),
                            index: Box::new(index),
                            pos,
                        };
                    }
                }
                _ => return Ok(expr),
            }
        }
    }

    fn expect_rbracket(&mut self) -> Result<(), ExprError> {
        if self.tok.kind != TokenKind::RBracket {
            return Err(self.unexpected("\"]\" of index access"));
        }
        self.advance()?;
        Ok(())
    }

    fn primary(&mut self) -> Result<ExprNode, ExprError> {
        let pos = self.pos();
        match self.tok.kind.clone() {
            TokenKind::LParen => {
                self.advance()?;
                let expr = self.logical_or()?;
                if self.tok.kind != TokenKind::RParen {
                    return Err(self.unexpected("\")\" of nested expression"));
                }
                self.advance()?;
                Ok(expr)
            }
            TokenKind::Ident(name) => {
                self.advance()?;
                if self.tok.kind == TokenKind::LParen {
                    let args = self.call_args()?;
                    return Ok(ExprNode::FuncCall { name, args, pos });
                }
                match name.as_str() {
                    "true" => Ok(ExprNode::BoolLit { value: true, pos }),
                    "false" => Ok(ExprNode::BoolLit { value: false, pos }),
                    "null" => Ok(ExprNode::NullLit { pos }),
                    _ => Ok(ExprNode::Variable { name, pos }),
                }
            }
            TokenKind::Int(i) => {
                self.advance()?;
                Ok(ExprNode::NumLit {
                    value: i as f64,
                    pos,
                })
            }
            TokenKind::Float(f) => {
                self.advance()?;
                Ok(ExprNode::NumLit { value: f, pos })
            }
            TokenKind::Str(value) => {
                self.advance()?;
                Ok(ExprNode::StrLit { value, pos })
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn call_args(&mut self) -> Result<Vec<ExprNode>, ExprError> {
        // self.tok is the "(" of the call
        self.advance()?;
        let mut args = Vec::new();
        if self.tok.kind == TokenKind::RParen {
            self.advance()?;
            return Ok(args);
        }
        loop {
            args.push(self.logical_or()?);
            match self.tok.kind {
                TokenKind::Comma => {
                    self.advance()?;
                }
                TokenKind::RParen => {
                    self.advance()?;
                    return Ok(args);
                }
                _ => return Err(self.unexpected("\",\" or \")\" of function call")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> ExprNode {
        let (result, _) = parse(src);
        result.unwrap()
    }

    fn parse_err(src: &str) -> ExprError {
        let (result, _) = parse(src);
        result.unwrap_err()
    }

    #[test]
    fn test_parse_variable() {
        let ExprNode::Variable { name, pos } = parse_ok("github }}") else {
            panic!("expected variable");
        };
        assert_eq!(name, "github");
        assert_eq!(pos, ExprPos::new(1, 1));
    }

    #[test]
    fn test_parse_property_chain() {
        let ExprNode::PropDeref {
            receiver, property, ..
        } = parse_ok("steps.Build.outputs }}")
        else {
            panic!("expected deref");
        };
        assert_eq!(property, "outputs");
        let ExprNode::PropDeref {
            receiver, property, ..
        } = *receiver
        else {
            panic!("expected deref");
        };
        // property names are case folded
        assert_eq!(property, "build");
        assert!(matches!(*receiver, ExprNode::Variable { ref name, .. } if name == "steps"));
    }

    #[test]
    fn test_parse_call_with_args() {
        let ExprNode::FuncCall { name, args, .. } =
            parse_ok("startsWith(github.ref, 'refs/tags/') }}")
        else {
            panic!("expected call");
        };
        assert_eq!(name, "startsWith");
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1], ExprNode::StrLit { ref value, .. } if value == "refs/tags/"));
    }

    #[test]
    fn test_parse_precedence() {
        // ! binds tighter than ==, which binds tighter than &&
        let ExprNode::Logical { op, left, .. } = parse_ok("!true == false && success() }}") else {
            panic!("expected logical node");
        };
        assert_eq!(op, LogicalOp::And);
        let ExprNode::Compare { op, left, .. } = *left else {
            panic!("expected compare node");
        };
        assert_eq!(op, CompareOp::Eq);
        assert!(matches!(*left, ExprNode::Not { .. }));
    }

    #[test]
    fn test_parse_index_and_filter() {
        let ExprNode::Index { receiver, index, .. } = parse_ok("matrix.os[0] }}") else {
            panic!("expected index");
        };
        assert!(matches!(*receiver, ExprNode::PropDeref { .. }));
        assert!(matches!(*index, ExprNode::NumLit { value, .. } if value == 0.0));

        assert!(matches!(
            parse_ok("inputs.* }}"),
            ExprNode::FilterDeref { .. }
        ));
        assert!(matches!(
            parse_ok("inputs[*] }}"),
            ExprNode::FilterDeref { .. }
        ));
    }

    #[test]
    fn test_parse_literals() {
        assert!(matches!(parse_ok("null }}"), ExprNode::NullLit { .. }));
        assert!(
            matches!(parse_ok("true }}"), ExprNode::BoolLit { value: true, .. })
        );
        assert!(matches!(parse_ok("42 }}"), ExprNode::NumLit { value, .. } if value == 42.0));
    }

    #[test]
    fn test_parse_parenthesized() {
        let ExprNode::Logical { op, .. } = parse_ok("(a || b) && c }}") else {
            panic!("expected logical node");
        };
        assert_eq!(op, LogicalOp::And);
    }

    #[test]
    fn test_error_on_trailing_token() {
        let err = parse_err("a b }}");
        assert!(err.message.contains("after expression"), "{}", err.message);
        assert_eq!((err.line, err.col), (1, 3));
    }

    #[test]
    fn test_error_on_missing_operand() {
        let err = parse_err("a && }}");
        assert!(err.message.contains("while parsing expression"));
    }

    #[test]
    fn test_error_position_after_newline() {
        let err = parse_err("a &&\n  == b }}");
        assert_eq!((err.line, err.col), (2, 3));
    }

    #[test]
    fn test_offset_after_error_allows_resume() {
        let (result, offset) = parse("a && }} tail");
        assert!(result.is_err());
        assert_eq!(&"a && }} tail"[..offset], "a && }}");
    }
}
