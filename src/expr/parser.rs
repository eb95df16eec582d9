//! Recursive-descent parser for binding declarations
//!
//! A declaration is the body of an object literal (`a: expr, b: expr`);
//! values are expressions from a small JavaScript-flavoured grammar:
//!
//! ```text
//! conditional := or ('?' conditional ':' conditional)?
//! or          := and ('||' and)*
//! and         := equality ('&&' equality)*
//! equality    := relational (('==' | '!=' | '===' | '!==') relational)*
//! relational  := additive (('<' | '<=' | '>' | '>=') additive)*
//! additive    := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := unary (('*' | '/' | '%') unary)*
//! unary       := ('!' | '-' | '+') unary | postfix
//! postfix     := primary ('.' name | '[' conditional ']' | '(' args ')')*
//! primary     := number | string | ident | '(' conditional ')' | object | array
//! ```

use serde_json::Value;

use super::lexer::{tokenize, Token, TokenKind};
use super::ExprError;

/// Nesting limit for the expression tree: brackets, unary chains and every
/// link of an operator or postfix chain count against it
const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Undefined,
    Ident {
        name: String,
        pos: usize,
    },
    Member {
        object: Box<Expr>,
        property: String,
        pos: usize,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        pos: usize,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        pos: usize,
    },
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

/// Parse a declaration body into ordered (binding name, expression) pairs
pub fn parse_declaration(source: &str) -> Result<Vec<(String, Expr)>, ExprError> {
    let mut parser = Parser::new(tokenize(source)?);
    let entries = parser.object_body(|kind| matches!(kind, TokenKind::Eof))?;
    parser.expect(TokenKind::Eof, "end of declaration")?;
    Ok(entries)
}

/// Parse a single expression (used by tests and the CLI `check` command)
pub fn parse_expression(source: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser::new(tokenize(source)?);
    let expr = parser.conditional()?;
    parser.expect(TokenKind::Eof, "end of expression")?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            cursor: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        // tokenize() always terminates with Eof, and the cursor never moves past it
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !matches!(token.kind, TokenKind::Eof) {
            self.cursor += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ExprError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> ExprError {
        let token = self.peek();
        let found = match &token.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Ident(name) => format!("'{name}'"),
            TokenKind::Str(s) => format!("string '{s}'"),
            TokenKind::Number(n) => format!("number {n}"),
            other => format!("{other:?}"),
        };
        ExprError::new(format!("expected {what}, found {found}"), token.pos)
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::new("expression nested too deeply", self.peek().pos));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// One more left-deep link (operator or postfix) on the current chain
    fn link(&mut self, links: &mut usize) -> Result<(), ExprError> {
        self.enter()?;
        *links += 1;
        Ok(())
    }

    fn unlink(&mut self, links: usize) {
        self.depth -= links;
    }

    /// `key: value (, key: value)* ,?` up to (not including) the terminator
    fn object_body(
        &mut self,
        is_end: impl Fn(&TokenKind) -> bool,
    ) -> Result<Vec<(String, Expr)>, ExprError> {
        let mut entries: Vec<(String, Expr)> = Vec::new();

        while !is_end(&self.peek().kind) {
            let key = self.property_key()?;
            self.expect(TokenKind::Colon, "':' after property name")?;
            let value = self.conditional()?;

            // duplicate keys keep their first position and take the last value
            match entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }

            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        Ok(entries)
    }

    fn property_key(&mut self) -> Result<String, ExprError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(s)
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(n.to_string())
            }
            TokenKind::Infinite => {
                self.advance();
                Ok("Infinity".to_string())
            }
            _ => Err(self.unexpected("property name")),
        }
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        self.enter()?;
        let test = self.logical_or()?;
        let result = if self.eat(&TokenKind::Question) {
            let consequent = self.conditional()?;
            self.expect(TokenKind::Colon, "':' in conditional expression")?;
            let alternate = self.conditional()?;
            Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            }
        } else {
            test
        };
        self.leave();
        Ok(result)
    }

    fn logical_or(&mut self) -> Result<Expr, ExprError> {
        let mut links = 0;
        let mut lhs = self.logical_and()?;
        while self.eat(&TokenKind::OrOr) {
            self.link(&mut links)?;
            let rhs = self.logical_and()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.unlink(links);
        Ok(lhs)
    }

    fn logical_and(&mut self) -> Result<Expr, ExprError> {
        let mut links = 0;
        let mut lhs = self.equality()?;
        while self.eat(&TokenKind::AndAnd) {
            self.link(&mut links)?;
            let rhs = self.equality()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.unlink(links);
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, ExprError> {
        let mut links = 0;
        let mut lhs = self.relational()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                TokenKind::EqEqEq => BinaryOp::StrictEq,
                TokenKind::NotEqEq => BinaryOp::StrictNotEq,
                _ => break,
            };
            self.advance();
            self.link(&mut links)?;
            let rhs = self.relational()?;
            lhs = binary(op, lhs, rhs);
        }
        self.unlink(links);
        Ok(lhs)
    }

    fn relational(&mut self) -> Result<Expr, ExprError> {
        let mut links = 0;
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            self.link(&mut links)?;
            let rhs = self.additive()?;
            lhs = binary(op, lhs, rhs);
        }
        self.unlink(links);
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut links = 0;
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.link(&mut links)?;
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        self.unlink(links);
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut links = 0;
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            self.link(&mut links)?;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
        self.unlink(links);
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.advance();
        self.enter()?;
        let operand = self.unary()?;
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut links = 0;
        let mut expr = self.primary()?;
        loop {
            let pos = self.peek().pos;
            if matches!(
                self.peek().kind,
                TokenKind::Dot | TokenKind::LBracket | TokenKind::LParen
            ) {
                self.link(&mut links)?;
            }
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let token = self.peek().clone();
                    let TokenKind::Ident(property) = token.kind else {
                        return Err(self.unexpected("property name after '.'"));
                    };
                    self.advance();
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        pos: token.pos,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.conditional()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        pos,
                    };
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    while self.peek().kind != TokenKind::RParen {
                        args.push(self.conditional()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen, "')' after arguments")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        pos,
                    };
                }
                _ => break,
            }
        }
        self.unlink(links);
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Number(n)))
            }
            // non-finite numbers have no JSON form, same as arithmetic overflow
            TokenKind::Infinite => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(match name.as_str() {
                    "true" => Expr::Literal(Value::Bool(true)),
                    "false" => Expr::Literal(Value::Bool(false)),
                    "null" => Expr::Literal(Value::Null),
                    "undefined" => Expr::Undefined,
                    _ => Expr::Ident {
                        name,
                        pos: token.pos,
                    },
                })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.conditional()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBrace => {
                self.advance();
                self.enter()?;
                let entries = self.object_body(|kind| matches!(kind, TokenKind::RBrace))?;
                self.leave();
                self.expect(TokenKind::RBrace, "'}' to close object literal")?;
                Ok(Expr::Object(entries))
            }
            TokenKind::LBracket => {
                self.advance();
                self.enter()?;
                let mut items = Vec::new();
                while self.peek().kind != TokenKind::RBracket {
                    items.push(self.conditional()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.leave();
                self.expect(TokenKind::RBracket, "']' to close array literal")?;
                Ok(Expr::Array(items))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
