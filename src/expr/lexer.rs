//! Tokenizer for binding declarations
//!
//! Single pass over `char_indices`, positions are byte offsets into the
//! declaration so errors can point at the offending character.

use serde_json::Number;

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(Number),
    /// Numeric literal beyond the f64 range
    Infinite,
    Str(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    Dot,
    Question,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    AndAnd,
    OrOr,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character
    pub pos: usize,
}

/// Split a declaration into tokens, always terminated by `Eof`
pub fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if is_ident_start(ch) {
            let mut ident = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if is_ident_continue(c) {
                    ident.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Ident(ident),
                pos,
            });
            continue;
        }

        if ch.is_ascii_digit() {
            let kind = lex_number(source, &mut chars, pos)?;
            tokens.push(Token { kind, pos });
            continue;
        }

        if ch == '"' || ch == '\'' {
            chars.next();
            let value = lex_string(&mut chars, ch, pos)?;
            tokens.push(Token {
                kind: TokenKind::Str(value),
                pos,
            });
            continue;
        }

        chars.next();
        let next = chars.peek().map(|&(_, c)| c);
        let kind = match ch {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '.' => {
                if next.is_some_and(|c| c.is_ascii_digit()) {
                    return Err(ExprError::new("numbers must start with a digit", pos));
                }
                TokenKind::Dot
            }
            '?' => TokenKind::Question,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '<' if next == Some('=') => {
                chars.next();
                TokenKind::Le
            }
            '<' => TokenKind::Lt,
            '>' if next == Some('=') => {
                chars.next();
                TokenKind::Ge
            }
            '>' => TokenKind::Gt,
            '=' if next == Some('=') => {
                chars.next();
                if chars.peek().map(|&(_, c)| c) == Some('=') {
                    chars.next();
                    TokenKind::EqEqEq
                } else {
                    TokenKind::EqEq
                }
            }
            '=' => {
                return Err(ExprError::new("assignment is not allowed in bindings", pos));
            }
            '!' if next == Some('=') => {
                chars.next();
                if chars.peek().map(|&(_, c)| c) == Some('=') {
                    chars.next();
                    TokenKind::NotEqEq
                } else {
                    TokenKind::NotEq
                }
            }
            '!' => TokenKind::Bang,
            '&' if next == Some('&') => {
                chars.next();
                TokenKind::AndAnd
            }
            '|' if next == Some('|') => {
                chars.next();
                TokenKind::OrOr
            }
            other => {
                return Err(ExprError::new(format!("unexpected character '{other}'"), pos));
            }
        };
        tokens.push(Token { kind, pos });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: source.len(),
    });
    Ok(tokens)
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

fn lex_number(
    source: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices>,
    start: usize,
) -> Result<TokenKind, ExprError> {
    let mut end = start;
    let mut is_float = false;
    let mut seen_exponent = false;

    while let Some(&(i, c)) = chars.peek() {
        if c.is_ascii_digit() {
            end = i + 1;
            chars.next();
        } else if c == '.' && !is_float && !seen_exponent {
            is_float = true;
            end = i + 1;
            chars.next();
        } else if (c == 'e' || c == 'E') && !seen_exponent {
            seen_exponent = true;
            is_float = true;
            end = i + 1;
            chars.next();
            if let Some(&(j, sign)) = chars.peek() {
                if sign == '+' || sign == '-' {
                    end = j + 1;
                    chars.next();
                }
            }
        } else {
            break;
        }
    }

    let text = &source[start..end];
    if !is_float {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(TokenKind::Number(Number::from(n)));
        }
    }
    let value = text
        .parse::<f64>()
        .map_err(|_| ExprError::new(format!("invalid number '{text}'"), start))?;
    Ok(Number::from_f64(value).map_or(TokenKind::Infinite, TokenKind::Number))
}

/// Four hex digits after `\u`
fn lex_hex4(
    chars: &mut std::iter::Peekable<std::str::CharIndices>,
    at: usize,
) -> Result<u32, ExprError> {
    let mut code = 0;
    for _ in 0..4 {
        match chars.next() {
            Some((_, h)) if h.is_ascii_hexdigit() => code = code * 16 + h.to_digit(16).unwrap_or(0),
            _ => return Err(ExprError::new("invalid \\u escape", at)),
        }
    }
    Ok(code)
}

fn lex_string(
    chars: &mut std::iter::Peekable<std::str::CharIndices>,
    quote: char,
    start: usize,
) -> Result<String, ExprError> {
    let mut value = String::new();

    while let Some((i, c)) = chars.next() {
        if c == quote {
            return Ok(value);
        }
        if c != '\\' {
            value.push(c);
            continue;
        }
        let Some((_, escaped)) = chars.next() else {
            break;
        };
        match escaped {
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            'b' => value.push('\u{8}'),
            'f' => value.push('\u{c}'),
            '0' => value.push('\0'),
            'u' => {
                let mut code = lex_hex4(chars, i)?;
                if (0xD800..0xDC00).contains(&code) {
                    // high surrogate: only valid as the first half of a pair
                    let low = match (chars.next(), chars.next()) {
                        (Some((_, '\\')), Some((_, 'u'))) => lex_hex4(chars, i)?,
                        _ => return Err(ExprError::new("unpaired surrogate in \\u escape", i)),
                    };
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(ExprError::new("unpaired surrogate in \\u escape", i));
                    }
                    code = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                }
                let ch = char::from_u32(code)
                    .ok_or_else(|| ExprError::new("unpaired surrogate in \\u escape", i))?;
                value.push(ch);
            }
            other => value.push(other),
        }
    }

    Err(ExprError::new("unterminated string literal", start))
}
