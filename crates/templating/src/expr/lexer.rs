// Expression tokenizer.
// Supports: decimal numbers, quoted strings, identifiers/keywords, arithmetic,
// comparison, brackets for indexing and list literals, dotted field access.

use core::str::FromStr;

use rust_decimal::Decimal;

use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(Decimal),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// A token plus the byte offset it starts at, for error messages.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            ',' => Some(Token::Comma),
            '.' => Some(Token::Dot),
            _ => None,
        };
        if let Some(token) = single {
            chars.next();
            tokens.push(Spanned { token, offset });
            continue;
        }

        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let followed_by_eq = matches!(chars.peek(), Some(&(_, '=')));
                if followed_by_eq {
                    chars.next();
                }
                let token = match (c, followed_by_eq) {
                    ('=', true) => Token::EqEq,
                    ('!', true) => Token::NotEq,
                    ('<', true) => Token::LtEq,
                    ('>', true) => Token::GtEq,
                    ('<', false) => Token::Lt,
                    ('>', false) => Token::Gt,
                    _ => {
                        return Err(ExpressionError::syntax(
                            offset,
                            format!("unexpected character [{c}]"),
                        ));
                    }
                };
                tokens.push(Spanned { token, offset });
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, ch)) if ch == quote => break,
                        Some((_, '\\')) => match chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, 't')) => s.push('\t'),
                            Some((_, ch)) => s.push(ch),
                            None => {
                                return Err(ExpressionError::syntax(
                                    offset,
                                    "unterminated string literal",
                                ));
                            }
                        },
                        Some((_, ch)) => s.push(ch),
                        None => {
                            return Err(ExpressionError::syntax(
                                offset,
                                "unterminated string literal",
                            ));
                        }
                    }
                }
                tokens.push(Spanned {
                    token: Token::Str(s),
                    offset,
                });
            }
            '0'..='9' => {
                let mut num = String::new();
                let mut seen_dot = false;
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() {
                        num.push(d);
                        chars.next();
                    } else if d == '.' && !seen_dot {
                        // Only a dot followed by a digit belongs to the number.
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        match lookahead.peek() {
                            Some(&(_, next)) if next.is_ascii_digit() => {
                                seen_dot = true;
                                num.push('.');
                                chars.next();
                            }
                            _ => break,
                        }
                    } else {
                        break;
                    }
                }
                let value = Decimal::from_str(&num).map_err(|_| {
                    ExpressionError::syntax(offset, format!("invalid number [{num}]"))
                })?;
                tokens.push(Spanned {
                    token: Token::Number(value),
                    offset,
                });
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned {
                    token: Token::Ident(ident),
                    offset,
                });
            }
            _ => {
                return Err(ExpressionError::syntax(
                    offset,
                    format!("unexpected character [{c}]"),
                ));
            }
        }
    }

    Ok(tokens)
}
