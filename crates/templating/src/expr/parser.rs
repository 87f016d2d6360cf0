// Expression parser - converts token streams into an AST.
// Precedence, lowest first: or, and, not, comparison/in, + -, * / %, unary -, postfix.

use crate::error::ExpressionError;
use crate::value::Value;

use super::lexer::{Spanned, Token, tokenize};

/// Maximum nesting of sub-expressions accepted by the parser.
pub const MAX_DEPTH: usize = 64;

/// Maximum expression source length in bytes.
pub const MAX_LENGTH: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    Field {
        target: Box<Expr>,
        name: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    List(Vec<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    // Logical, short-circuit
    And,
    Or,
}

/// Parse an expression string into an AST.
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    if source.len() > MAX_LENGTH {
        return Err(ExpressionError::TooLong {
            len: source.len(),
            limit: MAX_LENGTH,
        });
    }
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::syntax(0, "empty expression"));
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        end: source.len(),
    };
    let expr = parser.parse_or()?;
    if let Some(extra) = parser.peek_spanned() {
        return Err(ExpressionError::syntax(
            extra.offset,
            format!("unexpected {:?}", extra.token),
        ));
    }
    Ok(expr)
}

struct Parser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
    depth: usize,
    end: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_spanned(&self) -> Option<&'t Spanned> {
        self.tokens.get(self.pos)
    }

    fn offset(&self) -> usize {
        self.peek_spanned().map_or(self.end, |s| s.offset)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == keyword)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ExpressionError> {
        match self.peek() {
            Some(token) if *token == expected => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(ExpressionError::syntax(self.offset(), format!("expected {what}"))),
        }
    }

    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Each folded operator nests the tree one level deeper.
    fn fold(&mut self, folds: &mut usize) -> Result<(), ExpressionError> {
        self.enter()?;
        *folds += 1;
        Ok(())
    }

    fn unwind(&mut self, folds: usize) {
        self.depth -= folds;
    }

    // Lowest precedence: or
    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        self.enter()?;
        let mut folds = 0;
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            self.fold(&mut folds)?;
            let right = self.parse_and()?;
            left = binary(Op::Or, left, right);
        }
        self.unwind(folds);
        self.leave();
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut folds = 0;
        let mut left = self.parse_not()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            self.fold(&mut folds)?;
            let right = self.parse_not()?;
            left = binary(Op::And, left, right);
        }
        self.unwind(folds);
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek_keyword("not") {
            self.pos += 1;
            self.enter()?;
            let operand = self.parse_not()?;
            self.leave();
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let mut folds = 0;
        let mut left = self.parse_add_sub()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => Op::Eq,
                Some(Token::NotEq) => Op::NotEq,
                Some(Token::Lt) => Op::Lt,
                Some(Token::LtEq) => Op::LtEq,
                Some(Token::Gt) => Op::Gt,
                Some(Token::GtEq) => Op::GtEq,
                Some(Token::Ident(name)) if name == "in" => Op::In,
                _ => break,
            };
            self.pos += 1;
            self.fold(&mut folds)?;
            let right = self.parse_add_sub()?;
            left = binary(op, left, right);
        }
        self.unwind(folds);
        Ok(left)
    }

    fn parse_add_sub(&mut self) -> Result<Expr, ExpressionError> {
        let mut folds = 0;
        let mut left = self.parse_mul_div()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => Op::Add,
                Some(Token::Minus) => Op::Sub,
                _ => break,
            };
            self.pos += 1;
            self.fold(&mut folds)?;
            let right = self.parse_mul_div()?;
            left = binary(op, left, right);
        }
        self.unwind(folds);
        Ok(left)
    }

    fn parse_mul_div(&mut self) -> Result<Expr, ExpressionError> {
        let mut folds = 0;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => Op::Mul,
                Some(Token::Slash) => Op::Div,
                Some(Token::Percent) => Op::Rem,
                _ => break,
            };
            self.pos += 1;
            self.fold(&mut folds)?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        self.unwind(folds);
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                self.enter()?;
                let operand = self.parse_unary()?;
                self.leave();
                Ok(Expr::Neg(Box::new(operand)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.enter()?;
                let operand = self.parse_unary()?;
                self.leave();
                Ok(operand)
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut folds = 0;
        let mut expr = self.parse_primary()?;
        loop {
            if matches!(
                self.peek(),
                Some(Token::Dot | Token::LBracket | Token::LParen)
            ) {
                self.fold(&mut folds)?;
            }
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Ident(name)) => {
                            expr = Expr::Field {
                                target: Box::new(expr),
                                name: name.clone(),
                            };
                        }
                        _ => {
                            return Err(ExpressionError::syntax(
                                self.offset(),
                                "expected field name after '.'",
                            ));
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_or()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::LParen) => {
                    let Expr::Name(name) = expr else {
                        return Err(ExpressionError::syntax(
                            self.offset(),
                            "only named functions can be called",
                        ));
                    };
                    self.pos += 1;
                    let args = self.parse_sequence(Token::RParen, "')'")?;
                    expr = Expr::Call { name, args };
                }
                _ => break,
            }
        }
        self.unwind(folds);
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::Number(*n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Text(s.clone()))),
            Some(Token::Ident(name)) => Ok(match name.as_str() {
                "true" | "True" => Expr::Literal(Value::Bool(true)),
                "false" | "False" => Expr::Literal(Value::Bool(false)),
                "none" | "None" => Expr::Literal(Value::None),
                _ => Expr::Name(name.clone()),
            }),
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(Token::RParen, "closing parenthesis")?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                self.enter()?;
                let items = self.parse_sequence(Token::RBracket, "']'")?;
                self.leave();
                Ok(Expr::List(items))
            }
            Some(token) => Err(ExpressionError::syntax(
                offset,
                format!("unexpected {token:?}"),
            )),
            None => Err(ExpressionError::syntax(offset, "unexpected end of expression")),
        }
    }

    /// Comma separated expressions up to `close`; a trailing comma is allowed.
    fn parse_sequence(&mut self, close: Token, what: &str) -> Result<Vec<Expr>, ExpressionError> {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.parse_or()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.pos += 1;
                }
                Some(token) if *token == close => {}
                _ => return Err(ExpressionError::syntax(self.offset(), format!("expected {what}"))),
            }
        }
    }
}

fn binary(op: Op, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("c + 5 * 2").unwrap();
        assert_eq!(
            expr,
            binary(
                Op::Add,
                Expr::Name("c".into()),
                binary(
                    Op::Mul,
                    Expr::Literal(Value::Number(dec!(5))),
                    Expr::Literal(Value::Number(dec!(2)))
                )
            )
        );
    }

    #[test]
    fn postfix_chain_parses_left_to_right() {
        let expr = parse("owner['address'][0]").unwrap();
        match expr {
            Expr::Index { target, .. } => assert!(matches!(*target, Expr::Index { .. })),
            other => panic!("Expected index, got {other:?}"),
        }
    }

    #[test]
    fn calls_require_a_plain_name() {
        assert!(parse("cformat(amount_net_)").is_ok());
        assert!(matches!(
            parse("date.strftime('%Y')"),
            Err(ExpressionError::Syntax { .. })
        ));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        assert!(matches!(parse("a b"), Err(ExpressionError::Syntax { offset: 2, .. })));
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let source = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(parse(&source), Err(ExpressionError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        assert!(parse(&format!("1{}", "+1".repeat(MAX_DEPTH - 2))).is_ok());
        for source in [
            format!("1{}", "+1".repeat(2000)),
            format!("1{}", "*1".repeat(2000)),
            format!("a{}", " or a".repeat(700)),
            format!("a{}", "[0]".repeat(1300)),
            format!("a{}", ".b".repeat(1300)),
        ] {
            assert_eq!(parse(&source), Err(ExpressionError::TooDeep(MAX_DEPTH)));
        }
    }

    #[test]
    fn overly_long_source_is_rejected() {
        let source = "1+".repeat(MAX_LENGTH);
        assert!(matches!(parse(&source), Err(ExpressionError::TooLong { .. })));
    }
}
