use crate::chain::condition::ConditionError;
use crate::chain::condition::ast::{BinaryOp, Expr, UnaryOp};
use crate::chain::condition::lexer::{Token, TokenKind, lex};

pub(crate) fn parse_condition(src: &str) -> Result<Expr, ConditionError> {
    let tokens = lex(src.trim())?;
    let mut p = Parser { tokens, pos: 0 };
    let expr = p.parse_or()?;
    p.expect(TokenKind::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ConditionError> {
        if self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(ConditionError::new(
                self.peek().offset,
                format!("expected {kind:?}, found {:?}", self.peek().kind),
            ))
        }
    }

    fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume the first of `ops` that matches the next token.
    fn consume_op(&mut self, ops: &[(TokenKind, BinaryOp)]) -> Option<BinaryOp> {
        let op = ops
            .iter()
            .find(|(kind, _)| self.peek().kind == *kind)
            .map(|(_, op)| *op)?;
        self.bump();
        Some(op)
    }

    fn binary_level(
        &mut self,
        ops: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ConditionError>,
    ) -> Result<Expr, ConditionError> {
        let mut e = next(self)?;
        while let Some(op) = self.consume_op(ops) {
            let r = next(self)?;
            e = Expr::Binary {
                op,
                left: Box::new(e),
                right: Box::new(r),
            };
        }
        Ok(e)
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        self.binary_level(&[(TokenKind::OrOr, BinaryOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        self.binary_level(&[(TokenKind::AndAnd, BinaryOp::And)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, ConditionError> {
        self.binary_level(
            &[(TokenKind::EqEq, BinaryOp::Eq), (TokenKind::Ne, BinaryOp::Ne)],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        self.binary_level(
            &[
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Le, BinaryOp::Le),
                (TokenKind::Gt, BinaryOp::Gt),
                (TokenKind::Ge, BinaryOp::Ge),
            ],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<Expr, ConditionError> {
        self.binary_level(
            &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<Expr, ConditionError> {
        self.binary_level(
            &[(TokenKind::Star, BinaryOp::Mul), (TokenKind::Slash, BinaryOp::Div)],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
        let op = if self.consume(TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.consume(TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.parse_postfix();
        };
        let e = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(e),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ConditionError> {
        let mut e = self.parse_primary()?;
        loop {
            if self.consume(TokenKind::Dot) {
                let t = self.bump();
                let (TokenKind::Ident(name), Expr::Path(mut path)) = (t.kind.clone(), e) else {
                    return Err(ConditionError::new(
                        t.offset,
                        format!("expected identifier after '.', found {:?}", t.kind),
                    ));
                };
                path.push(name);
                e = Expr::Path(path);
                continue;
            }

            let offset = self.peek().offset;
            if self.consume(TokenKind::LParen) {
                let func = match e {
                    Expr::Path(p) if p.len() == 1 => p.concat(),
                    _ => {
                        return Err(ConditionError::new(
                            offset,
                            "call target must be a single identifier",
                        ));
                    }
                };
                let args = self.parse_args()?;
                e = Expr::Call { func, args };
                continue;
            }

            return Ok(e);
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ConditionError> {
        let mut args = Vec::new();
        if self.consume(TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.consume(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        let t = self.bump();
        match t.kind {
            TokenKind::Number(v) => Ok(Expr::Num(v)),
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::Ident(s) => Ok(Expr::Path(vec![s])),
            TokenKind::LParen => {
                let e = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            other => Err(ConditionError::new(
                t.offset,
                format!("unexpected token {other:?}"),
            )),
        }
    }
}
