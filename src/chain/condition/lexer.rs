use std::iter::Peekable;
use std::str::CharIndices;

use crate::chain::condition::ConditionError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Flag, size field (`input`, `width`, ...) or function name.
    Ident(String),
    Number(f64),
    True,
    False,

    LParen,
    RParen,
    Comma,
    Dot,

    // Arithmetic over sizes, e.g. `input.width * 2 <= target.width`.
    Plus,
    Minus,
    Star,
    Slash,

    Bang,
    EqEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,

    Eof,
}

/// Two-character operators, checked before single characters.
const PAIRS: [(char, char, TokenKind); 6] = [
    ('&', '&', TokenKind::AndAnd),
    ('|', '|', TokenKind::OrOr),
    ('=', '=', TokenKind::EqEq),
    ('!', '=', TokenKind::Ne),
    ('<', '=', TokenKind::Le),
    ('>', '=', TokenKind::Ge),
];

fn single(c: char) -> Option<TokenKind> {
    Some(match c {
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        ',' => TokenKind::Comma,
        '.' => TokenKind::Dot,
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '*' => TokenKind::Star,
        '/' => TokenKind::Slash,
        '!' => TokenKind::Bang,
        '<' => TokenKind::Lt,
        '>' => TokenKind::Gt,
        _ => return None,
    })
}

struct Scanner<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |&(i, _)| i)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> usize {
        while self.chars.next_if(|&(_, c)| pred(c)).is_some() {}
        self.offset()
    }

    fn next_token(&mut self) -> Result<Option<Token>, ConditionError> {
        self.eat_while(char::is_whitespace);
        let Some((start, c)) = self.chars.next() else {
            return Ok(None);
        };

        let kind = if c.is_ascii_digit() {
            self.number(start)?
        } else if c.is_ascii_alphabetic() || c == '_' {
            let end = self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
            match &self.src[start..end] {
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                word => TokenKind::Ident(word.to_owned()),
            }
        } else if let Some(kind) = self.pair(c) {
            kind
        } else {
            single(c).ok_or_else(|| {
                ConditionError::new(start, format!("unexpected character '{c}'"))
            })?
        };
        Ok(Some(Token {
            kind,
            offset: start,
        }))
    }

    // Digits with an optional fraction; a dot not followed by a digit is left for field access.
    fn number(&mut self, start: usize) -> Result<TokenKind, ConditionError> {
        let mut end = self.eat_while(|c| c.is_ascii_digit());
        let mut ahead = self.chars.clone();
        if matches!(ahead.next(), Some((_, '.')))
            && matches!(ahead.peek(), Some((_, d)) if d.is_ascii_digit())
        {
            self.chars.next();
            end = self.eat_while(|c| c.is_ascii_digit());
        }
        self.src[start..end]
            .parse()
            .map(TokenKind::Number)
            .map_err(|_| ConditionError::new(start, "invalid number"))
    }

    fn pair(&mut self, first: char) -> Option<TokenKind> {
        let &(_, second) = self.chars.peek()?;
        let kind = PAIRS
            .iter()
            .find(|(a, b, _)| *a == first && *b == second)
            .map(|(_, _, kind)| kind.clone())?;
        self.chars.next();
        Some(kind)
    }
}

pub(crate) fn lex(input: &str) -> Result<Vec<Token>, ConditionError> {
    let mut scanner = Scanner::new(input);
    let mut out = Vec::new();
    while let Some(token) = scanner.next_token()? {
        out.push(token);
    }
    out.push(Token {
        kind: TokenKind::Eof,
        offset: input.len(),
    });
    Ok(out)
}

#[cfg(test)]
#[path = "../../../tests/unit/chain/condition_lexer.rs"]
mod tests;
