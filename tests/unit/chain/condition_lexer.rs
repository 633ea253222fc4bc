use super::*;

fn kinds(src: &str) -> Vec<TokenKind> {
    lex(src).unwrap().into_iter().map(|t| t.kind).collect()
}

#[test]
fn field_access_is_not_a_fraction() {
    assert_eq!(
        kinds("input.width*2 >= 1.5"),
        vec![
            TokenKind::Ident("input".to_owned()),
            TokenKind::Dot,
            TokenKind::Ident("width".to_owned()),
            TokenKind::Star,
            TokenKind::Number(2.0),
            TokenKind::Ge,
            TokenKind::Number(1.5),
            TokenKind::Eof,
        ]
    );
    assert_eq!(
        kinds("2.x"),
        vec![
            TokenKind::Number(2.0),
            TokenKind::Dot,
            TokenKind::Ident("x".to_owned()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn two_character_operators_win() {
    assert_eq!(
        kinds("!hdr && a != b || c<=d"),
        vec![
            TokenKind::Bang,
            TokenKind::Ident("hdr".to_owned()),
            TokenKind::AndAnd,
            TokenKind::Ident("a".to_owned()),
            TokenKind::Ne,
            TokenKind::Ident("b".to_owned()),
            TokenKind::OrOr,
            TokenKind::Ident("c".to_owned()),
            TokenKind::Le,
            TokenKind::Ident("d".to_owned()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn offsets_point_at_token_starts() {
    let tokens = lex("  true ||false").unwrap();
    let offsets: Vec<usize> = tokens.iter().map(|t| t.offset).collect();
    assert_eq!(offsets, vec![2, 7, 9, 14]);
}

#[test]
fn lone_ampersand_is_rejected() {
    let err = lex("a & b").unwrap_err();
    assert_eq!(err.offset, 2);
}
