use logos::Logos;

use crate::ast::Span;

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    // Keywords
    #[token("let")]
    Let,
    #[token("fn")]
    Fn,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("return")]
    Return,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Two-char operators before their one-char prefixes
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,

    // One-char operators
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Asterisk,
    #[token("/")]
    Slash,
    #[token("!")]
    Bang,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // Punctuation
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r#""[^"\n]*""#, |lex| {
        let s = lex.slice();
        Some(s[1..s.len() - 1].to_string())
    })]
    Str(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

#[derive(Debug, thiserror::Error)]
#[error("lex error at byte {position}: unexpected input '{snippet}'")]
pub struct LexError {
    pub code: &'static str,
    pub position: usize,
    pub snippet: String,
}

/// Lex source code into tokens with their byte spans.
pub fn lex(source: &str) -> Result<Vec<(Token, Span)>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, Span { start: span.start, end: span.end })),
            Err(()) => {
                let bad = &source[span.clone()];
                let code = if bad.starts_with('"') {
                    "TARN-L002" // string ran into end of line or file
                } else {
                    "TARN-L001"
                };
                return Err(LexError {
                    code,
                    position: span.start,
                    snippet: bad.to_string(),
                });
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn lex_let_statement() {
        assert_eq!(
            kinds("let five = 5;"),
            vec![
                Token::Let,
                Token::Ident("five".to_string()),
                Token::Assign,
                Token::Int(5),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn lex_operators() {
        assert_eq!(
            kinds("== != = + - * / ! < >"),
            vec![
                Token::Eq,
                Token::NotEq,
                Token::Assign,
                Token::Plus,
                Token::Minus,
                Token::Asterisk,
                Token::Slash,
                Token::Bang,
                Token::Lt,
                Token::Gt,
            ]
        );
    }

    #[test]
    fn lex_punctuation() {
        assert_eq!(
            kinds(",;:(){}[]"),
            vec![
                Token::Comma,
                Token::Semicolon,
                Token::Colon,
                Token::LParen,
                Token::RParen,
                Token::LBrace,
                Token::RBrace,
                Token::LBracket,
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn lex_keywords_vs_idents() {
        assert_eq!(
            kinds("fn let if else return true false foobar"),
            vec![
                Token::Fn,
                Token::Let,
                Token::If,
                Token::Else,
                Token::Return,
                Token::True,
                Token::False,
                Token::Ident("foobar".to_string()),
            ]
        );
    }

    #[test]
    fn lex_string_literal() {
        assert_eq!(
            kinds(r#""hello world""#),
            vec![Token::Str("hello world".to_string())]
        );
    }

    #[test]
    fn lex_empty_string_literal() {
        assert_eq!(kinds(r#""""#), vec![Token::Str(String::new())]);
    }

    #[test]
    fn lex_comment_skipped() {
        assert_eq!(
            kinds("let x = 1; // trailing comment\nx"),
            vec![
                Token::Let,
                Token::Ident("x".to_string()),
                Token::Assign,
                Token::Int(1),
                Token::Semicolon,
                Token::Ident("x".to_string()),
            ]
        );
    }

    #[test]
    fn lex_function_literal() {
        let toks = kinds("fn(x, y) { x + y; }");
        assert_eq!(toks[0], Token::Fn);
        assert_eq!(toks[5], Token::LBrace);
        assert_eq!(toks.last(), Some(&Token::RBrace));
    }

    #[test]
    fn spans_track_byte_offsets() {
        let tokens = lex("let ab = 12;").unwrap();
        let (tok, span) = &tokens[1];
        assert_eq!(*tok, Token::Ident("ab".to_string()));
        assert_eq!((span.start, span.end), (4, 6));
    }

    #[test]
    fn lex_error_on_unexpected_char() {
        let err = lex("let x = 5 @").unwrap_err();
        assert_eq!(err.code, "TARN-L001");
        assert_eq!(err.position, 10);
        assert_eq!(err.snippet, "@");
    }
}
