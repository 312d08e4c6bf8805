use crate::ast::*;
use crate::lexer::Token;

#[derive(Debug, thiserror::Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub code: &'static str,
    pub span: Span,
    pub message: String,
}

type Result<T> = std::result::Result<T, ParseError>;

/// Binding power, weakest first. `a + b * c` parses as `a + (b * c)`
/// because Product binds tighter than Sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

fn infix_precedence(token: &Token) -> Precedence {
    match token {
        Token::Eq | Token::NotEq => Precedence::Equals,
        Token::Lt | Token::Gt => Precedence::LessGreater,
        Token::Plus | Token::Minus => Precedence::Sum,
        Token::Asterisk | Token::Slash => Precedence::Product,
        Token::LParen => Precedence::Call,
        Token::LBracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

/// Parse a token stream into a program, collecting every statement that
/// parses cleanly. Statements that fail are skipped up to the next `;`.
pub fn parse(tokens: Vec<(Token, Span)>) -> (Program, Vec<ParseError>) {
    let mut parser = Parser::new(tokens);
    let mut statements = Vec::new();
    let mut errors = Vec::new();

    while !parser.at_end() {
        match parser.parse_statement() {
            Ok(stmt) => statements.push(stmt),
            Err(e) => {
                errors.push(e);
                parser.synchronize();
            }
        }
    }

    (Program { statements }, errors)
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, Span)>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, span)) => *span,
            // At EOF, point just past the last token.
            None => {
                let end = self.tokens.last().map(|(_, s)| s.end).unwrap_or(0);
                Span { start: end, end }
            }
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.eat(expected) {
            return Ok(());
        }
        Err(self.error(
            "TARN-P002",
            match self.peek() {
                Some(tok) => format!("expected {:?}, got {:?}", expected, tok),
                None => format!("expected {:?}, got end of input", expected),
            },
        ))
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(name)
            }
            Some(tok) => Err(self.error("TARN-P002", format!("expected identifier, got {:?}", tok))),
            None => Err(self.error("TARN-P002", "expected identifier, got end of input".into())),
        }
    }

    fn error(&self, code: &'static str, message: String) -> ParseError {
        ParseError { code, span: self.peek_span(), message }
    }

    /// Skip to just past the next `;` so one bad statement doesn't
    /// cascade into errors for everything after it.
    fn synchronize(&mut self) {
        while let Some(tok) = self.advance() {
            if tok == Token::Semicolon {
                break;
            }
        }
    }

    // ---- Statements ----

    fn parse_statement(&mut self) -> Result<Stmt> {
        match self.peek() {
            Some(Token::Let) => self.parse_let_statement(),
            Some(Token::Return) => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Result<Stmt> {
        self.expect(&Token::Let)?;
        let name = self.expect_ident()?;
        self.expect(&Token::Assign)?;
        let mut value = self.parse_expression(Precedence::Lowest)?;
        // `let f = fn(...) {...}` names the literal after its binding so
        // the compiler can resolve recursive calls to it.
        if let Expr::Fn { name: fn_name @ None, .. } = &mut value {
            *fn_name = Some(name.clone());
        }
        self.eat(&Token::Semicolon);
        Ok(Stmt::Let { name, value })
    }

    fn parse_return_statement(&mut self) -> Result<Stmt> {
        self.expect(&Token::Return)?;
        let value = self.parse_expression(Precedence::Lowest)?;
        self.eat(&Token::Semicolon);
        Ok(Stmt::Return { value })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt> {
        let value = self.parse_expression(Precedence::Lowest)?;
        self.eat(&Token::Semicolon);
        Ok(Stmt::Expr { value })
    }

    fn parse_block(&mut self) -> Result<Block> {
        self.expect(&Token::LBrace)?;
        let mut statements = Vec::new();
        while !matches!(self.peek(), Some(Token::RBrace) | None) {
            statements.push(self.parse_statement()?);
        }
        self.expect(&Token::RBrace)?;
        Ok(Block { statements })
    }

    // ---- Expressions (Pratt) ----

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expr> {
        let mut left = self.parse_prefix()?;

        while !matches!(self.peek(), Some(Token::Semicolon) | None)
            && precedence < infix_precedence(self.peek().unwrap_or(&Token::Semicolon))
        {
            left = self.parse_infix(left)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.error("TARN-P001", "unexpected end of input".into()));
        };
        match tok {
            Token::Ident(name) => {
                self.pos += 1;
                Ok(Expr::Ident(name))
            }
            Token::Int(value) => {
                self.pos += 1;
                Ok(Expr::Int(value))
            }
            Token::Str(value) => {
                self.pos += 1;
                Ok(Expr::Str(value))
            }
            Token::True => {
                self.pos += 1;
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.pos += 1;
                Ok(Expr::Bool(false))
            }
            Token::Bang => {
                self.pos += 1;
                let right = self.parse_expression(Precedence::Prefix)?;
                Ok(Expr::Prefix { op: PrefixOp::Bang, right: Box::new(right) })
            }
            Token::Minus => {
                self.pos += 1;
                let right = self.parse_expression(Precedence::Prefix)?;
                Ok(Expr::Prefix { op: PrefixOp::Minus, right: Box::new(right) })
            }
            Token::LParen => {
                self.pos += 1;
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::If => self.parse_if_expression(),
            Token::Fn => self.parse_function_literal(),
            Token::LBracket => {
                self.pos += 1;
                let elements = self.parse_expression_list(&Token::RBracket)?;
                Ok(Expr::Array(elements))
            }
            Token::LBrace => self.parse_hash_literal(),
            other => Err(self.error(
                "TARN-P001",
                format!("no expression can start with {:?}", other),
            )),
        }
    }

    fn parse_infix(&mut self, left: Expr) -> Result<Expr> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.error("TARN-P001", "unexpected end of input".into()));
        };
        let op = match tok {
            Token::Plus => InfixOp::Add,
            Token::Minus => InfixOp::Sub,
            Token::Asterisk => InfixOp::Mul,
            Token::Slash => InfixOp::Div,
            Token::Eq => InfixOp::Eq,
            Token::NotEq => InfixOp::NotEq,
            Token::Lt => InfixOp::Lt,
            Token::Gt => InfixOp::Gt,
            Token::LParen => {
                self.pos += 1;
                let arguments = self.parse_expression_list(&Token::RParen)?;
                return Ok(Expr::Call { function: Box::new(left), arguments });
            }
            Token::LBracket => {
                self.pos += 1;
                let index = self.parse_expression(Precedence::Lowest)?;
                self.expect(&Token::RBracket)?;
                return Ok(Expr::Index { left: Box::new(left), index: Box::new(index) });
            }
            other => {
                return Err(self.error("TARN-P001", format!("{:?} is not an infix operator", other)))
            }
        };
        let precedence = infix_precedence(&tok);
        self.pos += 1;
        let right = self.parse_expression(precedence)?;
        Ok(Expr::Infix { op, left: Box::new(left), right: Box::new(right) })
    }

    fn parse_if_expression(&mut self) -> Result<Expr> {
        self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect(&Token::RParen)?;
        let consequence = self.parse_block()?;
        let alternative = if self.eat(&Token::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_function_literal(&mut self) -> Result<Expr> {
        self.expect(&Token::Fn)?;
        self.expect(&Token::LParen)?;
        let mut parameters = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                parameters.push(self.expect_ident()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RParen)?;
        }
        let body = self.parse_block()?;
        Ok(Expr::Fn { name: None, parameters, body })
    }

    fn parse_hash_literal(&mut self) -> Result<Expr> {
        self.expect(&Token::LBrace)?;
        let mut pairs = Vec::new();
        if !self.eat(&Token::RBrace) {
            loop {
                let key = self.parse_expression(Precedence::Lowest)?;
                self.expect(&Token::Colon)?;
                let value = self.parse_expression(Precedence::Lowest)?;
                pairs.push((key, value));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::RBrace)?;
        }
        Ok(Expr::Hash(pairs))
    }

    /// Comma-separated expressions up to (and consuming) `end`.
    fn parse_expression_list(&mut self, end: &Token) -> Result<Vec<Expr>> {
        let mut list = Vec::new();
        if self.eat(end) {
            return Ok(list);
        }
        loop {
            list.push(self.parse_expression(Precedence::Lowest)?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(end)?;
        Ok(list)
    }
}
