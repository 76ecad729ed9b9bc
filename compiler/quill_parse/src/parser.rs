//! Recursive-descent parser over the token list.

use quill_ir::{
    BinaryOp, Domain, Expr, ExprKind, ImportBinding, Param, Program, Span, Stmt, StmtKind,
    UnaryOp,
};
use quill_stack::ensure_sufficient_stack;

use crate::lexer::{Token, TokenKind};
use crate::ParseError;

type PResult<T> = Result<T, ParseError>;

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    // === Token cursor ===

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len().saturating_sub(1));
        self.tokens.get(idx).map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(Span::DUMMY, |t| t.span)
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(Span::DUMMY, |t| t.span)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens.get(self.pos).cloned().unwrap_or(Token {
            kind: TokenKind::Eof,
            span: self.current_span(),
        });
        if self.pos < self.tokens.len().saturating_sub(1) {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, context: &str) -> PResult<Span> {
        if self.check(kind) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(&format!("{} {context}", kind.describe())))
        }
    }

    fn expect_ident(&mut self, context: &str) -> PResult<(String, Span)> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                let span = self.advance().span;
                Ok((name, span))
            }
            _ => Err(self.unexpected(&format!("identifier {context}"))),
        }
    }

    #[cold]
    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::new(
            format!("expected {expected}, found {}", self.peek().describe()),
            self.current_span(),
        )
    }

    fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof | TokenKind::RBrace
        )
    }

    // === Statements ===

    pub(crate) fn parse_program(&mut self) -> PResult<Program> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            if self.check(&TokenKind::Eof) {
                break;
            }
            statements.push(self.parse_statement(true)?);
            if !matches!(
                self.peek(),
                TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
            ) {
                return Err(self.unexpected("newline or `;` after statement"));
            }
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self, top_level: bool) -> PResult<Stmt> {
        let start = self.current_span();
        match self.peek() {
            TokenKind::Import if top_level => self.parse_import(),
            TokenKind::Import => Err(ParseError::new(
                "imports are only allowed at the top level of a module",
                start,
            )),
            TokenKind::Export if top_level => {
                self.advance();
                if !self.at_binding() {
                    return Err(self.unexpected("binding after `export`"));
                }
                self.parse_binding(true, start)
            }
            TokenKind::Export => Err(ParseError::new(
                "`export` is only allowed at the top level of a module",
                start,
            )),
            _ if self.at_binding() => self.parse_binding(false, start),
            _ => {
                let expr = self.parse_expr()?;
                let span = expr.span;
                Ok(Stmt {
                    kind: StmtKind::Expr(expr),
                    span,
                })
            }
        }
    }

    fn parse_import(&mut self) -> PResult<Stmt> {
        let start = self.advance().span;
        let path = match self.peek().clone() {
            TokenKind::Str(path) => {
                self.advance();
                path
            }
            _ => return Err(self.unexpected("import path string")),
        };
        let binding = if self.eat(&TokenKind::As) {
            let (name, _) = self.expect_ident("after `as`")?;
            ImportBinding::Named(name)
        } else {
            ImportBinding::Flat
        };
        Ok(Stmt {
            kind: StmtKind::Import { path, binding },
            span: start.merge(self.previous_span()),
        })
    }

    /// `name =` or `name(params) =` ahead.
    fn at_binding(&self) -> bool {
        if !matches!(self.peek(), TokenKind::Ident(_)) {
            return false;
        }
        match self.peek_at(1) {
            TokenKind::Eq => true,
            TokenKind::LParen => {
                let mut depth = 0usize;
                let mut offset = 1;
                loop {
                    match self.peek_at(offset) {
                        TokenKind::LParen => depth += 1,
                        TokenKind::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.peek_at(offset + 1) == &TokenKind::Eq;
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                    offset += 1;
                }
            }
            _ => false,
        }
    }

    fn parse_binding(&mut self, exported: bool, start: Span) -> PResult<Stmt> {
        let (name, _) = self.expect_ident("for binding name")?;
        let params = if self.eat(&TokenKind::LParen) {
            Some(self.parse_params(&TokenKind::RParen)?)
        } else {
            None
        };
        self.expect(&TokenKind::Eq, "in binding")?;
        self.skip_newlines();
        let mut value = self.parse_expr()?;
        if let Some(params) = params {
            let span = start.merge(value.span);
            value = Expr::new(
                ExprKind::Lambda {
                    name: Some(name.clone()),
                    params,
                    body: Box::new(value),
                },
                span,
            );
        } else if let ExprKind::Lambda { name: slot @ None, .. } = &mut value.kind {
            *slot = Some(name.clone());
        }
        let span = start.merge(value.span);
        Ok(Stmt {
            kind: StmtKind::Let {
                name,
                exported,
                value,
            },
            span,
        })
    }

    /// Parameters up to and including `close`.
    fn parse_params(&mut self, close: &TokenKind) -> PResult<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        self.skip_newlines();
        while !self.check(close) {
            let (name, span) = self.expect_ident("for parameter")?;
            if params.iter().any(|p| p.name == name) {
                return Err(ParseError::new(
                    format!("duplicate parameter `{name}`"),
                    span,
                ));
            }
            let domain = if self.eat(&TokenKind::Colon) {
                Some(self.parse_domain()?)
            } else {
                None
            };
            params.push(Param {
                name,
                domain,
                span: span.merge(self.previous_span()),
            });
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.expect(close, "to close parameter list")?;
        Ok(params)
    }

    fn parse_domain(&mut self) -> PResult<Domain> {
        let start = self.expect(&TokenKind::LBracket, "to open a domain range")?;
        let min = self.parse_signed_number()?;
        self.expect(&TokenKind::Comma, "in domain range")?;
        let max = self.parse_signed_number()?;
        let end = self.expect(&TokenKind::RBracket, "to close a domain range")?;
        if min > max {
            return Err(ParseError::new(
                format!("empty domain: lower bound {min} exceeds upper bound {max}"),
                start.merge(end),
            ));
        }
        Ok(Domain::Range { min, max })
    }

    fn parse_signed_number(&mut self) -> PResult<f64> {
        let negative = self.eat(&TokenKind::Minus);
        match *self.peek() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(if negative { -n } else { n })
            }
            _ => Err(self.unexpected("number")),
        }
    }

    // === Expressions ===

    /// Every nested expression comes through here or `parse_unary`, so
    /// both grow the stack on demand.
    fn parse_expr(&mut self) -> PResult<Expr> {
        ensure_sufficient_stack(|| self.parse_expr_inner())
    }

    fn parse_expr_inner(&mut self) -> PResult<Expr> {
        if self.check(&TokenKind::If) {
            return self.parse_if();
        }
        self.parse_binary(1)
    }

    fn parse_if(&mut self) -> PResult<Expr> {
        let start = self.advance().span;
        let condition = self.parse_expr()?;
        self.skip_newlines();
        self.expect(&TokenKind::Then, "after `if` condition")?;
        self.skip_newlines();
        let then_branch = self.parse_expr()?;
        self.skip_newlines();
        self.expect(&TokenKind::Else, "after `then` branch")?;
        self.skip_newlines();
        let else_branch = self.parse_expr()?;
        let span = start.merge(else_branch.span);
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            span,
        ))
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        Some(match self.peek() {
            TokenKind::PipePipe => BinaryOp::Or,
            TokenKind::AmpAmp => BinaryOp::And,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::GtEq,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            _ => return None,
        })
    }

    /// Precedence climbing for left-associative operators.
    fn parse_binary(&mut self, min_precedence: u8) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.binary_op() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            self.skip_newlines();
            let right = self.parse_binary(precedence + 1)?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        ensure_sufficient_stack(|| self.parse_unary_inner())
    }

    fn parse_unary_inner(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_power(),
        };
        let start = self.advance().span;
        let operand = self.parse_unary()?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `^` is right-associative and binds tighter than unary minus.
    fn parse_power(&mut self) -> PResult<Expr> {
        let base = self.parse_postfix()?;
        if !self.eat(&TokenKind::Caret) {
            return Ok(base);
        }
        let exponent = self.parse_unary()?;
        let span = base.span.merge(exponent.span);
        Ok(Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_comma_list(&TokenKind::RParen, "in argument list")?;
                    let span = expr.span.merge(self.previous_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let (field, field_span) = self.expect_ident("after `.`")?;
                    let span = expr.span.merge(field_span);
                    expr = Expr::new(
                        ExprKind::Field {
                            object: Box::new(expr),
                            field,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expr()?;
                    self.skip_newlines();
                    let end = self.expect(&TokenKind::RBracket, "to close index")?;
                    let span = expr.span.merge(end);
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_comma_list(&mut self, close: &TokenKind, context: &str) -> PResult<Vec<Expr>> {
        let mut items = Vec::new();
        self.skip_newlines();
        while !self.check(close) {
            items.push(self.parse_expr()?);
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        self.expect(close, context)?;
        Ok(items)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let span = self.current_span();
        let kind = match self.peek().clone() {
            TokenKind::Number(n) => {
                self.advance();
                ExprKind::Number(n)
            }
            TokenKind::Str(s) => {
                self.advance();
                ExprKind::Str(s)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Ident(name) => {
                self.advance();
                ExprKind::Ident(name)
            }
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                let end = self.expect(&TokenKind::RParen, "to close parenthesis")?;
                return Ok(Expr::new(inner.kind, span.merge(end)));
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.parse_comma_list(&TokenKind::RBracket, "to close list")?;
                ExprKind::List(items)
            }
            TokenKind::LBrace => return self.parse_brace(),
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr::new(kind, span.merge(self.previous_span())))
    }

    /// `{` starts a lambda, a dict, or a block depending on what follows.
    fn parse_brace(&mut self) -> PResult<Expr> {
        let start = self.advance().span;
        self.skip_newlines();

        if self.check(&TokenKind::PipePipe) {
            // `{|| body}`: zero-parameter lambda lexed as one `||` token.
            self.advance();
            let body = self.parse_block_body()?;
            return Ok(self.finish_lambda(start, Vec::new(), body));
        }
        if self.eat(&TokenKind::Pipe) {
            let params = self.parse_params(&TokenKind::Pipe)?;
            let body = self.parse_block_body()?;
            return Ok(self.finish_lambda(start, params, body));
        }
        if self.eat(&TokenKind::RBrace) {
            return Ok(Expr::new(ExprKind::Dict(Vec::new()), start.merge(self.previous_span())));
        }
        let is_dict = matches!(self.peek(), TokenKind::Ident(_) | TokenKind::Str(_))
            && self.peek_at(1) == &TokenKind::Colon;
        if is_dict {
            return self.parse_dict(start);
        }
        let body = self.parse_block_body()?;
        Ok(Expr::new(body.kind, start.merge(self.previous_span())))
    }

    fn finish_lambda(&self, start: Span, params: Vec<Param>, body: Expr) -> Expr {
        Expr::new(
            ExprKind::Lambda {
                name: None,
                params,
                body: Box::new(body),
            },
            start.merge(self.previous_span()),
        )
    }

    fn parse_dict(&mut self, start: Span) -> PResult<Expr> {
        let mut entries: Vec<(String, Expr)> = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key_span = self.current_span();
            let key = match self.advance().kind {
                TokenKind::Ident(k) | TokenKind::Str(k) => k,
                _ => return Err(ParseError::new("expected dict key", key_span)),
            };
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(ParseError::new(format!("duplicate dict key `{key}`"), key_span));
            }
            self.expect(&TokenKind::Colon, "after dict key")?;
            self.skip_newlines();
            let value = self.parse_expr()?;
            entries.push((key, value));
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_newlines();
        }
        let end = self.expect(&TokenKind::RBrace, "to close dict")?;
        Ok(Expr::new(ExprKind::Dict(entries), start.merge(end)))
    }

    /// Statements up to `}`; the last one must be an expression.
    fn parse_block_body(&mut self) -> PResult<Expr> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            if self.check(&TokenKind::RBrace) {
                break;
            }
            statements.push(self.parse_statement(false)?);
            if !self.at_statement_end() {
                return Err(self.unexpected("newline, `;` or `}` after statement"));
            }
        }
        let end = self.expect(&TokenKind::RBrace, "to close block")?;
        let result = match statements.pop() {
            Some(Stmt {
                kind: StmtKind::Expr(expr),
                ..
            }) => expr,
            Some(stmt) => {
                return Err(ParseError::new(
                    "block must end with an expression",
                    stmt.span,
                ))
            }
            None => return Err(ParseError::new("empty block", end)),
        };
        if statements.is_empty() {
            return Ok(result);
        }
        let span = statements
            .first()
            .map_or(result.span, |s| s.span.merge(result.span));
        Ok(Expr::new(
            ExprKind::Block {
                statements,
                result: Box::new(result),
            },
            span,
        ))
    }
}
