use crate::ast::{AttrValue, Attribute, NodeDescriptor, SourcePos, TemplateDescriptor, TemplateRole};
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenWithPos};

// ── Parser ────────────────────────────────────────────────────────────────

pub struct Parser {
    tokens: Vec<TokenWithPos>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<TokenWithPos>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current_pos(&self) -> SourcePos {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(TokenWithPos::pos)
            .unwrap_or(SourcePos::new(1, 1))
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|t| &t.token).unwrap_or(&Token::Eof)
    }

    /// Look at the token `offset` positions ahead of current without consuming.
    fn peek_ahead(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).map(|t| &t.token).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos)
            .map(|t| t.token.clone())
            .unwrap_or(Token::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError::new(msg, self.current_pos())
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(s) => { self.advance(); Ok(s) }
            tok => Err(self.err(format!("expected identifier, got {:?}", tok))),
        }
    }

    fn expect_token(&mut self, expected: &Token) -> Result<(), ParseError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {:?}, got {:?}", expected, self.peek())))
        }
    }

    // ── Document ──────────────────────────────────────────────────────────

    pub fn parse_document(&mut self) -> Result<NodeDescriptor, ParseError> {
        let root = self.parse_node()?;
        if self.peek() != &Token::Eof {
            return Err(self.err(format!("expected end of input after root node, got {:?}", self.peek())));
        }
        Ok(root)
    }

    // ── Node ──────────────────────────────────────────────────────────────

    /// `Type [as name] [{ ... }]`
    fn parse_named_node(&mut self) -> Result<(Option<String>, NodeDescriptor), ParseError> {
        let pos = self.current_pos();
        let type_name = self.expect_ident()?;

        let name = if self.peek() == &Token::As {
            self.advance();
            Some(self.expect_ident()?)
        } else {
            None
        };

        let mut node = NodeDescriptor::new(type_name).at(pos);
        if self.peek() == &Token::LBrace {
            self.parse_block(&mut node)?;
        }
        Ok((name, node))
    }

    fn parse_node(&mut self) -> Result<NodeDescriptor, ParseError> {
        match self.parse_named_node()? {
            (None, node) => Ok(node),
            (Some(_), _) => Err(self.err("the root node and template roots cannot be named")),
        }
    }

    // ── Block ─────────────────────────────────────────────────────────────

    /// Parse `{ item* }` where each item is an attribute, a template, or a
    /// child node.
    ///
    /// Disambiguation: when we see `Ident`, we look one token ahead:
    /// - `Ident ":"` → attribute
    /// - `Ident <anything else>` → child node
    fn parse_block(&mut self, node: &mut NodeDescriptor) -> Result<(), ParseError> {
        self.advance(); // consume `{`

        loop {
            match self.peek() {
                Token::RBrace => { self.advance(); break; }
                Token::Eof    => return Err(self.err("unclosed '{' block")),
                Token::Template => {
                    self.advance();
                    let root = self.parse_template_body()?;
                    node.templates.push(TemplateDescriptor { role: TemplateRole::Control, root });
                }
                Token::ItemTemplate => {
                    self.advance();
                    let data_type = if let Token::Str(s) = self.peek().clone() {
                        self.advance();
                        Some(s)
                    } else {
                        None
                    };
                    let fetch = self.parse_fetch()?;
                    let root = self.parse_template_body()?;
                    node.templates.push(TemplateDescriptor {
                        role: TemplateRole::Item { data_type, fetch },
                        root,
                    });
                }
                Token::Ident(_) => {
                    if self.peek_ahead(1) == &Token::Colon {
                        node.attributes.push(self.parse_attribute()?);
                    } else {
                        match self.parse_named_node()? {
                            (Some(name), child) => node.named_children.push((name, child)),
                            (None, child) => node.children.push(child),
                        }
                    }
                }
                tok => {
                    return Err(self.err(format!(
                        "unexpected {:?} inside block, expected an attribute (name: value), a template, or a node",
                        tok
                    )));
                }
            }
        }

        Ok(())
    }

    /// Optional `fetch member` clause of an item template.
    fn parse_fetch(&mut self) -> Result<Option<String>, ParseError> {
        if !matches!(self.peek(), Token::Ident(s) if s == "fetch") {
            return Ok(None);
        }
        self.advance();
        match self.peek().clone() {
            Token::Ident(s) | Token::Str(s) => { self.advance(); Ok(Some(s)) }
            tok => Err(self.err(format!("expected the member to fetch sub-items from, got {:?}", tok))),
        }
    }

    /// `{ Node }`: exactly one root node.
    fn parse_template_body(&mut self) -> Result<NodeDescriptor, ParseError> {
        self.expect_token(&Token::LBrace)?;
        let root = self.parse_node()?;
        self.expect_token(&Token::RBrace)?;
        Ok(root)
    }

    // ── Attribute ─────────────────────────────────────────────────────────

    fn parse_attribute(&mut self) -> Result<Attribute, ParseError> {
        let pos = self.current_pos();
        let name = self.expect_ident()?;
        self.advance(); // consume `:`
        let value = self.parse_value()?;
        Ok(Attribute { name, value, pos })
    }

    // ── Value ─────────────────────────────────────────────────────────────

    fn parse_value(&mut self) -> Result<AttrValue, ParseError> {
        match self.peek().clone() {
            Token::Str(s)
            | Token::Number(s)
            | Token::Color(s)
            | Token::Constant(s)
            | Token::Ident(s) => { self.advance(); Ok(AttrValue::Literal(s)) }
            Token::Binding(s) => { self.advance(); Ok(AttrValue::Binding(s)) }
            tok => Err(self.err(format!("expected a value, got {:?}", tok))),
        }
    }
}

// ── Public parse entry point ──────────────────────────────────────────────

/// Parse a `.mkml` source string into its root [`NodeDescriptor`].
pub fn parse_str(src: &str) -> Result<NodeDescriptor, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(tokens).parse_document()
}
