use crate::ast::SourcePos;
use crate::error::ParseError;

// ── Token ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Ident(String),
    Str(String),
    /// Numeric literal, kept as written so the compiler can convert it to the
    /// member's own numeric type without a lossy round trip through `f32`.
    Number(String),
    /// Color literal, kept as written including the leading `#`.
    Color(String),
    /// Raw text of a `{ ... }` value that directly follows a `:`.
    Binding(String),
    /// Styling constant reference, kept as written: `${accent}`.
    Constant(String),
    // Punctuation
    Colon,
    LBrace,
    RBrace,
    // Keywords
    As,
    Template,
    ItemTemplate,
    // Sentinel
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenWithPos {
    pub token: Token,
    pub line: usize,
    pub col: usize,
}

impl TokenWithPos {
    pub fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.col)
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────

pub struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    col: usize,
    /// Binding braces are only recognised in value position.
    after_colon: bool,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self { src, pos: 0, line: 1, col: 1, after_colon: false }
    }

    pub fn tokenize(mut self) -> Result<Vec<TokenWithPos>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let (line, col) = (self.line, self.col);
            let token = self.next_token()?;
            self.after_colon = token == Token::Colon;
            let eof = token == Token::Eof;
            tokens.push(TokenWithPos { token, line, col });
            if eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn here(&self) -> SourcePos {
        SourcePos::new(self.line, self.col)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.src[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            // skip `//` line comments
            if self.src[self.pos..].starts_with("//") {
                while !matches!(self.peek(), None | Some('\n')) {
                    self.advance();
                }
            // skip `/* */` block comments
            } else if self.src[self.pos..].starts_with("/*") {
                self.advance(); self.advance();
                loop {
                    if self.src[self.pos..].starts_with("*/") {
                        self.advance(); self.advance();
                        break;
                    }
                    if self.advance().is_none() {
                        break; // unterminated; EOF will surface on next token
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        let ch = match self.peek() {
            None => return Ok(Token::Eof),
            Some(c) => c,
        };

        match ch {
            ':' => { self.advance(); Ok(Token::Colon) }
            '{' if self.after_colon => self.lex_binding(),
            '$' if self.after_colon => self.lex_constant(),
            '{' => { self.advance(); Ok(Token::LBrace) }
            '}' => { self.advance(); Ok(Token::RBrace) }
            '"' => self.lex_string(),
            '#' => self.lex_color(),
            c if c.is_ascii_digit() || c == '-' => self.lex_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.lex_ident_or_keyword()),
            other => Err(ParseError::new(format!("unexpected character {:?}", other), self.here())),
        }
    }

    /// Collect everything up to the matching `}`. Nested braces are balanced
    /// and single-quoted runs are copied verbatim, so handler bodies such as
    /// `{ title.text = '}'; flag = true }` survive intact.
    fn lex_binding(&mut self) -> Result<Token, ParseError> {
        let open = self.here();
        self.advance(); // consume `{`
        let start = self.pos;
        let mut depth = 0usize;
        let mut in_quote = false;
        loop {
            let end = self.pos;
            match self.advance() {
                None => return Err(ParseError::new("unterminated binding expression", open)),
                Some('\'') => in_quote = !in_quote,
                Some('{') if !in_quote => depth += 1,
                Some('}') if !in_quote => {
                    if depth == 0 {
                        return Ok(Token::Binding(self.src[start..end].trim().to_string()));
                    }
                    depth -= 1;
                }
                Some(_) => {}
            }
        }
    }

    fn lex_constant(&mut self) -> Result<Token, ParseError> {
        let open = self.here();
        let start = self.pos;
        self.advance(); // consume `$`
        if self.advance() != Some('{') {
            return Err(ParseError::new("expected `{` after `$`", open));
        }
        let mut empty = true;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-' || c == '.') {
            self.advance();
            empty = false;
        }
        if empty || self.advance() != Some('}') {
            return Err(ParseError::new("malformed constant reference, expected `${name}`", open));
        }
        Ok(Token::Constant(self.src[start..self.pos].to_string()))
    }

    fn lex_string(&mut self) -> Result<Token, ParseError> {
        let open = self.here();
        self.advance(); // consume opening `"`
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(ParseError::new("unterminated string literal", open)),
                Some('"') => break,
                Some('\\') => {
                    match self.advance() {
                        Some('n')  => s.push('\n'),
                        Some('t')  => s.push('\t'),
                        Some('"')  => s.push('"'),
                        Some('\\') => s.push('\\'),
                        Some(c)    => s.push(c),
                        None => return Err(ParseError::new("unterminated escape sequence", open)),
                    }
                }
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(s))
    }

    fn lex_color(&mut self) -> Result<Token, ParseError> {
        let open = self.here();
        let start = self.pos;
        self.advance(); // consume `#`
        let mut count = 0;
        while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
            self.advance();
            count += 1;
        }
        if count != 6 && count != 8 {
            return Err(ParseError::new(
                format!("color literal must be #rrggbb or #rrggbbaa, got {} digits", count),
                open,
            ));
        }
        Ok(Token::Color(self.src[start..self.pos].to_string()))
    }

    fn lex_number(&mut self) -> Result<Token, ParseError> {
        let open = self.here();
        let start = self.pos;
        if self.peek() == Some('-') {
            self.advance();
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let s = &self.src[start..self.pos];
        if self.pos == digits_start || s.ends_with('.') {
            return Err(ParseError::new(format!("invalid number {:?}", s), open));
        }
        Ok(Token::Number(s.to_string()))
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let word = &self.src[start..self.pos];
        match word {
            "as"            => Token::As,
            "template"      => Token::Template,
            "item_template" => Token::ItemTemplate,
            _               => Token::Ident(word.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn binding_only_after_colon() {
        assert_eq!(
            kinds("Text { text: {../title} }"),
            vec![
                Token::Ident("Text".into()),
                Token::LBrace,
                Token::Ident("text".into()),
                Token::Colon,
                Token::Binding("../title".into()),
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn binding_keeps_nested_braces_and_quotes() {
        let toks = kinds("Button { on_click: { a = {b}; c = '}' } }");
        assert_eq!(toks[4], Token::Binding("a = {b}; c = '}'".into()));
    }

    #[test]
    fn tracks_lines_and_columns() {
        let toks = Lexer::new("Column {\n  gap: 8\n}").tokenize().unwrap();
        let gap = toks.iter().find(|t| t.token == Token::Ident("gap".into())).unwrap();
        assert_eq!((gap.line, gap.col), (2, 3));
    }

    #[test]
    fn number_keeps_lexeme() {
        assert_eq!(kinds("-0.250")[0], Token::Number("-0.250".into()));
    }

    #[test]
    fn unterminated_binding_reports_opening_brace() {
        let err = Lexer::new("Text {\n text: {oops").tokenize().unwrap_err();
        assert_eq!((err.line, err.col), (2, 8));
    }
}
