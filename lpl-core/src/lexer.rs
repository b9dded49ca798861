//! Lexer for LPL sources.
//!
//! Turns one source file's text into a flat token sequence. Comments
//! start with `#` and run to the end of the line; `//` cannot open a
//! comment because it is the integer division operator.

use crate::error::{CoreError, Location};
use crate::span::Span;

/// Kind of a token produced by the lexer.
///
/// Literal kinds carry their decoded payload so later stages never
/// re-read the source text. `true`, `false` and `null` are not
/// keywords; they resolve through the built-in environment like any
/// other identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Entrypoint,
    Public,
    Link,
    Using,
    As,
    Proc,
    Const,
    Var,
    If,
    Else,
    While,
    Break,
    Continue,
    Return,

    // Punctuation
    LBrace,      // {
    RBrace,      // }
    LParen,      // (
    RParen,      // )
    Semi,        // ;
    Dot,         // .
    Comma,       // ,
    Colon,       // :
    DoubleColon, // ::
    Tilde,       // ~
    Bang,        // !
    BangEq,      // !=
    Equal,       // =
    EqEq,        // ==
    EqEqEq,      // ===
    Lt,          // <
    LtEq,        // <=
    Shl,         // <<
    ShlEq,       // <<=
    Gt,          // >
    GtEq,        // >=
    Shr,         // >>
    ShrEq,       // >>=
    Plus,        // +
    PlusPlus,    // ++
    PlusEq,      // +=
    Minus,       // -
    MinusMinus,  // --
    MinusEq,     // -=
    Star,        // *
    StarEq,      // *=
    Slash,       // /
    SlashEq,     // /=
    SlashSlash,  // //
    SlashSlashEq, // //=
    Percent,     // %
    PercentEq,   // %=
    Amp,         // &
    AmpAmp,      // &&
    AmpEq,       // &=
    Pipe,        // |
    PipePipe,    // ||
    PipeEq,      // |=
    Caret,       // ^
    CaretEq,     // ^=

    // Identifiers and literals
    Ident(String),
    Number(f64),
    Color(u32),
    Str(String),
}

impl TokenKind {
    /// Text used to report this token to the user.
    pub fn description(&self) -> String {
        let fixed = match self {
            TokenKind::Entrypoint => "keyword `entrypoint`",
            TokenKind::Public => "keyword `public`",
            TokenKind::Link => "keyword `link`",
            TokenKind::Using => "keyword `using`",
            TokenKind::As => "keyword `as`",
            TokenKind::Proc => "keyword `proc`",
            TokenKind::Const => "keyword `const`",
            TokenKind::Var => "keyword `var`",
            TokenKind::If => "keyword `if`",
            TokenKind::Else => "keyword `else`",
            TokenKind::While => "keyword `while`",
            TokenKind::Break => "keyword `break`",
            TokenKind::Continue => "keyword `continue`",
            TokenKind::Return => "keyword `return`",
            TokenKind::LBrace => "punctuation `{`",
            TokenKind::RBrace => "punctuation `}`",
            TokenKind::LParen => "punctuation `(`",
            TokenKind::RParen => "punctuation `)`",
            TokenKind::Semi => "punctuation `;`",
            TokenKind::Dot => "punctuation `.`",
            TokenKind::Comma => "punctuation `,`",
            TokenKind::Colon => "punctuation `:`",
            TokenKind::DoubleColon => "punctuation `::`",
            TokenKind::Tilde => "punctuation `~`",
            TokenKind::Bang => "punctuation `!`",
            TokenKind::BangEq => "punctuation `!=`",
            TokenKind::Equal => "punctuation `=`",
            TokenKind::EqEq => "punctuation `==`",
            TokenKind::EqEqEq => "punctuation `===`",
            TokenKind::Lt => "punctuation `<`",
            TokenKind::LtEq => "punctuation `<=`",
            TokenKind::Shl => "punctuation `<<`",
            TokenKind::ShlEq => "punctuation `<<=`",
            TokenKind::Gt => "punctuation `>`",
            TokenKind::GtEq => "punctuation `>=`",
            TokenKind::Shr => "punctuation `>>`",
            TokenKind::ShrEq => "punctuation `>>=`",
            TokenKind::Plus => "punctuation `+`",
            TokenKind::PlusPlus => "punctuation `++`",
            TokenKind::PlusEq => "punctuation `+=`",
            TokenKind::Minus => "punctuation `-`",
            TokenKind::MinusMinus => "punctuation `--`",
            TokenKind::MinusEq => "punctuation `-=`",
            TokenKind::Star => "punctuation `*`",
            TokenKind::StarEq => "punctuation `*=`",
            TokenKind::Slash => "punctuation `/`",
            TokenKind::SlashEq => "punctuation `/=`",
            TokenKind::SlashSlash => "punctuation `//`",
            TokenKind::SlashSlashEq => "punctuation `//=`",
            TokenKind::Percent => "punctuation `%`",
            TokenKind::PercentEq => "punctuation `%=`",
            TokenKind::Amp => "punctuation `&`",
            TokenKind::AmpAmp => "punctuation `&&`",
            TokenKind::AmpEq => "punctuation `&=`",
            TokenKind::Pipe => "punctuation `|`",
            TokenKind::PipePipe => "punctuation `||`",
            TokenKind::PipeEq => "punctuation `|=`",
            TokenKind::Caret => "punctuation `^`",
            TokenKind::CaretEq => "punctuation `^=`",
            TokenKind::Ident(text) => return format!("identifier `{text}`"),
            TokenKind::Number(value) => return format!("number `{value}`"),
            TokenKind::Color(value) => return format!("color `0p{value:08x}`"),
            TokenKind::Str(text) => return format!("string `\"{text}\"`"),
        };
        fixed.to_string()
    }
}

/// A single token with its kind and span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Lex a source string into tokens.
///
/// `source` is the name or path the file is reported as in errors.
pub fn lex(source: &str, contents: &str) -> Result<Vec<Token>, CoreError> {
    let mut lexer = Lexer {
        source,
        contents,
        bytes: contents.as_bytes(),
        index: 0,
    };
    lexer.run()
}

struct Lexer<'src> {
    source: &'src str,
    contents: &'src str,
    bytes: &'src [u8],
    index: usize,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Result<Vec<Token>, CoreError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.consume_char();
                continue;
            }
            if ch == b'#' {
                while let Some(ch) = self.peek_char() {
                    self.consume_char();
                    if ch == b'\n' {
                        break;
                    }
                }
                continue;
            }

            let start = self.index as u32;
            let token = match ch {
                b'{' => self.single(TokenKind::LBrace, start),
                b'}' => self.single(TokenKind::RBrace, start),
                b'(' => self.single(TokenKind::LParen, start),
                b')' => self.single(TokenKind::RParen, start),
                b';' => self.single(TokenKind::Semi, start),
                b'.' => self.single(TokenKind::Dot, start),
                b',' => self.single(TokenKind::Comma, start),
                b'~' => self.single(TokenKind::Tilde, start),
                b':' => {
                    self.consume_char();
                    if self.peek_char() == Some(b':') {
                        self.consume_char();
                        self.token(TokenKind::DoubleColon, start)
                    } else {
                        self.token(TokenKind::Colon, start)
                    }
                }
                b'!' => self.with_equal(TokenKind::Bang, TokenKind::BangEq, start),
                b'=' => {
                    self.consume_char();
                    if self.peek_char() == Some(b'=') {
                        self.consume_char();
                        if self.peek_char() == Some(b'=') {
                            self.consume_char();
                            self.token(TokenKind::EqEqEq, start)
                        } else {
                            self.token(TokenKind::EqEq, start)
                        }
                    } else {
                        self.token(TokenKind::Equal, start)
                    }
                }
                b'<' => self.shift_family(
                    TokenKind::Lt,
                    TokenKind::LtEq,
                    TokenKind::Shl,
                    TokenKind::ShlEq,
                    b'<',
                    start,
                ),
                b'>' => self.shift_family(
                    TokenKind::Gt,
                    TokenKind::GtEq,
                    TokenKind::Shr,
                    TokenKind::ShrEq,
                    b'>',
                    start,
                ),
                b'+' => self.with_double_or_equal(
                    TokenKind::Plus,
                    TokenKind::PlusPlus,
                    TokenKind::PlusEq,
                    b'+',
                    start,
                ),
                b'-' => self.with_double_or_equal(
                    TokenKind::Minus,
                    TokenKind::MinusMinus,
                    TokenKind::MinusEq,
                    b'-',
                    start,
                ),
                b'*' => self.with_equal(TokenKind::Star, TokenKind::StarEq, start),
                b'/' => self.shift_family(
                    TokenKind::Slash,
                    TokenKind::SlashEq,
                    TokenKind::SlashSlash,
                    TokenKind::SlashSlashEq,
                    b'/',
                    start,
                ),
                b'%' => self.with_equal(TokenKind::Percent, TokenKind::PercentEq, start),
                b'&' => self.with_double_or_equal(
                    TokenKind::Amp,
                    TokenKind::AmpAmp,
                    TokenKind::AmpEq,
                    b'&',
                    start,
                ),
                b'|' => self.with_double_or_equal(
                    TokenKind::Pipe,
                    TokenKind::PipePipe,
                    TokenKind::PipeEq,
                    b'|',
                    start,
                ),
                b'^' => self.with_equal(TokenKind::Caret, TokenKind::CaretEq, start),
                b'"' => self.lex_string(start)?,
                b'0'..=b'9' => self.lex_number(start)?,
                _ => {
                    if is_ident_start(ch) {
                        self.lex_ident_or_keyword(start)
                    } else {
                        self.consume_char();
                        return Err(self.error(start, "unexpected character".to_string()));
                    }
                }
            };
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn single(&mut self, kind: TokenKind, start: u32) -> Token {
        self.consume_char();
        self.token(kind, start)
    }

    /// `x` or `x=`.
    fn with_equal(&mut self, plain: TokenKind, with_eq: TokenKind, start: u32) -> Token {
        self.consume_char();
        if self.peek_char() == Some(b'=') {
            self.consume_char();
            self.token(with_eq, start)
        } else {
            self.token(plain, start)
        }
    }

    /// `x`, `xx` or `x=`.
    fn with_double_or_equal(
        &mut self,
        plain: TokenKind,
        doubled: TokenKind,
        with_eq: TokenKind,
        repeat: u8,
        start: u32,
    ) -> Token {
        self.consume_char();
        if self.peek_char() == Some(repeat) {
            self.consume_char();
            self.token(doubled, start)
        } else if self.peek_char() == Some(b'=') {
            self.consume_char();
            self.token(with_eq, start)
        } else {
            self.token(plain, start)
        }
    }

    /// `x`, `x=`, `xx` or `xx=`.
    fn shift_family(
        &mut self,
        plain: TokenKind,
        with_eq: TokenKind,
        doubled: TokenKind,
        doubled_eq: TokenKind,
        repeat: u8,
        start: u32,
    ) -> Token {
        self.consume_char();
        if self.peek_char() == Some(repeat) {
            self.consume_char();
            if self.peek_char() == Some(b'=') {
                self.consume_char();
                self.token(doubled_eq, start)
            } else {
                self.token(doubled, start)
            }
        } else if self.peek_char() == Some(b'=') {
            self.consume_char();
            self.token(with_eq, start)
        } else {
            self.token(plain, start)
        }
    }

    fn lex_string(&mut self, start: u32) -> Result<Token, CoreError> {
        self.consume_char();
        let content_start = self.index;
        while let Some(ch) = self.peek_char() {
            if ch == b'"' {
                let text = self.contents[content_start..self.index].to_string();
                self.consume_char();
                return Ok(self.token(TokenKind::Str(text), start));
            }
            self.consume_char();
        }
        Err(self.error(start, "unterminated string literal".to_string()))
    }

    fn lex_number(&mut self, start: u32) -> Result<Token, CoreError> {
        // Packed color literals look like `0p` followed by 8 hex digits.
        if self.peek_char() == Some(b'0') && self.peek_next() == Some(b'p') {
            self.consume_char();
            self.consume_char();
            let digits_start = self.index;
            while self.peek_char().is_some_and(|ch| ch.is_ascii_hexdigit()) {
                self.consume_char();
            }
            let digits = &self.contents[digits_start..self.index];
            if digits.len() != 8 {
                return Err(self.error(
                    start,
                    "color literal must have exactly 8 hexadecimal digits".to_string(),
                ));
            }
            let value = u32::from_str_radix(digits, 16)
                .map_err(|_| self.error(start, "malformed color literal".to_string()))?;
            return Ok(self.token(TokenKind::Color(value), start));
        }

        let mut text = String::new();
        self.consume_digits(&mut text);
        if self.peek_char() == Some(b'.') && self.peek_next().is_some_and(|ch| ch.is_ascii_digit())
        {
            text.push('.');
            self.consume_char();
            self.consume_digits(&mut text);
        }
        if matches!(self.peek_char(), Some(b'e') | Some(b'E')) {
            let sign_len = match self.peek_next() {
                Some(b'+') | Some(b'-') => 1,
                _ => 0,
            };
            let first_digit = self.bytes.get(self.index + 1 + sign_len).copied();
            if first_digit.is_some_and(|ch| ch.is_ascii_digit()) {
                text.push('e');
                self.consume_char();
                if sign_len != 0 {
                    if self.peek_char() == Some(b'-') {
                        text.push('-');
                    }
                    self.consume_char();
                }
                self.consume_digits(&mut text);
            }
        }
        let value = text
            .parse::<f64>()
            .map_err(|_| self.error(start, "malformed number literal".to_string()))?;
        Ok(self.token(TokenKind::Number(value), start))
    }

    /// Consumes a digit run, dropping `_` separators.
    fn consume_digits(&mut self, text: &mut String) {
        while let Some(ch) = self.peek_char() {
            match ch {
                b'0'..=b'9' => {
                    text.push(ch as char);
                    self.consume_char();
                }
                b'_' => self.consume_char(),
                _ => break,
            }
        }
    }

    fn lex_ident_or_keyword(&mut self, start: u32) -> Token {
        while self.peek_char().is_some_and(is_ident_continue) {
            self.consume_char();
        }
        let text = &self.contents[start as usize..self.index];
        let kind = match text {
            "entrypoint" => TokenKind::Entrypoint,
            "public" => TokenKind::Public,
            "link" => TokenKind::Link,
            "using" => TokenKind::Using,
            "as" => TokenKind::As,
            "proc" => TokenKind::Proc,
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            _ => TokenKind::Ident(text.to_string()),
        };
        self.token(kind, start)
    }

    fn token(&self, kind: TokenKind, start: u32) -> Token {
        Token {
            kind,
            span: Span::new(start, self.index as u32),
        }
    }

    fn error(&self, offset: u32, message: String) -> CoreError {
        CoreError::LexError {
            location: Location::of(self.source, self.contents, offset as usize),
            message,
        }
    }

    fn peek_char(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.bytes.len() {
            self.index += 1;
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(contents: &str) -> Vec<TokenKind> {
        lex("test.lpl", contents)
            .expect("lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn greedily_munches_compound_punctuation() {
        assert_eq!(
            kinds("<<= << <= < >>= == === //= // /"),
            vec![
                TokenKind::ShlEq,
                TokenKind::Shl,
                TokenKind::LtEq,
                TokenKind::Lt,
                TokenKind::ShrEq,
                TokenKind::EqEq,
                TokenKind::EqEqEq,
                TokenKind::SlashSlashEq,
                TokenKind::SlashSlash,
                TokenKind::Slash,
            ],
        );
    }

    #[test]
    fn distinguishes_keywords_from_identifiers() {
        assert_eq!(
            kinds("proc process true"),
            vec![
                TokenKind::Proc,
                TokenKind::Ident("process".to_string()),
                TokenKind::Ident("true".to_string()),
            ],
        );
    }

    #[test]
    fn lexes_number_forms() {
        assert_eq!(
            kinds("0 42 1_000 2.5 1e3 2.5e-1"),
            vec![
                TokenKind::Number(0.0),
                TokenKind::Number(42.0),
                TokenKind::Number(1000.0),
                TokenKind::Number(2.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(0.25),
            ],
        );
    }

    #[test]
    fn keeps_exponent_lookahead_conservative() {
        // `1e` is a number followed by an identifier, not a malformed literal.
        assert_eq!(
            kinds("1e"),
            vec![TokenKind::Number(1.0), TokenKind::Ident("e".to_string())],
        );
    }

    #[test]
    fn lexes_color_and_string_literals() {
        assert_eq!(
            kinds("0pff00ff80 \"hello there\""),
            vec![
                TokenKind::Color(0xff00ff80),
                TokenKind::Str("hello there".to_string()),
            ],
        );
    }

    #[test]
    fn rejects_short_color_literal() {
        let err = lex("test.lpl", "0pff00").unwrap_err();
        assert!(matches!(err, CoreError::LexError { .. }));
    }

    #[test]
    fn skips_comments_to_end_of_line() {
        assert_eq!(
            kinds("x # the rest // is = ignored\ny"),
            vec![
                TokenKind::Ident("x".to_string()),
                TokenKind::Ident("y".to_string()),
            ],
        );
    }

    #[test]
    fn reports_location_of_unexpected_character() {
        let err = lex("test.lpl", "x\n  @").unwrap_err();
        match err {
            CoreError::LexError { location, .. } => {
                assert_eq!(location.line, 2);
                assert_eq!(location.column, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
