//! Module `scanner` implements a one‑pass, streaming lexer for the Lox language.
//!
//! It transforms a source string into a sequence of `Token<'a>`s, skipping
//! whitespace and comments, and emitting exactly one `EOF` token at the end.
//! Lexical problems (unexpected characters, unterminated strings) are yielded
//! in‑band as `Err` items and scanning carries on with the next character, so
//! a single pass reports every lexical error in the file.
//!
//! # Public API
//!
//! - `Scanner::new(src: &'a str) -> Scanner<'a>`
//!   Create a new lexer over the input buffer.
//!
//! - `impl Iterator for Scanner<'a>`
//!   Yields `Result<Token<'a>, LoxError>` on each `.next()`.
//!
//! - `scan_tokens(src) -> (Vec<Token<'a>>, Vec<LoxError>)`
//!   Drains a scanner, splitting tokens from diagnostics.  The token vector
//!   always ends with `EOF`.
//!
//! # Token Recognition
//!
//! - Single‑character tokens: `(`, `)`, `{`, `}`, `,`, `.`, `-`, `+`, `;`, `*`.
//! - Two‑character operators: `!=`, `==`, `<=`, `>=`.
//! - String literals: `"` … `"`, allowing multi‑line.
//! - Numeric literals: digits with an optional fractional part (no exponent,
//!   no leading dot).
//! - Identifiers/keywords: resolved via a perfect‑hash `KEYWORDS` map.
//!
//! # Example
//!
//! ```rust
//! use lox_interpreter::scanner::Scanner;
//!
//! let mut scanner = Scanner::new("var x = 123; // example");
//! for result in &mut scanner {
//!     match result {
//!         Ok(token) => println!("{}", token),
//!         Err(err) => eprintln!("{}", err),
//!     }
//! }
//! ```

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_map;
use std::iter::FusedIterator;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile‑time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fun"    => TokenType::FUN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

/// A single pass **scanner / lexer** that converts source text into a
/// sequence of [`Token`]s.  The lifetime `'a` ties every emitted token’s
/// `lexeme` slice back to the original source buffer.
pub struct Scanner<'a> {
    src: &'a str,               // entire source file
    start: usize,               // byte index of the *first* byte of the current lexeme
    curr: usize,                // byte index *one past* the last byte examined
    line: usize,                // 1‑based line counter (\n increments)
    pending: Option<TokenType>, // recognised token kind waiting to be emitted
}

impl<'a> Scanner<'a> {
    /// Create a new lexer over `src`.
    #[inline]
    pub fn new(src: &'a str) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            curr: 0,
            line: 1,
            pending: None,
        }
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    #[inline(always)]
    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    #[inline(always)]
    fn len(&self) -> usize {
        self.src.len()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.len()
    }

    /// Advance one byte and return it.  Callers guard with [`is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.bytes()[self.curr];
        self.curr += 1;
        b
    }

    /// Current byte, or `0` past EOF.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.bytes()[self.curr]
        }
    }

    /// One byte beyond [`peek`].  Safe at EOF.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.len() {
            0
        } else {
            self.bytes()[self.curr + 1]
        }
    }

    /// Consume the current byte **iff** it matches `expected`.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Pick `matched` when the next byte is `=`, otherwise `single`.
    #[inline(always)]
    fn with_equal(&mut self, matched: TokenType, single: TokenType) -> TokenType {
        if self.match_byte(b'=') {
            matched
        } else {
            single
        }
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Scan a *single* lexeme starting at `self.curr`.  If it produces an
    /// actual token the kind is stored in `self.pending`; whitespace and
    /// comments leave `pending = None`.
    fn scan_token(&mut self) -> Result<()> {
        let b = self.advance();

        let tt: TokenType = match b {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,

            b'!' => self.with_equal(TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.with_equal(TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.with_equal(TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.with_equal(TokenType::GREATER_EQUAL, TokenType::GREATER),

            b' ' | b'\r' | b'\t' => return Ok(()),

            b'\n' => {
                self.line += 1;

                return Ok(());
            }

            b'/' => {
                if self.match_byte(b'/') {
                    // Jump to the next newline; the newline itself is left for
                    // the main loop so the line counter stays correct.
                    match memchr(b'\n', &self.bytes()[self.curr..]) {
                        Some(pos) => self.curr += pos,
                        None => self.curr = self.len(),
                    }

                    return Ok(());
                }

                TokenType::SLASH
            }

            b'"' => self.string()?,

            b'0'..=b'9' => self.number(),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            _ => {
                // Swallow the rest of a multi‑byte character so it is
                // reported once.
                while self.peek() & 0xC0 == 0x80 {
                    self.advance();
                }

                let ch: &str = &self.src[self.start..self.curr];

                return Err(LoxError::lex(
                    self.line,
                    format!("Unexpected character: {}", ch),
                ));
            }
        };

        self.pending = Some(tt);

        Ok(())
    }

    /// Parse a double‑quoted string literal.  On success `self.curr` points
    /// **past** the closing `"`.
    fn string(&mut self) -> Result<TokenType> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.advance() == b'\n' {
                self.line += 1;
            }
        }

        if self.is_at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        self.advance(); // closing quote

        let s: &str = &self.src[self.start + 1..self.curr - 1];

        Ok(TokenType::STRING(s.to_owned()))
    }

    /// Parse a numeric literal (`123`, `3.14`).
    fn number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance(); // "."

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let s: &str = &self.src[self.start..self.curr];

        // Only ASCII digits and one interior dot reach this point.
        TokenType::NUMBER(s.parse::<f64>().unwrap_or(0.0))
    }

    /// Parse an identifier and decide if it is a **keyword** or a plain
    /// `IDENTIFIER`.
    fn identifier(&mut self) -> TokenType {
        while {
            let c: u8 = self.peek();
            c.is_ascii_alphanumeric() || c == b'_'
        } {
            self.advance();
        }

        let slice: &[u8] = &self.bytes()[self.start..self.curr];

        KEYWORDS
            .get(slice)
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.curr <= self.len() {
            // Emit exactly one EOF, then terminate.
            if self.curr == self.len() {
                self.curr += 1;
                return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
            }

            self.start = self.curr;
            self.pending = None;

            if let Err(e) = self.scan_token() {
                return Some(Err(e));
            }

            if let Some(tt) = self.pending.take() {
                let src: &'a str = self.src;
                let lex: &'a str = &src[self.start..self.curr];
                debug!("Scanned token ({:?}) on line {}", tt, self.line);

                return Some(Ok(Token::new(tt, lex, self.line)));
            }
        }

        None
    }
}

impl<'a> FusedIterator for Scanner<'a> {}

/// Scan the whole of `src`, separating tokens from lexical diagnostics.
pub fn scan_tokens(src: &str) -> (Vec<Token<'_>>, Vec<LoxError>) {
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut errors: Vec<LoxError> = Vec::new();

    for item in Scanner::new(src) {
        match item {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }

    info!(
        "Scanned {} token(s) with {} error(s)",
        tokens.len(),
        errors.len()
    );

    (tokens, errors)
}
