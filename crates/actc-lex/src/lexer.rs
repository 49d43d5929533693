//! The scanner.

use std::collections::VecDeque;
use std::sync::Arc;

use actc_util::{CompileError, CompileResult, SourceLoc};

use crate::define::DefineStack;
use crate::token::{Token, TokenKind};

/// Lexer for Action! source text.
///
/// Produces one token per call to [`next_token`](Lexer::next_token); the
/// stream ends with a single [`TokenKind::Eof`]. Line numbers are 0-based
/// and advance on every newline, whether or not it separates tokens.
pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    file: Arc<str>,
    defines: &'a DefineStack,
    /// Tokens produced by macro expansion, drained before scanning resumes.
    pending: VecDeque<Token>,
    /// Set while lexing replacement text so expansion is single-level.
    expanding: bool,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over `source`, reporting locations against
    /// `filename`.
    pub fn new(source: &str, filename: &str, defines: &'a DefineStack) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 0,
            file: Arc::from(filename),
            defines,
            pending: VecDeque::new(),
            expanding: false,
        }
    }

    fn sub_lexer(text: &str, file: Arc<str>, line: u32, defines: &'a DefineStack) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line,
            file,
            defines,
            pending: VecDeque::new(),
            expanding: true,
        }
    }

    /// Returns the next token, or `Eof` once the input is exhausted.
    pub fn next_token(&mut self) -> CompileResult<Token> {
        if let Some(token) = self.pending.pop_front() {
            return Ok(token);
        }

        self.skip_whitespace_and_comments();

        if self.is_at_end() {
            return Ok(self.token(TokenKind::Eof, None));
        }

        match self.current_char() {
            '"' => self.lex_string(),
            '\'' => self.lex_char_literal(),
            '$' => self.lex_hex_number(),
            c if c.is_ascii_digit() => self.lex_dec_number(),
            c if c.is_ascii_alphabetic() => self.lex_word(),
            c => self.lex_symbol(c),
        }
    }

    /// Skips spaces, tabs, newlines, and `;` comments. Newlines advance the
    /// line counter.
    fn skip_whitespace_and_comments(&mut self) {
        while !self.is_at_end() {
            match self.current_char() {
                '\n' => {
                    self.line += 1;
                    self.pos += 1;
                },
                c if c.is_whitespace() => self.pos += 1,
                ';' => {
                    while !self.is_at_end() && self.current_char() != '\n' {
                        self.pos += 1;
                    }
                },
                _ => break,
            }
        }
    }

    /// Double-quote delimited, printable ASCII payload, closing quote
    /// required.
    fn lex_string(&mut self) -> CompileResult<Token> {
        self.pos += 1;
        let start = self.pos;
        while !self.is_at_end() && self.current_char() != '"' {
            let c = self.current_char();
            if !(' '..='~').contains(&c) {
                return Err(self.error(format!("invalid character in string constant: {c:?}")));
            }
            self.pos += 1;
        }
        if self.is_at_end() {
            return Err(self.error("unterminated string constant"));
        }
        let payload: String = self.chars[start..self.pos].iter().collect();
        self.pos += 1;
        Ok(self.token(TokenKind::StringLiteral, Some(payload)))
    }

    /// A single apostrophe followed by exactly one character. Unlike most
    /// languages there is no closing apostrophe.
    fn lex_char_literal(&mut self) -> CompileResult<Token> {
        if self.pos + 1 >= self.chars.len() {
            return Err(self.error("invalid character constant"));
        }
        let c = self.chars[self.pos + 1];
        self.pos += 2;
        Ok(self.token(TokenKind::CharLiteral, Some(c.to_string())))
    }

    /// A maximal run of decimal digits.
    fn lex_dec_number(&mut self) -> CompileResult<Token> {
        let start = self.pos;
        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        Ok(self.token(TokenKind::IntLiteral, Some(digits)))
    }

    /// `$` followed by a maximal run of `[0-9A-F]`.
    fn lex_hex_number(&mut self) -> CompileResult<Token> {
        self.pos += 1;
        let start = self.pos;
        while !self.is_at_end()
            && (self.current_char().is_ascii_digit() || ('A'..='F').contains(&self.current_char()))
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected hex digit after $"));
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        Ok(self.token(TokenKind::HexLiteral, Some(digits)))
    }

    /// A keyword or an identifier; identifiers may expand via the define
    /// stack.
    fn lex_word(&mut self) -> CompileResult<Token> {
        let start = self.pos;
        while !self.is_at_end()
            && (self.current_char().is_ascii_alphanumeric() || self.current_char() == '_')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        if let Some(kind) = TokenKind::keyword(&word) {
            return Ok(self.token(kind, None));
        }

        if !self.expanding {
            if let Some(replacement) = self.defines.get(&word) {
                return self.expand_define(replacement.to_string());
            }
        }

        Ok(self.token(TokenKind::Identifier, Some(word)))
    }

    /// Re-lexes macro replacement text in place of the identifier that
    /// named it. Expansion is single-level.
    fn expand_define(&mut self, replacement: String) -> CompileResult<Token> {
        let mut sub = Lexer::sub_lexer(&replacement, self.file.clone(), self.line, self.defines);
        loop {
            let token = sub.next_token()?;
            if token.kind == TokenKind::Eof {
                break;
            }
            self.pending.push_back(token);
        }
        match self.pending.pop_front() {
            Some(token) => Ok(token),
            // An empty replacement vanishes; carry on scanning.
            None => self.next_token(),
        }
    }

    /// One- or two-character operators, preferring the longer match.
    fn lex_symbol(&mut self, c: char) -> CompileResult<Token> {
        if self.pos + 1 < self.chars.len() {
            if let Some(kind) = TokenKind::symbol2(c, self.chars[self.pos + 1]) {
                self.pos += 2;
                return Ok(self.token(kind, None));
            }
        }
        if let Some(kind) = TokenKind::symbol1(c) {
            self.pos += 1;
            return Ok(self.token(kind, None));
        }
        Err(self.error(format!("invalid character: {c:?}")))
    }

    fn token(&self, kind: TokenKind, value: Option<String>) -> Token {
        Token::new(kind, value, SourceLoc::new(self.file.clone(), self.line))
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::lex(message, SourceLoc::new(self.file.clone(), self.line))
    }

    fn current_char(&self) -> char {
        self.chars[self.pos]
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

/// Tokenizes a whole source file, including the trailing EOF token.
pub fn tokenize(source: &str, filename: &str, defines: &DefineStack) -> CompileResult<Vec<Token>> {
    let mut lexer = Lexer::new(source, filename, defines);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const S_F: &str = "<test>";

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source, S_F, &DefineStack::new()).expect("lexing failed")
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|t| t.kind).collect()
    }

    // =========================================================================
    // KEYWORDS AND IDENTIFIERS
    // =========================================================================

    #[test]
    fn test_keyword_tokens() {
        assert_eq!(
            kinds("IF THEN ELSE"),
            vec![TokenKind::If, TokenKind::Then, TokenKind::Else, TokenKind::Eof]
        );
    }

    #[test]
    fn test_identifier_tokens() {
        let tokens = lex("apples Bananas cu_cumbers d0nutS");
        let names: Vec<_> = tokens[..4]
            .iter()
            .map(|t| t.value.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["apples", "Bananas", "cu_cumbers", "d0nutS"]);
        assert!(tokens[..4].iter().all(|t| t.kind == TokenKind::Identifier));
    }

    #[test]
    fn test_lowercase_keyword_is_identifier() {
        let tokens = lex("while");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
    }

    // =========================================================================
    // OPERATORS
    // =========================================================================

    #[test]
    fn test_symbol_tokens() {
        assert_eq!(
            kinds("+ - * / & % ! = == <> # > >= < <= ^ @ (<>)"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Times,
                TokenKind::Divide,
                TokenKind::BitAnd,
                TokenKind::BitOr,
                TokenKind::BitXor,
                TokenKind::Eq,
                TokenKind::SelfAssign,
                TokenKind::Ne,
                TokenKind::Ne,
                TokenKind::Gt,
                TokenKind::Ge,
                TokenKind::Lt,
                TokenKind::Le,
                TokenKind::Caret,
                TokenKind::At,
                TokenKind::LParen,
                TokenKind::Ne,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_two_char_operator_preferred() {
        // "<=" must not lex as "<" "="
        assert_eq!(kinds("<="), vec![TokenKind::Le, TokenKind::Eof]);
        assert_eq!(kinds("< ="), vec![TokenKind::Lt, TokenKind::Eq, TokenKind::Eof]);
    }

    // =========================================================================
    // LITERALS AND LINE NUMBERS
    // =========================================================================

    #[test]
    fn test_literal_tokens_and_line_numbers() {
        let tokens = lex(" \"hello world\"$1A\n 'c 123 ");
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].value.as_deref(), Some("hello world"));
        assert_eq!(tokens[0].loc.line, 0);
        assert_eq!(tokens[1].kind, TokenKind::HexLiteral);
        assert_eq!(tokens[1].value.as_deref(), Some("1A"));
        assert_eq!(tokens[2].kind, TokenKind::CharLiteral);
        assert_eq!(tokens[2].value.as_deref(), Some("c"));
        assert_eq!(tokens[2].loc.line, 1);
        assert_eq!(tokens[3].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[3].value.as_deref(), Some("123"));
        assert_eq!(tokens[3].loc.line, 1);
    }

    #[test]
    fn test_comment_skipped_to_end_of_line() {
        assert_eq!(
            kinds("1 ; two three four\n2"),
            vec![TokenKind::IntLiteral, TokenKind::IntLiteral, TokenKind::Eof]
        );
        let tokens = lex("1 ; comment\n2");
        assert_eq!(tokens[1].loc.line, 1);
    }

    // =========================================================================
    // DEFINE EXPANSION
    // =========================================================================

    #[test]
    fn test_define_expansion_splices_tokens() {
        let mut defines = DefineStack::new();
        defines.set("size", "4+1");
        let tokens = tokenize("BYTE x size", S_F, &defines).unwrap();
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Byte,
                TokenKind::Identifier,
                TokenKind::IntLiteral,
                TokenKind::Plus,
                TokenKind::IntLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_define_expansion_is_single_level() {
        let mut defines = DefineStack::new();
        defines.set("a", "a");
        let tokens = tokenize("a", S_F, &defines).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].value.as_deref(), Some("a"));
    }

    // =========================================================================
    // FAILURE MODES
    // =========================================================================

    #[test]
    fn test_error_unterminated_string() {
        let err = tokenize("\"hello", S_F, &DefineStack::new()).unwrap_err();
        assert!(err.to_string().contains("unterminated string"));
    }

    #[test]
    fn test_error_invalid_string_character() {
        let err = tokenize("\"a\tb\"", S_F, &DefineStack::new()).unwrap_err();
        assert!(err.to_string().contains("invalid character in string"));
    }

    #[test]
    fn test_error_bare_dollar() {
        let err = tokenize("$", S_F, &DefineStack::new()).unwrap_err();
        assert!(err.to_string().contains("hex digit"));
    }

    #[test]
    fn test_error_invalid_symbol() {
        let err = tokenize("{", S_F, &DefineStack::new()).unwrap_err();
        assert!(err.to_string().contains("invalid character"));
    }

    #[test]
    fn test_hex_stops_at_lowercase() {
        // Lowercase letters are not hex digits here; $1a is $1 then ident a.
        let tokens = lex("$1a");
        assert_eq!(tokens[0].kind, TokenKind::HexLiteral);
        assert_eq!(tokens[0].value.as_deref(), Some("1"));
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    // =========================================================================
    // ROUND-TRIP PROPERTY
    // =========================================================================

    /// Joining the lexed tokens with single spaces and re-lexing must give
    /// the same stream: the token text is the whitespace-free skeleton of
    /// the source.
    fn assert_round_trip(source: &str) {
        let tokens = lex(source);
        let skeleton: Vec<String> = tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(Token::source_text)
            .collect();
        let rejoined = skeleton.join(" ");
        let relexed = lex(&rejoined);
        let a: Vec<_> = tokens.iter().map(|t| (t.kind, t.value.clone())).collect();
        let b: Vec<_> = relexed.iter().map(|t| (t.kind, t.value.clone())).collect();
        assert_eq!(a, b, "round trip failed for {source:?}");
    }

    #[test]
    fn test_round_trip_samples() {
        assert_round_trip("BYTE x CHAR y=['a] INT z=[$1234] CARD a");
        assert_round_trip("PROC main() i = b + 1000 RETURN");
        assert_round_trip("IF i<=5 THEN EXIT FI");
    }

    proptest! {
        #[test]
        fn prop_round_trip_identifier_and_number_soup(
            words in proptest::collection::vec("[a-z][a-z0-9_]{0,6}|[0-9]{1,4}", 1..20)
        ) {
            let source = words.join(" ");
            let tokens = lex(&source);
            let skeleton: String = tokens
                .iter()
                .filter(|t| t.kind != TokenKind::Eof)
                .map(Token::source_text)
                .collect::<Vec<_>>()
                .join(" ");
            let relexed = lex(&skeleton);
            let a: Vec<_> = tokens.iter().map(|t| (t.kind, t.value.clone())).collect();
            let b: Vec<_> = relexed.iter().map(|t| (t.kind, t.value.clone())).collect();
            prop_assert_eq!(a, b);
        }
    }
}
