//! actc-lex - Lexical analysis for the Action! language.
//!
//! The lexer turns source text into a flat token stream terminated by an
//! EOF token. Whitespace separates tokens, newlines advance the line
//! counter, and `;` starts a comment that runs to end of line. The scanner
//! is greedy: two-character operators (`<=`, `>=`, `<>`, `==`) win over
//! their one-character prefixes.
//!
//! A [`DefineStack`] can be supplied as a macro-expansion hook: identifiers
//! matching an active definition are re-lexed from their replacement text.
//! The macro engine that populates the stack lives outside this crate.

mod define;
mod lexer;
mod token;

pub use define::DefineStack;
pub use lexer::{tokenize, Lexer};
pub use token::{Token, TokenKind};
