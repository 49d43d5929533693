//! Token kinds and the token value carried between lexer and parser.

use actc_util::{CompileError, CompileResult, SourceLoc};

/// Every lexical unit the scanner can produce.
///
/// Keywords and operators carry no payload; literals and identifiers keep
/// their lexeme in [`Token::value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    And,
    Array,
    Byte,
    Card,
    Char,
    DevPrint,
    Do,
    Else,
    ElseIf,
    Exit,
    Fi,
    For,
    Func,
    If,
    Int,
    Lsh,
    Mod,
    Module,
    Od,
    Or,
    Pointer,
    Proc,
    Return,
    Rsh,
    Step,
    Then,
    To,
    Type,
    Until,
    While,
    Xor,

    // Operators and punctuators
    Plus,
    Minus,
    Times,
    Divide,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Caret,
    At,
    LParen,
    RParen,
    Dot,
    LBrack,
    RBrack,
    Comma,
    SelfAssign,

    // Literals and names
    StringLiteral,
    CharLiteral,
    IntLiteral,
    HexLiteral,
    Identifier,

    /// End of input.
    Eof,
}

impl TokenKind {
    /// Looks up a reserved word. Keywords are case-sensitive and all upper.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        Some(match word {
            "AND" => TokenKind::And,
            "ARRAY" => TokenKind::Array,
            "BYTE" => TokenKind::Byte,
            "CARD" => TokenKind::Card,
            "CHAR" => TokenKind::Char,
            "DEVPRINT" => TokenKind::DevPrint,
            "DO" => TokenKind::Do,
            "ELSE" => TokenKind::Else,
            "ELSEIF" => TokenKind::ElseIf,
            "EXIT" => TokenKind::Exit,
            "FI" => TokenKind::Fi,
            "FOR" => TokenKind::For,
            "FUNC" => TokenKind::Func,
            "IF" => TokenKind::If,
            "INT" => TokenKind::Int,
            "LSH" => TokenKind::Lsh,
            "MOD" => TokenKind::Mod,
            "MODULE" => TokenKind::Module,
            "OD" => TokenKind::Od,
            "OR" => TokenKind::Or,
            "POINTER" => TokenKind::Pointer,
            "PROC" => TokenKind::Proc,
            "RETURN" => TokenKind::Return,
            "RSH" => TokenKind::Rsh,
            "STEP" => TokenKind::Step,
            "THEN" => TokenKind::Then,
            "TO" => TokenKind::To,
            "TYPE" => TokenKind::Type,
            "UNTIL" => TokenKind::Until,
            "WHILE" => TokenKind::While,
            "XOR" => TokenKind::Xor,
            _ => return None,
        })
    }

    /// Looks up a two-character operator.
    pub fn symbol2(a: char, b: char) -> Option<TokenKind> {
        Some(match (a, b) {
            ('<', '>') => TokenKind::Ne,
            ('>', '=') => TokenKind::Ge,
            ('<', '=') => TokenKind::Le,
            ('=', '=') => TokenKind::SelfAssign,
            _ => return None,
        })
    }

    /// Looks up a one-character operator or punctuator.
    pub fn symbol1(c: char) -> Option<TokenKind> {
        Some(match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Times,
            '/' => TokenKind::Divide,
            '&' => TokenKind::BitAnd,
            '%' => TokenKind::BitOr,
            '!' => TokenKind::BitXor,
            '=' => TokenKind::Eq,
            '#' => TokenKind::Ne,
            '>' => TokenKind::Gt,
            '<' => TokenKind::Lt,
            '^' => TokenKind::Caret,
            '@' => TokenKind::At,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '[' => TokenKind::LBrack,
            ']' => TokenKind::RBrack,
            _ => return None,
        })
    }

    /// True for the tokens that begin a fundamental type name.
    pub fn is_fund_type(self) -> bool {
        matches!(
            self,
            TokenKind::Byte | TokenKind::Card | TokenKind::Char | TokenKind::Int
        )
    }

    /// Canonical spelling of a keyword or operator token, `None` for tokens
    /// that carry their own lexeme.
    pub fn fixed_text(self) -> Option<&'static str> {
        Some(match self {
            TokenKind::And => "AND",
            TokenKind::Array => "ARRAY",
            TokenKind::Byte => "BYTE",
            TokenKind::Card => "CARD",
            TokenKind::Char => "CHAR",
            TokenKind::DevPrint => "DEVPRINT",
            TokenKind::Do => "DO",
            TokenKind::Else => "ELSE",
            TokenKind::ElseIf => "ELSEIF",
            TokenKind::Exit => "EXIT",
            TokenKind::Fi => "FI",
            TokenKind::For => "FOR",
            TokenKind::Func => "FUNC",
            TokenKind::If => "IF",
            TokenKind::Int => "INT",
            TokenKind::Lsh => "LSH",
            TokenKind::Mod => "MOD",
            TokenKind::Module => "MODULE",
            TokenKind::Od => "OD",
            TokenKind::Or => "OR",
            TokenKind::Pointer => "POINTER",
            TokenKind::Proc => "PROC",
            TokenKind::Return => "RETURN",
            TokenKind::Rsh => "RSH",
            TokenKind::Step => "STEP",
            TokenKind::Then => "THEN",
            TokenKind::To => "TO",
            TokenKind::Type => "TYPE",
            TokenKind::Until => "UNTIL",
            TokenKind::While => "WHILE",
            TokenKind::Xor => "XOR",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Times => "*",
            TokenKind::Divide => "/",
            TokenKind::BitAnd => "&",
            TokenKind::BitOr => "%",
            TokenKind::BitXor => "!",
            TokenKind::Eq => "=",
            TokenKind::Ne => "<>",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Caret => "^",
            TokenKind::At => "@",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Dot => ".",
            TokenKind::LBrack => "[",
            TokenKind::RBrack => "]",
            TokenKind::Comma => ",",
            TokenKind::SelfAssign => "==",
            _ => return None,
        })
    }
}

/// A token with its optional lexeme and source position.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Lexeme for identifiers and literals, absent for keywords and
    /// punctuators.
    pub value: Option<String>,
    pub loc: SourceLoc,
}

impl Token {
    pub fn new(kind: TokenKind, value: Option<String>, loc: SourceLoc) -> Self {
        Self { kind, value, loc }
    }

    /// Converts the value of a numeric token to an integer.
    pub fn int_value(&self) -> CompileResult<i32> {
        let value = self.value.as_deref().unwrap_or("");
        match self.kind {
            TokenKind::IntLiteral => value.parse::<i32>().map_err(|_| {
                CompileError::syntax(format!("invalid integer literal {value}"), self.loc.clone())
            }),
            TokenKind::HexLiteral => i32::from_str_radix(value, 16).map_err(|_| {
                CompileError::syntax(format!("invalid hex literal ${value}"), self.loc.clone())
            }),
            TokenKind::CharLiteral => value
                .chars()
                .next()
                .map(|c| c as i32)
                .ok_or_else(|| CompileError::internal("empty character literal")),
            _ => Err(CompileError::internal(format!(
                "token {:?} has no integer value",
                self.kind
            ))),
        }
    }

    /// True when this token starts a fundamental type name.
    pub fn is_fund_type(&self) -> bool {
        self.kind.is_fund_type()
    }

    /// The source spelling of the token, reconstructed for tokens that
    /// carry a lexeme.
    pub fn source_text(&self) -> String {
        if let Some(text) = self.kind.fixed_text() {
            return text.to_string();
        }
        let value = self.value.as_deref().unwrap_or("");
        match self.kind {
            TokenKind::StringLiteral => format!("\"{value}\""),
            TokenKind::CharLiteral => format!("'{value}"),
            TokenKind::HexLiteral => format!("${value}"),
            TokenKind::IntLiteral | TokenKind::Identifier => value.to_string(),
            TokenKind::Eof => String::new(),
            _ => unreachable!("fixed_text covers all remaining kinds"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(kind: TokenKind, value: Option<&str>) -> Token {
        Token::new(kind, value.map(String::from), SourceLoc::start_of("<test>"))
    }

    #[test]
    fn test_keyword_lookup_is_case_sensitive() {
        assert_eq!(TokenKind::keyword("WHILE"), Some(TokenKind::While));
        assert_eq!(TokenKind::keyword("While"), None);
        assert_eq!(TokenKind::keyword("while"), None);
    }

    #[test]
    fn test_int_value_decimal_hex_char() {
        assert_eq!(tok(TokenKind::IntLiteral, Some("123")).int_value().unwrap(), 123);
        assert_eq!(tok(TokenKind::HexLiteral, Some("1A")).int_value().unwrap(), 0x1A);
        assert_eq!(tok(TokenKind::CharLiteral, Some("a")).int_value().unwrap(), 97);
    }

    #[test]
    fn test_int_value_rejects_non_numeric_kinds() {
        assert!(tok(TokenKind::Plus, None).int_value().is_err());
    }

    #[test]
    fn test_source_text_round_trips_literals() {
        assert_eq!(tok(TokenKind::HexLiteral, Some("FF")).source_text(), "$FF");
        assert_eq!(tok(TokenKind::CharLiteral, Some("c")).source_text(), "'c");
        assert_eq!(
            tok(TokenKind::StringLiteral, Some("hi")).source_text(),
            "\"hi\""
        );
        assert_eq!(tok(TokenKind::Le, None).source_text(), "<=");
    }
}
