//! Pratt rule table for expression parsing.
//!
//! Every operator token carries an optional prefix action, an optional
//! infix action, and an infix precedence. The expression driver invokes
//! the prefix action for the current token and then extends the left
//! operand while the next token's precedence stays at or above the
//! requested minimum.

use actc_lex::TokenKind;

use crate::ast::BinOp;

/// Infix precedence levels, lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Precedence {
    None = 0,
    Xor = 1,
    Or = 2,
    And = 3,
    Compare = 4,
    Term = 5,
    Factor = 6,
    Unary = 7,
}

impl Precedence {
    /// The next-higher level, used as the right operand's minimum so
    /// binary operators associate to the left.
    pub fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Xor,
            Precedence::Xor => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Compare,
            Precedence::Compare => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Unary,
        }
    }
}

/// Action taken when a token begins an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefixAction {
    None,
    NumericLiteral,
    Grouping,
    Unary,
    Identifier,
}

/// Action taken when a token continues an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfixAction {
    None,
    Binary,
}

/// One row of the rule table.
#[derive(Clone, Copy, Debug)]
pub struct ExprRule {
    pub prefix: PrefixAction,
    pub infix: InfixAction,
    pub precedence: Precedence,
}

const fn rule_of(prefix: PrefixAction, infix: InfixAction, precedence: Precedence) -> ExprRule {
    ExprRule {
        prefix,
        infix,
        precedence,
    }
}

/// Looks up the rule for a token. Tokens with no rule terminate an
/// expression.
pub fn rule(kind: TokenKind) -> Option<ExprRule> {
    use InfixAction as I;
    use Precedence as P;
    use PrefixAction as Pre;

    Some(match kind {
        TokenKind::LParen => rule_of(Pre::Grouping, I::None, P::None),
        TokenKind::RParen => rule_of(Pre::None, I::None, P::None),
        TokenKind::Plus => rule_of(Pre::None, I::Binary, P::Term),
        TokenKind::Minus => rule_of(Pre::Unary, I::Binary, P::Term),
        TokenKind::Times => rule_of(Pre::None, I::Binary, P::Factor),
        TokenKind::Divide => rule_of(Pre::None, I::Binary, P::Factor),
        TokenKind::Mod => rule_of(Pre::None, I::Binary, P::Factor),
        TokenKind::Lsh => rule_of(Pre::None, I::Binary, P::Factor),
        TokenKind::Rsh => rule_of(Pre::None, I::Binary, P::Factor),
        TokenKind::At => rule_of(Pre::Identifier, I::None, P::Unary),
        TokenKind::Eq => rule_of(Pre::None, I::Binary, P::Compare),
        TokenKind::Ne => rule_of(Pre::None, I::Binary, P::Compare),
        TokenKind::Gt => rule_of(Pre::None, I::Binary, P::Compare),
        TokenKind::Ge => rule_of(Pre::None, I::Binary, P::Compare),
        TokenKind::Lt => rule_of(Pre::None, I::Binary, P::Compare),
        TokenKind::Le => rule_of(Pre::None, I::Binary, P::Compare),
        TokenKind::And => rule_of(Pre::None, I::Binary, P::And),
        TokenKind::BitAnd => rule_of(Pre::None, I::Binary, P::And),
        TokenKind::Or => rule_of(Pre::None, I::Binary, P::Or),
        TokenKind::BitOr => rule_of(Pre::None, I::Binary, P::Or),
        TokenKind::Xor => rule_of(Pre::None, I::Binary, P::Xor),
        TokenKind::BitXor => rule_of(Pre::None, I::Binary, P::Xor),
        TokenKind::IntLiteral => rule_of(Pre::NumericLiteral, I::None, P::None),
        TokenKind::HexLiteral => rule_of(Pre::NumericLiteral, I::None, P::None),
        TokenKind::CharLiteral => rule_of(Pre::NumericLiteral, I::None, P::None),
        TokenKind::Identifier => rule_of(Pre::Identifier, I::None, P::None),
        TokenKind::Eof => rule_of(Pre::None, I::None, P::None),
        _ => return None,
    })
}

/// The binary AST operator for an infix token. Keyword synonyms map to
/// their bitwise counterparts.
pub fn binop_for(kind: TokenKind) -> Option<BinOp> {
    Some(match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Times => BinOp::Mul,
        TokenKind::Divide => BinOp::Div,
        TokenKind::Mod => BinOp::Mod,
        TokenKind::Lsh => BinOp::Lsh,
        TokenKind::Rsh => BinOp::Rsh,
        TokenKind::Eq => BinOp::Eq,
        TokenKind::Ne => BinOp::Ne,
        TokenKind::Gt => BinOp::Gt,
        TokenKind::Ge => BinOp::Ge,
        TokenKind::Lt => BinOp::Lt,
        TokenKind::Le => BinOp::Le,
        TokenKind::And => BinOp::BitAnd,
        TokenKind::BitAnd => BinOp::BitAnd,
        TokenKind::Or => BinOp::BitOr,
        TokenKind::BitOr => BinOp::BitOr,
        TokenKind::Xor => BinOp::Xor,
        TokenKind::BitXor => BinOp::BitXor,
        _ => return None,
    })
}
