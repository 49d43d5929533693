//! Expression parsing via Pratt precedence climbing.
//!
//! The driver invokes the prefix action for the current token, then keeps
//! consuming infix operators while their precedence stays at or above the
//! requested minimum. Tokens without a table entry (THEN, DO, ...) simply
//! terminate the expression.

use actc_lex::TokenKind;
use actc_util::{CompileError, CompileResult};

use crate::ast::{Expr, NumericConst, RefTarget};
use crate::pratt::{binop_for, rule, Precedence, PrefixAction};
use crate::symtab::EntryKind;
use crate::types::Type;
use crate::Parser;

impl<'a> Parser<'a> {
    /// Parses a full expression, or `None` when the current token cannot
    /// start one.
    pub(crate) fn parse_expression(&mut self) -> CompileResult<Option<Expr>> {
        self.parse_precedence(Precedence::Xor)
    }

    fn parse_precedence(&mut self, min: Precedence) -> CompileResult<Option<Expr>> {
        let Some(prefix_rule) = rule(self.kind()) else {
            return Ok(None);
        };
        if prefix_rule.prefix == PrefixAction::None {
            return Err(CompileError::syntax(
                format!("expected expression, got {:?}", self.kind()),
                self.loc(),
            ));
        }

        let mut expr = self.parse_prefix(prefix_rule.prefix)?;

        while let Some(infix_rule) = rule(self.kind()) {
            if infix_rule.precedence < min {
                break;
            }
            expr = self.parse_binary(expr, infix_rule.precedence)?;
        }
        Ok(Some(expr))
    }

    fn parse_prefix(&mut self, action: PrefixAction) -> CompileResult<Expr> {
        match action {
            PrefixAction::NumericLiteral => self.parse_numeric_literal(),
            PrefixAction::Grouping => self.parse_grouping(),
            PrefixAction::Unary => self.parse_unary(),
            PrefixAction::Identifier => self.parse_identifier_expr(),
            PrefixAction::None => Err(CompileError::internal("prefix action missing")),
        }
    }

    /// Decimal, hex, or character literal.
    fn parse_numeric_literal(&mut self) -> CompileResult<Expr> {
        let value = self.current().int_value()?;
        if !(-65535..=65535).contains(&value) {
            return Err(CompileError::syntax(
                format!("numeric literal {value} out of range [-65535, 65535]"),
                self.loc(),
            ));
        }
        self.advance();
        Ok(Expr::Const(NumericConst::new(value)))
    }

    /// `( <expression> )`
    fn parse_grouping(&mut self) -> CompileResult<Expr> {
        self.advance();
        let loc = self.loc();
        let expr = self
            .parse_expression()?
            .ok_or_else(|| CompileError::syntax("expected expression inside parentheses", loc))?;
        self.consume(TokenKind::RParen)?;
        Ok(expr)
    }

    /// Unary minus, the only prefix operator.
    fn parse_unary(&mut self) -> CompileResult<Expr> {
        let op = self.kind();
        let loc = self.loc();
        self.advance();
        let operand = self
            .parse_precedence(Precedence::Unary)?
            .ok_or_else(|| CompileError::syntax("expected operand for unary operator", self.loc()))?;
        match op {
            TokenKind::Minus => Ok(Expr::Negate(Box::new(operand))),
            other => Err(CompileError::syntax(
                format!("unknown unary operator {other:?}"),
                loc,
            )),
        }
    }

    /// Extends `lhs` with one infix operator and its right operand.
    fn parse_binary(&mut self, lhs: Expr, precedence: Precedence) -> CompileResult<Expr> {
        let op_kind = self.kind();
        let loc = self.loc();
        self.advance();

        let rhs = self
            .parse_precedence(precedence.next())?
            .ok_or_else(|| {
                CompileError::syntax(format!("expected right operand for {op_kind:?}"), self.loc())
            })?;
        let op = binop_for(op_kind)
            .ok_or_else(|| CompileError::syntax(format!("unknown binary operator {op_kind:?}"), loc))?;
        Ok(Expr::binary(op, lhs, rhs))
    }

    /// An identifier in expression position: a variable access, an array
    /// element, a pointer dereference, a record field, an `@` reference,
    /// or a function call - decided through the symbol table.
    fn parse_identifier_expr(&mut self) -> CompileResult<Expr> {
        let is_reference = self.eat(TokenKind::At);

        if self.kind() != TokenKind::Identifier {
            return Err(CompileError::syntax(
                format!("expected identifier in expression, got {:?}", self.kind()),
                self.loc(),
            ));
        }
        let name = self.current().value.clone().unwrap_or_default();
        let loc = self.loc();

        let Some((entry, _)) = self.symtab.find(&name) else {
            return Err(CompileError::identifier(
                format!("undefined identifier: {name}"),
                loc,
            ));
        };

        match entry.kind {
            EntryKind::Var(id) => {
                self.advance();
                let var_ty = self.vars[id.index()].ty.clone();

                if self.kind() == TokenKind::Caret {
                    if is_reference {
                        return Err(CompileError::syntax(
                            "cannot combine @ with a pointer dereference",
                            loc,
                        ));
                    }
                    self.advance();
                    let Type::Pointer(pointee) = var_ty else {
                        return Err(CompileError::type_error(
                            format!("{name} is not a pointer"),
                            loc,
                        ));
                    };
                    let ty = pointee.fund().ok_or_else(|| {
                        CompileError::type_error(
                            format!("record pointer {name} must be dereferenced through a field"),
                            loc,
                        )
                    })?;
                    return Ok(Expr::Deref { var: id, ty });
                }

                if is_reference {
                    return Ok(Expr::Reference(RefTarget::Var(id)));
                }

                match var_ty {
                    Type::Array { elem, .. } => {
                        if self.eat(TokenKind::LParen) {
                            let index = self.parse_arith_exp()?;
                            self.consume(TokenKind::RParen)?;
                            Ok(Expr::Index {
                                var: id,
                                index: Box::new(index),
                                ty: elem,
                            })
                        } else {
                            // A bare array name decays to its address.
                            Ok(Expr::Reference(RefTarget::Var(id)))
                        }
                    },
                    Type::Record(record) => {
                        if self.eat(TokenKind::Dot) {
                            let field_token = self.consume(TokenKind::Identifier)?;
                            let field_name = field_token.value.clone().unwrap_or_default();
                            let (offset, ty) = self.records[record.index()]
                                .field(&field_name)
                                .ok_or_else(|| {
                                    CompileError::identifier(
                                        format!(
                                            "record {} has no field named {field_name}",
                                            self.records[record.index()].name
                                        ),
                                        field_token.loc,
                                    )
                                })?;
                            Ok(Expr::Field {
                                var: id,
                                offset,
                                ty,
                            })
                        } else {
                            Err(CompileError::type_error(
                                format!("record variable {name} used as a value"),
                                loc,
                            ))
                        }
                    },
                    other => {
                        let ty = other
                            .fund()
                            .ok_or_else(|| CompileError::internal("scalar type without width"))?;
                        Ok(Expr::Var { id, ty })
                    },
                }
            },
            EntryKind::Routine(id) => {
                if is_reference {
                    self.advance();
                    return Ok(Expr::Reference(RefTarget::Routine(id)));
                }
                match self.parse_routine_call()? {
                    Some(call) => Ok(Expr::Call(call)),
                    None => Err(CompileError::syntax(
                        format!("routine {name} used without a call"),
                        loc,
                    )),
                }
            },
            EntryKind::Record(_) => Err(CompileError::identifier(
                format!("invalid identifier in expression: {name}"),
                loc,
            )),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
