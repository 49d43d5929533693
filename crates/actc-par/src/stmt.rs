//! Statement parsing: assignment, EXIT, RETURN, routine calls, IF, DO,
//! WHILE, FOR, code blocks, and the DEVPRINT debugging statement.
//!
//! A statement beginning with an identifier is disambiguated through the
//! symbol table: a VAR entry is an assignment target, a ROUTINE entry
//! followed by `(` is a call.

use actc_lex::TokenKind;
use actc_util::{CompileError, CompileResult};

use crate::ast::{CallExpr, Conditional, DoLoop, Expr, NumericConst, Stmt};
use crate::symtab::EntryKind;
use crate::types::Type;
use crate::{Parser, RoutineCategory};

impl<'a> Parser<'a> {
    /// `<stmt list> ::= {<stmt>}`
    pub(crate) fn parse_stmt_list(&mut self) -> CompileResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while let Some(stmt) = self.parse_stmt()? {
            stmts.push(stmt);
        }
        Ok(stmts)
    }

    /// `<stmt> ::= <simp stmt> | <struc stmt> | <code block>`
    fn parse_stmt(&mut self) -> CompileResult<Option<Stmt>> {
        // Inside a routine, a PROC or FUNC header starts the next routine,
        // not a statement.
        if self.parsing_routine.is_some()
            && (self.kind() == TokenKind::Proc
                || (self.current().is_fund_type() && self.peek_kind() == TokenKind::Func))
        {
            return Ok(None);
        }

        if let Some(stmt) = self.parse_simp_stmt()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_struc_stmt()? {
            return Ok(Some(stmt));
        }
        self.parse_code_block()
    }

    /// `<simp stmt> ::= <devprint> | <assign stmt> | <EXIT stmt> |
    ///                  <routine call> | <RETURN stmt>`
    fn parse_simp_stmt(&mut self) -> CompileResult<Option<Stmt>> {
        if let Some(stmt) = self.parse_devprint_stmt()? {
            return Ok(Some(stmt));
        }
        if let Some(stmt) = self.parse_assign_stmt()? {
            return Ok(Some(stmt));
        }
        if self.kind() == TokenKind::Exit {
            let loc = self.loc();
            self.advance();
            return Ok(Some(Stmt::Exit { loc }));
        }
        if let Some(call) = self.parse_routine_call()? {
            return Ok(Some(Stmt::Call(call)));
        }
        self.parse_return_stmt()
    }

    /// `DEVPRINT ( <arith exp> )` - the sole I/O primitive, a debug aid.
    fn parse_devprint_stmt(&mut self) -> CompileResult<Option<Stmt>> {
        if self.kind() != TokenKind::DevPrint {
            return Ok(None);
        }
        self.advance();
        self.consume(TokenKind::LParen)?;
        let expr = self.parse_arith_exp()?;
        self.consume(TokenKind::RParen)?;
        Ok(Some(Stmt::DevPrint(expr)))
    }

    /// `<assign stmt> ::= <mem contents> = <arith exp>` where
    /// `<mem contents>` is a plain variable, an array element, a pointer
    /// dereference, or a record field.
    fn parse_assign_stmt(&mut self) -> CompileResult<Option<Stmt>> {
        if self.kind() != TokenKind::Identifier {
            return Ok(None);
        }
        let name = self.current().value.clone().unwrap_or_default();
        let loc = self.loc();

        let Some((entry, _)) = self.symtab.find(&name) else {
            return Err(CompileError::identifier(
                format!("undefined identifier: {name}"),
                loc,
            ));
        };
        let EntryKind::Var(var_id) = entry.kind else {
            // Routines fall through to call parsing.
            return Ok(None);
        };
        let var_ty = self.vars[var_id.index()].ty.clone();

        let target = match self.peek_kind() {
            TokenKind::Eq => {
                self.advance();
                self.advance();
                let ty = match &var_ty {
                    Type::Record(_) => {
                        return Err(CompileError::type_error(
                            format!("cannot assign to record variable {name}"),
                            loc,
                        ));
                    },
                    Type::Array { .. } => {
                        return Err(CompileError::type_error(
                            format!("cannot assign to array variable {name}"),
                            loc,
                        ));
                    },
                    other => other
                        .fund()
                        .ok_or_else(|| CompileError::internal("scalar type without width"))?,
                };
                Expr::Var { id: var_id, ty }
            },
            TokenKind::LParen => {
                self.advance();
                self.advance();
                let index = self.parse_arith_exp()?;
                self.consume(TokenKind::RParen)?;
                self.consume(TokenKind::Eq)?;
                let Type::Array { elem, .. } = var_ty else {
                    return Err(CompileError::type_error(
                        format!("{name} is not an array"),
                        loc,
                    ));
                };
                Expr::Index {
                    var: var_id,
                    index: Box::new(index),
                    ty: elem,
                }
            },
            TokenKind::Caret => {
                self.advance();
                self.advance();
                self.consume(TokenKind::Eq)?;
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
                Expr::Deref { var: var_id, ty }
            },
            TokenKind::Dot => {
                self.advance();
                self.advance();
                let field_token = self.consume(TokenKind::Identifier)?;
                let field_name = field_token.value.clone().unwrap_or_default();
                self.consume(TokenKind::Eq)?;
                let Type::Record(record) = var_ty else {
                    return Err(CompileError::type_error(
                        format!("{name} is not a record"),
                        loc,
                    ));
                };
                let (offset, ty) =
                    self.records[record.index()].field(&field_name).ok_or_else(|| {
                        CompileError::identifier(
                            format!(
                                "record {} has no field named {field_name}",
                                self.records[record.index()].name
                            ),
                            field_token.loc,
                        )
                    })?;
                Expr::Field {
                    var: var_id,
                    offset,
                    ty,
                }
            },
            _ => return Ok(None),
        };

        let value = self.parse_arith_exp()?;
        Ok(Some(Stmt::Assign { target, value }))
    }

    /// `RETURN` in a PROC, `RETURN (<arith exp>)` in a FUNC.
    fn parse_return_stmt(&mut self) -> CompileResult<Option<Stmt>> {
        if self.kind() != TokenKind::Return {
            return Ok(None);
        }
        let loc = self.loc();
        self.advance();
        match self.parsing_routine {
            None => Err(CompileError::syntax("RETURN statement outside of a routine", loc)),
            Some(RoutineCategory::Proc) => {
                if self.kind() == TokenKind::LParen {
                    return Err(CompileError::syntax(
                        "RETURN with a value is not allowed in a PROC",
                        loc,
                    ));
                }
                Ok(Some(Stmt::Return(None)))
            },
            Some(RoutineCategory::Func) => {
                self.consume(TokenKind::LParen)?;
                let expr = self.parse_arith_exp()?;
                self.consume(TokenKind::RParen)?;
                Ok(Some(Stmt::Return(Some(expr))))
            },
        }
    }

    /// `<routine call> ::= <identifier> ( {<params>} )`
    ///
    /// Only recognised when the identifier resolves to a ROUTINE entry
    /// and is followed by `(`. Function calls are banned inside argument
    /// lists, matching the original language rule.
    pub(crate) fn parse_routine_call(&mut self) -> CompileResult<Option<CallExpr>> {
        if self.kind() != TokenKind::Identifier || self.peek_kind() != TokenKind::LParen {
            return Ok(None);
        }
        let name = self.current().value.clone().unwrap_or_default();
        let loc = self.loc();

        let Some((entry, _)) = self.symtab.find(&name) else {
            return Err(CompileError::identifier(
                format!("undefined identifier: {name}"),
                loc,
            ));
        };
        let EntryKind::Routine(routine) = entry.kind else {
            return Ok(None);
        };
        if self.parsing_param_decl {
            return Err(CompileError::syntax(
                "a function call may not be used as a parameter",
                loc,
            ));
        }
        self.advance();
        self.advance();
        let args = self.parse_params(routine)?;
        self.consume(TokenKind::RParen)?;
        Ok(Some(CallExpr {
            routine,
            args,
            return_type: self.routines[routine.index()].return_type,
        }))
    }

    /// `<params> ::= <arith exp> {,<arith exp>}`
    ///
    /// Too few arguments warns and zero-pads; too many is a hard error.
    fn parse_params(&mut self, routine: crate::ast::RoutineId) -> CompileResult<Vec<Expr>> {
        let expected = self.routines[routine.index()].params.len();
        let mut args = Vec::new();

        self.parsing_param_decl = true;
        let result = (|| -> CompileResult<()> {
            while self.kind() != TokenKind::RParen {
                args.push(self.parse_arith_exp()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            Ok(())
        })();
        self.parsing_param_decl = false;
        result?;

        if args.len() < expected {
            self.warn(format!(
                "too few parameters, expected {expected}, got {}, filling in remainder with zeros",
                args.len()
            ));
            while args.len() < expected {
                args.push(Expr::Const(NumericConst::new(0)));
            }
        } else if args.len() > expected {
            return Err(CompileError::syntax(
                format!("too many parameters, expected {expected}, got {}", args.len()),
                self.loc(),
            ));
        }
        Ok(args)
    }

    /// `<struc stmt> ::= <IF stmt> | <DO loop> | <WHILE loop> | <FOR loop>`
    fn parse_struc_stmt(&mut self) -> CompileResult<Option<Stmt>> {
        if let Some(stmt) = self.parse_if_stmt()? {
            return Ok(Some(stmt));
        }
        if let Some(body) = self.parse_do_loop()? {
            return Ok(Some(Stmt::Do(body)));
        }
        if let Some(stmt) = self.parse_while_loop()? {
            return Ok(Some(stmt));
        }
        self.parse_for_loop()
    }

    /// `IF <cond> THEN {stmts} {ELSEIF <cond> THEN {stmts}} {ELSE {stmts}} FI`
    fn parse_if_stmt(&mut self) -> CompileResult<Option<Stmt>> {
        if !self.eat(TokenKind::If) {
            return Ok(None);
        }
        let mut arms = Vec::new();

        let cond = self.parse_cond_exp()?;
        self.consume(TokenKind::Then)?;
        let body = self.parse_stmt_list()?;
        arms.push(Conditional { cond, body });

        while self.eat(TokenKind::ElseIf) {
            let cond = self.parse_cond_exp()?;
            self.consume(TokenKind::Then)?;
            let body = self.parse_stmt_list()?;
            arms.push(Conditional { cond, body });
        }

        let else_body = if self.eat(TokenKind::Else) {
            Some(self.parse_stmt_list()?)
        } else {
            None
        };

        self.consume(TokenKind::Fi)?;
        Ok(Some(Stmt::If { arms, else_body }))
    }

    /// `DO {stmts} {UNTIL <cond>} OD`
    fn parse_do_loop(&mut self) -> CompileResult<Option<DoLoop>> {
        if !self.eat(TokenKind::Do) {
            return Ok(None);
        }
        let body = self.parse_stmt_list()?;
        let until = if self.eat(TokenKind::Until) {
            Some(self.parse_cond_exp()?)
        } else {
            None
        };
        self.consume(TokenKind::Od)?;
        Ok(Some(DoLoop { body, until }))
    }

    /// `WHILE <cond> <DO loop>` - and yes, the DO loop may carry its own
    /// UNTIL.
    fn parse_while_loop(&mut self) -> CompileResult<Option<Stmt>> {
        if !self.eat(TokenKind::While) {
            return Ok(None);
        }
        let cond = self.parse_cond_exp()?;
        let body = self.parse_do_loop()?.ok_or_else(|| {
            CompileError::syntax("expected DO loop after WHILE", self.loc())
        })?;
        Ok(Some(Stmt::While { cond, body }))
    }

    /// `FOR <ident> = <start> TO <finish> {STEP <inc>} <DO loop>`
    fn parse_for_loop(&mut self) -> CompileResult<Option<Stmt>> {
        if !self.eat(TokenKind::For) {
            return Ok(None);
        }
        let name_token = self.consume(TokenKind::Identifier)?;
        let name = name_token.value.clone().unwrap_or_default();
        self.consume(TokenKind::Eq)?;
        let start = self.parse_arith_exp()?;
        self.consume(TokenKind::To)?;
        let finish = self.parse_arith_exp()?;
        let step = if self.eat(TokenKind::Step) {
            self.parse_arith_exp()?
        } else {
            Expr::Const(NumericConst::new(1))
        };
        let body = self.parse_do_loop()?.ok_or_else(|| {
            CompileError::syntax("expected DO loop after FOR", self.loc())
        })?;

        let Some((entry, _)) = self.symtab.find(&name) else {
            return Err(CompileError::identifier(
                format!("undefined identifier: {name}"),
                name_token.loc,
            ));
        };
        let EntryKind::Var(var) = entry.kind else {
            return Err(CompileError::identifier(
                format!("expected variable identifier: {name}"),
                name_token.loc,
            ));
        };
        let var_ty = self.vars[var.index()].ty.fund().ok_or_else(|| {
            CompileError::type_error(
                format!("FOR variable {name} must have a scalar type"),
                name_token.loc,
            )
        })?;

        Ok(Some(Stmt::For {
            var,
            var_ty,
            start,
            finish,
            step,
            body,
        }))
    }

    /// `<code block> ::= [ <comp const list> ]` - inline machine code.
    fn parse_code_block(&mut self) -> CompileResult<Option<Stmt>> {
        if !self.eat(TokenKind::LBrack) {
            return Ok(None);
        }
        let mut values = Vec::new();
        while let Some(value) = self.parse_comp_const()? {
            values.push(value);
        }
        self.consume(TokenKind::RBrack)?;
        Ok(Some(Stmt::CodeBlock(values)))
    }

    /// A conditional expression: any scalar expression, tested against
    /// zero at runtime.
    pub(crate) fn parse_cond_exp(&mut self) -> CompileResult<Expr> {
        let loc = self.loc();
        self.parse_expression()?
            .ok_or_else(|| CompileError::syntax("expected conditional expression", loc))
    }

    /// An arithmetic expression: rejects a top-level relational operator.
    pub(crate) fn parse_arith_exp(&mut self) -> CompileResult<Expr> {
        let loc = self.loc();
        let expr = self
            .parse_expression()?
            .ok_or_else(|| CompileError::syntax("expected arithmetic expression", loc.clone()))?;
        if expr.is_relational() {
            return Err(CompileError::type_error(
                "conditional expression not allowed here",
                loc,
            ));
        }
        Ok(expr)
    }
}

// =============================================================================
// TESTS
// =============================================================================
