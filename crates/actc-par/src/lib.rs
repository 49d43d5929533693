//! actc-par - Parser for the Action! language.
//!
//! Primarily a recursive-descent parser; expressions go through a Pratt
//! precedence-climbing driver (see [`pratt`]). Parsing builds three flat
//! arenas (variables, routines, record types), populates the scope-tree
//! symbol table, and performs the type checking the language needs:
//! implicit numeric promotion, relational-vs-arithmetic context checks,
//! and identifier-kind disambiguation.
//!
//! The parser aborts on the first error. Recoverable oddities (too few
//! call arguments, array dimension mismatches) are reported as warnings
//! through the shared [`Handler`] and parsing continues.

pub mod ast;
pub mod pratt;
pub mod symtab;
pub mod types;

mod decl;
mod expr;
mod stmt;

use actc_lex::{Token, TokenKind};
use actc_util::{CompileError, CompileResult, Handler, SourceLoc};

use crate::ast::{Ast, Module, Routine, VarDecl};

/// Whether the routine being parsed is a PROC or a FUNC; RETURN parsing
/// depends on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutineCategory {
    Proc,
    Func,
}

/// The parser state for one compilation unit.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    handler: &'a mut Handler,

    // Arenas under construction.
    pub(crate) vars: Vec<VarDecl>,
    pub(crate) routines: Vec<Routine>,
    pub(crate) records: Vec<RecordDef>,
    pub(crate) symtab: SymbolTable,

    // Parsing state.
    pub(crate) parsing_param_decl: bool,
    pub(crate) parsing_routine: Option<RoutineCategory>,
}

impl<'a> Parser<'a> {
    /// Creates a parser over a token stream. The stream is normally
    /// EOF-terminated by the lexer; a missing terminator is tolerated.
    pub fn new(mut tokens: Vec<Token>, handler: &'a mut Handler) -> Self {
        let terminated = tokens.last().is_some_and(|t| t.kind == TokenKind::Eof);
        if !terminated {
            let loc = tokens
                .last()
                .map(|t| t.loc.clone())
                .unwrap_or_else(|| SourceLoc::start_of("<input>"));
            tokens.push(Token::new(TokenKind::Eof, None, loc));
        }
        Self {
            tokens,
            pos: 0,
            handler,
            vars: Vec::new(),
            routines: Vec::new(),
            records: Vec::new(),
            symtab: SymbolTable::new(),
            parsing_param_decl: false,
            parsing_routine: None,
        }
    }

    // =========================================================================
    // TOKEN CURSOR
    // =========================================================================

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    pub(crate) fn kind(&self) -> TokenKind {
        self.current().kind
    }

    pub(crate) fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    pub(crate) fn loc(&self) -> SourceLoc {
        self.current().loc.clone()
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// Consumes a token of the expected kind or fails with a syntax error.
    pub(crate) fn consume(&mut self, kind: TokenKind) -> CompileResult<Token> {
        if self.kind() != kind {
            return Err(CompileError::syntax(
                format!("expected {:?}, got {:?}", kind, self.kind()),
                self.loc(),
            ));
        }
        Ok(self.advance())
    }

    /// Consumes the current token when it matches.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        let loc = self.loc();
        self.handler.warn(message, loc);
    }

    // =========================================================================
    // PROGRAM STRUCTURE
    // =========================================================================

    /// `<program> ::= {MODULE} <prog module> (MODULE <prog module>)*`
    pub fn parse_program(mut self) -> CompileResult<Ast> {
        let mut modules = Vec::new();

        // The first MODULE keyword is optional.
        self.eat(TokenKind::Module);
        modules.push(self.parse_prog_module()?);

        while self.eat(TokenKind::Module) {
            self.parsing_routine = None;
            modules.push(self.parse_prog_module()?);
        }

        if self.kind() != TokenKind::Eof {
            return Err(CompileError::syntax(
                format!("unexpected token {:?}", self.kind()),
                self.loc(),
            ));
        }

        Ok(Ast {
            modules,
            vars: self.vars,
            routines: self.routines,
            records: self.records,
            symtab: self.symtab,
        })
    }

    /// `<prog module> ::= {<system decls>} <routine list>`
    fn parse_prog_module(&mut self) -> CompileResult<Module> {
        let decls = self.parse_system_decls()?;
        let routines = self.parse_routine_list()?;
        Ok(Module { decls, routines })
    }

    fn parse_routine_list(&mut self) -> CompileResult<Vec<RoutineId>> {
        let mut routines = Vec::new();
        while let Some(id) = self.parse_routine()? {
            routines.push(id);
        }
        Ok(routines)
    }

    /// `<routine> ::= (PROC <ident> | <fund type> FUNC <ident>) {=<addr>}
    ///                ({<param decls>}) {<system decls>} {<stmt list>}`
    ///
    /// The closing RETURN is an ordinary statement: routines may fall
    /// through, and the emitter plants a synthetic return when they do.
    fn parse_routine(&mut self) -> CompileResult<Option<RoutineId>> {
        let loc = self.loc();
        let return_type = if self.eat(TokenKind::Proc) {
            FundamentalType::Void
        } else if self.current().is_fund_type() && self.peek_kind() == TokenKind::Func {
            let t = self
                .parse_fund_type()
                .ok_or_else(|| CompileError::internal("fund type vanished before FUNC"))?;
            self.consume(TokenKind::Func)?;
            t
        } else {
            return Ok(None);
        };

        let name_token = self.consume(TokenKind::Identifier)?;
        let name = name_token.value.clone().unwrap_or_default();

        let fixed_addr = if self.eat(TokenKind::Eq) {
            Some(self.parse_addr()?)
        } else {
            None
        };

        self.parsing_routine = Some(if return_type == FundamentalType::Void {
            RoutineCategory::Proc
        } else {
            RoutineCategory::Func
        });

        // The routine scope opens at the parameter list and closes when
        // control returns to the outer parser state.
        self.symtab.open_scope();

        self.consume(TokenKind::LParen)?;
        let params = self.parse_param_decls()?;
        self.consume(TokenKind::RParen)?;

        let decls = self
            .parse_system_decls()?
            .into_iter()
            .filter_map(|decl| match decl {
                ast::Decl::Var(id) => Some(id),
                ast::Decl::Record(_) => None,
            })
            .collect();

        let body = self.parse_stmt_list()?;

        self.symtab.close_scope()?;
        self.parsing_routine = None;

        let id = RoutineId(self.routines.len() as u32);
        self.routines.push(Routine {
            name: name.clone(),
            params,
            decls,
            body,
            fixed_addr,
            return_type,
            loc: loc.clone(),
        });
        self.symtab.add(&name, EntryKind::Routine(id), &loc)?;
        Ok(Some(id))
    }

    /// `<param decls> ::= <param decl> {,<param decl>}`
    ///
    /// Parameters may not carry initializers, and record types are
    /// rejected outright.
    fn parse_param_decls(&mut self) -> CompileResult<Vec<VarId>> {
        if self.parsing_param_decl {
            return Err(CompileError::internal(
                "nested parameter declarations should be unreachable",
            ));
        }
        self.parsing_param_decl = true;

        let mut params: Vec<VarId> = Vec::new();
        while self.kind() != TokenKind::RParen && self.kind() != TokenKind::Eof {
            match self.parse_var_decl(false)? {
                Some(ids) => params.extend(ids),
                None => {
                    self.parsing_param_decl = false;
                    return Err(CompileError::syntax(
                        "expected parameter declaration",
                        self.loc(),
                    ));
                },
            }
            self.eat(TokenKind::Comma);
        }
        self.parsing_param_decl = false;

        for &id in &params {
            let decl = &self.vars[id.index()];
            if matches!(decl.ty, Type::Record(_)) {
                return Err(CompileError::type_error(
                    format!("record type may not be used as a parameter: {}", decl.name),
                    decl.loc.clone(),
                ));
            }
        }
        Ok(params)
    }

    // =========================================================================
    // SHARED SMALL PARSERS
    // =========================================================================

    /// `<fund type> ::= CARD | CHAR | BYTE | INT`
    pub(crate) fn parse_fund_type(&mut self) -> Option<FundamentalType> {
        let t = match self.kind() {
            TokenKind::Byte => FundamentalType::Byte,
            TokenKind::Char => FundamentalType::Char,
            TokenKind::Int => FundamentalType::Int,
            TokenKind::Card => FundamentalType::Card,
            _ => return None,
        };
        self.advance();
        Some(t)
    }

    /// A compile-time constant: decimal, hex, or character literal.
    pub(crate) fn parse_comp_const(&mut self) -> CompileResult<Option<i32>> {
        match self.kind() {
            TokenKind::IntLiteral | TokenKind::HexLiteral | TokenKind::CharLiteral => {
                let value = self.current().int_value()?;
                if !(-65535..=65535).contains(&value) {
                    return Err(CompileError::syntax(
                        format!("numeric literal {value} out of range [-65535, 65535]"),
                        self.loc(),
                    ));
                }
                self.advance();
                Ok(Some(value))
            },
            _ => Ok(None),
        }
    }

    /// `<addr> ::= <comp const>`, constrained to the 64 KiB address space.
    pub(crate) fn parse_addr(&mut self) -> CompileResult<u16> {
        let loc = self.loc();
        let value = self
            .parse_comp_const()?
            .ok_or_else(|| CompileError::syntax("expected constant value for address", loc.clone()))?;
        u16::try_from(value)
            .map_err(|_| CompileError::syntax(format!("address {value} out of range"), loc))
    }

    /// Where a variable declared right now will live.
    pub(crate) fn current_placement(&self) -> ast::Placement {
        if self.parsing_param_decl {
            ast::Placement::Param
        } else if self.parsing_routine.is_some() {
            ast::Placement::Local
        } else {
            ast::Placement::Global
        }
    }
}

pub use ast::{
    BinOp, CallExpr, Conditional, Decl, DoLoop, Expr, InitOpts, NumericConst, Placement,
    RefTarget, RoutineId, VarId,
};
pub use symtab::{Entry, EntryKind, ScopeId, SymbolTable};
pub use types::{promote, FundamentalType, Pointee, RecordDef, RecordId, Type};

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use actc_lex::{tokenize, DefineStack};

    /// Parses a source snippet, panicking on error.
    pub fn parse(source: &str) -> Ast {
        let mut handler = Handler::new();
        parse_with(source, &mut handler).expect("parse failed")
    }

    /// Parses a source snippet, returning the error.
    pub fn parse_err(source: &str) -> CompileError {
        let mut handler = Handler::new();
        parse_with(source, &mut handler).expect_err("parse unexpectedly succeeded")
    }

    pub fn parse_with(source: &str, handler: &mut Handler) -> CompileResult<Ast> {
        let tokens = tokenize(source, "<test>", &DefineStack::new())?;
        Parser::new(tokens, handler).parse_program()
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::{parse, parse_err};
    use super::*;

    #[test]
    fn test_empty_program() {
        let ast = parse("");
        assert_eq!(ast.modules.len(), 1);
        assert!(ast.modules[0].decls.is_empty());
        assert!(ast.modules[0].routines.is_empty());
    }

    #[test]
    fn test_optional_module_keyword() {
        let ast = parse("MODULE BYTE x PROC main() RETURN");
        assert_eq!(ast.modules.len(), 1);
        assert_eq!(ast.modules[0].decls.len(), 1);
        assert_eq!(ast.modules[0].routines.len(), 1);
    }

    #[test]
    fn test_multiple_modules() {
        let ast = parse("BYTE x PROC a() RETURN MODULE BYTE y PROC b() RETURN");
        assert_eq!(ast.modules.len(), 2);
        assert_eq!(ast.routines.len(), 2);
    }

    #[test]
    fn test_proc_and_func_return_types() {
        let ast = parse("PROC p() RETURN INT FUNC f() RETURN (1)");
        assert_eq!(ast.routines[0].return_type, FundamentalType::Void);
        assert_eq!(ast.routines[1].return_type, FundamentalType::Int);
        assert!(!ast.routines[0].is_func());
        assert!(ast.routines[1].is_func());
    }

    #[test]
    fn test_routine_fixed_address() {
        let ast = parse("PROC p=$4000() RETURN");
        assert_eq!(ast.routines[0].fixed_addr, Some(0x4000));
    }

    #[test]
    fn test_last_routine_is_entry_point() {
        let ast = parse("PROC a() RETURN PROC main() RETURN");
        let entry = ast.symtab.last_routine().unwrap();
        assert_eq!(ast.routine(entry).name, "main");
    }

    #[test]
    fn test_params_and_locals_placement() {
        let ast = parse("PROC p(BYTE a, INT b) CARD c RETURN");
        let routine = &ast.routines[0];
        assert_eq!(routine.params.len(), 2);
        assert_eq!(routine.decls.len(), 1);
        assert_eq!(ast.var(routine.params[0]).placement, Placement::Param);
        assert_eq!(ast.var(routine.params[1]).placement, Placement::Param);
        assert_eq!(ast.var(routine.decls[0]).placement, Placement::Local);
    }

    #[test]
    fn test_routine_scope_allows_shadowing() {
        let ast = parse("BYTE x PROC p(BYTE x) RETURN");
        assert_eq!(ast.vars.len(), 2);
    }

    #[test]
    fn test_duplicate_global_rejected() {
        let err = parse_err("BYTE x CARD x");
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_record_parameter_rejected() {
        let err = parse_err("TYPE Pt = [BYTE x] PROC p(Pt q) RETURN");
        assert!(err.to_string().contains("parameter"));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let err = parse_err("PROC p() RETURN ]");
        assert!(err.to_string().contains("unexpected token"));
    }

    #[test]
    fn test_parser_determinism() {
        let source = "BYTE b=[5] INT i PROC main() i = b + 1000 RETURN";
        let a = parse(source);
        let b = parse(source);
        assert_eq!(format!("{:?}", a.modules), format!("{:?}", b.modules));
        assert_eq!(a.vars.len(), b.vars.len());
        assert_eq!(a.routines.len(), b.routines.len());
    }
}
