//! Declaration parsing: TYPE declarations and the four variable
//! declaration families (fundamental, pointer, array, record).
//!
//! Repetition is handled at the call sites rather than encoded in
//! right-recursive rules, and a single declaration can introduce several
//! variables (`BYTE x, y = [5], z`). Pointer and array declarations are
//! tried before fundamental ones because they share the leading type
//! token.

use actc_lex::TokenKind;
use actc_util::{CompileError, CompileResult};

use crate::ast::{Decl, InitOpts, VarDecl, VarId};
use crate::symtab::EntryKind;
use crate::types::{FundamentalType, Pointee, RecordDef, RecordId, Type};
use crate::Parser;

impl<'a> Parser<'a> {
    /// `<system decls> ::= {<TYPE decl> | <var decl>}`
    pub(crate) fn parse_system_decls(&mut self) -> CompileResult<Vec<Decl>> {
        let mut decls = Vec::new();
        loop {
            if let Some(record) = self.parse_type_decl()? {
                decls.push(Decl::Record(record));
                continue;
            }
            match self.parse_var_decl(true)? {
                Some(ids) => decls.extend(ids.into_iter().map(Decl::Var)),
                None => break,
            }
        }
        Ok(decls)
    }

    /// `<TYPE decl> ::= TYPE <identifier> = [ <field list> ]`
    ///
    /// Field lists reuse fundamental declaration syntax without
    /// initializers; an empty record is an error, matching the original
    /// Action! compiler.
    fn parse_type_decl(&mut self) -> CompileResult<Option<RecordId>> {
        if self.kind() != TokenKind::Type {
            return Ok(None);
        }
        self.advance();
        let name_token = self.consume(TokenKind::Identifier)?;
        let name = name_token.value.clone().unwrap_or_default();
        self.consume(TokenKind::Eq)?;
        self.consume(TokenKind::LBrack)?;

        let mut record = RecordDef::new(name.clone());
        while let Some(field_type) = self.parse_fund_type() {
            loop {
                let field_token = self.consume(TokenKind::Identifier)?;
                let field_name = field_token.value.clone().unwrap_or_default();
                if !record.add_field(&field_name, field_type) {
                    return Err(CompileError::identifier(
                        format!("duplicate field {field_name} in record {name}"),
                        field_token.loc,
                    ));
                }
                if self.kind() == TokenKind::Comma && self.peek_kind() == TokenKind::Identifier {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if record.fields().is_empty() {
            return Err(CompileError::syntax("empty record declaration", self.loc()));
        }
        self.consume(TokenKind::RBrack)?;

        let id = RecordId(self.records.len() as u32);
        self.records.push(record);
        self.symtab.add(&name, EntryKind::Record(id), &name_token.loc)?;
        Ok(Some(id))
    }

    /// `<var decl> ::= <POINTER decl> | <ARRAY decl> | <fund decl> | <record decl>`
    pub(crate) fn parse_var_decl(&mut self, allow_init: bool) -> CompileResult<Option<Vec<VarId>>> {
        if let Some(ids) = self.parse_pointer_decl(allow_init)? {
            return Ok(Some(ids));
        }
        if let Some(ids) = self.parse_array_decl(allow_init)? {
            return Ok(Some(ids));
        }
        if let Some(ids) = self.parse_fund_decl(allow_init)? {
            return Ok(Some(ids));
        }
        if let Some(ids) = self.parse_record_decl()? {
            return Ok(Some(ids));
        }
        Ok(None)
    }

    /// Registers a freshly parsed declaration in the arena and the current
    /// scope.
    fn declare_var(&mut self, decl: VarDecl) -> CompileResult<VarId> {
        let id = VarId(self.vars.len() as u32);
        let name = decl.name.clone();
        let loc = decl.loc.clone();
        self.vars.push(decl);
        self.symtab.add(&name, EntryKind::Var(id), &loc)?;
        Ok(id)
    }

    // =========================================================================
    // FUNDAMENTAL DECLARATIONS
    // =========================================================================

    /// `<fund decl> ::= <fund type> <fund ident list>`
    fn parse_fund_decl(&mut self, allow_init: bool) -> CompileResult<Option<Vec<VarId>>> {
        // A fund type followed by FUNC is a routine declaration.
        if self.current().is_fund_type() && self.peek_kind() == TokenKind::Func {
            return Ok(None);
        }
        let Some(fund_type) = self.parse_fund_type() else {
            return Ok(None);
        };

        // `INT x, y = [1], z` - one type, several identifiers.
        let mut ids = Vec::new();
        loop {
            ids.push(self.parse_fund_ident(fund_type, allow_init)?);
            if self.kind() == TokenKind::Comma && self.peek_kind() == TokenKind::Identifier {
                self.advance();
            } else {
                break;
            }
        }
        Ok(Some(ids))
    }

    /// `<fund ident> ::= <identifier> {=<init opts>}`
    fn parse_fund_ident(
        &mut self,
        fund_type: FundamentalType,
        allow_init: bool,
    ) -> CompileResult<VarId> {
        let name_token = self.consume(TokenKind::Identifier)?;
        let init = self.parse_init_opts(allow_init)?;
        self.declare_var(VarDecl {
            name: name_token.value.clone().unwrap_or_default(),
            ty: Type::Fund(fund_type),
            init,
            placement: self.current_placement(),
            loc: name_token.loc,
        })
    }

    /// `<init opts> ::= [<value>] | <addr>`
    ///
    /// The bracketed form is an initial value; the bare form records a
    /// fixed memory address and suppresses storage emission.
    fn parse_init_opts(&mut self, allow_init: bool) -> CompileResult<Option<InitOpts>> {
        if self.kind() != TokenKind::Eq {
            return Ok(None);
        }
        if !allow_init {
            return Err(CompileError::syntax(
                "declaration may not have an initial value",
                self.loc(),
            ));
        }
        self.advance();
        if self.eat(TokenKind::LBrack) {
            let loc = self.loc();
            let value = self
                .parse_comp_const()?
                .ok_or_else(|| CompileError::syntax("expected constant initial value", loc))?;
            self.consume(TokenKind::RBrack)?;
            Ok(Some(InitOpts {
                values: vec![value],
                is_address: false,
            }))
        } else {
            let addr = self.parse_addr()?;
            Ok(Some(InitOpts {
                values: vec![i32::from(addr)],
                is_address: true,
            }))
        }
    }

    // =========================================================================
    // POINTER DECLARATIONS
    // =========================================================================

    /// `<POINTER decl> ::= <ptr type> POINTER <ptr ident list>`
    fn parse_pointer_decl(&mut self, allow_init: bool) -> CompileResult<Option<Vec<VarId>>> {
        if self.peek_kind() != TokenKind::Pointer {
            return Ok(None);
        }
        let pointee = self.parse_pointee()?.ok_or_else(|| {
            CompileError::syntax(
                "expected fundamental or record type in pointer declaration",
                self.loc(),
            )
        })?;
        self.consume(TokenKind::Pointer)?;

        let mut ids = Vec::new();
        loop {
            ids.push(self.parse_ptr_ident(pointee, allow_init)?);
            if self.kind() == TokenKind::Comma && self.peek_kind() == TokenKind::Identifier {
                self.advance();
            } else {
                break;
            }
        }
        Ok(Some(ids))
    }

    /// `<ptr type> ::= <fund type> | <record type>`
    fn parse_pointee(&mut self) -> CompileResult<Option<Pointee>> {
        if let Some(fund) = self.parse_fund_type() {
            return Ok(Some(Pointee::Fund(fund)));
        }
        Ok(self.parse_record_type().map(Pointee::Record))
    }

    /// `<ptr ident> ::= <identifier> {=<value>}`
    ///
    /// A pointer initializer is the pointed-to address stored as the
    /// pointer's 2-byte value; it is not the fixed-address form.
    fn parse_ptr_ident(&mut self, pointee: Pointee, allow_init: bool) -> CompileResult<VarId> {
        let name_token = self.consume(TokenKind::Identifier)?;
        let init = if self.kind() == TokenKind::Eq {
            if !allow_init {
                return Err(CompileError::syntax(
                    "declaration may not have an initial value",
                    self.loc(),
                ));
            }
            self.advance();
            let loc = self.loc();
            let value = self.parse_comp_const()?.ok_or_else(|| {
                CompileError::syntax("expected constant value in pointer declaration", loc)
            })?;
            Some(InitOpts {
                values: vec![value],
                is_address: false,
            })
        } else {
            None
        };
        self.declare_var(VarDecl {
            name: name_token.value.clone().unwrap_or_default(),
            ty: Type::Pointer(pointee),
            init,
            placement: self.current_placement(),
            loc: name_token.loc,
        })
    }

    // =========================================================================
    // ARRAY DECLARATIONS
    // =========================================================================

    /// `<ARRAY decl> ::= <fund type> ARRAY <arr ident list>`
    fn parse_array_decl(&mut self, allow_init: bool) -> CompileResult<Option<Vec<VarId>>> {
        if self.peek_kind() != TokenKind::Array {
            return Ok(None);
        }
        let elem = self.parse_fund_type().ok_or_else(|| {
            CompileError::syntax("expected fundamental type in array declaration", self.loc())
        })?;
        self.consume(TokenKind::Array)?;

        let mut ids = Vec::new();
        loop {
            ids.push(self.parse_arr_ident(elem, allow_init)?);
            if self.kind() == TokenKind::Comma && self.peek_kind() == TokenKind::Identifier {
                self.advance();
            } else {
                break;
            }
        }
        Ok(Some(ids))
    }

    /// `<arr ident> ::= <identifier> {(<dim>)} {=<arr init opts>}`
    fn parse_arr_ident(
        &mut self,
        elem: FundamentalType,
        allow_init: bool,
    ) -> CompileResult<VarId> {
        let name_token = self.consume(TokenKind::Identifier)?;
        let dim = self.parse_dimension()?;
        let init = self.parse_arr_init_opts(allow_init)?;

        match (&dim, &init) {
            (None, None) => {
                self.warn("array declaration has no dimensions or initialization");
            },
            (Some(dim), Some(init)) if !init.is_address => {
                let count = init.values.len();
                if usize::from(*dim) != count {
                    self.warn(format!(
                        "array dimension {dim} does not match initialization length {count}, \
                         allocating from the initialization length"
                    ));
                }
            },
            _ => {},
        }

        self.declare_var(VarDecl {
            name: name_token.value.clone().unwrap_or_default(),
            ty: Type::Array { elem, len: dim },
            init,
            placement: self.current_placement(),
            loc: name_token.loc,
        })
    }

    /// `{(<dim>)}`
    fn parse_dimension(&mut self) -> CompileResult<Option<u16>> {
        if !self.eat(TokenKind::LParen) {
            return Ok(None);
        }
        let loc = self.loc();
        let dim = self
            .parse_comp_const()?
            .ok_or_else(|| CompileError::syntax("expected constant value in array dimension", loc.clone()))?;
        let dim = u16::try_from(dim)
            .map_err(|_| CompileError::syntax(format!("array dimension {dim} out of range"), loc))?;
        self.consume(TokenKind::RParen)?;
        Ok(Some(dim))
    }

    /// `<arr init opts> ::= [<value list>] | <str const> | <addr>`
    fn parse_arr_init_opts(&mut self, allow_init: bool) -> CompileResult<Option<InitOpts>> {
        if self.kind() != TokenKind::Eq {
            return Ok(None);
        }
        if !allow_init {
            return Err(CompileError::syntax(
                "declaration may not have an initial value",
                self.loc(),
            ));
        }
        self.advance();

        if self.eat(TokenKind::LBrack) {
            let mut values = Vec::new();
            while self.kind() != TokenKind::RBrack {
                let loc = self.loc();
                let value = self.parse_comp_const()?.ok_or_else(|| {
                    CompileError::syntax("expected constant value in array initialization", loc)
                })?;
                values.push(value);
                // Commas between values are optional, trailing commas
                // included.
                self.eat(TokenKind::Comma);
            }
            self.consume(TokenKind::RBrack)?;
            return Ok(Some(InitOpts {
                values,
                is_address: false,
            }));
        }

        if self.kind() == TokenKind::StringLiteral {
            let token = self.advance();
            let payload = token.value.unwrap_or_default();
            // Length byte first, then the character payload.
            let mut values = vec![payload.len() as i32];
            values.extend(payload.chars().map(|c| c as i32));
            return Ok(Some(InitOpts {
                values,
                is_address: false,
            }));
        }

        let addr = self.parse_addr()?;
        Ok(Some(InitOpts {
            values: vec![i32::from(addr)],
            is_address: true,
        }))
    }

    // =========================================================================
    // RECORD-TYPED DECLARATIONS
    // =========================================================================

    /// `<record type> ::= <identifier>` naming a declared TYPE.
    pub(crate) fn parse_record_type(&mut self) -> Option<RecordId> {
        if self.kind() != TokenKind::Identifier {
            return None;
        }
        let name = self.current().value.as_deref()?;
        match self.symtab.find(name) {
            Some((entry, _)) => match entry.kind {
                EntryKind::Record(id) => {
                    self.advance();
                    Some(id)
                },
                _ => None,
            },
            None => None,
        }
    }

    /// `<record decl> ::= <record type> <rec ident list>`
    fn parse_record_decl(&mut self) -> CompileResult<Option<Vec<VarId>>> {
        let Some(record) = self.parse_record_type() else {
            return Ok(None);
        };

        let mut ids = Vec::new();
        loop {
            ids.push(self.parse_rec_ident(record)?);
            if self.kind() == TokenKind::Comma && self.peek_kind() == TokenKind::Identifier {
                self.advance();
            } else {
                break;
            }
        }
        Ok(Some(ids))
    }

    /// `<rec ident> ::= <identifier> {=<address>}`
    fn parse_rec_ident(&mut self, record: RecordId) -> CompileResult<VarId> {
        let name_token = self.consume(TokenKind::Identifier)?;
        let init = if self.eat(TokenKind::Eq) {
            let addr = self.parse_addr()?;
            Some(InitOpts {
                values: vec![i32::from(addr)],
                is_address: true,
            })
        } else {
            None
        };
        self.declare_var(VarDecl {
            name: name_token.value.clone().unwrap_or_default(),
            ty: Type::Record(record),
            init,
            placement: self.current_placement(),
            loc: name_token.loc,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
