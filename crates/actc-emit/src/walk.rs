//! The AST walker that produces the program image.
//!
//! Globals are emitted as raw data in declaration order; routines follow
//! in source order. Address assignment happens here: globals get absolute
//! addresses in the program partition, parameters negative frame offsets,
//! locals non-negative ones. Forward references (calls and `@routine`
//! before the target's address is known) go through a fix-up list that is
//! resolved after the walk; loop exits use a stack of patch lists.

use actc_par::ast::{
    Ast, CallExpr, Decl, Expr, RefTarget, RoutineId, Stmt, VarDecl, VarId,
};
use actc_par::types::{FundamentalType, Type};
use actc_util::{CompileError, CompileResult};

use crate::codegen::CodeGen;
use crate::layout::{MAX_PROGRAM_SIZE, START_PROGRAM};
use crate::opcode::{AddrMode, ByteCodeOp, VarScope};

/// The finished program: image bytes plus the absolute entry address
/// (the last routine declared in the program scope, absent when the
/// program declares no routines).
#[derive(Debug)]
pub struct ProgramImage {
    pub code: Vec<u8>,
    pub entry: Option<u16>,
}

/// A resolved variable address: absolute for globals and fixed-address
/// declarations, frame-relative for parameters and locals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VarSlot {
    Global(u16),
    Frame(i16),
}

/// A pending patch for a routine whose address was unknown at emit time.
enum Fixup {
    Call {
        locals_pos: u16,
        target_pos: u16,
        routine: RoutineId,
    },
    Load {
        addr_pos: u16,
        routine: RoutineId,
    },
}

/// Walks one AST and accumulates the program image.
pub struct Emitter<'a> {
    ast: &'a Ast,
    gen: CodeGen,
    var_slots: Vec<Option<VarSlot>>,
    routine_addrs: Vec<Option<u16>>,
    routine_locals: Vec<Option<u16>>,
    fixups: Vec<Fixup>,
    /// One list per open loop; EXIT appends, loop close patches.
    loop_exits: Vec<Vec<u16>>,
    current_return: FundamentalType,
    entry: Option<u16>,
}

/// Emits a complete program image for a parsed AST.
pub fn emit(ast: &Ast) -> CompileResult<ProgramImage> {
    let mut emitter = Emitter::new(ast);
    emitter.run()?;
    Ok(emitter.into_image())
}

impl<'a> Emitter<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            gen: CodeGen::new(),
            var_slots: vec![None; ast.vars.len()],
            routine_addrs: vec![None; ast.routines.len()],
            routine_locals: vec![None; ast.routines.len()],
            fixups: Vec::new(),
            loop_exits: Vec::new(),
            current_return: FundamentalType::Void,
            entry: None,
        }
    }

    pub fn run(&mut self) -> CompileResult<()> {
        for module in &self.ast.modules {
            for decl in &module.decls {
                if let Decl::Var(id) = decl {
                    self.emit_global_data(*id)?;
                    self.check_image_size()?;
                }
            }
            for &routine in &module.routines {
                self.walk_routine(routine)?;
                self.check_image_size()?;
            }
        }
        self.resolve_fixups()?;

        self.entry = self
            .ast
            .symtab
            .last_routine()
            .and_then(|id| self.routine_addrs[id.index()]);
        Ok(())
    }

    pub fn into_image(self) -> ProgramImage {
        ProgramImage {
            code: self.gen.into_code(),
            entry: self.entry,
        }
    }

    /// Absolute address of the next instruction to be emitted.
    fn here(&self) -> u16 {
        START_PROGRAM + self.gen.next_addr()
    }

    /// Checked after every declaration and routine so image offsets can
    /// never wrap the 16-bit address space.
    fn check_image_size(&self) -> CompileResult<()> {
        if self.gen.code().len() > MAX_PROGRAM_SIZE {
            return Err(CompileError::internal(format!(
                "program image of {} bytes exceeds the {MAX_PROGRAM_SIZE}-byte program partition",
                self.gen.code().len()
            )));
        }
        Ok(())
    }

    // =========================================================================
    // ADDRESS RESOLUTION
    // =========================================================================

    fn slot(&self, id: VarId) -> CompileResult<(VarScope, u16)> {
        match self.var_slots[id.index()] {
            Some(VarSlot::Global(addr)) => Ok((VarScope::Global, addr)),
            Some(VarSlot::Frame(offset)) if offset < 0 => Ok((VarScope::Param, offset as u16)),
            Some(VarSlot::Frame(offset)) => Ok((VarScope::Local, offset as u16)),
            None => Err(CompileError::internal(format!(
                "variable {} referenced before its address was assigned",
                self.ast.var(id).name
            ))),
        }
    }

    /// The slot shifted by a record field offset.
    fn slot_shifted(&self, id: VarId, offset: u16) -> CompileResult<(VarScope, u16)> {
        match self.var_slots[id.index()] {
            Some(VarSlot::Global(addr)) => Ok((VarScope::Global, addr + offset)),
            Some(VarSlot::Frame(frame)) => {
                let shifted = frame + offset as i16;
                Ok((
                    if shifted < 0 {
                        VarScope::Param
                    } else {
                        VarScope::Local
                    },
                    shifted as u16,
                ))
            },
            None => Err(CompileError::internal(format!(
                "variable {} referenced before its address was assigned",
                self.ast.var(id).name
            ))),
        }
    }

    /// Bytes a declaration occupies in storage. Arrays size from their
    /// initializer when the declared dimension disagrees or is absent.
    fn storage_size(&self, decl: &VarDecl) -> u16 {
        match &decl.ty {
            Type::Array { elem, len } => {
                let count = match &decl.init {
                    Some(init) if !init.is_address => init.values.len() as u16,
                    _ => len.unwrap_or(0),
                };
                count * elem.size_bytes()
            },
            ty => ty.size_bytes(&self.ast.records),
        }
    }

    /// Widens or narrows the value on top of the work stack when the
    /// destination width differs. INT and CARD share a representation, so
    /// equal widths need no instruction.
    fn cast_to(&mut self, from: FundamentalType, to: FundamentalType) {
        if from.size_bytes() != to.size_bytes() {
            self.gen.emit_cast(from, to);
        }
    }

    // =========================================================================
    // GLOBAL DATA
    // =========================================================================

    /// Emits storage for one module-scope declaration, zero-initialized
    /// unless an initializer is present. Fixed-address declarations emit
    /// nothing and keep their declared address.
    fn emit_global_data(&mut self, id: VarId) -> CompileResult<()> {
        let decl = self.ast.var(id);

        if let Some(init) = &decl.init {
            if init.is_address {
                self.var_slots[id.index()] = Some(VarSlot::Global(init.values[0] as u16));
                return Ok(());
            }
        }

        let offset = match &decl.ty {
            Type::Array { elem, len } => {
                let values: Vec<i32> = match (&decl.init, len) {
                    (Some(init), _) => init.values.clone(),
                    (None, Some(n)) => vec![0; *n as usize],
                    // Legal but unusual: no dimension and no initializer,
                    // the variable just names the current address.
                    (None, None) => Vec::new(),
                };
                if elem.size_bytes() == 1 {
                    self.gen.emit_bytes(&values)
                } else {
                    self.gen.emit_shorts(&values)
                }
            },
            Type::Pointer(_) => {
                let values = decl
                    .init
                    .as_ref()
                    .map_or_else(|| vec![0], |init| init.values.clone());
                self.gen.emit_shorts(&values)
            },
            Type::Record(record) => {
                let size = self.ast.record(*record).size_bytes();
                self.gen.emit_bytes(&vec![0; size as usize])
            },
            Type::Fund(fund) => {
                let values = decl
                    .init
                    .as_ref()
                    .map_or_else(|| vec![0], |init| init.values.clone());
                if fund.size_bytes() == 1 {
                    self.gen.emit_bytes(&values)
                } else {
                    self.gen.emit_shorts(&values)
                }
            },
        };
        self.var_slots[id.index()] = Some(VarSlot::Global(START_PROGRAM + offset));
        Ok(())
    }

    // =========================================================================
    // ROUTINES
    // =========================================================================

    fn walk_routine(&mut self, id: RoutineId) -> CompileResult<()> {
        let routine = self.ast.routine(id);
        let code_addr = self.here();
        self.routine_addrs[id.index()] = Some(routine.fixed_addr.unwrap_or(code_addr));
        self.current_return = routine.return_type;

        // Parameters sit below the saved return address and frame pointer;
        // the running offset starts at -4 and moves down by each width in
        // declaration order, matching right-to-left argument pushes.
        let mut param_offset: i32 = -4;
        for &param in &routine.params {
            let size = i32::from(self.ast.var(param).ty.param_size_bytes());
            param_offset -= size;
            self.var_slots[param.index()] = Some(VarSlot::Frame(param_offset as i16));
        }

        // Locals are laid out from frame offset 0 upward; initializers
        // become stores at routine entry.
        let mut next_local: u16 = 0;
        for &local in &routine.decls {
            let decl = self.ast.var(local);

            if let Some(init) = &decl.init {
                if init.is_address {
                    // A fixed-address local is an absolute location, not
                    // frame storage.
                    self.var_slots[local.index()] =
                        Some(VarSlot::Global(init.values[0] as u16));
                    continue;
                }
            }

            let base = next_local;
            self.var_slots[local.index()] = Some(VarSlot::Frame(base as i16));
            next_local += self.storage_size(decl);

            if let Some(init) = &decl.init {
                match &decl.ty {
                    Type::Array { elem, .. } => {
                        for (i, &value) in init.values.iter().enumerate() {
                            self.gen.emit_numerical_constant(*elem, value);
                            let elem_offset = i as u16 * elem.size_bytes();
                            self.gen.emit_numerical_constant(
                                FundamentalType::Card,
                                i32::from(elem_offset),
                            );
                            self.gen.emit_store_variable(
                                *elem,
                                VarScope::Local,
                                AddrMode::Offset,
                                base,
                            );
                        }
                    },
                    ty => {
                        let fund = ty.fund().ok_or_else(|| {
                            CompileError::internal("initialized local without scalar width")
                        })?;
                        self.gen.emit_numerical_constant(fund, init.values[0]);
                        self.gen.emit_store_variable(
                            fund,
                            VarScope::Local,
                            AddrMode::Default,
                            base,
                        );
                    },
                }
            }
        }
        self.routine_locals[id.index()] = Some(next_local);

        for stmt in &routine.body {
            self.walk_stmt(stmt)?;
        }

        // A body that does not end in RETURN falls through; terminate it.
        if !matches!(routine.body.last(), Some(Stmt::Return(_))) {
            self.gen.emit_return(FundamentalType::Void);
        }
        Ok(())
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    fn walk_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Assign { target, value } => self.walk_assign(target, value),
            Stmt::If { arms, else_body } => self.walk_if(arms, else_body.as_deref()),
            Stmt::Do(do_loop) => {
                self.loop_exits.push(Vec::new());
                let top = self.here();
                for s in &do_loop.body {
                    self.walk_stmt(s)?;
                }
                match &do_loop.until {
                    Some(cond) => {
                        self.walk_expr(cond)?;
                        self.gen.emit_jump_if_false_to(cond.fund_type(), top);
                    },
                    None => self.gen.emit_jump_to(top),
                }
                self.patch_loop_exits();
                Ok(())
            },
            Stmt::While { cond, body } => {
                self.loop_exits.push(Vec::new());
                let top = self.here();
                self.walk_expr(cond)?;
                let exit_jf = self.gen.emit_jump_if_false(cond.fund_type());
                for s in &body.body {
                    self.walk_stmt(s)?;
                }
                match &body.until {
                    Some(until) => {
                        self.walk_expr(until)?;
                        self.gen.emit_jump_if_false_to(until.fund_type(), top);
                    },
                    None => self.gen.emit_jump_to(top),
                }
                let here = self.here();
                self.gen.patch_short(exit_jf, here);
                self.patch_loop_exits();
                Ok(())
            },
            Stmt::For {
                var,
                var_ty,
                start,
                finish,
                step,
                body,
            } => self.walk_for(*var, *var_ty, start, finish, step, body),
            Stmt::Exit { loc } => {
                if self.loop_exits.is_empty() {
                    return Err(CompileError::syntax("EXIT outside of a loop", loc.clone()));
                }
                let pos = self.gen.emit_jump();
                self.loop_exits
                    .last_mut()
                    .expect("loop exit stack checked above")
                    .push(pos);
                Ok(())
            },
            Stmt::Return(expr) => {
                match expr {
                    Some(value) => {
                        self.walk_expr(value)?;
                        let ret = self.current_return;
                        self.cast_to(value.fund_type(), ret);
                        self.gen.emit_return(ret);
                    },
                    None => self.gen.emit_return(FundamentalType::Void),
                }
                Ok(())
            },
            Stmt::Call(call) => {
                self.walk_call(call)?;
                // In statement position an unused function result is
                // discarded to keep the work stack balanced.
                if call.return_type != FundamentalType::Void {
                    self.gen.emit_pop(call.return_type);
                }
                Ok(())
            },
            Stmt::CodeBlock(values) => {
                for &value in values {
                    self.gen.append_byte(value as u8);
                }
                Ok(())
            },
            Stmt::DevPrint(expr) => {
                self.walk_expr(expr)?;
                self.gen.emit_devprint(expr.fund_type());
                Ok(())
            },
        }
    }

    fn walk_assign(&mut self, target: &Expr, value: &Expr) -> CompileResult<()> {
        self.walk_expr(value)?;
        let value_t = value.fund_type();

        match target {
            Expr::Var { id, ty } => {
                self.cast_to(value_t, *ty);
                let (scope, addr) = self.slot(*id)?;
                self.gen
                    .emit_store_variable(*ty, scope, AddrMode::Default, addr);
            },
            Expr::Deref { var, ty } => {
                self.cast_to(value_t, *ty);
                let (scope, addr) = self.slot(*var)?;
                self.gen
                    .emit_store_variable(*ty, scope, AddrMode::Pointer, addr);
            },
            Expr::Field { var, offset, ty } => {
                self.cast_to(value_t, *ty);
                let (scope, addr) = self.slot_shifted(*var, *offset)?;
                self.gen
                    .emit_store_variable(*ty, scope, AddrMode::Default, addr);
            },
            Expr::Index { var, index, ty } => {
                self.cast_to(value_t, *ty);
                self.emit_index_offset(index, *ty)?;
                let (scope, addr) = self.slot(*var)?;
                self.gen
                    .emit_store_variable(*ty, scope, AddrMode::Offset, addr);
            },
            _ => {
                return Err(CompileError::internal("unsupported assignment target"));
            },
        }
        Ok(())
    }

    fn walk_if(&mut self, arms: &[actc_par::ast::Conditional], else_body: Option<&[Stmt]>) -> CompileResult<()> {
        let mut end_jumps = Vec::new();
        for (i, arm) in arms.iter().enumerate() {
            self.walk_expr(&arm.cond)?;
            let skip = self.gen.emit_jump_if_false(arm.cond.fund_type());
            for s in &arm.body {
                self.walk_stmt(s)?;
            }
            let last_arm = i + 1 == arms.len();
            if !last_arm || else_body.is_some() {
                end_jumps.push(self.gen.emit_jump());
            }
            let here = self.here();
            self.gen.patch_short(skip, here);
        }
        if let Some(body) = else_body {
            for s in body {
                self.walk_stmt(s)?;
            }
        }
        let here = self.here();
        for pos in end_jumps {
            self.gen.patch_short(pos, here);
        }
        Ok(())
    }

    /// FOR runs while `var <= finish`; finish and step are re-evaluated
    /// every iteration.
    fn walk_for(
        &mut self,
        var: VarId,
        var_ty: FundamentalType,
        start: &Expr,
        finish: &Expr,
        step: &Expr,
        body: &actc_par::ast::DoLoop,
    ) -> CompileResult<()> {
        use actc_par::ast::BinOp;

        self.loop_exits.push(Vec::new());

        self.walk_expr(start)?;
        self.cast_to(start.fund_type(), var_ty);
        let (scope, addr) = self.slot(var)?;
        self.gen
            .emit_store_variable(var_ty, scope, AddrMode::Default, addr);

        let top = self.here();
        self.gen
            .emit_load_variable(var_ty, scope, AddrMode::Default, addr);
        self.walk_expr(finish)?;
        self.gen
            .emit_binary_op(ByteCodeOp::Le, var_ty, finish.fund_type());
        let exit_jf = self.gen.emit_jump_if_false(FundamentalType::Byte);

        for s in &body.body {
            self.walk_stmt(s)?;
        }

        // An UNTIL that comes out true leaves the loop before the
        // increment.
        let mut until_exit = None;
        if let Some(until) = &body.until {
            self.walk_expr(until)?;
            let continue_jf = self.gen.emit_jump_if_false(until.fund_type());
            until_exit = Some(self.gen.emit_jump());
            let here = self.here();
            self.gen.patch_short(continue_jf, here);
        }

        self.gen
            .emit_load_variable(var_ty, scope, AddrMode::Default, addr);
        self.walk_expr(step)?;
        self.gen
            .emit_binary_op(ByteCodeOp::Add, var_ty, step.fund_type());
        self.cast_to(BinOp::Add.result_type(var_ty, step.fund_type()), var_ty);
        self.gen
            .emit_store_variable(var_ty, scope, AddrMode::Default, addr);
        self.gen.emit_jump_to(top);

        let here = self.here();
        self.gen.patch_short(exit_jf, here);
        if let Some(pos) = until_exit {
            self.gen.patch_short(pos, here);
        }
        self.patch_loop_exits();
        Ok(())
    }

    /// Patches every EXIT of the innermost loop to the instruction past
    /// the loop terminator.
    fn patch_loop_exits(&mut self) {
        let exits = self.loop_exits.pop().unwrap_or_default();
        let here = self.here();
        for pos in exits {
            self.gen.patch_short(pos, here);
        }
    }

    // =========================================================================
    // EXPRESSIONS
    // =========================================================================

    fn walk_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        match expr {
            Expr::Const(c) => {
                self.gen.emit_numerical_constant(c.ty, c.value);
                Ok(())
            },
            Expr::Var { id, ty } => {
                let (scope, addr) = self.slot(*id)?;
                self.gen
                    .emit_load_variable(*ty, scope, AddrMode::Default, addr);
                Ok(())
            },
            Expr::Deref { var, ty } => {
                let (scope, addr) = self.slot(*var)?;
                self.gen
                    .emit_load_variable(*ty, scope, AddrMode::Pointer, addr);
                Ok(())
            },
            Expr::Reference(RefTarget::Var(id)) => {
                let (scope, addr) = self.slot(*id)?;
                self.gen.emit_load_variable(
                    FundamentalType::Card,
                    scope,
                    AddrMode::Reference,
                    addr,
                );
                Ok(())
            },
            Expr::Reference(RefTarget::Routine(routine)) => {
                match self.routine_addrs[routine.index()] {
                    Some(addr) => self.gen.emit_load_variable(
                        FundamentalType::Card,
                        VarScope::RoutineReference,
                        AddrMode::Reference,
                        addr,
                    ),
                    None => {
                        let addr_pos = self.gen.emit_load_variable_placeholder(
                            FundamentalType::Card,
                            VarScope::RoutineReference,
                            AddrMode::Reference,
                        );
                        self.fixups.push(Fixup::Load {
                            addr_pos,
                            routine: *routine,
                        });
                    },
                }
                Ok(())
            },
            Expr::Field { var, offset, ty } => {
                let (scope, addr) = self.slot_shifted(*var, *offset)?;
                self.gen
                    .emit_load_variable(*ty, scope, AddrMode::Default, addr);
                Ok(())
            },
            Expr::Index { var, index, ty } => {
                self.emit_index_offset(index, *ty)?;
                let (scope, addr) = self.slot(*var)?;
                self.gen
                    .emit_load_variable(*ty, scope, AddrMode::Offset, addr);
                Ok(())
            },
            Expr::Binary { op, lhs, rhs, .. } => {
                self.walk_expr(lhs)?;
                self.walk_expr(rhs)?;
                self.gen.emit_binary_op(
                    ByteCodeOp::for_binop(*op),
                    lhs.fund_type(),
                    rhs.fund_type(),
                );
                Ok(())
            },
            Expr::Negate(operand) => {
                self.walk_expr(operand)?;
                self.gen.emit_unary_minus(operand.fund_type());
                Ok(())
            },
            Expr::Call(call) => self.walk_call(call),
        }
    }

    /// Pushes a byte offset (2 bytes) for an array element: the index
    /// expression widened to CARD and scaled by the element width.
    fn emit_index_offset(&mut self, index: &Expr, elem: FundamentalType) -> CompileResult<()> {
        self.walk_expr(index)?;
        let mut index_t = index.fund_type();
        if index_t.size_bytes() == 1 {
            self.gen.emit_cast(index_t, FundamentalType::Card);
            index_t = FundamentalType::Card;
        }
        if elem.size_bytes() == 2 {
            self.gen
                .emit_numerical_constant(FundamentalType::Byte, 2);
            self.gen
                .emit_binary_op(ByteCodeOp::Multiply, index_t, FundamentalType::Byte);
        }
        Ok(())
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    /// Arguments are pushed right-to-left, each cast to its declared
    /// parameter width; composite parameters travel as CARD addresses.
    fn walk_call(&mut self, call: &CallExpr) -> CompileResult<()> {
        let routine = self.ast.routine(call.routine);
        for (arg, &param) in call.args.iter().zip(routine.params.iter()).rev() {
            self.walk_expr(arg)?;
            let param_t = self
                .ast
                .var(param)
                .ty
                .fund()
                .unwrap_or(FundamentalType::Card);
            self.cast_to(arg.fund_type(), param_t);
        }

        let locals = self.routine_locals[call.routine.index()];
        let target = self.routine_addrs[call.routine.index()];
        match (locals, target) {
            (Some(locals), Some(target)) => {
                self.gen
                    .emit_routine_call(call.return_type, locals, target);
            },
            _ => {
                let (locals_pos, target_pos) =
                    self.gen.emit_routine_call(call.return_type, 0, 0);
                self.fixups.push(Fixup::Call {
                    locals_pos,
                    target_pos,
                    routine: call.routine,
                });
            },
        }
        Ok(())
    }

    /// Resolves every pending forward reference from the final routine
    /// addresses.
    fn resolve_fixups(&mut self) -> CompileResult<()> {
        for fixup in std::mem::take(&mut self.fixups) {
            match fixup {
                Fixup::Call {
                    locals_pos,
                    target_pos,
                    routine,
                } => {
                    let target = self.routine_addrs[routine.index()].ok_or_else(|| {
                        CompileError::internal(format!(
                            "call target {} never received an address",
                            self.ast.routine(routine).name
                        ))
                    })?;
                    let locals = self.routine_locals[routine.index()].ok_or_else(|| {
                        CompileError::internal(format!(
                            "call target {} never received a frame size",
                            self.ast.routine(routine).name
                        ))
                    })?;
                    self.gen.patch_short(locals_pos, locals);
                    self.gen.patch_short(target_pos, target);
                },
                Fixup::Load { addr_pos, routine } => {
                    let target = self.routine_addrs[routine.index()].ok_or_else(|| {
                        CompileError::internal(format!(
                            "routine reference {} never received an address",
                            self.ast.routine(routine).name
                        ))
                    })?;
                    self.gen.patch_short(addr_pos, target);
                },
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use actc_lex::{tokenize, DefineStack};
    use actc_par::Parser;
    use actc_util::Handler;

    fn parse(source: &str) -> Ast {
        let mut handler = Handler::new();
        let tokens = tokenize(source, "<test>", &DefineStack::new()).unwrap();
        Parser::new(tokens, &mut handler)
            .parse_program()
            .expect("parse failed")
    }

    fn emit_source(source: &str) -> ProgramImage {
        emit(&parse(source)).expect("emit failed")
    }

    fn emitter_for(ast: &Ast) -> Emitter<'_> {
        let mut emitter = Emitter::new(ast);
        emitter.run().expect("emit failed");
        emitter
    }

    // =========================================================================
    // GLOBAL DATA
    // =========================================================================

    #[test]
    fn test_global_scalars_image() {
        let image = emit_source("BYTE x CHAR y = ['a] INT z = [$1234] CARD a");
        assert_eq!(image.code, vec![0x00, 0x61, 0x34, 0x12, 0x00, 0x00]);
        assert_eq!(image.entry, None);
    }

    #[test]
    fn test_global_arrays_image() {
        let image = emit_source(
            "BYTE ARRAY ba(3)
             CHAR ARRAY cha = ['a, 'b]
             CHAR ARRAY st = \"Hello\"
             CARD ARRAY ca = [$1234, $5678]
             CARD ARRAY ca2 = $1234
             BYTE ARRAY ba2(4) = [1, 2, 3, 4, 5]",
        );
        assert_eq!(
            image.code,
            vec![
                0x00, 0x00, 0x00, // ba: three zero bytes
                0x61, 0x62, // cha: 'a 'b
                0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F, // st: length byte + "Hello"
                0x34, 0x12, 0x78, 0x56, // ca: two little-endian shorts
                // ca2 has a fixed address, no storage
                0x01, 0x02, 0x03, 0x04, 0x05, // ba2: sized from its initializer
            ]
        );
    }

    #[test]
    fn test_string_array_is_length_prefixed() {
        let image = emit_source("CHAR ARRAY st = \"Hello\"");
        assert_eq!(image.code, vec![0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F]);
    }

    #[test]
    fn test_record_global_emits_zeroed_storage() {
        let image = emit_source("TYPE Pt = [BYTE x BYTE y INT n] Pt p");
        assert_eq!(image.code, vec![0, 0, 0, 0]);
    }

    // =========================================================================
    // ROUTINES AND CALLS
    // =========================================================================

    #[test]
    fn test_proc_call_encoding() {
        let image = emit_source(
            "PROC proc1()
               DEVPRINT(1)
             RETURN

             PROC main()
               proc1()
             RETURN",
        );
        let byte = FundamentalType::Byte as u8;
        let void = FundamentalType::Void as u8;
        assert_eq!(
            image.code,
            vec![
                // proc1 at 0x2000
                ByteCodeOp::NumericalConstant as u8, byte, 1,
                ByteCodeOp::DevPrint as u8, byte,
                ByteCodeOp::Return as u8, void,
                // main at 0x2007
                ByteCodeOp::RoutineCall as u8, void, 0x00, 0x00, 0x00, 0x20,
                ByteCodeOp::Return as u8, void,
            ]
        );
        assert_eq!(image.entry, Some(0x2007));
    }

    #[test]
    fn test_synthetic_return_on_fallthrough() {
        let image = emit_source("PROC main() DEVPRINT(1)");
        assert_eq!(
            image.code[image.code.len() - 2..],
            [ByteCodeOp::Return as u8, FundamentalType::Void as u8]
        );
    }

    #[test]
    fn test_fixed_address_routine_call_target() {
        let image = emit_source(
            "PROC romcall=$C010() RETURN
             PROC main() romcall() RETURN",
        );
        // The call targets the fixed address, not the emitted body.
        let call_at = image
            .code
            .iter()
            .position(|&b| b == ByteCodeOp::RoutineCall as u8)
            .unwrap();
        assert_eq!(&image.code[call_at + 4..call_at + 6], &[0x10, 0xC0]);
    }

    // =========================================================================
    // FRAME LAYOUT
    // =========================================================================

    #[test]
    fn test_param_and_local_offsets() {
        let ast = parse("PROC p(INT a, BYTE b) INT x CARD c RETURN PROC main() p(1, 2) RETURN");
        let emitter = emitter_for(&ast);
        let routine = &ast.routines[0];

        // First-declared 2-byte parameter sits at -6, the next below it.
        assert_eq!(
            emitter.var_slots[routine.params[0].index()],
            Some(VarSlot::Frame(-6))
        );
        assert_eq!(
            emitter.var_slots[routine.params[1].index()],
            Some(VarSlot::Frame(-7))
        );
        // Locals grow upward from 0.
        assert_eq!(
            emitter.var_slots[routine.decls[0].index()],
            Some(VarSlot::Frame(0))
        );
        assert_eq!(
            emitter.var_slots[routine.decls[1].index()],
            Some(VarSlot::Frame(2))
        );
        assert_eq!(emitter.routine_locals[0], Some(4));
    }

    #[test]
    fn test_address_sign_matches_scope() {
        let ast = parse(
            "BYTE g
             PROC p(INT a) INT x
               x = a
               x = g
             RETURN",
        );
        let emitter = emitter_for(&ast);
        for (id, slot) in emitter.var_slots.iter().enumerate() {
            let decl = &ast.vars[id];
            match (decl.placement, slot) {
                (actc_par::Placement::Param, Some(VarSlot::Frame(offset))) => {
                    assert!(*offset < 0, "param {} must have a negative offset", decl.name);
                },
                (actc_par::Placement::Local, Some(VarSlot::Frame(offset))) => {
                    assert!(*offset >= 0, "local {} must have a non-negative offset", decl.name);
                },
                (actc_par::Placement::Global, Some(VarSlot::Global(_))) => {},
                other => panic!("unexpected slot pairing {other:?}"),
            }
        }
    }

    // =========================================================================
    // CONTROL FLOW PATCHING
    // =========================================================================

    #[test]
    fn test_while_exit_patching() {
        let image = emit_source("INT i PROC main() WHILE 1 DO EXIT OD RETURN");
        let constant = ByteCodeOp::NumericalConstant as u8;
        let byte = FundamentalType::Byte as u8;
        let void = FundamentalType::Void as u8;
        assert_eq!(
            image.code,
            vec![
                0x00, 0x00, // global i
                // main at 0x2002, loop top 0x2002
                constant, byte, 1,
                ByteCodeOp::JumpIfFalse as u8, byte, 0x0F, 0x20, // exit -> 0x200F
                ByteCodeOp::Jump as u8, 0x0F, 0x20, // EXIT patched past the terminator
                ByteCodeOp::Jump as u8, 0x02, 0x20, // back to the loop top
                ByteCodeOp::Return as u8, void,
            ]
        );
    }

    #[test]
    fn test_exit_outside_loop_rejected() {
        let ast = parse("PROC main() EXIT RETURN");
        let err = emit(&ast).unwrap_err();
        assert!(err.to_string().contains("EXIT outside of a loop"));
    }

    #[test]
    fn test_if_else_jumps_past_else() {
        // IF 1 THEN DEVPRINT(1) ELSE DEVPRINT(2) FI
        let image = emit_source("PROC main() IF 1 THEN DEVPRINT(1) ELSE DEVPRINT(2) FI RETURN");
        let constant = ByteCodeOp::NumericalConstant as u8;
        let byte = FundamentalType::Byte as u8;
        let void = FundamentalType::Void as u8;
        assert_eq!(
            image.code,
            vec![
                constant, byte, 1, // condition at 0x2000
                ByteCodeOp::JumpIfFalse as u8, byte, 0x0F, 0x20, // to the else arm
                constant, byte, 1,
                ByteCodeOp::DevPrint as u8, byte,
                ByteCodeOp::Jump as u8, 0x14, 0x20, // over the else arm
                constant, byte, 2, // else arm at 0x200F
                ByteCodeOp::DevPrint as u8, byte,
                ByteCodeOp::Return as u8, void, // end at 0x2014
            ]
        );
    }

    // =========================================================================
    // VARIABLE ACCESS
    // =========================================================================

    #[test]
    fn test_global_load_is_absolute() {
        let image = emit_source("BYTE b INT i PROC main() i = b + 1000 RETURN");
        // b at 0x2000, i at 0x2001; code follows at 0x2003.
        let load_at = image
            .code
            .iter()
            .position(|&op| op == ByteCodeOp::LoadVariable as u8)
            .unwrap();
        assert_eq!(
            &image.code[load_at..load_at + 6],
            &[
                ByteCodeOp::LoadVariable as u8,
                FundamentalType::Byte as u8,
                VarScope::Global as u8,
                AddrMode::Default as u8,
                0x00,
                0x20,
            ]
        );
    }

    #[test]
    fn test_record_field_store_folds_offset() {
        let image = emit_source("TYPE Pt = [BYTE x BYTE y] Pt p PROC main() p.y = 4 RETURN");
        let store_at = image
            .code
            .iter()
            .position(|&op| op == ByteCodeOp::StoreVariable as u8)
            .unwrap();
        // p occupies 0x2000-0x2001; field y is at +1.
        assert_eq!(
            &image.code[store_at..store_at + 6],
            &[
                ByteCodeOp::StoreVariable as u8,
                FundamentalType::Byte as u8,
                VarScope::Global as u8,
                AddrMode::Default as u8,
                0x01,
                0x20,
            ]
        );
    }

    #[test]
    fn test_card_array_index_is_scaled() {
        let image = emit_source("CARD ARRAY ca(4) PROC main() ca(1) = 7 RETURN");
        // The index constant is widened to CARD and multiplied by 2.
        let mul = [
            ByteCodeOp::Multiply as u8,
            FundamentalType::Card as u8,
            FundamentalType::Byte as u8,
        ];
        assert!(
            image.code.windows(3).any(|window| window == mul),
            "expected a CARD*BYTE scaling multiply in {:02X?}",
            image.code
        );
    }

    #[test]
    fn test_assignment_casts_on_width_change() {
        let image = emit_source("BYTE b INT i PROC main() i = b RETURN");
        let cast_at = image
            .code
            .iter()
            .position(|&op| op == ByteCodeOp::Cast as u8)
            .expect("expected a widening cast");
        assert_eq!(image.code[cast_at + 1], FundamentalType::Byte as u8);
        assert_eq!(image.code[cast_at + 2], FundamentalType::Int as u8);
    }

    #[test]
    fn test_func_call_in_statement_pops_result() {
        let image = emit_source(
            "BYTE FUNC f() RETURN (1)
             PROC main() f() RETURN",
        );
        let pop_at = image
            .code
            .iter()
            .position(|&op| op == ByteCodeOp::Pop as u8)
            .expect("unused function result must be popped");
        assert_eq!(image.code[pop_at + 1], FundamentalType::Byte as u8);
    }
}
