//! The growing program image and per-instruction append helpers.

use actc_par::types::FundamentalType;

use crate::opcode::{AddrMode, ByteCodeOp, VarScope};

/// A byte buffer with little-endian append and patch primitives. Offsets
/// handed back by the `emit_*` methods are image offsets, not absolute
/// addresses.
#[derive(Debug, Default)]
pub struct CodeGen {
    code: Vec<u8>,
}

impl CodeGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the next byte to be emitted.
    pub fn next_addr(&self) -> u16 {
        self.code.len() as u16
    }

    pub fn into_code(self) -> Vec<u8> {
        self.code
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn append_byte(&mut self, byte: u8) {
        self.code.push(byte);
    }

    pub fn append_short(&mut self, short: u16) {
        self.code.push((short & 0xFF) as u8);
        self.code.push((short >> 8) as u8);
    }

    /// Overwrites a previously emitted 2-byte operand.
    pub fn patch_short(&mut self, pos: u16, short: u16) {
        let pos = pos as usize;
        self.code[pos] = (short & 0xFF) as u8;
        self.code[pos + 1] = (short >> 8) as u8;
    }

    // =========================================================================
    // DATA EMISSION
    // =========================================================================

    /// Appends raw single bytes; returns the offset of the first.
    pub fn emit_bytes(&mut self, values: &[i32]) -> u16 {
        let addr = self.next_addr();
        for &value in values {
            self.append_byte(value as u8);
        }
        addr
    }

    /// Appends little-endian 2-byte values; returns the offset of the
    /// first.
    pub fn emit_shorts(&mut self, values: &[i32]) -> u16 {
        let addr = self.next_addr();
        for &value in values {
            self.append_short(value as u16);
        }
        addr
    }

    // =========================================================================
    // INSTRUCTION EMISSION
    // =========================================================================

    /// `op, lhs-type, rhs-type`
    pub fn emit_binary_op(
        &mut self,
        op: ByteCodeOp,
        lhs: FundamentalType,
        rhs: FundamentalType,
    ) {
        self.append_byte(op as u8);
        self.append_byte(lhs as u8);
        self.append_byte(rhs as u8);
    }

    pub fn emit_unary_minus(&mut self, operand: FundamentalType) {
        self.append_byte(ByteCodeOp::UnaryMinus as u8);
        self.append_byte(operand as u8);
    }

    /// `NUMERICAL_CONSTANT, type, value` with a 1-byte value for BYTE and
    /// CHAR, 2 bytes little-endian otherwise.
    pub fn emit_numerical_constant(&mut self, ty: FundamentalType, value: i32) {
        self.append_byte(ByteCodeOp::NumericalConstant as u8);
        self.append_byte(ty as u8);
        if ty.size_bytes() == 1 {
            self.append_byte(value as u8);
        } else {
            self.append_short(value as u16);
        }
    }

    pub fn emit_load_variable(
        &mut self,
        ty: FundamentalType,
        scope: VarScope,
        mode: AddrMode,
        addr: u16,
    ) {
        self.append_byte(ByteCodeOp::LoadVariable as u8);
        self.append_byte(ty as u8);
        self.append_byte(scope as u8);
        self.append_byte(mode as u8);
        self.append_short(addr);
    }

    pub fn emit_store_variable(
        &mut self,
        ty: FundamentalType,
        scope: VarScope,
        mode: AddrMode,
        addr: u16,
    ) {
        self.append_byte(ByteCodeOp::StoreVariable as u8);
        self.append_byte(ty as u8);
        self.append_byte(scope as u8);
        self.append_byte(mode as u8);
        self.append_short(addr);
    }

    /// Emits a LOAD_VARIABLE with a placeholder address; returns the
    /// operand offset for later patching.
    pub fn emit_load_variable_placeholder(
        &mut self,
        ty: FundamentalType,
        scope: VarScope,
        mode: AddrMode,
    ) -> u16 {
        self.append_byte(ByteCodeOp::LoadVariable as u8);
        self.append_byte(ty as u8);
        self.append_byte(scope as u8);
        self.append_byte(mode as u8);
        let pos = self.next_addr();
        self.append_short(0);
        pos
    }

    /// `JUMP, target` with a placeholder target; returns the operand
    /// offset for patching.
    pub fn emit_jump(&mut self) -> u16 {
        self.append_byte(ByteCodeOp::Jump as u8);
        let pos = self.next_addr();
        self.append_short(0);
        pos
    }

    /// `JUMP, target` with a known target.
    pub fn emit_jump_to(&mut self, target: u16) {
        self.append_byte(ByteCodeOp::Jump as u8);
        self.append_short(target);
    }

    /// `JUMP_IF_FALSE, type, target` with a placeholder target; returns
    /// the operand offset for patching.
    pub fn emit_jump_if_false(&mut self, ty: FundamentalType) -> u16 {
        self.append_byte(ByteCodeOp::JumpIfFalse as u8);
        self.append_byte(ty as u8);
        let pos = self.next_addr();
        self.append_short(0);
        pos
    }

    /// `JUMP_IF_FALSE, type, target` with a known target.
    pub fn emit_jump_if_false_to(&mut self, ty: FundamentalType, target: u16) {
        self.append_byte(ByteCodeOp::JumpIfFalse as u8);
        self.append_byte(ty as u8);
        self.append_short(target);
    }

    /// `ROUTINE_CALL, return-type, locals-size, target`. Returns the
    /// offsets of the two 2-byte operands so forward calls can be patched.
    pub fn emit_routine_call(
        &mut self,
        return_type: FundamentalType,
        locals_size: u16,
        target: u16,
    ) -> (u16, u16) {
        self.append_byte(ByteCodeOp::RoutineCall as u8);
        self.append_byte(return_type as u8);
        let locals_pos = self.next_addr();
        self.append_short(locals_size);
        let target_pos = self.next_addr();
        self.append_short(target);
        (locals_pos, target_pos)
    }

    pub fn emit_return(&mut self, return_type: FundamentalType) {
        self.append_byte(ByteCodeOp::Return as u8);
        self.append_byte(return_type as u8);
    }

    pub fn emit_cast(&mut self, from: FundamentalType, to: FundamentalType) {
        self.append_byte(ByteCodeOp::Cast as u8);
        self.append_byte(from as u8);
        self.append_byte(to as u8);
    }

    pub fn emit_pop(&mut self, ty: FundamentalType) {
        self.append_byte(ByteCodeOp::Pop as u8);
        self.append_byte(ty as u8);
    }

    pub fn emit_devprint(&mut self, ty: FundamentalType) {
        self.append_byte(ByteCodeOp::DevPrint as u8);
        self.append_byte(ty as u8);
    }
}
