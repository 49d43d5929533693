//! The bytecode interpreter.
//!
//! A 64 KiB byte array partitioned per [`actc_emit::layout`], four
//! registers, and a fetch-decode-execute loop dispatching on the opcode
//! byte. Binary operators read their operand types from the instruction,
//! pop accordingly, compute in 16-bit two's-complement wraparound, and
//! push with the width the operator family implies.

use std::io::Write;

use actc_emit::layout::{
    MEMORY_SIZE, START_LOCALS, START_PARAMS, START_PROGRAM,
};
use actc_emit::opcode::{AddrMode, ByteCodeOp, VarScope};
use actc_emit::ProgramImage;
use actc_par::types::{promote, FundamentalType};

use crate::error::{ExecError, ExecResult};

/// One virtual machine instance. The memory array is exclusively owned;
/// nothing is shared between instances.
pub struct Vm<W: Write> {
    memory: Vec<u8>,
    /// Program counter, initialised to the entry routine's address.
    pc: usize,
    /// Work-stack pointer; locals and expression temporaries grow upward.
    wsp: usize,
    /// Frame pointer: negative offsets address parameters, non-negative
    /// ones locals.
    fp: usize,
    /// Parameter-stack pointer. The partition is reserved; the calling
    /// convention passes arguments on the work stack.
    #[allow(dead_code)]
    psp: usize,
    /// First address past the loaded image; fetching beyond it is fatal.
    program_end: usize,
    /// Frames above the entry frame; RETURN at depth zero halts.
    call_depth: usize,
    halted: bool,
    out: W,
}

impl<W: Write> Vm<W> {
    /// Loads a program image and prepares the registers. DEVPRINT output
    /// goes to `out`.
    pub fn load(image: &ProgramImage, out: W) -> ExecResult<Self> {
        let entry = image.entry.ok_or(ExecError::NoEntryPoint)?;
        let start = START_PROGRAM as usize;
        if start + image.code.len() > MEMORY_SIZE {
            return Err(ExecError::ImageTooLarge);
        }
        let mut memory = vec![0u8; MEMORY_SIZE];
        memory[start..start + image.code.len()].copy_from_slice(&image.code);
        Ok(Self {
            memory,
            pc: entry as usize,
            wsp: START_LOCALS as usize,
            fp: START_LOCALS as usize,
            psp: START_PARAMS as usize,
            program_end: start + image.code.len(),
            call_depth: 0,
            halted: false,
            out,
        })
    }

    /// Runs to completion or to the first fatal error.
    pub fn run(&mut self) -> ExecResult<()> {
        while !self.halted {
            self.step()?;
        }
        Ok(())
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn wsp(&self) -> usize {
        self.wsp
    }

    pub fn fp(&self) -> usize {
        self.fp
    }

    /// Reads one byte of VM memory (for host-side inspection).
    pub fn read_byte(&self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    /// Reads a little-endian 16-bit value (for host-side inspection).
    pub fn read_card(&self, addr: u16) -> u16 {
        let lo = u16::from(self.memory[addr as usize]);
        let hi = u16::from(self.memory[addr.wrapping_add(1) as usize]);
        lo | (hi << 8)
    }

    // =========================================================================
    // FETCH AND DECODE
    // =========================================================================

    fn step(&mut self) -> ExecResult<()> {
        let pc = self.pc;
        if pc < START_PROGRAM as usize || pc >= self.program_end {
            return Err(ExecError::PcOutOfRange { pc: pc as u16 });
        }

        let opcode = self.memory[pc];
        let op = ByteCodeOp::from_byte(opcode).ok_or(ExecError::UnknownOpcode {
            opcode,
            pc: pc as u16,
        })?;

        match op {
            ByteCodeOp::Nop => {
                self.pc += 1;
            },
            ByteCodeOp::Break => {
                // Breakpoint trap with no debugger attached: stop.
                self.halted = true;
            },
            op if op.is_binary() => self.exec_binary(op)?,
            ByteCodeOp::UnaryMinus => self.exec_unary_minus()?,
            ByteCodeOp::NumericalConstant => self.exec_constant()?,
            ByteCodeOp::LoadVariable => self.exec_load()?,
            ByteCodeOp::StoreVariable => self.exec_store()?,
            ByteCodeOp::Jump => {
                self.pc = usize::from(self.operand_short(1)?);
            },
            ByteCodeOp::JumpIfFalse => self.exec_jump_if_false()?,
            ByteCodeOp::RoutineCall => self.exec_call()?,
            ByteCodeOp::Return => self.exec_return()?,
            ByteCodeOp::Cast => self.exec_cast()?,
            ByteCodeOp::Pop => {
                let ty = self.operand_type(1)?;
                self.pop_value(ty)?;
                self.pc += 2;
            },
            ByteCodeOp::Dup => {
                let ty = self.operand_type(1)?;
                let value = self.pop_value(ty)?;
                self.push_value(value, ty.size_bytes())?;
                self.push_value(value, ty.size_bytes())?;
                self.pc += 2;
            },
            ByteCodeOp::DevPrint => self.exec_devprint()?,
            other => {
                return Err(ExecError::UnknownOpcode {
                    opcode: other as u8,
                    pc: pc as u16,
                });
            },
        }
        Ok(())
    }

    fn operand_byte(&self, offset: usize) -> ExecResult<u8> {
        let at = self.pc + offset;
        if at >= self.program_end {
            return Err(ExecError::PcOutOfRange { pc: self.pc as u16 });
        }
        Ok(self.memory[at])
    }

    fn operand_short(&self, offset: usize) -> ExecResult<u16> {
        let lo = u16::from(self.operand_byte(offset)?);
        let hi = u16::from(self.operand_byte(offset + 1)?);
        Ok(lo | (hi << 8))
    }

    fn operand_type(&self, offset: usize) -> ExecResult<FundamentalType> {
        let byte = self.operand_byte(offset)?;
        FundamentalType::from_byte(byte).ok_or(ExecError::BadOperand { pc: self.pc as u16 })
    }

    // =========================================================================
    // WORK STACK
    // =========================================================================

    fn push_value(&mut self, value: u16, size: u16) -> ExecResult<()> {
        let size = size as usize;
        if self.wsp + size > START_PARAMS as usize {
            return Err(ExecError::StackOverflow { pc: self.pc as u16 });
        }
        self.memory[self.wsp] = (value & 0xFF) as u8;
        if size == 2 {
            self.memory[self.wsp + 1] = (value >> 8) as u8;
        }
        self.wsp += size;
        Ok(())
    }

    fn pop_value(&mut self, ty: FundamentalType) -> ExecResult<u16> {
        self.pop_sized(ty.size_bytes())
    }

    fn pop_sized(&mut self, size: u16) -> ExecResult<u16> {
        let size = size as usize;
        if size == 0 || self.wsp < START_LOCALS as usize + size {
            return Err(ExecError::StackUnderflow { pc: self.pc as u16 });
        }
        self.wsp -= size;
        let lo = u16::from(self.memory[self.wsp]);
        if size == 2 {
            let hi = u16::from(self.memory[self.wsp + 1]);
            Ok(lo | (hi << 8))
        } else {
            Ok(lo)
        }
    }

    // =========================================================================
    // MEMORY
    // =========================================================================

    fn mem_read(&self, addr: usize, size: u16) -> u16 {
        let lo = u16::from(self.memory[addr & 0xFFFF]);
        if size == 2 {
            let hi = u16::from(self.memory[(addr + 1) & 0xFFFF]);
            lo | (hi << 8)
        } else {
            lo
        }
    }

    fn mem_write(&mut self, addr: usize, size: u16, value: u16) {
        self.memory[addr & 0xFFFF] = (value & 0xFF) as u8;
        if size == 2 {
            self.memory[(addr + 1) & 0xFFFF] = (value >> 8) as u8;
        }
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    /// A value reinterpreted per its operand type: INT is signed, the
    /// rest are unsigned.
    fn to_signed(ty: FundamentalType, raw: u16) -> i32 {
        if ty.is_signed() {
            i32::from(raw as i16)
        } else {
            i32::from(raw)
        }
    }

    fn exec_binary(&mut self, op: ByteCodeOp) -> ExecResult<()> {
        let lhs_t = self.operand_type(1)?;
        let rhs_t = self.operand_type(2)?;
        let rhs = self.pop_value(rhs_t)?;
        let lhs = self.pop_value(lhs_t)?;
        let pc = self.pc as u16;

        let (result_ty, value): (FundamentalType, u16) = match op {
            ByteCodeOp::Add => (promote(lhs_t, rhs_t), lhs.wrapping_add(rhs)),
            ByteCodeOp::Subtract => (promote(lhs_t, rhs_t), lhs.wrapping_sub(rhs)),
            ByteCodeOp::Multiply => (FundamentalType::Int, lhs.wrapping_mul(rhs)),
            ByteCodeOp::Divide => {
                if rhs == 0 {
                    return Err(ExecError::DivisionByZero { pc });
                }
                let quotient =
                    Self::to_signed(lhs_t, lhs).wrapping_div(Self::to_signed(rhs_t, rhs));
                (FundamentalType::Int, quotient as u16)
            },
            ByteCodeOp::Mod => {
                if rhs == 0 {
                    return Err(ExecError::DivisionByZero { pc });
                }
                let remainder =
                    Self::to_signed(lhs_t, lhs).wrapping_rem(Self::to_signed(rhs_t, rhs));
                (FundamentalType::Int, remainder as u16)
            },
            ByteCodeOp::Lsh => {
                let shifted = if rhs >= 16 { 0 } else { lhs << rhs };
                (promote(lhs_t, rhs_t), shifted)
            },
            ByteCodeOp::Rsh => {
                let ty = promote(lhs_t, rhs_t);
                let shifted = if ty.is_signed() {
                    ((lhs as i16) >> rhs.min(15)) as u16
                } else if rhs >= 16 {
                    0
                } else {
                    lhs >> rhs
                };
                (ty, shifted)
            },
            ByteCodeOp::Eq => (FundamentalType::Byte, u16::from(lhs == rhs)),
            ByteCodeOp::Ne => (FundamentalType::Byte, u16::from(lhs != rhs)),
            ByteCodeOp::Gt => (
                FundamentalType::Byte,
                u16::from(Self::to_signed(lhs_t, lhs) > Self::to_signed(rhs_t, rhs)),
            ),
            ByteCodeOp::Ge => (
                FundamentalType::Byte,
                u16::from(Self::to_signed(lhs_t, lhs) >= Self::to_signed(rhs_t, rhs)),
            ),
            ByteCodeOp::Lt => (
                FundamentalType::Byte,
                u16::from(Self::to_signed(lhs_t, lhs) < Self::to_signed(rhs_t, rhs)),
            ),
            ByteCodeOp::Le => (
                FundamentalType::Byte,
                u16::from(Self::to_signed(lhs_t, lhs) <= Self::to_signed(rhs_t, rhs)),
            ),
            ByteCodeOp::Xor | ByteCodeOp::BitXor => (promote(lhs_t, rhs_t), lhs ^ rhs),
            ByteCodeOp::BitAnd => (promote(lhs_t, rhs_t), lhs & rhs),
            ByteCodeOp::BitOr => (promote(lhs_t, rhs_t), lhs | rhs),
            other => {
                return Err(ExecError::UnknownOpcode {
                    opcode: other as u8,
                    pc,
                });
            },
        };

        let size = result_ty.size_bytes();
        let value = if size == 1 { value & 0xFF } else { value };
        self.push_value(value, size)?;
        self.pc += 3;
        Ok(())
    }

    fn exec_unary_minus(&mut self) -> ExecResult<()> {
        let ty = self.operand_type(1)?;
        let value = self.pop_value(ty)?;
        let negated = (0i32.wrapping_sub(Self::to_signed(ty, value))) as u16;
        // Unary minus always yields INT.
        self.push_value(negated, 2)?;
        self.pc += 2;
        Ok(())
    }

    fn exec_constant(&mut self) -> ExecResult<()> {
        let ty = self.operand_type(1)?;
        let size = ty.size_bytes();
        if size == 0 {
            return Err(ExecError::BadOperand { pc: self.pc as u16 });
        }
        let value = if size == 1 {
            u16::from(self.operand_byte(2)?)
        } else {
            self.operand_short(2)?
        };
        self.push_value(value, size)?;
        self.pc += 2 + size as usize;
        Ok(())
    }

    /// Resolves the base address of a LOAD/STORE target. Frame scopes add
    /// the signed operand to the frame pointer.
    fn resolve_base(&self, scope: VarScope, addr: u16) -> usize {
        match scope {
            VarScope::Global | VarScope::RoutineReference => usize::from(addr),
            VarScope::Local | VarScope::Param => {
                (self.fp as i32 + i32::from(addr as i16)) as usize
            },
        }
    }

    fn exec_load(&mut self) -> ExecResult<()> {
        let ty = self.operand_type(1)?;
        let scope = VarScope::from_byte(self.operand_byte(2)?)
            .ok_or(ExecError::BadOperand { pc: self.pc as u16 })?;
        let mode = AddrMode::from_byte(self.operand_byte(3)?)
            .ok_or(ExecError::BadOperand { pc: self.pc as u16 })?;
        let addr = self.operand_short(4)?;
        let size = ty.size_bytes();

        if scope == VarScope::RoutineReference {
            // The address of a routine, whatever the mode says.
            self.push_value(addr, 2)?;
            self.pc += 6;
            return Ok(());
        }

        let base = self.resolve_base(scope, addr);
        match mode {
            AddrMode::Default => {
                let value = self.mem_read(base, size);
                self.push_value(value, size)?;
            },
            AddrMode::Pointer => {
                let ptr = self.mem_read(base, 2);
                let value = self.mem_read(usize::from(ptr), size);
                self.push_value(value, size)?;
            },
            AddrMode::Reference => {
                self.push_value(base as u16, 2)?;
            },
            AddrMode::Offset => {
                let offset = self.pop_value(FundamentalType::Card)?;
                let value = self.mem_read(base + usize::from(offset), size);
                self.push_value(value, size)?;
            },
        }
        self.pc += 6;
        Ok(())
    }

    fn exec_store(&mut self) -> ExecResult<()> {
        let ty = self.operand_type(1)?;
        let scope = VarScope::from_byte(self.operand_byte(2)?)
            .ok_or(ExecError::BadOperand { pc: self.pc as u16 })?;
        let mode = AddrMode::from_byte(self.operand_byte(3)?)
            .ok_or(ExecError::BadOperand { pc: self.pc as u16 })?;
        let addr = self.operand_short(4)?;
        let size = ty.size_bytes();
        let base = self.resolve_base(scope, addr);

        match mode {
            AddrMode::Default => {
                let value = self.pop_value(ty)?;
                self.mem_write(base, size, value);
            },
            AddrMode::Pointer => {
                let value = self.pop_value(ty)?;
                let ptr = self.mem_read(base, 2);
                self.mem_write(usize::from(ptr), size, value);
            },
            AddrMode::Offset => {
                let offset = self.pop_value(FundamentalType::Card)?;
                let value = self.pop_value(ty)?;
                self.mem_write(base + usize::from(offset), size, value);
            },
            AddrMode::Reference => {
                return Err(ExecError::BadOperand { pc: self.pc as u16 });
            },
        }
        self.pc += 6;
        Ok(())
    }

    fn exec_jump_if_false(&mut self) -> ExecResult<()> {
        let ty = self.operand_type(1)?;
        let target = self.operand_short(2)?;
        let value = self.pop_value(ty)?;
        if value == 0 {
            self.pc = usize::from(target);
        } else {
            self.pc += 4;
        }
        Ok(())
    }

    /// Pushes the return address and saved frame pointer, opens the new
    /// frame, reserves the callee's locals, and jumps.
    fn exec_call(&mut self) -> ExecResult<()> {
        let locals_size = self.operand_short(2)?;
        let target = self.operand_short(4)?;
        let return_addr = (self.pc + 6) as u16;

        self.push_value(return_addr, 2)?;
        self.push_value(self.fp as u16, 2)?;
        self.fp = self.wsp;
        if self.wsp + usize::from(locals_size) > START_PARAMS as usize {
            return Err(ExecError::StackOverflow { pc: self.pc as u16 });
        }
        self.wsp += usize::from(locals_size);
        self.call_depth += 1;
        self.pc = usize::from(target);
        Ok(())
    }

    /// Unwinds one frame; at the entry frame the machine halts instead.
    fn exec_return(&mut self) -> ExecResult<()> {
        let ty = self.operand_type(1)?;

        if self.call_depth == 0 {
            self.halted = true;
            return Ok(());
        }

        let return_value = if ty == FundamentalType::Void {
            None
        } else {
            Some(self.pop_value(ty)?)
        };

        self.wsp = self.fp;
        let saved_fp = self.pop_sized(2)?;
        let return_addr = self.pop_sized(2)?;
        self.fp = usize::from(saved_fp);
        if let Some(value) = return_value {
            self.push_value(value, ty.size_bytes())?;
        }
        self.call_depth -= 1;
        self.pc = usize::from(return_addr);
        Ok(())
    }

    fn exec_cast(&mut self) -> ExecResult<()> {
        let from = self.operand_type(1)?;
        let to = self.operand_type(2)?;
        if from.size_bytes() == 0 || to.size_bytes() == 0 {
            return Err(ExecError::BadOperand { pc: self.pc as u16 });
        }
        let value = self.pop_value(from)?;
        let value = if to.size_bytes() == 1 { value & 0xFF } else { value };
        self.push_value(value, to.size_bytes())?;
        self.pc += 3;
        Ok(())
    }

    fn exec_devprint(&mut self) -> ExecResult<()> {
        let ty = self.operand_type(1)?;
        let value = self.pop_value(ty)?;
        if ty.is_signed() {
            writeln!(self.out, "{}", value as i16)?;
        } else {
            writeln!(self.out, "{value}")?;
        }
        self.pc += 2;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
