//! Bytecode instruction encodings.
//!
//! Instruction layout (all multibyte integers little-endian):
//!
//! | Mnemonic           | Encoding                                         |
//! |--------------------|--------------------------------------------------|
//! | NOP, BREAK         | op                                               |
//! | binary op          | op, lhs-type, rhs-type                           |
//! | UNARY_MINUS        | op, type                                         |
//! | NUMERICAL_CONSTANT | op, type, value(1 or 2)                          |
//! | LOAD/STORE_VARIABLE| op, type, scope, addr-mode, addr(2)              |
//! | JUMP               | op, target(2)                                    |
//! | JUMP_IF_FALSE      | op, type, target(2)                              |
//! | ROUTINE_CALL       | op, return-type, locals-size(2), target(2)       |
//! | RETURN             | op, type                                         |
//! | CAST               | op, from-type, to-type                           |
//! | DEVPRINT, POP, DUP | op, type                                         |

use actc_par::ast::BinOp;

/// Opcode bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ByteCodeOp {
    Break = 0,
    Add = 1,
    Subtract = 2,
    Multiply = 3,
    Divide = 4,
    Mod = 5,
    Lsh = 6,
    Rsh = 7,
    Eq = 8,
    Ne = 9,
    Gt = 10,
    Ge = 11,
    Lt = 12,
    Le = 13,
    Xor = 14,
    BitAnd = 15,
    BitOr = 16,
    BitXor = 17,
    UnaryMinus = 18,
    JumpIfFalse = 19,
    Jump = 20,
    Dup = 21,
    Pop = 22,
    NumericalConstant = 23,
    LoadVariable = 24,
    StoreVariable = 25,
    RoutineCall = 26,
    Return = 27,
    Cast = 28,
    Nop = 29,
    DevPrint = 200,
}

impl ByteCodeOp {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => ByteCodeOp::Break,
            1 => ByteCodeOp::Add,
            2 => ByteCodeOp::Subtract,
            3 => ByteCodeOp::Multiply,
            4 => ByteCodeOp::Divide,
            5 => ByteCodeOp::Mod,
            6 => ByteCodeOp::Lsh,
            7 => ByteCodeOp::Rsh,
            8 => ByteCodeOp::Eq,
            9 => ByteCodeOp::Ne,
            10 => ByteCodeOp::Gt,
            11 => ByteCodeOp::Ge,
            12 => ByteCodeOp::Lt,
            13 => ByteCodeOp::Le,
            14 => ByteCodeOp::Xor,
            15 => ByteCodeOp::BitAnd,
            16 => ByteCodeOp::BitOr,
            17 => ByteCodeOp::BitXor,
            18 => ByteCodeOp::UnaryMinus,
            19 => ByteCodeOp::JumpIfFalse,
            20 => ByteCodeOp::Jump,
            21 => ByteCodeOp::Dup,
            22 => ByteCodeOp::Pop,
            23 => ByteCodeOp::NumericalConstant,
            24 => ByteCodeOp::LoadVariable,
            25 => ByteCodeOp::StoreVariable,
            26 => ByteCodeOp::RoutineCall,
            27 => ByteCodeOp::Return,
            28 => ByteCodeOp::Cast,
            29 => ByteCodeOp::Nop,
            200 => ByteCodeOp::DevPrint,
            _ => return None,
        })
    }

    /// The opcode for a typed binary operator.
    pub fn for_binop(op: BinOp) -> ByteCodeOp {
        match op {
            BinOp::Add => ByteCodeOp::Add,
            BinOp::Sub => ByteCodeOp::Subtract,
            BinOp::Mul => ByteCodeOp::Multiply,
            BinOp::Div => ByteCodeOp::Divide,
            BinOp::Mod => ByteCodeOp::Mod,
            BinOp::Lsh => ByteCodeOp::Lsh,
            BinOp::Rsh => ByteCodeOp::Rsh,
            BinOp::Eq => ByteCodeOp::Eq,
            BinOp::Ne => ByteCodeOp::Ne,
            BinOp::Gt => ByteCodeOp::Gt,
            BinOp::Ge => ByteCodeOp::Ge,
            BinOp::Lt => ByteCodeOp::Lt,
            BinOp::Le => ByteCodeOp::Le,
            BinOp::Xor => ByteCodeOp::Xor,
            BinOp::BitAnd => ByteCodeOp::BitAnd,
            BinOp::BitOr => ByteCodeOp::BitOr,
            BinOp::BitXor => ByteCodeOp::BitXor,
        }
    }

    /// True for the three-byte typed binary operator instructions.
    pub fn is_binary(self) -> bool {
        (ByteCodeOp::Add as u8..=ByteCodeOp::BitXor as u8).contains(&(self as u8))
    }
}

/// Where a LOAD/STORE_VARIABLE instruction resolves its address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum VarScope {
    Global = 0,
    Local = 1,
    Param = 2,
    RoutineReference = 3,
}

impl VarScope {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => VarScope::Global,
            1 => VarScope::Local,
            2 => VarScope::Param,
            3 => VarScope::RoutineReference,
            _ => return None,
        })
    }
}

/// How the resolved base address is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AddrMode {
    Default = 0,
    Pointer = 1,
    Reference = 2,
    Offset = 3,
}

impl AddrMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => AddrMode::Default,
            1 => AddrMode::Pointer,
            2 => AddrMode::Reference,
            3 => AddrMode::Offset,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_round_trip() {
        for byte in 0u8..=29 {
            let op = ByteCodeOp::from_byte(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
        assert_eq!(ByteCodeOp::from_byte(200), Some(ByteCodeOp::DevPrint));
        assert_eq!(ByteCodeOp::from_byte(30), None);
        assert_eq!(ByteCodeOp::from_byte(0xFF), None);
    }

    #[test]
    fn test_binary_op_range() {
        assert!(ByteCodeOp::Add.is_binary());
        assert!(ByteCodeOp::BitXor.is_binary());
        assert!(!ByteCodeOp::UnaryMinus.is_binary());
        assert!(!ByteCodeOp::Break.is_binary());
    }

    #[test]
    fn test_binop_mapping() {
        assert_eq!(ByteCodeOp::for_binop(BinOp::Add), ByteCodeOp::Add);
        assert_eq!(ByteCodeOp::for_binop(BinOp::Le), ByteCodeOp::Le);
        assert_eq!(ByteCodeOp::for_binop(BinOp::BitXor), ByteCodeOp::BitXor);
    }
}
