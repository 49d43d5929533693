//! The abstract syntax tree.
//!
//! A tagged-union AST over three arenas: variable declarations, routines,
//! and record types all live in flat `Vec`s owned by [`Ast`], and nodes
//! reference each other through typed indices. The symbol table holds the
//! same indices, so nothing here is reference-counted or back-linked.
//!
//! Every expression variant carries the fundamental type it evaluates to;
//! the parser computes it at construction from the promotion rules.

use actc_util::SourceLoc;

use crate::symtab::SymbolTable;
use crate::types::{promote, FundamentalType, RecordDef, RecordId, Type};

/// Index of a variable declaration in [`Ast::vars`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a routine in [`Ast::routines`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RoutineId(pub u32);

impl RoutineId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a variable lives, fixed at declaration time. The emitter turns
/// this into the scope operand of LOAD/STORE instructions; parameters get
/// negative frame offsets, locals non-negative ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Global,
    Param,
    Local,
}

/// Initializer options on a variable declaration.
///
/// `is_address` marks the `name = $addr` form: the value is an absolute
/// memory address, no storage is emitted, and every reference uses the
/// fixed address.
#[derive(Clone, Debug, PartialEq)]
pub struct InitOpts {
    pub values: Vec<i32>,
    pub is_address: bool,
}

/// A single declared variable (global, parameter, or local).
#[derive(Clone, Debug)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
    pub init: Option<InitOpts>,
    pub placement: Placement,
    pub loc: SourceLoc,
}

/// A PROC or FUNC. `return_type` is VOID for procedures.
#[derive(Clone, Debug)]
pub struct Routine {
    pub name: String,
    pub params: Vec<VarId>,
    pub decls: Vec<VarId>,
    pub body: Vec<Stmt>,
    pub fixed_addr: Option<u16>,
    pub return_type: FundamentalType,
    pub loc: SourceLoc,
}

impl Routine {
    pub fn is_func(&self) -> bool {
        self.return_type != FundamentalType::Void
    }
}

/// A module-level declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decl {
    Var(VarId),
    Record(RecordId),
}

/// One MODULE: system declarations followed by routines.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub decls: Vec<Decl>,
    pub routines: Vec<RoutineId>,
}

/// A whole parsed program plus the arenas its indices point into.
#[derive(Debug)]
pub struct Ast {
    pub modules: Vec<Module>,
    pub vars: Vec<VarDecl>,
    pub routines: Vec<Routine>,
    pub records: Vec<RecordDef>,
    pub symtab: SymbolTable,
}

impl Ast {
    pub fn var(&self, id: VarId) -> &VarDecl {
        &self.vars[id.index()]
    }

    pub fn routine(&self, id: RoutineId) -> &Routine {
        &self.routines[id.index()]
    }

    pub fn record(&self, id: RecordId) -> &RecordDef {
        &self.records[id.index()]
    }
}

/// Binary operators, after keyword synonyms have been resolved
/// (`AND` ≡ `&`, `OR` ≡ `%`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lsh,
    Rsh,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Xor,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinOp {
    /// True for the comparison operators, whose results are BYTE booleans.
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le
        )
    }

    /// Result type of `lhs op rhs`. Relational operators yield BYTE and
    /// `*`, `/`, `MOD` always yield INT (so CARD values above 32767
    /// misbehave under them, as on the original compiler); everything else
    /// follows the promotion ladder.
    pub fn result_type(self, lhs: FundamentalType, rhs: FundamentalType) -> FundamentalType {
        if self.is_relational() {
            FundamentalType::Byte
        } else if matches!(self, BinOp::Mul | BinOp::Div | BinOp::Mod) {
            FundamentalType::Int
        } else {
            promote(lhs, rhs)
        }
    }
}

/// A numeric constant with its inferred type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NumericConst {
    pub value: i32,
    pub ty: FundamentalType,
}

impl NumericConst {
    /// Classifies a literal: `0..=255` BYTE, `256..=32767` INT, larger
    /// values CARD.
    pub fn new(value: i32) -> Self {
        let ty = if (0..=255).contains(&value) {
            FundamentalType::Byte
        } else if (-32768..=32767).contains(&value) {
            FundamentalType::Int
        } else {
            FundamentalType::Card
        };
        Self { value, ty }
    }

    /// A constant with an explicit type, for zero padding and loop steps.
    pub fn typed(value: i32, ty: FundamentalType) -> Self {
        Self { value, ty }
    }
}

/// What `@name` refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefTarget {
    Var(VarId),
    Routine(RoutineId),
}

/// A routine invocation, in expression or statement position.
#[derive(Clone, Debug)]
pub struct CallExpr {
    pub routine: RoutineId,
    pub args: Vec<Expr>,
    pub return_type: FundamentalType,
}

/// Expressions. Each variant knows its fundamental result type.
#[derive(Clone, Debug)]
pub enum Expr {
    Const(NumericConst),
    /// Direct scalar access to a variable.
    Var { id: VarId, ty: FundamentalType },
    /// `p^` — value behind a pointer variable.
    Deref { var: VarId, ty: FundamentalType },
    /// `@name` — address of a variable or routine; always CARD.
    Reference(RefTarget),
    /// `r.f` — record field, offset folded in at parse time.
    Field {
        var: VarId,
        offset: u16,
        ty: FundamentalType,
    },
    /// `a(i)` — array element.
    Index {
        var: VarId,
        index: Box<Expr>,
        ty: FundamentalType,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        ty: FundamentalType,
    },
    /// Unary minus; always INT.
    Negate(Box<Expr>),
    Call(CallExpr),
}

impl Expr {
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        let ty = op.result_type(lhs.fund_type(), rhs.fund_type());
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            ty,
        }
    }

    /// The fundamental type this expression evaluates to.
    pub fn fund_type(&self) -> FundamentalType {
        match self {
            Expr::Const(c) => c.ty,
            Expr::Var { ty, .. } => *ty,
            Expr::Deref { ty, .. } => *ty,
            Expr::Reference(_) => FundamentalType::Card,
            Expr::Field { ty, .. } => *ty,
            Expr::Index { ty, .. } => *ty,
            Expr::Binary { ty, .. } => *ty,
            Expr::Negate(_) => FundamentalType::Int,
            Expr::Call(call) => call.return_type,
        }
    }

    /// True when the top-level operator is relational; such expressions
    /// are rejected where an arithmetic expression is required.
    pub fn is_relational(&self) -> bool {
        matches!(self, Expr::Binary { op, .. } if op.is_relational())
    }
}

/// One `cond THEN body` arm of an IF statement.
#[derive(Clone, Debug)]
pub struct Conditional {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

/// A `DO ... {UNTIL cond} OD` loop body, also the tail of WHILE and FOR.
#[derive(Clone, Debug)]
pub struct DoLoop {
    pub body: Vec<Stmt>,
    pub until: Option<Expr>,
}

/// Statements.
#[derive(Clone, Debug)]
pub enum Stmt {
    /// `lvalue = expr`; the target is restricted to Var, Index, Deref, or
    /// Field by the parser.
    Assign { target: Expr, value: Expr },
    If {
        arms: Vec<Conditional>,
        else_body: Option<Vec<Stmt>>,
    },
    Do(DoLoop),
    While { cond: Expr, body: DoLoop },
    For {
        var: VarId,
        var_ty: FundamentalType,
        start: Expr,
        finish: Expr,
        step: Expr,
        body: DoLoop,
    },
    Exit { loc: SourceLoc },
    Return(Option<Expr>),
    Call(CallExpr),
    /// Inline machine code: raw constants copied into the image.
    CodeBlock(Vec<i32>),
    /// Debug print of one value; the only I/O primitive.
    DevPrint(Expr),
}

#[cfg(test)]
mod tests {
    use super::*;
    use FundamentalType::*;

    #[test]
    fn test_numeric_const_classification() {
        assert_eq!(NumericConst::new(0).ty, Byte);
        assert_eq!(NumericConst::new(255).ty, Byte);
        assert_eq!(NumericConst::new(256).ty, Int);
        assert_eq!(NumericConst::new(32767).ty, Int);
        assert_eq!(NumericConst::new(32768).ty, Card);
        assert_eq!(NumericConst::new(65535).ty, Card);
    }

    #[test]
    fn test_relational_result_is_byte() {
        for op in [BinOp::Eq, BinOp::Ne, BinOp::Gt, BinOp::Ge, BinOp::Lt, BinOp::Le] {
            assert_eq!(op.result_type(Card, Card), Byte);
        }
    }

    #[test]
    fn test_mul_div_mod_result_is_int() {
        for op in [BinOp::Mul, BinOp::Div, BinOp::Mod] {
            assert_eq!(op.result_type(Card, Card), Int);
            assert_eq!(op.result_type(Byte, Byte), Int);
        }
    }

    #[test]
    fn test_additive_follows_promotion() {
        assert_eq!(BinOp::Add.result_type(Byte, Byte), Byte);
        assert_eq!(BinOp::Add.result_type(Byte, Int), Int);
        assert_eq!(BinOp::Sub.result_type(Int, Card), Card);
    }

    #[test]
    fn test_negate_is_int() {
        let e = Expr::Negate(Box::new(Expr::Const(NumericConst::new(5))));
        assert_eq!(e.fund_type(), Int);
    }
}
