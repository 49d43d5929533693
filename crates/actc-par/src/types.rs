//! The Action! type model.
//!
//! Four fundamental value types with fixed widths, plus records, pointers,
//! and arrays built over them. The internal VOID type marks procedures
//! without a return value; relational results are BYTE (0 = false, nonzero
//! = true).

use rustc_hash::FxHashMap;

/// Index of a record type in the AST's record arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordId(pub u32);

impl RecordId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A fundamental (scalar) type. The discriminants are the wire encoding
/// used in bytecode type operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FundamentalType {
    Byte = 0,
    Char = 1,
    Int = 2,
    Card = 3,
    Void = 4,
}

impl FundamentalType {
    /// Decodes a bytecode type operand.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => FundamentalType::Byte,
            1 => FundamentalType::Char,
            2 => FundamentalType::Int,
            3 => FundamentalType::Card,
            4 => FundamentalType::Void,
            _ => return None,
        })
    }

    /// Storage width in bytes.
    pub fn size_bytes(self) -> u16 {
        match self {
            FundamentalType::Byte | FundamentalType::Char => 1,
            FundamentalType::Int | FundamentalType::Card => 2,
            FundamentalType::Void => 0,
        }
    }

    /// Rank used by the implicit numeric promotion rules.
    fn cast_priority(self) -> u8 {
        match self {
            FundamentalType::Byte | FundamentalType::Char | FundamentalType::Void => 1,
            FundamentalType::Int => 2,
            FundamentalType::Card => 3,
        }
    }

    /// True for the signed type.
    pub fn is_signed(self) -> bool {
        self == FundamentalType::Int
    }
}

/// The wider of two operand types: BYTE/CHAR < INT < CARD. CHAR operands
/// promote to BYTE, never back to CHAR.
pub fn promote(a: FundamentalType, b: FundamentalType) -> FundamentalType {
    match a.cast_priority().max(b.cast_priority()) {
        1 => FundamentalType::Byte,
        2 => FundamentalType::Int,
        _ => FundamentalType::Card,
    }
}

/// What a pointer points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pointee {
    Fund(FundamentalType),
    Record(RecordId),
}

impl Pointee {
    /// The fundamental type loaded or stored through the pointer.
    /// Record pointees are addressed field-by-field, never whole.
    pub fn fund(self) -> Option<FundamentalType> {
        match self {
            Pointee::Fund(t) => Some(t),
            Pointee::Record(_) => None,
        }
    }
}

/// A declared variable type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Fund(FundamentalType),
    Record(RecordId),
    Pointer(Pointee),
    /// Element type plus optional compile-time length.
    Array {
        elem: FundamentalType,
        len: Option<u16>,
    },
}

impl Type {
    /// The fundamental type a direct access to this variable yields.
    /// Pointers are stored as CARD addresses and arrays decay to CARD;
    /// record variables have no direct scalar access.
    pub fn fund(&self) -> Option<FundamentalType> {
        match self {
            Type::Fund(t) => Some(*t),
            Type::Pointer(_) => Some(FundamentalType::Card),
            Type::Array { .. } => Some(FundamentalType::Card),
            Type::Record(_) => None,
        }
    }

    /// Storage width of one variable of this type, for frame layout and
    /// global data emission. Arrays without a length occupy no storage of
    /// their own.
    pub fn size_bytes(&self, records: &[RecordDef]) -> u16 {
        match self {
            Type::Fund(t) => t.size_bytes(),
            Type::Pointer(_) => 2,
            Type::Record(id) => records[id.index()].size_bytes(),
            Type::Array { elem, len } => len.map_or(0, |n| n * elem.size_bytes()),
        }
    }

    /// Width this type occupies when passed as a parameter; composite
    /// types are passed as 2-byte addresses.
    pub fn param_size_bytes(&self) -> u16 {
        match self {
            Type::Fund(t) => t.size_bytes(),
            Type::Pointer(_) | Type::Array { .. } | Type::Record(_) => 2,
        }
    }
}

/// A named record type: an ordered list of uniquely named scalar fields.
#[derive(Clone, Debug)]
pub struct RecordDef {
    pub name: String,
    fields: Vec<(String, FundamentalType)>,
    lookup: FxHashMap<String, usize>,
}

impl RecordDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            lookup: FxHashMap::default(),
        }
    }

    /// Appends a field. Returns false when the name is already taken.
    pub fn add_field(&mut self, name: impl Into<String>, field_type: FundamentalType) -> bool {
        let name = name.into();
        if self.lookup.contains_key(&name) {
            return false;
        }
        self.lookup.insert(name.clone(), self.fields.len());
        self.fields.push((name, field_type));
        true
    }

    /// Byte offset and type of a field, if declared.
    pub fn field(&self, name: &str) -> Option<(u16, FundamentalType)> {
        let index = *self.lookup.get(name)?;
        let offset = self.fields[..index]
            .iter()
            .map(|(_, t)| t.size_bytes())
            .sum();
        Some((offset, self.fields[index].1))
    }

    pub fn fields(&self) -> &[(String, FundamentalType)] {
        &self.fields
    }

    /// Total width: the sum of the field widths.
    pub fn size_bytes(&self) -> u16 {
        self.fields.iter().map(|(_, t)| t.size_bytes()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FundamentalType::*;

    #[test]
    fn test_sizes() {
        assert_eq!(Byte.size_bytes(), 1);
        assert_eq!(Char.size_bytes(), 1);
        assert_eq!(Int.size_bytes(), 2);
        assert_eq!(Card.size_bytes(), 2);
        assert_eq!(Void.size_bytes(), 0);
    }

    #[test]
    fn test_promotion_ladder() {
        assert_eq!(promote(Byte, Byte), Byte);
        assert_eq!(promote(Char, Char), Byte);
        assert_eq!(promote(Byte, Int), Int);
        assert_eq!(promote(Int, Card), Card);
        assert_eq!(promote(Card, Byte), Card);
    }

    #[test]
    fn test_wire_encoding_round_trip() {
        for t in [Byte, Char, Int, Card, Void] {
            assert_eq!(FundamentalType::from_byte(t as u8), Some(t));
        }
        assert_eq!(FundamentalType::from_byte(5), None);
    }

    #[test]
    fn test_record_field_offsets() {
        let mut rec = RecordDef::new("Pt");
        assert!(rec.add_field("x", Byte));
        assert!(rec.add_field("n", Int));
        assert!(rec.add_field("y", Byte));
        assert_eq!(rec.field("x"), Some((0, Byte)));
        assert_eq!(rec.field("n"), Some((1, Int)));
        assert_eq!(rec.field("y"), Some((3, Byte)));
        assert_eq!(rec.field("z"), None);
        assert_eq!(rec.size_bytes(), 4);
    }

    #[test]
    fn test_record_duplicate_field_rejected() {
        let mut rec = RecordDef::new("Pt");
        assert!(rec.add_field("x", Byte));
        assert!(!rec.add_field("x", Int));
        assert_eq!(rec.size_bytes(), 1);
    }

    #[test]
    fn test_array_sizes() {
        let arr = Type::Array {
            elem: Card,
            len: Some(3),
        };
        assert_eq!(arr.size_bytes(&[]), 6);
        let open = Type::Array {
            elem: Byte,
            len: None,
        };
        assert_eq!(open.size_bytes(&[]), 0);
        assert_eq!(open.param_size_bytes(), 2);
    }
}
