// CodeView constants and small shared types used by the TPI and symbol
// record streams.

use std::fmt;

/// Type record leaf ids, from cvinfo.h.
pub mod leaf {
    pub const LF_MODIFIER: u16 = 0x1001;
    pub const LF_POINTER: u16 = 0x1002;
    pub const LF_PROCEDURE: u16 = 0x1008;
    pub const LF_MFUNCTION: u16 = 0x1009;
    pub const LF_ARGLIST: u16 = 0x1201;
    pub const LF_FIELDLIST: u16 = 0x1203;
    pub const LF_BITFIELD: u16 = 0x1205;
    pub const LF_METHODLIST: u16 = 0x1206;

    pub const LF_BCLASS: u16 = 0x1400;
    pub const LF_VBCLASS: u16 = 0x1401;
    pub const LF_IVBCLASS: u16 = 0x1402;
    pub const LF_VFUNCTAB: u16 = 0x1409;

    pub const LF_ENUMERATE_ST: u16 = 0x0403;
    pub const LF_ENUMERATE: u16 = 0x1502;
    pub const LF_ARRAY_ST: u16 = 0x1003;
    pub const LF_ARRAY: u16 = 0x1503;
    pub const LF_CLASS_ST: u16 = 0x1004;
    pub const LF_CLASS: u16 = 0x1504;
    pub const LF_STRUCTURE_ST: u16 = 0x1005;
    pub const LF_STRUCTURE: u16 = 0x1505;
    pub const LF_UNION_ST: u16 = 0x1006;
    pub const LF_UNION: u16 = 0x1506;
    pub const LF_ENUM_ST: u16 = 0x1007;
    pub const LF_ENUM: u16 = 0x1507;
    pub const LF_MEMBER_ST: u16 = 0x1405;
    pub const LF_MEMBER: u16 = 0x150d;
    pub const LF_STMEMBER_ST: u16 = 0x1406;
    pub const LF_STMEMBER: u16 = 0x150e;
    pub const LF_METHOD_ST: u16 = 0x1407;
    pub const LF_METHOD: u16 = 0x150f;
    pub const LF_NESTTYPE_ST: u16 = 0x1408;
    pub const LF_NESTTYPE: u16 = 0x1510;
    pub const LF_ONEMETHOD_ST: u16 = 0x140b;
    pub const LF_ONEMETHOD: u16 = 0x1511;
    pub const LF_INTERFACE: u16 = 0x1519;

    /// Records above this use NUL-terminated names, at or below use
    /// length-prefixed ones.
    pub const LF_ST_MAX: u16 = 0x1500;

    /// Values below this in a numeric leaf position are the number itself.
    pub const LF_NUMERIC: u16 = 0x8000;
    pub const LF_CHAR: u16 = 0x8000;
    pub const LF_SHORT: u16 = 0x8001;
    pub const LF_USHORT: u16 = 0x8002;
    pub const LF_LONG: u16 = 0x8003;
    pub const LF_ULONG: u16 = 0x8004;
    pub const LF_REAL32: u16 = 0x8005;
    pub const LF_REAL64: u16 = 0x8006;
    pub const LF_REAL80: u16 = 0x8007;
    pub const LF_REAL128: u16 = 0x8008;
    pub const LF_QUADWORD: u16 = 0x8009;
    pub const LF_UQUADWORD: u16 = 0x800a;
    pub const LF_VARSTRING: u16 = 0x8010;

    pub const LF_PAD0: u8 = 0xf0;
}

/// Symbol record kinds, from cvinfo.h.
pub mod sym {
    pub const S_END: u16 = 0x0006;

    pub const S_CONSTANT_ST: u16 = 0x1002;
    pub const S_UDT_ST: u16 = 0x1003;
    pub const S_LDATA32_ST: u16 = 0x1007;
    pub const S_GDATA32_ST: u16 = 0x1008;
    pub const S_PUB32_ST: u16 = 0x1009;
    pub const S_LTHREAD32_ST: u16 = 0x100e;
    pub const S_GTHREAD32_ST: u16 = 0x100f;

    /// Same NUL-terminated versus length-prefixed boundary as for type
    /// leaves, at the symbol-table value.
    pub const S_ST_MAX: u16 = 0x1100;

    pub const S_OBJNAME: u16 = 0x1101;
    pub const S_CONSTANT: u16 = 0x1107;
    pub const S_UDT: u16 = 0x1108;
    pub const S_LDATA32: u16 = 0x110c;
    pub const S_GDATA32: u16 = 0x110d;
    pub const S_PUB32: u16 = 0x110e;
    pub const S_LPROC32: u16 = 0x110f;
    pub const S_GPROC32: u16 = 0x1110;
    pub const S_LTHREAD32: u16 = 0x1112;
    pub const S_GTHREAD32: u16 = 0x1113;
    pub const S_COMPILE3: u16 = 0x113c;
}

/// Calling conventions (CV_call_e).
pub mod call {
    pub const NEAR_C: u8 = 0x00;
    pub const NEAR_FAST: u8 = 0x04;
    pub const NEAR_STD: u8 = 0x07;
    pub const NEAR_SYS: u8 = 0x09;
    pub const THISCALL: u8 = 0x0b;
    pub const CLRCALL: u8 = 0x16;

    pub fn name(convention: u8) -> &'static str {
        match convention {
            NEAR_C => "cdecl",
            NEAR_FAST => "fastcall",
            NEAR_STD => "stdcall",
            NEAR_SYS => "syscall",
            THISCALL => "thiscall",
            CLRCALL => "clrcall",
            _ => "unknown",
        }
    }
}

/// Index into the type stream. Values below 0x1000 denote built-in
/// primitive types; the rest are records in the TPI stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIndex(pub u32);

impl TypeIndex {
    pub const MIN_DYNAMIC: u32 = 0x1000;

    pub fn is_primitive(self) -> bool {
        self.0 < Self::MIN_DYNAMIC
    }

    pub fn primitive(self) -> Option<PrimitiveType> {
        PrimitiveType::from_index(self)
    }
}

impl From<u32> for TypeIndex {
    fn from(value: u32) -> Self {
        TypeIndex(value)
    }
}

impl fmt::Debug for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeIndex(0x{:x})", self.0)
    }
}

impl fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// What a primitive type index means, decomposed: the low byte selects the
/// base type, bits 8..12 the indirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveType {
    pub kind: PrimitiveKind,
    pub indirection: Indirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    NoType,
    Void,
    NotTranslated,
    HResult,
    SignedCharacter,
    UnsignedCharacter,
    NarrowCharacter,
    WideCharacter,
    Character8,
    Character16,
    Character32,
    SByte,
    Byte,
    Int16Short,
    UInt16Short,
    Int16,
    UInt16,
    Int32Long,
    UInt32Long,
    Int32,
    UInt32,
    Int64Quad,
    UInt64Quad,
    Int64,
    UInt64,
    Int128,
    UInt128,
    Boolean8,
    Boolean16,
    Boolean32,
    Boolean64,
    Float16,
    Float32,
    Float32PartialPrecision,
    Float48,
    Float64,
    Float80,
    Float128,
}

impl PrimitiveKind {
    fn from_low_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x00 => Self::NoType,
            0x03 => Self::Void,
            0x07 => Self::NotTranslated,
            0x08 => Self::HResult,
            0x10 => Self::SignedCharacter,
            0x20 => Self::UnsignedCharacter,
            0x70 => Self::NarrowCharacter,
            0x71 => Self::WideCharacter,
            0x7c => Self::Character8,
            0x7a => Self::Character16,
            0x7b => Self::Character32,
            0x68 => Self::SByte,
            0x69 => Self::Byte,
            0x11 => Self::Int16Short,
            0x21 => Self::UInt16Short,
            0x72 => Self::Int16,
            0x73 => Self::UInt16,
            0x12 => Self::Int32Long,
            0x22 => Self::UInt32Long,
            0x74 => Self::Int32,
            0x75 => Self::UInt32,
            0x13 => Self::Int64Quad,
            0x23 => Self::UInt64Quad,
            0x76 => Self::Int64,
            0x77 => Self::UInt64,
            0x78 => Self::Int128,
            0x79 => Self::UInt128,
            0x30 => Self::Boolean8,
            0x31 => Self::Boolean16,
            0x32 => Self::Boolean32,
            0x33 => Self::Boolean64,
            0x46 => Self::Float16,
            0x40 => Self::Float32,
            0x45 => Self::Float32PartialPrecision,
            0x44 => Self::Float48,
            0x41 => Self::Float64,
            0x42 => Self::Float80,
            0x43 => Self::Float128,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indirection {
    Direct,
    Near16,
    Far16,
    Huge16,
    Near32,
    Far32,
    Near64,
    Near128,
}

impl Indirection {
    fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0 => Self::Direct,
            1 => Self::Near16,
            2 => Self::Far16,
            3 => Self::Huge16,
            4 => Self::Near32,
            5 => Self::Far32,
            6 => Self::Near64,
            7 => Self::Near128,
            _ => return None,
        })
    }
}

impl PrimitiveType {
    pub fn from_index(ti: TypeIndex) -> Option<Self> {
        if !ti.is_primitive() {
            return None;
        }
        let kind = PrimitiveKind::from_low_byte((ti.0 & 0xff) as u8)?;
        let indirection = Indirection::from_bits(((ti.0 >> 8) & 0x0f) as u8)?;
        Some(PrimitiveType { kind, indirection })
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.indirection {
            Indirection::Direct => write!(f, "{:?}", self.kind),
            other => write!(f, "{:?} to {:?}", other, self.kind),
        }
    }
}

/// Property bits on struct/union/enum records (CV_prop_t).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeProperties(pub u16);

impl TypeProperties {
    pub fn packed(self) -> bool {
        self.0 & (1 << 0) != 0
    }
    pub fn has_constructor(self) -> bool {
        self.0 & (1 << 1) != 0
    }
    pub fn overloaded_operators(self) -> bool {
        self.0 & (1 << 2) != 0
    }
    pub fn is_nested(self) -> bool {
        self.0 & (1 << 3) != 0
    }
    pub fn contains_nested(self) -> bool {
        self.0 & (1 << 4) != 0
    }
    pub fn overloaded_assignment(self) -> bool {
        self.0 & (1 << 5) != 0
    }
    pub fn overloaded_casts(self) -> bool {
        self.0 & (1 << 6) != 0
    }
    pub fn forward_reference(self) -> bool {
        self.0 & (1 << 7) != 0
    }
    pub fn scoped(self) -> bool {
        self.0 & (1 << 8) != 0
    }
    pub fn has_unique_name(self) -> bool {
        self.0 & (1 << 9) != 0
    }
    pub fn sealed(self) -> bool {
        self.0 & (1 << 10) != 0
    }
    pub fn intrinsic(self) -> bool {
        self.0 & (1 << 13) != 0
    }
}

/// Attribute bits on class/struct members (CV_fldattr_t).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldAttributes(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Private,
    Protected,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Vanilla,
    Virtual,
    Static,
    Friend,
    Intro,
    PureVirtual,
    PureIntro,
}

impl FieldAttributes {
    pub fn access(self) -> Option<Access> {
        match self.0 & 0x3 {
            1 => Some(Access::Private),
            2 => Some(Access::Protected),
            3 => Some(Access::Public),
            _ => None,
        }
    }

    pub fn method_kind(self) -> Option<MethodKind> {
        match (self.0 >> 2) & 0x7 {
            0 => Some(MethodKind::Vanilla),
            1 => Some(MethodKind::Virtual),
            2 => Some(MethodKind::Static),
            3 => Some(MethodKind::Friend),
            4 => Some(MethodKind::Intro),
            5 => Some(MethodKind::PureVirtual),
            6 => Some(MethodKind::PureIntro),
            _ => None,
        }
    }

    pub fn is_pseudo(self) -> bool {
        self.0 & (1 << 5) != 0
    }
    pub fn is_compiler_generated(self) -> bool {
        self.0 & (1 << 8) != 0
    }
    pub fn is_sealed(self) -> bool {
        self.0 & (1 << 9) != 0
    }

    /// Introducing virtuals carry a vtable offset after the method type.
    pub fn is_introducing(self) -> bool {
        matches!(
            self.method_kind(),
            Some(MethodKind::Intro) | Some(MethodKind::PureIntro)
        )
    }
}

/// Attribute bits on LF_POINTER records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerAttributes(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Near16,
    Far16,
    Huge16,
    BasedOnSegment,
    BasedOnValue,
    BasedOnSegmentValue,
    BasedOnAddress,
    BasedOnSegmentAddress,
    BasedOnType,
    BasedOnSelf,
    Near32,
    Far32,
    Ptr64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerMode {
    Pointer,
    LValueReference,
    Member,
    MemberFunction,
    RValueReference,
}

impl PointerAttributes {
    pub fn kind(self) -> Option<PointerKind> {
        Some(match self.0 & 0x1f {
            0x00 => PointerKind::Near16,
            0x01 => PointerKind::Far16,
            0x02 => PointerKind::Huge16,
            0x03 => PointerKind::BasedOnSegment,
            0x04 => PointerKind::BasedOnValue,
            0x05 => PointerKind::BasedOnSegmentValue,
            0x06 => PointerKind::BasedOnAddress,
            0x07 => PointerKind::BasedOnSegmentAddress,
            0x08 => PointerKind::BasedOnType,
            0x09 => PointerKind::BasedOnSelf,
            0x0a => PointerKind::Near32,
            0x0b => PointerKind::Far32,
            0x0c => PointerKind::Ptr64,
            _ => return None,
        })
    }

    pub fn mode(self) -> Option<PointerMode> {
        Some(match (self.0 >> 5) & 0x7 {
            0 => PointerMode::Pointer,
            1 => PointerMode::LValueReference,
            2 => PointerMode::Member,
            3 => PointerMode::MemberFunction,
            4 => PointerMode::RValueReference,
            _ => return None,
        })
    }

    pub fn is_flat32(self) -> bool {
        self.0 & (1 << 8) != 0
    }
    pub fn is_volatile(self) -> bool {
        self.0 & (1 << 9) != 0
    }
    pub fn is_const(self) -> bool {
        self.0 & (1 << 10) != 0
    }
    pub fn is_unaligned(self) -> bool {
        self.0 & (1 << 11) != 0
    }
    pub fn is_restrict(self) -> bool {
        self.0 & (1 << 12) != 0
    }

    pub fn size(self) -> u32 {
        (self.0 >> 13) & 0x3f
    }
}
