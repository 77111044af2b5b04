// The symbol record stream: a flat run of length-prefixed CodeView symbol
// records, referenced by the DBI header.

use anyhow::{ensure, Result};

use crate::codeview::{sym, TypeIndex};
use crate::parse::{Numeric, ParseBuf};

/// Whether a name is visible outside its translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Linkage {
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSymbol {
    pub kind: u16,
    pub type_index: TypeIndex,
    pub offset: u32,
    pub segment: u16,
    pub name: String,
}

impl DataSymbol {
    pub fn linkage(&self) -> Linkage {
        match self.kind {
            sym::S_LDATA32 | sym::S_LDATA32_ST | sym::S_LTHREAD32 | sym::S_LTHREAD32_ST => {
                Linkage::Internal
            }
            _ => Linkage::External,
        }
    }

    pub fn is_thread_local(&self) -> bool {
        matches!(
            self.kind,
            sym::S_LTHREAD32 | sym::S_LTHREAD32_ST | sym::S_GTHREAD32 | sym::S_GTHREAD32_ST
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublicSymbol {
    pub flags: u32,
    pub offset: u32,
    pub segment: u16,
    pub name: String,
}

impl PublicSymbol {
    pub fn is_code(&self) -> bool {
        self.flags & 0x2 != 0
    }

    pub fn is_function(&self) -> bool {
        self.flags & 0x8 != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UdtSymbol {
    pub type_index: TypeIndex,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantSymbol {
    pub type_index: TypeIndex,
    pub value: Numeric,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Data(DataSymbol),
    Public(PublicSymbol),
    Udt(UdtSymbol),
    Constant(ConstantSymbol),
    Unknown { kind: u16 },
}

impl Symbol {
    pub fn name(&self) -> Option<&str> {
        match self {
            Symbol::Data(s) => Some(&s.name),
            Symbol::Public(s) => Some(&s.name),
            Symbol::Udt(s) => Some(&s.name),
            Symbol::Constant(s) => Some(&s.name),
            Symbol::Unknown { .. } => None,
        }
    }
}

pub struct SymbolStream {
    data: Vec<u8>,
}

impl SymbolStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn iter(&self) -> SymbolIter<'_> {
        SymbolIter {
            buf: ParseBuf::new(&self.data),
        }
    }
}

pub struct SymbolIter<'a> {
    buf: ParseBuf<'a>,
}

impl SymbolIter<'_> {
    fn read_record(&mut self) -> Result<Symbol> {
        let length = self.buf.read_u16()?;
        ensure!(length >= 2, "symbol record of {} bytes is too short", length);
        let record = self.buf.take(length as usize)?;
        let mut buf = ParseBuf::new(record);
        let kind = buf.read_u16()?;
        parse_symbol(kind, &mut buf)
    }
}

impl Iterator for SymbolIter<'_> {
    type Item = Result<Symbol>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.remaining() < 4 {
            return None;
        }
        Some(self.read_record())
    }
}

fn parse_symbol(kind: u16, buf: &mut ParseBuf) -> Result<Symbol> {
    Ok(match kind {
        sym::S_LDATA32
        | sym::S_GDATA32
        | sym::S_LTHREAD32
        | sym::S_GTHREAD32
        | sym::S_LDATA32_ST
        | sym::S_GDATA32_ST
        | sym::S_LTHREAD32_ST
        | sym::S_GTHREAD32_ST => {
            let type_index = TypeIndex(buf.read_u32()?);
            let offset = buf.read_u32()?;
            let segment = buf.read_u16()?;
            let name = buf.read_name(kind, sym::S_ST_MAX)?;
            Symbol::Data(DataSymbol {
                kind,
                type_index,
                offset,
                segment,
                name,
            })
        }
        sym::S_PUB32 | sym::S_PUB32_ST => {
            let flags = buf.read_u32()?;
            let offset = buf.read_u32()?;
            let segment = buf.read_u16()?;
            let name = buf.read_name(kind, sym::S_ST_MAX)?;
            Symbol::Public(PublicSymbol {
                flags,
                offset,
                segment,
                name,
            })
        }
        sym::S_UDT | sym::S_UDT_ST => {
            let type_index = TypeIndex(buf.read_u32()?);
            let name = buf.read_name(kind, sym::S_ST_MAX)?;
            Symbol::Udt(UdtSymbol { type_index, name })
        }
        sym::S_CONSTANT | sym::S_CONSTANT_ST => {
            let type_index = TypeIndex(buf.read_u32()?);
            let value = buf.read_numeric()?;
            let name = buf.read_name(kind, sym::S_ST_MAX)?;
            Symbol::Constant(ConstantSymbol {
                type_index,
                value,
                name,
            })
        }
        other => Symbol::Unknown { kind: other },
    })
}
