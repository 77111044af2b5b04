// The TPI stream (fixed index 2): CodeView type records addressed by type
// index. Records are length-prefixed and dense, so one indexing pass gives
// O(1) lookup; the hash stream, when present, narrows name lookups.

use anyhow::{bail, ensure, Context, Result};

use crate::codeview::{leaf, FieldAttributes, PointerAttributes, TypeIndex, TypeProperties};
use crate::hash::name_hash_v1;
use crate::parse::{Numeric, ParseBuf};

#[derive(Debug, Clone, Copy)]
pub struct OffsetSize {
    pub offset: i32,
    pub size: i32,
}

#[derive(Debug, Clone)]
pub struct TypeStreamHeader {
    pub version: u32,
    pub header_size: i32,
    pub ti_min: u32,
    pub ti_max: u32,
    pub records_size: u32,
    pub hash_stream: u16,
    pub aux_hash_stream: u16,
    pub hash_key_size: i32,
    pub bucket_count: u32,
    pub hash_values: OffsetSize,
    pub index_offsets: OffsetSize,
    pub hash_adjusters: OffsetSize,
}

impl TypeStreamHeader {
    fn parse(buf: &mut ParseBuf) -> Result<Self> {
        let read_pair = |buf: &mut ParseBuf| -> Result<OffsetSize> {
            Ok(OffsetSize {
                offset: buf.read_i32()?,
                size: buf.read_i32()?,
            })
        };
        Ok(Self {
            version: buf.read_u32()?,
            header_size: buf.read_i32()?,
            ti_min: buf.read_u32()?,
            ti_max: buf.read_u32()?,
            records_size: buf.read_u32()?,
            hash_stream: buf.read_u16()?,
            aux_hash_stream: buf.read_u16()?,
            hash_key_size: buf.read_i32()?,
            bucket_count: buf.read_u32()?,
            hash_values: read_pair(buf)?,
            index_offsets: read_pair(buf)?,
            hash_adjusters: read_pair(buf)?,
        })
    }
}

/// Bucket number per dynamic type index, from the hash stream.
struct TpiHash {
    buckets: Vec<u32>,
}

impl TpiHash {
    fn parse(header: &TypeStreamHeader, stream: &[u8]) -> Result<Self> {
        ensure!(
            header.hash_key_size == 4,
            "can only deal with 4-byte hash keys, stream has {}",
            header.hash_key_size
        );
        let count = (header.ti_max - header.ti_min) as usize;
        let offset = usize::try_from(header.hash_values.offset).context("negative hash buffer offset")?;
        let size = usize::try_from(header.hash_values.size).context("negative hash buffer size")?;
        ensure!(
            size == 4 * count || size == 0,
            "hash value buffer holds {} bytes for {} types",
            size,
            count
        );
        let end = offset.checked_add(size).context("hash buffer range overflows")?;
        ensure!(end <= stream.len(), "hash value buffer extends past the hash stream");

        let mut buf = ParseBuf::new(&stream[offset..end]);
        let mut buckets = Vec::with_capacity(size / 4);
        while !buf.is_empty() {
            buckets.push(buf.read_u32()?);
        }
        Ok(Self { buckets })
    }
}

pub struct TypeStream {
    header: TypeStreamHeader,
    data: Vec<u8>,
    /// Offset of each record's length prefix, per dynamic index.
    offsets: Vec<usize>,
    hash: Option<TpiHash>,
}

impl TypeStream {
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let header = {
            let mut buf = ParseBuf::new(&data);
            TypeStreamHeader::parse(&mut buf).context("type stream header truncated")?
        };
        ensure!(
            header.ti_min >= TypeIndex::MIN_DYNAMIC && header.ti_max >= header.ti_min,
            "nonsense type index range {}..{}",
            header.ti_min,
            header.ti_max
        );
        let header_size = usize::try_from(header.header_size).context("negative header size")?;
        let end = header_size
            .checked_add(header.records_size as usize)
            .context("record area overflows")?;
        ensure!(end <= data.len(), "type record area extends past the stream");

        let count = (header.ti_max - header.ti_min) as usize;
        let mut offsets = Vec::with_capacity(count);
        let mut pos = header_size;
        for index in 0..count {
            ensure!(pos + 4 <= end, "type records truncated at dynamic index {}", index);
            offsets.push(pos);
            let size = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
            ensure!(size >= 2, "type record at offset {} too short", pos);
            pos += 2 + size;
            ensure!(pos <= end, "type record at dynamic index {} overruns the stream", index);
        }
        log::debug!("tpi: {} records, indices {:#x}..{:#x}", count, header.ti_min, header.ti_max);

        Ok(Self {
            header,
            data,
            offsets,
            hash: None,
        })
    }

    pub fn header(&self) -> &TypeStreamHeader {
        &self.header
    }

    pub fn type_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn contains(&self, ti: TypeIndex) -> bool {
        (self.header.ti_min..self.header.ti_max).contains(&ti.0)
    }

    pub fn attach_hash(&mut self, stream: &[u8]) -> Result<()> {
        self.hash = Some(TpiHash::parse(&self.header, stream)?);
        Ok(())
    }

    fn record_at(&self, pos: usize) -> Result<TypeRecord> {
        let size = u16::from_le_bytes([self.data[pos], self.data[pos + 1]]) as usize;
        parse_type_record(&self.data[pos + 2..pos + 2 + size])
    }

    pub fn get(&self, ti: TypeIndex) -> Result<TypeRecord> {
        if ti.is_primitive() {
            bail!("{} is a primitive type index, not a record", ti);
        }
        ensure!(self.contains(ti), "type index {} out of range", ti);
        self.record_at(self.offsets[(ti.0 - self.header.ti_min) as usize])
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeIndex, Result<TypeRecord>)> + '_ {
        self.offsets.iter().enumerate().map(move |(index, &pos)| {
            (TypeIndex(self.header.ti_min + index as u32), self.record_at(pos))
        })
    }

    /// Indices worth checking for a name; all of them when there is no
    /// usable hash stream. An attached hash with an empty bucket array
    /// would otherwise rule out every record.
    fn candidates(&self, name: &str) -> Vec<TypeIndex> {
        match &self.hash {
            Some(hash) if self.header.bucket_count != 0 && !hash.buckets.is_empty() => {
                let bucket = name_hash_v1(name) % self.header.bucket_count;
                hash.buckets
                    .iter()
                    .enumerate()
                    .filter(|&(_, &b)| b == bucket)
                    .map(|(index, _)| TypeIndex(self.header.ti_min + index as u32))
                    .collect()
            }
            _ => (self.header.ti_min..self.header.ti_max).map(TypeIndex).collect(),
        }
    }

    /// First record whose name matches.
    pub fn find(&self, name: &str) -> Result<Option<(TypeIndex, TypeRecord)>> {
        for ti in self.candidates(name) {
            let record = self.get(ti)?;
            if record.name() == Some(name) {
                return Ok(Some((ti, record)));
            }
        }
        Ok(None)
    }

    /// Struct/class definition with that name, skipping forward references.
    pub fn find_struct(&self, name: &str) -> Result<Option<(TypeIndex, StructRecord)>> {
        for ti in self.candidates(name) {
            if let TypeRecord::Struct(record) = self.get(ti)? {
                if record.name == name && !record.properties.forward_reference() {
                    return Ok(Some((ti, record)));
                }
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifierRecord {
    pub underlying: TypeIndex,
    pub flags: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerRecord {
    pub underlying: TypeIndex,
    pub attributes: PointerAttributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureRecord {
    pub return_type: TypeIndex,
    pub calling_convention: u8,
    pub attributes: u8,
    pub parameter_count: u16,
    pub argument_list: TypeIndex,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayRecord {
    pub element_type: TypeIndex,
    pub index_type: TypeIndex,
    pub size: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructRecord {
    pub leaf: u16,
    pub field_count: u16,
    pub properties: TypeProperties,
    pub fields: TypeIndex,
    pub derived: TypeIndex,
    pub vshape: TypeIndex,
    pub size: u64,
    pub name: String,
    pub unique_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionRecord {
    pub field_count: u16,
    pub properties: TypeProperties,
    pub fields: TypeIndex,
    pub size: u64,
    pub name: String,
    pub unique_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumRecord {
    pub count: u16,
    pub properties: TypeProperties,
    pub underlying: TypeIndex,
    pub fields: TypeIndex,
    pub name: String,
    pub unique_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitfieldRecord {
    pub underlying: TypeIndex,
    pub length: u8,
    pub position: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeRecord {
    Modifier(ModifierRecord),
    Pointer(PointerRecord),
    Procedure(ProcedureRecord),
    ArgumentList(Vec<TypeIndex>),
    Array(ArrayRecord),
    Struct(StructRecord),
    Union(UnionRecord),
    Enum(EnumRecord),
    FieldList(Vec<Field>),
    Bitfield(BitfieldRecord),
    Unknown { leaf: u16 },
}

impl TypeRecord {
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRecord::Array(r) => Some(&r.name),
            TypeRecord::Struct(r) => Some(&r.name),
            TypeRecord::Union(r) => Some(&r.name),
            TypeRecord::Enum(r) => Some(&r.name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Member {
        attributes: FieldAttributes,
        field_type: TypeIndex,
        offset: u64,
        name: String,
    },
    StaticMember {
        attributes: FieldAttributes,
        field_type: TypeIndex,
        name: String,
    },
    Enumerate {
        attributes: FieldAttributes,
        value: Numeric,
        name: String,
    },
    BaseClass {
        attributes: FieldAttributes,
        base: TypeIndex,
        offset: u64,
    },
    VirtualBaseClass {
        direct: bool,
        attributes: FieldAttributes,
        base: TypeIndex,
        vbptr: TypeIndex,
        vbptr_offset: u64,
        vtable_index: u64,
    },
    VFuncTable {
        table: TypeIndex,
    },
    NestedType {
        nested: TypeIndex,
        name: String,
    },
    OneMethod {
        attributes: FieldAttributes,
        method_type: TypeIndex,
        vtable_offset: Option<u32>,
        name: String,
    },
    Method {
        count: u16,
        method_list: TypeIndex,
        name: String,
    },
}

impl Field {
    pub fn name(&self) -> Option<&str> {
        match self {
            Field::Member { name, .. }
            | Field::StaticMember { name, .. }
            | Field::Enumerate { name, .. }
            | Field::NestedType { name, .. }
            | Field::OneMethod { name, .. }
            | Field::Method { name, .. } => Some(name),
            _ => None,
        }
    }
}

fn read_numeric_u64(buf: &mut ParseBuf, what: &str) -> Result<u64> {
    let value = buf.read_numeric()?;
    value
        .as_u64()
        .with_context(|| format!("{} is not an unsigned number: {:?}", what, value))
}

fn read_type_name(buf: &mut ParseBuf, leaf_id: u16) -> Result<String> {
    buf.read_name(leaf_id, leaf::LF_ST_MAX)
}

fn parse_struct(leaf_id: u16, buf: &mut ParseBuf) -> Result<StructRecord> {
    let field_count = buf.read_u16()?;
    let properties = TypeProperties(buf.read_u16()?);
    let fields = TypeIndex(buf.read_u32()?);
    let derived = TypeIndex(buf.read_u32()?);
    let vshape = TypeIndex(buf.read_u32()?);
    let size = read_numeric_u64(buf, "struct size")?;
    let name = read_type_name(buf, leaf_id)?;
    let unique_name = if properties.has_unique_name() {
        Some(read_type_name(buf, leaf_id)?)
    } else {
        None
    };
    Ok(StructRecord {
        leaf: leaf_id,
        field_count,
        properties,
        fields,
        derived,
        vshape,
        size,
        name,
        unique_name,
    })
}

fn parse_field(buf: &mut ParseBuf) -> Result<Field> {
    let leaf_id = buf.read_u16()?;
    Ok(match leaf_id {
        leaf::LF_MEMBER | leaf::LF_MEMBER_ST => {
            let attributes = FieldAttributes(buf.read_u16()?);
            let field_type = TypeIndex(buf.read_u32()?);
            let offset = read_numeric_u64(buf, "member offset")?;
            let name = read_type_name(buf, leaf_id)?;
            Field::Member {
                attributes,
                field_type,
                offset,
                name,
            }
        }
        leaf::LF_STMEMBER | leaf::LF_STMEMBER_ST => {
            let attributes = FieldAttributes(buf.read_u16()?);
            let field_type = TypeIndex(buf.read_u32()?);
            let name = read_type_name(buf, leaf_id)?;
            Field::StaticMember {
                attributes,
                field_type,
                name,
            }
        }
        leaf::LF_ENUMERATE | leaf::LF_ENUMERATE_ST => {
            let attributes = FieldAttributes(buf.read_u16()?);
            let value = buf.read_numeric()?;
            let name = read_type_name(buf, leaf_id)?;
            Field::Enumerate {
                attributes,
                value,
                name,
            }
        }
        leaf::LF_BCLASS => {
            let attributes = FieldAttributes(buf.read_u16()?);
            let base = TypeIndex(buf.read_u32()?);
            let offset = read_numeric_u64(buf, "base class offset")?;
            Field::BaseClass {
                attributes,
                base,
                offset,
            }
        }
        leaf::LF_VBCLASS | leaf::LF_IVBCLASS => {
            let attributes = FieldAttributes(buf.read_u16()?);
            let base = TypeIndex(buf.read_u32()?);
            let vbptr = TypeIndex(buf.read_u32()?);
            let vbptr_offset = read_numeric_u64(buf, "virtual base pointer offset")?;
            let vtable_index = read_numeric_u64(buf, "virtual base index")?;
            Field::VirtualBaseClass {
                direct: leaf_id == leaf::LF_VBCLASS,
                attributes,
                base,
                vbptr,
                vbptr_offset,
                vtable_index,
            }
        }
        leaf::LF_VFUNCTAB => {
            let _padding = buf.read_u16()?;
            Field::VFuncTable {
                table: TypeIndex(buf.read_u32()?),
            }
        }
        leaf::LF_NESTTYPE | leaf::LF_NESTTYPE_ST => {
            let _padding = buf.read_u16()?;
            let nested = TypeIndex(buf.read_u32()?);
            let name = read_type_name(buf, leaf_id)?;
            Field::NestedType { nested, name }
        }
        leaf::LF_ONEMETHOD | leaf::LF_ONEMETHOD_ST => {
            let attributes = FieldAttributes(buf.read_u16()?);
            let method_type = TypeIndex(buf.read_u32()?);
            let vtable_offset = if attributes.is_introducing() {
                Some(buf.read_u32()?)
            } else {
                None
            };
            let name = read_type_name(buf, leaf_id)?;
            Field::OneMethod {
                attributes,
                method_type,
                vtable_offset,
                name,
            }
        }
        leaf::LF_METHOD | leaf::LF_METHOD_ST => {
            let count = buf.read_u16()?;
            let method_list = TypeIndex(buf.read_u32()?);
            let name = read_type_name(buf, leaf_id)?;
            Field::Method {
                count,
                method_list,
                name,
            }
        }
        // A member leaf we can't size can't be skipped over.
        other => bail!("unknown member leaf 0x{:04x} in field list", other),
    })
}

pub fn parse_type_record(data: &[u8]) -> Result<TypeRecord> {
    let mut buf = ParseBuf::new(data);
    let leaf_id = buf.read_u16()?;
    Ok(match leaf_id {
        leaf::LF_MODIFIER => TypeRecord::Modifier(ModifierRecord {
            underlying: TypeIndex(buf.read_u32()?),
            flags: buf.read_u16()?,
        }),
        leaf::LF_POINTER => TypeRecord::Pointer(PointerRecord {
            underlying: TypeIndex(buf.read_u32()?),
            // member pointers carry trailing class data we don't model
            attributes: PointerAttributes(buf.read_u32()?),
        }),
        leaf::LF_PROCEDURE => TypeRecord::Procedure(ProcedureRecord {
            return_type: TypeIndex(buf.read_u32()?),
            calling_convention: buf.read_u8()?,
            attributes: buf.read_u8()?,
            parameter_count: buf.read_u16()?,
            argument_list: TypeIndex(buf.read_u32()?),
        }),
        leaf::LF_ARGLIST => {
            let count = buf.read_u32()?;
            let mut arguments = Vec::with_capacity(count as usize);
            for _ in 0..count {
                arguments.push(TypeIndex(buf.read_u32()?));
            }
            TypeRecord::ArgumentList(arguments)
        }
        leaf::LF_ARRAY | leaf::LF_ARRAY_ST => {
            let element_type = TypeIndex(buf.read_u32()?);
            let index_type = TypeIndex(buf.read_u32()?);
            let size = read_numeric_u64(&mut buf, "array size")?;
            let name = read_type_name(&mut buf, leaf_id)?;
            TypeRecord::Array(ArrayRecord {
                element_type,
                index_type,
                size,
                name,
            })
        }
        leaf::LF_STRUCTURE
        | leaf::LF_STRUCTURE_ST
        | leaf::LF_CLASS
        | leaf::LF_CLASS_ST
        | leaf::LF_INTERFACE => TypeRecord::Struct(parse_struct(leaf_id, &mut buf)?),
        leaf::LF_UNION | leaf::LF_UNION_ST => {
            let field_count = buf.read_u16()?;
            let properties = TypeProperties(buf.read_u16()?);
            let fields = TypeIndex(buf.read_u32()?);
            let size = read_numeric_u64(&mut buf, "union size")?;
            let name = read_type_name(&mut buf, leaf_id)?;
            let unique_name = if properties.has_unique_name() {
                Some(read_type_name(&mut buf, leaf_id)?)
            } else {
                None
            };
            TypeRecord::Union(UnionRecord {
                field_count,
                properties,
                fields,
                size,
                name,
                unique_name,
            })
        }
        leaf::LF_ENUM | leaf::LF_ENUM_ST => {
            let count = buf.read_u16()?;
            let properties = TypeProperties(buf.read_u16()?);
            let underlying = TypeIndex(buf.read_u32()?);
            let fields = TypeIndex(buf.read_u32()?);
            let name = read_type_name(&mut buf, leaf_id)?;
            let unique_name = if properties.has_unique_name() {
                Some(read_type_name(&mut buf, leaf_id)?)
            } else {
                None
            };
            TypeRecord::Enum(EnumRecord {
                count,
                properties,
                underlying,
                fields,
                name,
                unique_name,
            })
        }
        leaf::LF_FIELDLIST => {
            let mut fields = Vec::new();
            while !buf.is_empty() {
                buf.skip_padding();
                if buf.is_empty() {
                    break;
                }
                fields.push(parse_field(&mut buf)?);
            }
            TypeRecord::FieldList(fields)
        }
        leaf::LF_BITFIELD => TypeRecord::Bitfield(BitfieldRecord {
            underlying: TypeIndex(buf.read_u32()?),
            length: buf.read_u8()?,
            position: buf.read_u8()?,
        }),
        other => TypeRecord::Unknown { leaf: other },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codeview::{PointerKind, PointerMode};

    #[test]
    fn pointer_record_parses() {
        let mut data = Vec::new();
        data.extend_from_slice(&leaf::LF_POINTER.to_le_bytes());
        data.extend_from_slice(&0x0670u32.to_le_bytes());
        data.extend_from_slice(&(0x0cu32 | (8 << 13)).to_le_bytes());

        let TypeRecord::Pointer(ptr) = parse_type_record(&data).unwrap() else {
            panic!("expected a pointer record");
        };
        assert_eq!(ptr.underlying, TypeIndex(0x0670));
        assert_eq!(ptr.attributes.kind(), Some(PointerKind::Ptr64));
        assert_eq!(ptr.attributes.mode(), Some(PointerMode::Pointer));
    }

    #[test]
    fn field_list_with_padding_parses() {
        let mut data = Vec::new();
        data.extend_from_slice(&leaf::LF_FIELDLIST.to_le_bytes());
        // int x at offset 0
        data.extend_from_slice(&leaf::LF_MEMBER.to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&0x0074u32.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes()); // inline numeric
        data.extend_from_slice(b"x\0");
        data.extend_from_slice(&[0xf2, 0xf1]);

        let TypeRecord::FieldList(fields) = parse_type_record(&data).unwrap() else {
            panic!("expected a field list");
        };
        assert_eq!(fields.len(), 1);
        let Field::Member {
            field_type, offset, name, ..
        } = &fields[0]
        else {
            panic!("expected a data member");
        };
        assert_eq!(*field_type, TypeIndex(0x0074));
        assert_eq!(*offset, 0);
        assert_eq!(name, "x");
    }

    #[test]
    fn unknown_leaf_is_preserved() {
        let data = [0x34u8, 0x16, 0x00, 0x00];
        assert_eq!(
            parse_type_record(&data).unwrap(),
            TypeRecord::Unknown { leaf: 0x1634 }
        );
    }
}
