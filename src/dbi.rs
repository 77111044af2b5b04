// The DBI stream (fixed index 3): which modules went into the image, the
// section map, and the stream numbers of the symbol records and section
// headers.

use anyhow::{ensure, Context, Result};

use crate::parse::ParseBuf;

pub const NO_STREAM: u16 = 0xffff;

#[derive(Debug, Clone)]
pub struct DbiHeader {
    pub signature: u32,
    pub version: u32,
    pub age: u32,
    /// Hash stream over the symbol records, keyed by qualified name.
    pub global_symbol_stream: u16,
    pub build_version: u16,
    /// Hash stream over the symbol records, keyed by mangled name.
    pub public_symbol_stream: u16,
    pub pdb_dll_version: u16,
    pub symbol_record_stream: u16,
    pub pdb_dll_rbld: u16,
    pub module_info_size: u32,
    pub section_contribution_size: u32,
    pub section_map_size: u32,
    pub file_info_size: u32,
    pub type_server_map_size: u32,
    pub mfc_type_server: u32,
    pub debug_header_size: u32,
    pub ec_info_size: u32,
    pub flags: u16,
    pub machine: u16,
    pub reserved: u32,
}

impl DbiHeader {
    fn parse(buf: &mut ParseBuf) -> Result<Self> {
        Ok(Self {
            signature: buf.read_u32()?,
            version: buf.read_u32()?,
            age: buf.read_u32()?,
            global_symbol_stream: buf.read_u16()?,
            build_version: buf.read_u16()?,
            public_symbol_stream: buf.read_u16()?,
            pdb_dll_version: buf.read_u16()?,
            symbol_record_stream: buf.read_u16()?,
            pdb_dll_rbld: buf.read_u16()?,
            module_info_size: buf.read_u32()?,
            section_contribution_size: buf.read_u32()?,
            section_map_size: buf.read_u32()?,
            file_info_size: buf.read_u32()?,
            type_server_map_size: buf.read_u32()?,
            mfc_type_server: buf.read_u32()?,
            debug_header_size: buf.read_u32()?,
            ec_info_size: buf.read_u32()?,
            flags: buf.read_u16()?,
            machine: buf.read_u16()?,
            reserved: buf.read_u32()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SectionContribution {
    pub section: u16,
    pub offset: i32,
    pub size: u32,
    pub characteristics: u32,
    pub module: u16,
    pub data_crc: u32,
    pub reloc_crc: u32,
}

impl SectionContribution {
    fn parse(buf: &mut ParseBuf) -> Result<Self> {
        let section = buf.read_u16()?;
        let _padding = buf.read_u16()?;
        let offset = buf.read_i32()?;
        let size = buf.read_u32()?;
        let characteristics = buf.read_u32()?;
        let module = buf.read_u16()?;
        let _padding = buf.read_u16()?;
        Ok(Self {
            section,
            offset,
            size,
            characteristics,
            module,
            data_crc: buf.read_u32()?,
            reloc_crc: buf.read_u32()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub contribution: SectionContribution,
    pub flags: u16,
    pub debug_info_stream: u16,
    pub local_symbols_size: u32,
    pub line_numbers_size: u32,
    pub c13_line_numbers_size: u32,
    pub file_count: u16,
    pub source_file_name_index: u32,
    pub pdb_file_name_index: u32,
    /// Usually the object file.
    pub module_name: String,
    /// The library it came from, or the object file again.
    pub object_name: String,
}

impl ModuleInfo {
    fn parse(buf: &mut ParseBuf) -> Result<Self> {
        let _opened = buf.read_u32()?; // in-memory pointer leaked to disk
        let contribution = SectionContribution::parse(buf)?;
        let flags = buf.read_u16()?;
        let debug_info_stream = buf.read_u16()?;
        let local_symbols_size = buf.read_u32()?;
        let line_numbers_size = buf.read_u32()?;
        let c13_line_numbers_size = buf.read_u32()?;
        let file_count = buf.read_u16()?;
        let _padding = buf.read_u16()?;
        let _opened = buf.read_u32()?;
        let source_file_name_index = buf.read_u32()?;
        let pdb_file_name_index = buf.read_u32()?;
        let module_name = buf.read_stringz()?;
        let object_name = buf.read_stringz()?;
        buf.align(4)?;
        Ok(Self {
            contribution,
            flags,
            debug_info_stream,
            local_symbols_size,
            line_numbers_size,
            c13_line_numbers_size,
            file_count,
            source_file_name_index,
            pdb_file_name_index,
            module_name,
            object_name,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SectionMapEntry {
    pub flags: u16,
    pub logical_overlay: u16,
    pub group: u16,
    pub frame: u16,
    pub section_name: u16,
    pub class_name: u16,
    pub offset: u32,
    pub length: u32,
}

impl SectionMapEntry {
    fn parse(buf: &mut ParseBuf) -> Result<Self> {
        Ok(Self {
            flags: buf.read_u16()?,
            logical_overlay: buf.read_u16()?,
            group: buf.read_u16()?,
            frame: buf.read_u16()?,
            section_name: buf.read_u16()?,
            class_name: buf.read_u16()?,
            offset: buf.read_u32()?,
            length: buf.read_u32()?,
        })
    }
}

/// Trailing substream of optional per-kind stream numbers.
#[derive(Debug, Clone, Copy)]
pub struct DebugHeader {
    pub fpo: u16,
    pub exception: u16,
    pub fixup: u16,
    pub omap_to_src: u16,
    pub src_to_omap: u16,
    pub section_headers: u16,
    pub token_rid_map: u16,
    pub xdata: u16,
    pub pdata: u16,
    pub new_fpo: u16,
    pub original_section_headers: u16,
}

impl DebugHeader {
    const SIZE: usize = 22;

    fn parse(buf: &mut ParseBuf) -> Result<Self> {
        Ok(Self {
            fpo: buf.read_u16()?,
            exception: buf.read_u16()?,
            fixup: buf.read_u16()?,
            omap_to_src: buf.read_u16()?,
            src_to_omap: buf.read_u16()?,
            section_headers: buf.read_u16()?,
            token_rid_map: buf.read_u16()?,
            xdata: buf.read_u16()?,
            pdata: buf.read_u16()?,
            new_fpo: buf.read_u16()?,
            original_section_headers: buf.read_u16()?,
        })
    }

    /// The pre-OMAP section headers win when both are present.
    pub fn section_header_stream(&self) -> Option<u16> {
        match (self.original_section_headers, self.section_headers) {
            (NO_STREAM, NO_STREAM) => None,
            (NO_STREAM, stream) => Some(stream),
            (stream, _) => Some(stream),
        }
    }
}

pub struct DbiStream {
    pub header: DbiHeader,
    pub modules: Vec<ModuleInfo>,
    pub section_map: Vec<SectionMapEntry>,
    pub debug_header: Option<DebugHeader>,
}

impl DbiStream {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = ParseBuf::new(data);
        let header = DbiHeader::parse(&mut buf).context("DBI header truncated")?;
        ensure!(
            header.signature == 0xffff_ffff,
            "DBI signature expected 0xFFFFFFFF, got 0x{:X}",
            header.signature
        );

        let module_bytes = buf
            .take(header.module_info_size as usize)
            .context("DBI module area truncated")?;
        let mut modules = Vec::new();
        let mut mbuf = ParseBuf::new(module_bytes);
        while !mbuf.is_empty() {
            modules.push(ModuleInfo::parse(&mut mbuf).context("bad module information record")?);
        }

        buf.skip(header.section_contribution_size as usize)
            .context("DBI section contribution area truncated")?;

        let map_bytes = buf
            .take(header.section_map_size as usize)
            .context("DBI section map truncated")?;
        let section_map = if map_bytes.is_empty() {
            Vec::new()
        } else {
            let mut sbuf = ParseBuf::new(map_bytes);
            let segment_count = sbuf.read_u16()?;
            let _logical_count = sbuf.read_u16()?;
            let mut entries = Vec::with_capacity(segment_count as usize);
            for _ in 0..segment_count {
                entries.push(SectionMapEntry::parse(&mut sbuf)?);
            }
            entries
        };

        buf.skip(header.file_info_size as usize)?;
        buf.skip(header.type_server_map_size as usize)?;
        buf.skip(header.ec_info_size as usize)?;

        let debug_header = if header.debug_header_size == 0 {
            None
        } else {
            // Writers may emit fewer fields than we know of; missing ones
            // read as absent, not as stream 0.
            let n = (header.debug_header_size as usize).min(buf.remaining());
            let raw = buf.take(n)?;
            let mut fixed = [0xffu8; DebugHeader::SIZE];
            let n = raw.len().min(DebugHeader::SIZE);
            fixed[..n].copy_from_slice(&raw[..n]);
            Some(DebugHeader::parse(&mut ParseBuf::new(&fixed))?)
        };

        Ok(Self {
            header,
            modules,
            section_map,
            debug_header,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_header_stream_fallback() {
        let mut header = DebugHeader {
            fpo: NO_STREAM,
            exception: NO_STREAM,
            fixup: NO_STREAM,
            omap_to_src: NO_STREAM,
            src_to_omap: NO_STREAM,
            section_headers: NO_STREAM,
            token_rid_map: NO_STREAM,
            xdata: NO_STREAM,
            pdata: NO_STREAM,
            new_fpo: NO_STREAM,
            original_section_headers: NO_STREAM,
        };
        assert_eq!(header.section_header_stream(), None);

        header.section_headers = 8;
        assert_eq!(header.section_header_stream(), Some(8));

        header.original_section_headers = 12;
        assert_eq!(header.section_header_stream(), Some(12));
    }

    #[test]
    fn rejects_wrong_signature() {
        let data = [0u8; 64];
        assert!(DbiStream::parse(&data).is_err());
    }
}
