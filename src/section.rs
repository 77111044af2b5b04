// The section header stream: IMAGE_SECTION_HEADER entries copied out of
// the PE, which turn a data symbol's (segment, offset) into an address.

use anyhow::{ensure, Result};

use crate::parse::ParseBuf;

pub const SECTION_HEADER_SIZE: usize = 40;

#[derive(Debug, Clone)]
pub struct SectionHeader {
    pub name: String,
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_line_numbers: u32,
    pub relocation_count: u16,
    pub line_number_count: u16,
    pub characteristics: u32,
}

impl SectionHeader {
    fn parse(buf: &mut ParseBuf) -> Result<Self> {
        let raw_name = buf.take(8)?;
        let end = raw_name.iter().position(|&b| b == 0).unwrap_or(8);
        let name = String::from_utf8_lossy(&raw_name[..end]).into_owned();
        Ok(Self {
            name,
            virtual_size: buf.read_u32()?,
            virtual_address: buf.read_u32()?,
            size_of_raw_data: buf.read_u32()?,
            pointer_to_raw_data: buf.read_u32()?,
            pointer_to_relocations: buf.read_u32()?,
            pointer_to_line_numbers: buf.read_u32()?,
            relocation_count: buf.read_u16()?,
            line_number_count: buf.read_u16()?,
            characteristics: buf.read_u32()?,
        })
    }
}

pub fn parse_section_headers(data: &[u8]) -> Result<Vec<SectionHeader>> {
    ensure!(
        data.len() % SECTION_HEADER_SIZE == 0,
        "section header stream of {} bytes is not a multiple of {}",
        data.len(),
        SECTION_HEADER_SIZE
    );
    let mut buf = ParseBuf::new(data);
    let mut sections = Vec::with_capacity(data.len() / SECTION_HEADER_SIZE);
    while !buf.is_empty() {
        sections.push(SectionHeader::parse(&mut buf)?);
    }
    Ok(sections)
}
