// A reader for Microsoft program database (PDB) files: the MSF container,
// the stream directory, and the streams a debug-symbol consumer cares
// about.

pub mod codeview;
pub mod dbi;
pub mod directory;
pub mod hash;
pub mod image;
pub mod info;
pub mod msf;
pub mod parse;
pub mod section;
pub mod sym;
pub mod tpi;

use anyhow::{ensure, Context, Result};

use crate::dbi::DbiStream;
use crate::directory::StreamDirectory;
use crate::info::InfoStream;
use crate::msf::Msf;
use crate::section::SectionHeader;
use crate::sym::{Symbol, SymbolStream};
use crate::tpi::TypeStream;

// Fixed stream indices in every PDB.
pub const OLD_DIRECTORY_STREAM: usize = 0;
pub const INFO_STREAM: usize = 1;
pub const TPI_STREAM: usize = 2;
pub const DBI_STREAM: usize = 3;

pub struct Pdb<'a> {
    msf: Msf<'a>,
    directory: StreamDirectory,
}

impl<'a> Pdb<'a> {
    /// Parse the container and directory; individual streams parse on
    /// demand.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let msf = Msf::parse(data)?;
        let directory = StreamDirectory::parse(&msf)?;
        Ok(Self { msf, directory })
    }

    pub fn msf(&self) -> &Msf<'a> {
        &self.msf
    }

    pub fn directory(&self) -> &StreamDirectory {
        &self.directory
    }

    pub fn stream_bytes(&self, index: usize) -> Result<Vec<u8>> {
        self.directory.stream_bytes(&self.msf, index)
    }

    pub fn info(&self) -> Result<InfoStream> {
        InfoStream::parse(&self.stream_bytes(INFO_STREAM)?).context("parsing the PDB info stream")
    }

    pub fn types(&self) -> Result<TypeStream> {
        let mut types =
            TypeStream::parse(self.stream_bytes(TPI_STREAM)?).context("parsing the type stream")?;
        let hash_stream = types.header().hash_stream;
        if hash_stream != dbi::NO_STREAM {
            // a bad hash stream only costs acceleration, never the types
            match self.stream_bytes(hash_stream as usize) {
                Ok(bytes) => {
                    if let Err(error) = types.attach_hash(&bytes) {
                        log::warn!("ignoring unusable TPI hash stream: {error:#}");
                    }
                }
                Err(error) => {
                    log::warn!("ignoring unreachable TPI hash stream {hash_stream}: {error:#}");
                }
            }
        }
        Ok(types)
    }

    pub fn debug_info(&self) -> Result<DbiStream> {
        DbiStream::parse(&self.stream_bytes(DBI_STREAM)?).context("parsing the DBI stream")
    }

    pub fn symbols(&self) -> Result<SymbolStream> {
        let dbi = self.debug_info()?;
        let stream = dbi.header.symbol_record_stream;
        ensure!(stream != dbi::NO_STREAM, "this PDB has no symbol record stream");
        Ok(SymbolStream::new(self.stream_bytes(stream as usize)?))
    }

    pub fn section_headers(&self) -> Result<Vec<SectionHeader>> {
        let dbi = self.debug_info()?;
        let header = dbi.debug_header.context("this PDB has no debug header")?;
        let stream = header
            .section_header_stream()
            .context("this PDB has no section header stream")?;
        section::parse_section_headers(&self.stream_bytes(stream as usize)?)
            .context("parsing the section header stream")
    }

    /// First symbol record with the given name.
    pub fn find_symbol(&self, name: &str) -> Result<Option<Symbol>> {
        for symbol in self.symbols()?.iter() {
            let symbol = symbol?;
            if symbol.name() == Some(name) {
                return Ok(Some(symbol));
            }
        }
        Ok(None)
    }

    /// Virtual address of a data symbol: image base plus its section's RVA
    /// plus its offset within the section.
    pub fn find_symbol_address(&self, name: &str, image_base: u64) -> Result<Option<u64>> {
        let Some(Symbol::Data(data)) = self.find_symbol(name)? else {
            return Ok(None);
        };
        let index = (data.segment as usize)
            .checked_sub(1)
            .with_context(|| format!("data symbol {} has segment 0", data.name))?;
        let sections = self.section_headers()?;
        let segment_count = sections.len();
        let section = sections
            .into_iter()
            .nth(index)
            .with_context(|| format!("segment {} out of range ({} sections)", data.segment, segment_count))?;
        Ok(Some(image_base + section.virtual_address as u64 + data.offset as u64))
    }
}
