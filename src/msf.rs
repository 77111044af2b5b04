// The MSF 7.00 container. A PDB is a small filesystem: fixed-size pages,
// a stream directory, and streams stitched together from scattered page
// lists.

use anyhow::{ensure, Context, Result};

use crate::parse::ParseBuf;

pub const MAGIC: &[u8; 32] = b"Microsoft C/C++ MSF 7.00\r\n\x1aDS\0\0\0";

#[derive(Debug)]
pub struct Msf<'a> {
    data: &'a [u8],
    page_size: u32,
    free_page_map: u32,
    page_count: u32,
    directory_size: u32,
    directory_pages: Vec<u32>,
}

impl<'a> Msf<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut buf = ParseBuf::new(data);
        let magic = buf.take(MAGIC.len()).context("file too small for an MSF header")?;
        ensure!(magic == MAGIC, "not an MSF 7.00 file (bad magic)");

        let page_size = buf.read_u32()?;
        ensure!(
            page_size.is_power_of_two() && (512..=0x10000).contains(&page_size),
            "implausible MSF page size {}",
            page_size
        );
        let free_page_map = buf.read_u32()?;
        let page_count = buf.read_u32()?;
        let directory_size = buf.read_u32()?;
        let _reserved = buf.read_u32()?;

        let mut msf = Self {
            data,
            page_size,
            free_page_map,
            page_count,
            directory_size,
            directory_pages: Vec::new(),
        };

        // The page numbers of the directory are themselves scattered over
        // pages; the header is followed by the numbers of *those* pages.
        let directory_page_count = msf.pages_for(directory_size);
        let index_bytes = 4 * directory_page_count;
        let mut index_pages = Vec::with_capacity(msf.pages_for(index_bytes) as usize);
        for _ in 0..msf.pages_for(index_bytes) {
            index_pages.push(buf.read_u32()?);
        }
        let index_data = msf
            .read_pages(&index_pages, index_bytes)
            .context("reading the directory page index")?;
        let mut index = ParseBuf::new(&index_data);
        let mut directory_pages = Vec::with_capacity(directory_page_count as usize);
        for _ in 0..directory_page_count {
            directory_pages.push(index.read_u32()?);
        }
        msf.directory_pages = directory_pages;

        log::debug!(
            "msf: {} byte pages, {} pages, directory of {} bytes over {} pages",
            page_size,
            page_count,
            directory_size,
            directory_page_count
        );
        Ok(msf)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn free_page_map(&self) -> u32 {
        self.free_page_map
    }

    pub fn pages_for(&self, bytes: u32) -> u32 {
        bytes.div_ceil(self.page_size)
    }

    fn page(&self, number: u32) -> Result<&'a [u8]> {
        ensure!(
            number < self.page_count,
            "page {} out of range (file has {} pages)",
            number,
            self.page_count
        );
        let start = number as usize * self.page_size as usize;
        let end = start + self.page_size as usize;
        ensure!(end <= self.data.len(), "page {} extends past the end of the file", number);
        Ok(&self.data[start..end])
    }

    /// Stitch a page list back into contiguous bytes.
    pub fn read_pages(&self, pages: &[u32], byte_count: u32) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(byte_count as usize);
        let mut left = byte_count as usize;
        for &number in pages {
            if left == 0 {
                break;
            }
            let page = self.page(number)?;
            let take = left.min(page.len());
            out.extend_from_slice(&page[..take]);
            left -= take;
        }
        ensure!(left == 0, "page list too short, {} bytes missing", left);
        Ok(out)
    }

    pub fn directory_bytes(&self) -> Result<Vec<u8>> {
        self.read_pages(&self.directory_pages, self.directory_size)
            .context("reading the stream directory")
    }
}
