// The stream directory: how many streams the PDB holds, how big each is,
// and which pages carry it.

use anyhow::{ensure, Context, Result};

use crate::msf::Msf;
use crate::parse::ParseBuf;

/// A directory size slot of all ones marks a stream that was freed.
pub const ABSENT: u32 = 0xffff_ffff;

pub struct StreamInfo {
    pub size: u32,
    pub pages: Vec<u32>,
}

impl StreamInfo {
    pub fn is_absent(&self) -> bool {
        self.size == ABSENT
    }

    pub fn byte_count(&self) -> u32 {
        if self.is_absent() {
            0
        } else {
            self.size
        }
    }
}

pub struct StreamDirectory {
    streams: Vec<StreamInfo>,
}

impl StreamDirectory {
    pub fn parse(msf: &Msf) -> Result<Self> {
        let bytes = msf.directory_bytes()?;
        let mut buf = ParseBuf::new(&bytes);

        let count = buf.read_u32()? as usize;
        ensure!(count < 0x10000, "implausible stream count {}", count);

        let mut sizes = Vec::with_capacity(count);
        for _ in 0..count {
            sizes.push(buf.read_u32()?);
        }

        let mut streams = Vec::with_capacity(count);
        for (index, size) in sizes.into_iter().enumerate() {
            let page_count = if size == ABSENT { 0 } else { msf.pages_for(size) };
            let mut pages = Vec::with_capacity(page_count as usize);
            for _ in 0..page_count {
                pages.push(
                    buf.read_u32()
                        .with_context(|| format!("page list of stream {} truncated", index))?,
                );
            }
            streams.push(StreamInfo { size, pages });
        }
        Ok(Self { streams })
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter()
    }

    pub fn stream(&self, index: usize) -> Result<&StreamInfo> {
        self.streams
            .get(index)
            .with_context(|| format!("no stream {} (directory has {})", index, self.streams.len()))
    }

    /// The stream's bytes; absent streams read as empty.
    pub fn stream_bytes(&self, msf: &Msf, index: usize) -> Result<Vec<u8>> {
        let info = self.stream(index)?;
        if info.is_absent() {
            return Ok(Vec::new());
        }
        msf.read_pages(&info.pages, info.size)
            .with_context(|| format!("reading stream {}", index))
    }
}
