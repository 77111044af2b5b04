// The PDB info stream (fixed index 1): the identity a debugger matches
// against the executable.

use std::fmt;

use anyhow::{Context, Result};

use crate::parse::ParseBuf;

/// VC 7.0 info stream version.
pub const VC70: u32 = 20000404;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Guid(pub [u8; 16]);

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.0;
        let data1 = u32::from_le_bytes([d[0], d[1], d[2], d[3]]);
        let data2 = u16::from_le_bytes([d[4], d[5]]);
        let data3 = u16::from_le_bytes([d[6], d[7]]);
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            data1, data2, data3, d[8], d[9], d[10], d[11], d[12], d[13], d[14], d[15]
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

pub struct InfoStream {
    pub version: u32,
    /// Build timestamp, a time_t.
    pub signature: u32,
    pub age: u32,
    pub guid: Guid,
    /// The named-stream string buffer, kept raw.
    pub names: Vec<u8>,
}

impl InfoStream {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = ParseBuf::new(data);
        let version = buf.read_u32().context("info stream too short")?;
        let signature = buf.read_u32()?;
        let age = buf.read_u32()?;
        let mut guid = [0u8; 16];
        guid.copy_from_slice(buf.take(16)?);
        let names_size = buf.read_u32()?;
        let names = buf
            .take(names_size as usize)
            .context("named-stream buffer truncated")?
            .to_vec();

        if version != VC70 {
            log::debug!("info stream version {} (expected {})", version, VC70);
        }
        Ok(Self {
            version,
            signature,
            age,
            guid: Guid(guid),
            names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_display() {
        let guid = Guid([
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ]);
        assert_eq!(guid.to_string(), "03020100-0504-0706-0809-0A0B0C0D0E0F");
    }

    #[test]
    fn truncated_stream_is_an_error() {
        assert!(InfoStream::parse(&[1, 2, 3]).is_err());
    }
}
