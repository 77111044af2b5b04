// Little-endian cursor over untrusted bytes. Every length and offset in a
// PDB comes from the file itself, so every read is bounds-checked.

use anyhow::{bail, Result};

use crate::codeview::leaf;

pub struct ParseBuf<'a> {
    data: &'a [u8],
    pos: usize,
}

/// A CodeView variable-width number: small values are stored inline,
/// larger ones as a typed leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Numeric {
    UInt(u64),
    Int(i64),
    F32(f32),
    F64(f64),
    Raw(Vec<u8>),
}

impl Numeric {
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Numeric::UInt(v) => Some(v),
            Numeric::Int(v) if v >= 0 => Some(v as u64),
            _ => None,
        }
    }
}

impl<'a> ParseBuf<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            bail!(
                "read of {} bytes at offset {} runs past the end of the buffer ({} left)",
                n,
                self.pos,
                self.remaining()
            );
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Advance to the next multiple of `n` bytes from the start of the buffer.
    pub fn align(&mut self, n: usize) -> Result<()> {
        let rem = self.pos % n;
        if rem != 0 {
            self.skip(n - rem)?;
        }
        Ok(())
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// NUL-terminated string; invalid UTF-8 is replaced, not rejected.
    pub fn read_stringz(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(b) = self.peek_u8() {
            self.pos += 1;
            if b == 0 {
                let raw = &self.data[start..self.pos - 1];
                return Ok(String::from_utf8_lossy(raw).into_owned());
            }
        }
        bail!("unterminated string at offset {}", start);
    }

    /// u8 length prefix followed by that many bytes.
    pub fn read_pascal_string(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    /// Names are NUL-terminated in post-7.0 records and length-prefixed in
    /// the older `*_ST` variants. The boundary differs between type leaves
    /// and symbol kinds, so the caller passes it in.
    pub fn read_name(&mut self, record_kind: u16, st_max: u16) -> Result<String> {
        if record_kind > st_max {
            self.read_stringz()
        } else {
            self.read_pascal_string()
        }
    }

    pub fn read_numeric(&mut self) -> Result<Numeric> {
        let id = self.read_u16()?;
        if id < leaf::LF_NUMERIC {
            return Ok(Numeric::UInt(id as u64));
        }
        Ok(match id {
            leaf::LF_CHAR => Numeric::Int(self.read_u8()? as i8 as i64),
            leaf::LF_SHORT => Numeric::Int(self.read_i16()? as i64),
            leaf::LF_USHORT => Numeric::UInt(self.read_u16()? as u64),
            leaf::LF_LONG => Numeric::Int(self.read_i32()? as i64),
            leaf::LF_ULONG => Numeric::UInt(self.read_u32()? as u64),
            leaf::LF_QUADWORD => Numeric::Int(self.read_i64()?),
            leaf::LF_UQUADWORD => Numeric::UInt(self.read_u64()?),
            leaf::LF_REAL32 => Numeric::F32(self.read_f32()?),
            leaf::LF_REAL64 => Numeric::F64(self.read_f64()?),
            leaf::LF_REAL80 => Numeric::Raw(self.take(10)?.to_vec()),
            leaf::LF_REAL128 => Numeric::Raw(self.take(16)?.to_vec()),
            other => bail!("unsupported numeric leaf 0x{:04x}", other),
        })
    }

    /// Inter-record padding: a byte of `0xF0 | n` means n pad bytes follow,
    /// counting itself.
    pub fn skip_padding(&mut self) {
        if let Some(b) = self.peek_u8() {
            if b > leaf::LF_PAD0 {
                let n = (b & 0x0f) as usize;
                self.pos += n.min(self.remaining());
            }
        }
    }
}
