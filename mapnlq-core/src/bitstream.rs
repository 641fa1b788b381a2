//! Bit-level reading and writing.
//!
//! RPU payloads are MSB-first bit fields mixed with Exp-Golomb codes, wrapped
//! in NAL units that carry emulation prevention bytes. This module covers all
//! three layers.

use crate::error::{BitstreamError, Error, Result};

/// MSB-first bit reader over a byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Absolute bit offset from the start of `data`.
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Create a new bit reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Get the total number of bits in the stream.
    pub fn total_bits(&self) -> usize {
        self.data.len() * 8
    }

    /// Get the current bit position in the stream.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the number of remaining bits.
    pub fn remaining_bits(&self) -> usize {
        self.total_bits().saturating_sub(self.pos)
    }

    /// Check if the stream is byte-aligned.
    pub fn is_byte_aligned(&self) -> bool {
        self.pos % 8 == 0
    }

    /// Skip to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        self.pos = self.pos.next_multiple_of(8);
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        let byte = *self
            .data
            .get(self.pos / 8)
            .ok_or(BitstreamError::UnexpectedEnd)?;
        let bit = (byte >> (7 - (self.pos % 8))) & 1;
        self.pos += 1;
        Ok(bit != 0)
    }

    /// Read up to 64 bits as an unsigned integer.
    pub fn read_bits_u64(&mut self, n: u8) -> Result<u64> {
        if n > 64 {
            return Err(Error::invalid_param("Cannot read more than 64 bits at once"));
        }
        if self.remaining_bits() < n as usize {
            return Err(BitstreamError::UnexpectedEnd.into());
        }

        let mut value = 0u64;
        for _ in 0..n {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Ok(value)
    }

    /// Read up to 32 bits as an unsigned integer.
    pub fn read_bits(&mut self, n: u8) -> Result<u32> {
        if n > 32 {
            return Err(Error::invalid_param("Cannot read more than 32 bits at once"));
        }
        self.read_bits_u64(n).map(|v| v as u32)
    }

    /// Read an unsigned Exp-Golomb coded value (ue(v)).
    pub fn read_ue(&mut self) -> Result<u32> {
        let mut leading_zeros = 0u8;
        while !self.read_bit()? {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(BitstreamError::ExpGolombOverflow.into());
            }
        }

        let suffix = self.read_bits(leading_zeros)?;
        Ok(((1u64 << leading_zeros) - 1 + u64::from(suffix)) as u32)
    }

    /// Read a signed Exp-Golomb coded value (se(v)).
    pub fn read_se(&mut self) -> Result<i32> {
        let code = i64::from(self.read_ue()?);
        let magnitude = (code + 1) / 2;
        Ok(if code % 2 == 0 { -magnitude } else { magnitude } as i32)
    }

    /// Skip a number of bits.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining_bits() < n {
            return Err(BitstreamError::UnexpectedEnd.into());
        }
        self.pos += n;
        Ok(())
    }
}

/// MSB-first bit writer.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    /// Bits used in the last byte of `data`, 0 when aligned.
    partial: u8,
}

impl BitWriter {
    /// Create a new bit writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new bit writer with capacity.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            partial: 0,
        }
    }

    /// Get the current bit position.
    pub fn position(&self) -> usize {
        if self.partial == 0 {
            self.data.len() * 8
        } else {
            (self.data.len() - 1) * 8 + self.partial as usize
        }
    }

    /// Check if the writer is byte-aligned.
    pub fn is_byte_aligned(&self) -> bool {
        self.partial == 0
    }

    /// Write a single bit.
    pub fn write_bit(&mut self, bit: bool) {
        if self.partial == 0 {
            self.data.push(0);
        }
        if bit {
            if let Some(last) = self.data.last_mut() {
                *last |= 0x80 >> self.partial;
            }
        }
        self.partial = (self.partial + 1) % 8;
    }

    /// Write the low `n` bits of `value`, up to 64.
    pub fn write_bits_u64(&mut self, value: u64, n: u8) -> Result<()> {
        if n > 64 {
            return Err(Error::invalid_param("Cannot write more than 64 bits at once"));
        }
        if n < 64 && value >> n != 0 {
            return Err(BitstreamError::ValueTooWide { value, bits: n }.into());
        }
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1 != 0);
        }
        Ok(())
    }

    /// Write the low `n` bits of `value`, up to 32.
    pub fn write_bits(&mut self, value: u32, n: u8) -> Result<()> {
        if n > 32 {
            return Err(Error::invalid_param("Cannot write more than 32 bits at once"));
        }
        self.write_bits_u64(u64::from(value), n)
    }

    /// Write an unsigned Exp-Golomb coded value.
    pub fn write_ue(&mut self, value: u32) -> Result<()> {
        let code = u64::from(value) + 1;
        let len = 64 - code.leading_zeros() as u8;
        for _ in 1..len {
            self.write_bit(false);
        }
        self.write_bits_u64(code, len)
    }

    /// Write a signed Exp-Golomb coded value.
    pub fn write_se(&mut self, value: i32) -> Result<()> {
        let value = i64::from(value);
        let code = if value <= 0 { -2 * value } else { 2 * value - 1 };
        let code = u32::try_from(code).map_err(|_| BitstreamError::InvalidSyntax {
            element: "se(v)".into(),
            value,
        })?;
        self.write_ue(code)
    }

    /// Align to byte boundary by writing zero bits.
    pub fn align_to_byte(&mut self) {
        self.partial = 0;
    }

    /// Get the written data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the written data, consuming the writer.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Find the next Annex-B start code in a byte slice.
///
/// Returns the offset of the start code and its length (3 or 4 bytes).
pub fn find_start_code(data: &[u8]) -> Option<(usize, usize)> {
    let at = data.windows(3).position(|w| w == [0, 0, 1])?;
    if at > 0 && data[at - 1] == 0 {
        Some((at - 1, 4))
    } else {
        Some((at, 3))
    }
}

/// Remove emulation prevention bytes (`00 00 03` → `00 00`).
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0usize;

    for &byte in data {
        if zeros >= 2 && byte == 3 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        out.push(byte);
    }

    out
}

/// Insert emulation prevention bytes wherever `00 00` is followed by a byte <= 3.
pub fn add_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 64);
    let mut zeros = 0usize;

    for &byte in data {
        if zeros >= 2 && byte <= 3 {
            out.push(3);
            zeros = 0;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        out.push(byte);
    }

    out
}
