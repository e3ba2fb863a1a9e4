//! Bit-granular buffered byte streams with atom boundaries.
//!
//! Values of up to 64 bits are packed LSB-first into a byte buffer;
//! unsigned 32- and 64-bit integers use a variable-byte encoding of
//! 7-bit groups, least significant first, each preceded by a 1-bit
//! continuation flag. The stream is a sequence of atoms: buffer flushes
//! and refills happen only on atom boundaries, and no atom may exceed
//! [`MAX_ATOM_SIZE`] bytes. Atoms are bit-contiguous; only the final
//! flush pads the trailing partial byte with zero bits.

use std::io::{ErrorKind, Read, Write};

use crate::bytecode::error::{BytecodeError, BytecodeErrorKind};

/// Maximum size of a single atom, in bytes.
pub const MAX_ATOM_SIZE: usize = 1 << 12;

/// Stream buffer size; a multiple of the atom size so that a whole atom
/// always fits between flushes.
const BUFFER_SIZE: usize = MAX_ATOM_SIZE << 4;

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Buffered bit-packing writer over any byte sink.
///
/// [`flush`](Self::flush) (or [`finish`](Self::finish)) must run before
/// the writer is dropped; dropping an unflushed writer is a programming
/// error and asserts in debug builds.
#[derive(Debug)]
pub struct BitStreamWriter<W: Write> {
    sink: Option<W>,
    buf: Vec<u8>,
    pos: usize,
    bit: u32,
    atom_bits: usize,
    errored: bool,
}

impl<W: Write> BitStreamWriter<W> {
    /// Creates a writer over the given sink.
    pub fn new(sink: W) -> Self {
        Self {
            sink: Some(sink),
            buf: vec![0; BUFFER_SIZE],
            pos: 0,
            bit: 0,
            atom_bits: 0,
            errored: false,
        }
    }

    fn write_out(&mut self, end: usize) -> Result<(), BytecodeError> {
        if end == 0 {
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            self.errored = true;
            return Err(BytecodeError::new(
                BytecodeErrorKind::Io,
                "writer used after finish",
                None,
            ));
        };
        if let Err(err) = sink.write_all(&self.buf[..end]) {
            self.errored = true;
            return Err(err.into());
        }
        Ok(())
    }

    fn push_bits(&mut self, mut value: u64, nbits: u32) -> Result<(), BytecodeError> {
        debug_assert!(nbits <= 64);
        self.atom_bits += nbits as usize;
        if self.atom_bits > MAX_ATOM_SIZE * 8 {
            self.errored = true;
            return Err(BytecodeError::atom_overflow(
                "atom exceeds the maximum atom size",
                format!("{} bits in one atom", self.atom_bits),
            ));
        }
        let mut left = nbits;
        while left > 0 {
            if self.bit == 0 {
                self.buf[self.pos] = 0;
            }
            let take = (8 - self.bit).min(left);
            let mask = (1u64 << take) - 1;
            self.buf[self.pos] |= ((value & mask) as u8) << self.bit;
            value >>= take;
            self.bit += take;
            left -= take;
            if self.bit == 8 {
                self.bit = 0;
                self.pos += 1;
                if self.pos == self.buf.len() {
                    self.write_out(BUFFER_SIZE)?;
                    self.pos = 0;
                }
            }
        }
        Ok(())
    }

    /// Writes the low `nbits` of `value`, LSB-first; `nbits <= 32`.
    ///
    /// The value is zero-extended, never sign-extended.
    pub fn write_bits32(&mut self, value: u32, nbits: u32) -> Result<(), BytecodeError> {
        debug_assert!(nbits <= 32);
        let masked = if nbits == 32 {
            value
        } else {
            value & ((1u32 << nbits) - 1)
        };
        self.push_bits(u64::from(masked), nbits)
    }

    /// Writes the low `nbits` of `value`, LSB-first; `nbits <= 64`.
    pub fn write_bits64(&mut self, value: u64, nbits: u32) -> Result<(), BytecodeError> {
        debug_assert!(nbits <= 64);
        let masked = if nbits == 64 {
            value
        } else {
            value & ((1u64 << nbits) - 1)
        };
        self.push_bits(masked, nbits)
    }

    /// Writes a 32-bit unsigned integer as 7-bit continuation groups.
    pub fn write_u32_vbr(&mut self, mut value: u32) -> Result<(), BytecodeError> {
        loop {
            let group = value & 0x7F;
            value >>= 7;
            let more = value != 0;
            self.write_bits32(u32::from(more), 1)?;
            self.write_bits32(group, 7)?;
            if !more {
                return Ok(());
            }
        }
    }

    /// Writes a 64-bit unsigned integer as 7-bit continuation groups.
    pub fn write_u64_vbr(&mut self, mut value: u64) -> Result<(), BytecodeError> {
        loop {
            let group = value & 0x7F;
            value >>= 7;
            let more = value != 0;
            self.write_bits64(u64::from(more), 1)?;
            self.write_bits64(group, 7)?;
            if !more {
                return Ok(());
            }
        }
    }

    /// Writes one boolean bit.
    pub fn write_bool(&mut self, value: bool) -> Result<(), BytecodeError> {
        self.write_bits32(u32::from(value), 1)
    }

    /// Writes an 8-bit unsigned integer as raw bits.
    pub fn write_u8(&mut self, value: u8) -> Result<(), BytecodeError> {
        self.write_bits32(u32::from(value), 8)
    }

    /// Writes a 16-bit unsigned integer in variable-byte form.
    pub fn write_u16(&mut self, value: u16) -> Result<(), BytecodeError> {
        self.write_u32_vbr(u32::from(value))
    }

    /// Writes a 32-bit unsigned integer in variable-byte form.
    pub fn write_u32(&mut self, value: u32) -> Result<(), BytecodeError> {
        self.write_u32_vbr(value)
    }

    /// Writes a 64-bit unsigned integer in variable-byte form.
    pub fn write_u64(&mut self, value: u64) -> Result<(), BytecodeError> {
        self.write_u64_vbr(value)
    }

    /// Writes an 8-bit signed integer as raw bits.
    pub fn write_i8(&mut self, value: i8) -> Result<(), BytecodeError> {
        self.write_bits32(u32::from(value as u8), 8)
    }

    /// Writes a 16-bit signed integer as raw bits.
    pub fn write_i16(&mut self, value: i16) -> Result<(), BytecodeError> {
        self.write_bits32(u32::from(value as u16), 16)
    }

    /// Writes a 32-bit signed integer as raw bits.
    pub fn write_i32(&mut self, value: i32) -> Result<(), BytecodeError> {
        self.write_bits32(value as u32, 32)
    }

    /// Writes a 64-bit signed integer as raw bits.
    pub fn write_i64(&mut self, value: i64) -> Result<(), BytecodeError> {
        self.write_bits64(value as u64, 64)
    }

    /// Writes a 32-bit float as its IEEE-754 bit pattern.
    pub fn write_f32(&mut self, value: f32) -> Result<(), BytecodeError> {
        self.write_bits32(value.to_bits(), 32)
    }

    /// Writes a 64-bit float as its IEEE-754 bit pattern.
    pub fn write_f64(&mut self, value: f64) -> Result<(), BytecodeError> {
        self.write_bits64(value.to_bits(), 64)
    }

    /// Writes raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), BytecodeError> {
        for &byte in data {
            self.push_bits(u64::from(byte), 8)?;
        }
        Ok(())
    }

    /// Writes a length-prefixed string with no terminator.
    pub fn write_str(&mut self, value: &str) -> Result<(), BytecodeError> {
        self.write_u32_vbr(value.len() as u32)?;
        self.write_bytes(value.as_bytes())
    }

    /// Marks the end of an atom.
    ///
    /// When less than an atom's worth of buffer space remains, the
    /// buffered whole bytes are flushed to the sink; the trailing
    /// partial byte stays buffered so atoms remain bit-contiguous.
    pub fn end_atom(&mut self) -> Result<(), BytecodeError> {
        self.atom_bits = 0;
        if self.buf.len() - self.pos < MAX_ATOM_SIZE {
            let end = self.pos;
            self.write_out(end)?;
            if self.bit > 0 {
                self.buf[0] = self.buf[end];
            }
            self.pos = 0;
        }
        Ok(())
    }

    /// Writes out the remaining partial atom, padding the trailing
    /// partial byte with zero bits, and resets the cursor.
    pub fn flush(&mut self) -> Result<(), BytecodeError> {
        let end = self.pos + usize::from(self.bit > 0);
        self.write_out(end)?;
        if let Some(sink) = self.sink.as_mut() {
            if let Err(err) = sink.flush() {
                self.errored = true;
                return Err(err.into());
            }
        }
        self.pos = 0;
        self.bit = 0;
        self.atom_bits = 0;
        Ok(())
    }

    /// Discards buffered data after a failed serialization so the sink
    /// never receives a partial suffix.
    pub fn abandon(&mut self) {
        self.pos = 0;
        self.bit = 0;
        self.atom_bits = 0;
        self.errored = true;
    }

    /// Flushes and returns the sink.
    pub fn finish(mut self) -> Result<W, BytecodeError> {
        self.flush()?;
        self.sink.take().ok_or_else(|| {
            BytecodeError::new(BytecodeErrorKind::Io, "writer already finished", None)
        })
    }
}

impl<W: Write> Drop for BitStreamWriter<W> {
    fn drop(&mut self) {
        if !self.errored && !std::thread::panicking() {
            debug_assert!(
                self.pos == 0 && self.bit == 0,
                "bit stream writer dropped without flush"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Buffered bit-unpacking reader over any byte source.
///
/// A short read from the source signals end of input. All decoding
/// methods fail with `UnexpectedEof` once the source is exhausted.
#[derive(Debug)]
pub struct BitStreamReader<R: Read> {
    source: R,
    buf: Vec<u8>,
    len: usize,
    pos: usize,
    bit: u32,
    eof: bool,
}

impl<R: Read> BitStreamReader<R> {
    /// Creates a reader over the given source and performs the initial
    /// buffer fill.
    pub fn new(source: R) -> Result<Self, BytecodeError> {
        let mut reader = Self {
            source,
            buf: vec![0; BUFFER_SIZE],
            len: 0,
            pos: 0,
            bit: 0,
            eof: false,
        };
        reader.refill()?;
        Ok(reader)
    }

    fn refill(&mut self) -> Result<(), BytecodeError> {
        self.buf.copy_within(self.pos..self.len, 0);
        self.len -= self.pos;
        self.pos = 0;
        while !self.eof && self.len < self.buf.len() {
            match self.source.read(&mut self.buf[self.len..]) {
                Ok(0) => self.eof = true,
                Ok(got) => self.len += got,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn remaining_bits(&self) -> usize {
        (self.len - self.pos) * 8 - self.bit as usize
    }

    fn take_bits(&mut self, nbits: u32) -> Result<u64, BytecodeError> {
        debug_assert!(nbits <= 64);
        if nbits as usize > self.remaining_bits() {
            if !self.eof {
                self.refill()?;
            }
            if nbits as usize > self.remaining_bits() {
                return Err(BytecodeError::unexpected_eof(
                    "source ended inside a value",
                    format!("wanted {nbits} bits, {} available", self.remaining_bits()),
                ));
            }
        }
        let mut out: u64 = 0;
        let mut got: u32 = 0;
        while got < nbits {
            let take = (8 - self.bit).min(nbits - got);
            let bits = u64::from(self.buf[self.pos] >> self.bit) & ((1u64 << take) - 1);
            out |= bits << got;
            self.bit += take;
            got += take;
            if self.bit == 8 {
                self.bit = 0;
                self.pos += 1;
            }
        }
        Ok(out)
    }

    /// Reads `nbits <= 32` bits, LSB-first.
    pub fn read_bits32(&mut self, nbits: u32) -> Result<u32, BytecodeError> {
        debug_assert!(nbits <= 32);
        Ok(self.take_bits(nbits)? as u32)
    }

    /// Reads `nbits <= 64` bits, LSB-first.
    pub fn read_bits64(&mut self, nbits: u32) -> Result<u64, BytecodeError> {
        self.take_bits(nbits)
    }

    /// Reads a 32-bit unsigned integer in variable-byte form.
    ///
    /// Accepts at most 5 continuation groups.
    pub fn read_u32_vbr(&mut self) -> Result<u32, BytecodeError> {
        let mut value: u64 = 0;
        for group in 0..5u32 {
            let more = self.take_bits(1)? != 0;
            let bits = self.take_bits(7)?;
            value |= bits << (7 * group);
            if !more {
                return u32::try_from(value).map_err(|_| {
                    BytecodeError::vbr_overrun(
                        "variable-byte value exceeds 32 bits",
                        format!("decoded value {value:#x}"),
                    )
                });
            }
        }
        Err(BytecodeError::vbr_overrun(
            "continuation chain exceeds the 32-bit group limit",
            "more than 5 groups",
        ))
    }

    /// Reads a 64-bit unsigned integer in variable-byte form.
    ///
    /// Accepts at most 10 continuation groups.
    pub fn read_u64_vbr(&mut self) -> Result<u64, BytecodeError> {
        let mut value: u64 = 0;
        for group in 0..10u32 {
            let more = self.take_bits(1)? != 0;
            let bits = self.take_bits(7)?;
            let shift = 7 * group;
            if shift + 7 > 64 && (bits >> (64 - shift)) != 0 {
                return Err(BytecodeError::vbr_overrun(
                    "variable-byte value exceeds 64 bits",
                    format!("group {group} carries {bits:#x}"),
                ));
            }
            value |= bits << shift;
            if !more {
                return Ok(value);
            }
        }
        Err(BytecodeError::vbr_overrun(
            "continuation chain exceeds the 64-bit group limit",
            "more than 10 groups",
        ))
    }

    /// Reads one boolean bit.
    pub fn read_bool(&mut self) -> Result<bool, BytecodeError> {
        Ok(self.take_bits(1)? != 0)
    }

    /// Reads an 8-bit unsigned integer from raw bits.
    pub fn read_u8(&mut self) -> Result<u8, BytecodeError> {
        Ok(self.take_bits(8)? as u8)
    }

    /// Reads a 16-bit unsigned integer in variable-byte form.
    pub fn read_u16(&mut self) -> Result<u16, BytecodeError> {
        let value = self.read_u32_vbr()?;
        u16::try_from(value).map_err(|_| {
            BytecodeError::malformed(
                "16-bit value out of range",
                format!("decoded value {value:#x}"),
            )
        })
    }

    /// Reads a 32-bit unsigned integer in variable-byte form.
    pub fn read_u32(&mut self) -> Result<u32, BytecodeError> {
        self.read_u32_vbr()
    }

    /// Reads a 64-bit unsigned integer in variable-byte form.
    pub fn read_u64(&mut self) -> Result<u64, BytecodeError> {
        self.read_u64_vbr()
    }

    /// Reads an 8-bit signed integer from raw bits.
    pub fn read_i8(&mut self) -> Result<i8, BytecodeError> {
        Ok(self.take_bits(8)? as u8 as i8)
    }

    /// Reads a 16-bit signed integer from raw bits.
    pub fn read_i16(&mut self) -> Result<i16, BytecodeError> {
        Ok(self.take_bits(16)? as u16 as i16)
    }

    /// Reads a 32-bit signed integer from raw bits.
    pub fn read_i32(&mut self) -> Result<i32, BytecodeError> {
        Ok(self.take_bits(32)? as u32 as i32)
    }

    /// Reads a 64-bit signed integer from raw bits.
    pub fn read_i64(&mut self) -> Result<i64, BytecodeError> {
        Ok(self.take_bits(64)? as i64)
    }

    /// Reads a 32-bit float from its IEEE-754 bit pattern.
    pub fn read_f32(&mut self) -> Result<f32, BytecodeError> {
        Ok(f32::from_bits(self.take_bits(32)? as u32))
    }

    /// Reads a 64-bit float from its IEEE-754 bit pattern.
    pub fn read_f64(&mut self) -> Result<f64, BytecodeError> {
        Ok(f64::from_bits(self.take_bits(64)?))
    }

    /// Reads raw bytes into `out`.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), BytecodeError> {
        for slot in out {
            *slot = self.take_bits(8)? as u8;
        }
        Ok(())
    }

    /// Reads a length-prefixed string.
    pub fn read_string(&mut self) -> Result<String, BytecodeError> {
        let len = self.read_u32_vbr()? as usize;
        if len > MAX_ATOM_SIZE {
            return Err(BytecodeError::malformed(
                "string length exceeds the maximum atom size",
                format!("{len} bytes"),
            ));
        }
        let mut bytes = vec![0u8; len];
        self.read_bytes(&mut bytes)?;
        String::from_utf8(bytes).map_err(|err| {
            BytecodeError::malformed(
                "string payload is not valid UTF-8",
                format!("invalid byte at offset {}", err.utf8_error().valid_up_to()),
            )
        })
    }

    /// Finishes reading the current atom, refilling the buffer when
    /// less than an atom's worth of bytes remains. Never skips bits.
    pub fn end_atom(&mut self) -> Result<(), BytecodeError> {
        if self.len - self.pos < MAX_ATOM_SIZE && !self.eof {
            self.refill()?;
        }
        Ok(())
    }

    /// True when the source is exhausted and only final-flush padding
    /// (fewer than 8 bits) remains unread.
    pub fn empty(&self) -> bool {
        self.eof && self.remaining_bits() < 8
    }
}

// ---------------------------------------------------------------------------
// Debug helpers
// ---------------------------------------------------------------------------

/// Renders encoded bytes as a hex dump, 16 bytes per line.
pub fn dump_bytes(data: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    for (line, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:04x}:", line * 16);
        for byte in chunk {
            let _ = write!(out, " {byte:02x}");
        }
        out.push('\n');
    }
    out
}
