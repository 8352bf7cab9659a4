//! LZW stream decoder (PDF variant). Encoding is not implemented.

use super::{CodecImpl, OutputSink, PredictorParams};
use crate::error::{PdfError, Result};

const CLEAR: u32 = 256;
const EOD: u32 = 257;
const TABLE_SIZE: usize = 4096;
const MASKS: [u32; 4] = [0x01FF, 0x03FF, 0x07FF, 0x0FFF];

/// Streaming LZW decoder.
///
/// Codes start at 9 bits and grow to 12, extracted MSB-first from a
/// 24-bit buffer. The dictionary is seeded with 256 single-byte literals
/// plus the CLEAR and EOD control codes. With `early_change` (the PDF
/// default) the code width grows one entry early.
pub(super) struct Lzw {
    table: Vec<Vec<u8>>,
    code_len: u32,
    mask: usize,
    buffer: u32,
    buffer_size: u32,
    prev: Option<u32>,
    early_change: bool,
    eod: bool,
}

impl Default for Lzw {
    fn default() -> Self {
        let mut lzw = Self {
            table: Vec::new(),
            code_len: 9,
            mask: 0,
            buffer: 0,
            buffer_size: 0,
            prev: None,
            early_change: true,
            eod: false,
        };
        lzw.init_table();
        lzw
    }
}

impl Lzw {
    fn init_table(&mut self) {
        self.table.clear();
        self.table.reserve(TABLE_SIZE);
        for byte in 0..=255u8 {
            self.table.push(vec![byte]);
        }
        // Placeholders so entry indices line up with code values; the
        // CLEAR and EOD codes never produce output themselves.
        self.table.push(Vec::new());
        self.table.push(Vec::new());
    }

    fn reset(&mut self) {
        self.init_table();
        self.code_len = 9;
        self.mask = 0;
        self.buffer = 0;
        self.buffer_size = 0;
        self.prev = None;
        self.eod = false;
    }

    /// Grow the code width when the next index to be assigned reaches the
    /// threshold (one entry early with `early_change`).
    fn maybe_grow(&mut self) {
        if self.mask >= MASKS.len() - 1 {
            return;
        }
        let mut threshold = 512usize << self.mask;
        if self.early_change {
            threshold -= 1;
        }
        if self.table.len() >= threshold {
            self.code_len += 1;
            self.mask += 1;
        }
    }

    fn push_entry(&mut self, entry: Vec<u8>) {
        if self.table.len() < TABLE_SIZE {
            self.table.push(entry);
            self.maybe_grow();
        }
    }

    fn handle_code(&mut self, sink: &mut dyn OutputSink, code: u32) -> Result<()> {
        if code == CLEAR {
            self.init_table();
            self.code_len = 9;
            self.mask = 0;
            self.prev = None;
            return Ok(());
        }
        if code == EOD {
            self.eod = true;
            return Ok(());
        }

        let idx = code as usize;
        let data = if idx < self.table.len() {
            self.table[idx].clone()
        } else if idx == self.table.len() {
            // KwKwK: the code refers to the entry about to be created.
            let prev = self.prev.ok_or_else(|| {
                PdfError::ValueOutOfRange(format!("LZW code {} before any output", code))
            })?;
            let mut data = self.table[prev as usize].clone();
            data.push(data[0]);
            data
        } else {
            return Err(PdfError::ValueOutOfRange(format!(
                "LZW code {} outside dictionary of {}",
                code,
                self.table.len()
            )));
        };

        sink.write(&data)?;

        if let Some(prev) = self.prev {
            let mut entry = self.table[prev as usize].clone();
            entry.push(data[0]);
            self.push_entry(entry);
        }
        self.prev = Some(code);
        Ok(())
    }
}

impl CodecImpl for Lzw {
    fn begin_encode(&mut self) -> Result<()> {
        Err(PdfError::UnsupportedFilter("LZWDecode"))
    }

    fn begin_decode(&mut self, params: Option<&PredictorParams>) -> Result<()> {
        self.reset();
        self.early_change = params.map_or(true, |p| p.early_change);
        Ok(())
    }

    fn encode_block(&mut self, _sink: &mut dyn OutputSink, _data: &[u8]) -> Result<()> {
        Err(PdfError::UnsupportedFilter("LZWDecode"))
    }

    fn decode_block(&mut self, sink: &mut dyn OutputSink, data: &[u8]) -> Result<()> {
        for &byte in data {
            if self.eod {
                break;
            }
            self.buffer = (self.buffer << 8) | byte as u32;
            self.buffer_size += 8;
            while self.buffer_size >= self.code_len {
                let code = (self.buffer >> (self.buffer_size - self.code_len)) & MASKS[self.mask];
                self.buffer_size -= self.code_len;
                self.handle_code(sink, code)?;
                if self.eod {
                    break;
                }
            }
        }
        Ok(())
    }

    fn end_encode(&mut self, _sink: &mut dyn OutputSink) -> Result<()> {
        Err(PdfError::UnsupportedFilter("LZWDecode"))
    }

    fn end_decode(&mut self, _sink: &mut dyn OutputSink) -> Result<()> {
        // A missing EOD code is tolerated; trailing bits shorter than a
        // code are padding.
        self.reset();
        Ok(())
    }

    fn fail(&mut self) {
        self.reset();
    }
}
