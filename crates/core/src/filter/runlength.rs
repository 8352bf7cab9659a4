//! RunLength stream decoder. Encoding is not implemented.

use super::{CodecImpl, OutputSink, PredictorParams};
use crate::error::{PdfError, Result};

#[derive(Default, Clone, Copy)]
enum State {
    #[default]
    Length,
    /// Copy this many bytes verbatim.
    Literal(usize),
    /// Repeat the next byte this many times.
    Repeat(usize),
    Eod,
}

/// Streaming RunLength decoder, resumable across block boundaries.
///
/// A length byte of 0..=127 copies the next length+1 bytes, 128 ends the
/// data, and 129..=255 repeats the next byte 257-length times.
#[derive(Default)]
pub(super) struct RunLength {
    state: State,
}

impl CodecImpl for RunLength {
    fn begin_encode(&mut self) -> Result<()> {
        Err(PdfError::UnsupportedFilter("RunLengthDecode"))
    }

    fn begin_decode(&mut self, _params: Option<&PredictorParams>) -> Result<()> {
        self.state = State::Length;
        Ok(())
    }

    fn encode_block(&mut self, _sink: &mut dyn OutputSink, _data: &[u8]) -> Result<()> {
        Err(PdfError::UnsupportedFilter("RunLengthDecode"))
    }

    fn decode_block(&mut self, sink: &mut dyn OutputSink, data: &[u8]) -> Result<()> {
        let mut pos = 0;
        while pos < data.len() {
            match self.state {
                State::Length => {
                    let length = data[pos];
                    pos += 1;
                    self.state = match length {
                        128 => State::Eod,
                        0..=127 => State::Literal(length as usize + 1),
                        129..=255 => State::Repeat(257 - length as usize),
                    };
                }
                State::Literal(remaining) => {
                    let take = remaining.min(data.len() - pos);
                    sink.write(&data[pos..pos + take])?;
                    pos += take;
                    self.state = if take == remaining {
                        State::Length
                    } else {
                        State::Literal(remaining - take)
                    };
                }
                State::Repeat(count) => {
                    // count is at most 128.
                    let mut run = [0u8; 128];
                    let run = &mut run[..count];
                    run.fill(data[pos]);
                    pos += 1;
                    sink.write(run)?;
                    self.state = State::Length;
                }
                State::Eod => break,
            }
        }
        Ok(())
    }

    fn end_encode(&mut self, _sink: &mut dyn OutputSink) -> Result<()> {
        Err(PdfError::UnsupportedFilter("RunLengthDecode"))
    }

    fn end_decode(&mut self, _sink: &mut dyn OutputSink) -> Result<()> {
        // Truncated input is tolerated; a missing EOD marker is common.
        self.state = State::Length;
        Ok(())
    }

    fn fail(&mut self) {
        self.state = State::Length;
    }
}
