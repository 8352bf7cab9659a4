//! Streaming PDF stream filters.
//!
//! This module contains:
//! - `asciihex`: ASCIIHex encoding/decoding
//! - `ascii85`: ASCII85 encoding/decoding
//! - `flate`: zlib compression with predictor reversal
//! - `lzw`: LZW decompression (PDF variant)
//! - `predictor`: PNG/TIFF predictor reversal
//! - `runlength`: run-length decoding
//!
//! Filters are driven as sessions created from a [`FilterKind`]: call
//! `begin_encode` or `begin_decode`, push input with `block`, then `end`.
//! All output goes to a caller-supplied [`OutputSink`]; the same sink must
//! be passed for the whole session.

mod ascii85;
mod asciihex;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use predictor::PredictorParams;

use crate::error::{PdfError, Result};
use log::warn;

/// Size of the scratch buffer used by buffering codecs.
pub(crate) const FILTER_BUFFER_SIZE: usize = 16 * 1024;

/// Downstream byte sink for filter and encryption output.
///
/// Implementations must not buffer on behalf of the caller; a returned
/// error aborts the session that produced the write.
pub trait OutputSink {
    fn write(&mut self, data: &[u8]) -> Result<()>;
}

impl OutputSink for Vec<u8> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
}

/// Adapter exposing any [`std::io::Write`] as an [`OutputSink`].
pub struct IoSink<W>(pub W);

impl<W: std::io::Write> OutputSink for IoSink<W> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.0.write_all(data)?;
        Ok(())
    }
}

/// The stream filters defined by the PDF specification.
///
/// Only the first five have encode/decode implementations; the image
/// codecs and `Crypt` are recognized name-tags that report
/// [`PdfError::UnsupportedFilter`] when a session is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    AsciiHex,
    Ascii85,
    Lzw,
    Flate,
    RunLength,
    CcittFax,
    Jbig2,
    Dct,
    Jpx,
    Crypt,
}

impl FilterKind {
    /// Parse a filter name as it appears in a stream dictionary.
    ///
    /// Both the full names and the short aliases (`/AHx`, `/Fl`, ...) are
    /// accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(FilterKind::AsciiHex),
            "ASCII85Decode" | "A85" => Some(FilterKind::Ascii85),
            "LZWDecode" | "LZW" => Some(FilterKind::Lzw),
            "FlateDecode" | "Fl" => Some(FilterKind::Flate),
            "RunLengthDecode" | "RL" => Some(FilterKind::RunLength),
            "CCITTFaxDecode" | "CCF" => Some(FilterKind::CcittFax),
            "JBIG2Decode" => Some(FilterKind::Jbig2),
            "DCTDecode" | "DCT" => Some(FilterKind::Dct),
            "JPXDecode" => Some(FilterKind::Jpx),
            "Crypt" => Some(FilterKind::Crypt),
            _ => {
                warn!("unknown filter name: {}", name);
                None
            }
        }
    }

    /// The canonical name written to a stream dictionary.
    pub fn pdf_name(self) -> &'static str {
        match self {
            FilterKind::AsciiHex => "ASCIIHexDecode",
            FilterKind::Ascii85 => "ASCII85Decode",
            FilterKind::Lzw => "LZWDecode",
            FilterKind::Flate => "FlateDecode",
            FilterKind::RunLength => "RunLengthDecode",
            FilterKind::CcittFax => "CCITTFaxDecode",
            FilterKind::Jbig2 => "JBIG2Decode",
            FilterKind::Dct => "DCTDecode",
            FilterKind::Jpx => "JPXDecode",
            FilterKind::Crypt => "Crypt",
        }
    }

    /// True if this crate implements the filter (decode at least).
    pub fn is_implemented(self) -> bool {
        matches!(
            self,
            FilterKind::AsciiHex
                | FilterKind::Ascii85
                | FilterKind::Lzw
                | FilterKind::Flate
                | FilterKind::RunLength
        )
    }

    /// Create a fresh session for this filter kind.
    pub fn session(self) -> FilterSession {
        FilterSession {
            kind: self,
            codec: Codec::new(self),
            phase: Phase::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Encoding,
    Decoding,
    Closed,
}

/// Per-codec session state, dispatched as a tagged variant.
enum Codec {
    AsciiHex(asciihex::AsciiHex),
    Ascii85(ascii85::Ascii85),
    Flate(flate::Flate),
    RunLength(runlength::RunLength),
    Lzw(lzw::Lzw),
    Unsupported,
}

impl Codec {
    fn new(kind: FilterKind) -> Self {
        match kind {
            FilterKind::AsciiHex => Codec::AsciiHex(asciihex::AsciiHex::default()),
            FilterKind::Ascii85 => Codec::Ascii85(ascii85::Ascii85::default()),
            FilterKind::Flate => Codec::Flate(flate::Flate::default()),
            FilterKind::RunLength => Codec::RunLength(runlength::RunLength::default()),
            FilterKind::Lzw => Codec::Lzw(lzw::Lzw::default()),
            _ => Codec::Unsupported,
        }
    }

    fn as_impl(&mut self) -> Option<&mut dyn CodecImpl> {
        match self {
            Codec::AsciiHex(c) => Some(c),
            Codec::Ascii85(c) => Some(c),
            Codec::Flate(c) => Some(c),
            Codec::RunLength(c) => Some(c),
            Codec::Lzw(c) => Some(c),
            Codec::Unsupported => None,
        }
    }
}

/// The capability set every codec session implements.
///
/// `begin_*` resets codec state; `*_block` pushes a span of input and may
/// write to the sink any number of times; `end_*` flushes residues and
/// must leave the codec reset for reuse. `fail` releases codec-owned
/// resources after a sink or codec error.
pub(crate) trait CodecImpl {
    fn begin_encode(&mut self) -> Result<()>;
    fn begin_decode(&mut self, params: Option<&PredictorParams>) -> Result<()>;
    fn encode_block(&mut self, sink: &mut dyn OutputSink, data: &[u8]) -> Result<()>;
    fn decode_block(&mut self, sink: &mut dyn OutputSink, data: &[u8]) -> Result<()>;
    fn end_encode(&mut self, sink: &mut dyn OutputSink) -> Result<()>;
    fn end_decode(&mut self, sink: &mut dyn OutputSink) -> Result<()>;
    fn fail(&mut self);
}

/// A single encode or decode operation over one filter.
///
/// Sessions are single-threaded and not reentrant across calls, but a
/// session that completed a clean `end` may be restarted with a new
/// `begin_encode`/`begin_decode`.
pub struct FilterSession {
    kind: FilterKind,
    codec: Codec,
    phase: Phase,
}

impl FilterSession {
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Start encoding. Fails with `UnsupportedFilter` if this filter has
    /// no encoder.
    pub fn begin_encode(&mut self) -> Result<()> {
        self.begin(Phase::Encoding, None)
    }

    /// Start decoding, optionally with predictor decode parameters.
    pub fn begin_decode(&mut self, params: Option<&PredictorParams>) -> Result<()> {
        self.begin(Phase::Decoding, params)
    }

    fn begin(&mut self, phase: Phase, params: Option<&PredictorParams>) -> Result<()> {
        if self.phase == Phase::Encoding || self.phase == Phase::Decoding {
            return Err(PdfError::InternalLogic("begin inside an active session"));
        }
        let name = self.kind.pdf_name();
        let codec = self
            .codec
            .as_impl()
            .ok_or(PdfError::UnsupportedFilter(name))?;
        match phase {
            Phase::Encoding => codec.begin_encode()?,
            Phase::Decoding => codec.begin_decode(params)?,
            _ => unreachable!(),
        }
        self.phase = phase;
        Ok(())
    }

    /// Push a span of input. The span is not retained after return.
    pub fn block(&mut self, sink: &mut dyn OutputSink, data: &[u8]) -> Result<()> {
        let phase = self.phase;
        let result = match (phase, self.codec.as_impl()) {
            (Phase::Encoding, Some(codec)) => codec.encode_block(sink, data),
            (Phase::Decoding, Some(codec)) => codec.decode_block(sink, data),
            _ => return Err(PdfError::InternalLogic("block outside an active session")),
        };
        if result.is_err() {
            self.abort();
        }
        result
    }

    /// Flush buffered state and close the session. Double-close is an
    /// error; a fresh `begin_*` restarts the session.
    pub fn end(&mut self, sink: &mut dyn OutputSink) -> Result<()> {
        let phase = self.phase;
        let result = match (phase, self.codec.as_impl()) {
            (Phase::Encoding, Some(codec)) => codec.end_encode(sink),
            (Phase::Decoding, Some(codec)) => codec.end_decode(sink),
            _ => return Err(PdfError::InternalLogic("end outside an active session")),
        };
        if result.is_err() {
            self.abort();
            return result;
        }
        self.phase = Phase::Closed;
        Ok(())
    }

    /// Release codec resources after a failure and close the session.
    fn abort(&mut self) {
        if let Some(codec) = self.codec.as_impl() {
            codec.fail();
        }
        self.phase = Phase::Closed;
    }
}

/// Encode a whole buffer through one filter.
pub fn encode_to_vec(kind: FilterKind, data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut session = kind.session();
    session.begin_encode()?;
    session.block(&mut out, data)?;
    session.end(&mut out)?;
    Ok(out)
}

/// Decode a whole buffer through one filter.
pub fn decode_to_vec(
    kind: FilterKind,
    data: &[u8],
    params: Option<&PredictorParams>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut session = kind.session();
    session.begin_decode(params)?;
    session.block(&mut out, data)?;
    session.end(&mut out)?;
    Ok(out)
}

/// Decode a buffer through a filter chain, outermost filter first,
/// staging intermediate output in memory.
pub fn decode_chain_to_vec(
    kinds: &[FilterKind],
    data: &[u8],
    params: Option<&PredictorParams>,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for (i, &kind) in kinds.iter().enumerate() {
        // Predictor parameters apply to the innermost (last) filter.
        let p = if i + 1 == kinds.len() { params } else { None };
        current = decode_to_vec(kind, &current, p)?;
    }
    Ok(current)
}
