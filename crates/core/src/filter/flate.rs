//! Flate (zlib) stream codec.

use super::{predictor, CodecImpl, OutputSink, PredictorParams, FILTER_BUFFER_SIZE};
use crate::error::{PdfError, Result};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use log::warn;

/// Streaming Flate session state.
///
/// Input is fed to zlib in arbitrary-sized blocks and drained through a
/// 16 KiB scratch buffer. When predictor decode parameters are present,
/// inflated data is buffered and the predictor reversal runs as a
/// post-pass on `end`, because PNG predictors reference the previous
/// decoded row.
#[derive(Default)]
pub(super) struct Flate {
    compress: Option<Compress>,
    decompress: Option<Decompress>,
    predictor: Option<PredictorParams>,
    inflated: Vec<u8>,
    finished: bool,
}

impl Flate {
    fn release(&mut self) {
        self.compress = None;
        self.decompress = None;
        self.predictor = None;
        self.inflated = Vec::new();
        self.finished = false;
    }

    fn route_output(&mut self, sink: &mut dyn OutputSink, data: &[u8]) -> Result<()> {
        if self.predictor.is_some() {
            self.inflated
                .try_reserve(data.len())
                .map_err(|_| PdfError::OutOfMemory("inflate buffer".into()))?;
            self.inflated.extend_from_slice(data);
            Ok(())
        } else {
            sink.write(data)
        }
    }
}

impl CodecImpl for Flate {
    fn begin_encode(&mut self) -> Result<()> {
        self.release();
        self.compress = Some(Compress::new(Compression::default(), true));
        Ok(())
    }

    fn begin_decode(&mut self, params: Option<&PredictorParams>) -> Result<()> {
        self.release();
        self.decompress = Some(Decompress::new(true));
        self.predictor = params.filter(|p| !p.is_identity()).cloned();
        Ok(())
    }

    fn encode_block(&mut self, sink: &mut dyn OutputSink, data: &[u8]) -> Result<()> {
        let stream = self
            .compress
            .as_mut()
            .ok_or(PdfError::InternalLogic("flate encode without begin"))?;
        let mut buf = [0u8; FILTER_BUFFER_SIZE];
        let mut pos = 0;
        loop {
            let before_in = stream.total_in();
            let before_out = stream.total_out();
            stream
                .compress(&data[pos..], &mut buf, FlushCompress::None)
                .map_err(|e| PdfError::Flate(e.to_string()))?;
            let consumed = (stream.total_in() - before_in) as usize;
            pos += consumed;
            let produced = (stream.total_out() - before_out) as usize;
            if produced > 0 {
                sink.write(&buf[..produced])?;
            }
            if pos >= data.len() && produced < buf.len() {
                break;
            }
            if consumed == 0 && produced == 0 {
                break;
            }
        }
        Ok(())
    }

    fn decode_block(&mut self, sink: &mut dyn OutputSink, data: &[u8]) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        let mut buf = [0u8; FILTER_BUFFER_SIZE];
        let mut pos = 0;
        loop {
            let stream = self
                .decompress
                .as_mut()
                .ok_or(PdfError::InternalLogic("flate decode without begin"))?;
            let before_in = stream.total_in();
            let before_out = stream.total_out();
            let status = stream
                .decompress(&data[pos..], &mut buf, FlushDecompress::None)
                .map_err(|e| {
                    warn!("zlib inflate error: {}", e);
                    PdfError::Flate(e.to_string())
                })?;
            let consumed = (stream.total_in() - before_in) as usize;
            pos += consumed;
            let produced = (stream.total_out() - before_out) as usize;
            if produced > 0 {
                self.route_output(sink, &buf[..produced])?;
            }
            if matches!(status, Status::StreamEnd) {
                self.finished = true;
                break;
            }
            if pos >= data.len() && produced < buf.len() {
                break;
            }
            if consumed == 0 && produced == 0 {
                break;
            }
        }
        Ok(())
    }

    fn end_encode(&mut self, sink: &mut dyn OutputSink) -> Result<()> {
        let stream = self
            .compress
            .as_mut()
            .ok_or(PdfError::InternalLogic("flate encode without begin"))?;
        let mut buf = [0u8; FILTER_BUFFER_SIZE];
        loop {
            let before_out = stream.total_out();
            let status = stream
                .compress(&[], &mut buf, FlushCompress::Finish)
                .map_err(|e| PdfError::Flate(e.to_string()))?;
            let produced = (stream.total_out() - before_out) as usize;
            if produced > 0 {
                sink.write(&buf[..produced])?;
            }
            if matches!(status, Status::StreamEnd) {
                break;
            }
            if produced == 0 {
                return Err(PdfError::Flate("deflate failed to finish".into()));
            }
        }
        self.release();
        Ok(())
    }

    fn end_decode(&mut self, sink: &mut dyn OutputSink) -> Result<()> {
        if !self.finished {
            let mut buf = [0u8; FILTER_BUFFER_SIZE];
            loop {
                let stream = self
                    .decompress
                    .as_mut()
                    .ok_or(PdfError::InternalLogic("flate decode without begin"))?;
                let before_out = stream.total_out();
                let status = stream
                    .decompress(&[], &mut buf, FlushDecompress::Finish)
                    .map_err(|e| PdfError::Flate(e.to_string()))?;
                let produced = (stream.total_out() - before_out) as usize;
                if produced > 0 {
                    self.route_output(sink, &buf[..produced])?;
                }
                if matches!(status, Status::StreamEnd) || produced == 0 {
                    break;
                }
            }
        }
        if let Some(params) = self.predictor.take() {
            let inflated = std::mem::take(&mut self.inflated);
            predictor::revert(&params, &inflated, sink)?;
        }
        self.release();
        Ok(())
    }

    fn fail(&mut self) {
        self.release();
    }
}
