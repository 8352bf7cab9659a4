//! PNG and TIFF predictor reversal for Flate and LZW streams.

use super::OutputSink;
use crate::error::{PdfError, Result};

/// Decode parameters from a stream's `/DecodeParms` dictionary.
///
/// Only `predictor` values 1 (none), 2 (TIFF horizontal differencing) and
/// 10..=15 (PNG row predictors) are meaningful; `early_change` is consumed
/// by the LZW decoder.
#[derive(Debug, Clone)]
pub struct PredictorParams {
    pub predictor: u8,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
    pub early_change: bool,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: true,
        }
    }
}

impl PredictorParams {
    pub fn is_identity(&self) -> bool {
        self.predictor == 1
    }

    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }

    fn row_length(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }
}

/// Reverse the predictor over fully decompressed data, writing plain rows
/// to the sink.
pub(super) fn revert(params: &PredictorParams, data: &[u8], sink: &mut dyn OutputSink) -> Result<()> {
    match params.predictor {
        1 => sink.write(data),
        2 => revert_tiff(params, data, sink),
        10..=15 => revert_png(params, data, sink),
        other => Err(PdfError::InvalidPredictor(other)),
    }
}

/// PNG predictors: each record is a filter-type byte followed by one row.
fn revert_png(params: &PredictorParams, data: &[u8], sink: &mut dyn OutputSink) -> Result<()> {
    let row_len = params.row_length();
    let bpp = params.bytes_per_pixel();

    if data.len() % (row_len + 1) != 0 {
        return Err(PdfError::InvalidStream(
            "predictor input is not a whole number of rows".into(),
        ));
    }

    let mut prev = vec![0u8; row_len];
    let mut row = vec![0u8; row_len];

    for record in data.chunks_exact(row_len + 1) {
        let filter_type = record[0];
        let src = &record[1..];

        match filter_type {
            0 => row.copy_from_slice(src),
            1 => {
                // Sub: add the byte one pixel to the left.
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] } else { 0 };
                    row[i] = src[i].wrapping_add(left);
                }
            }
            2 => {
                // Up: add the byte from the previous row.
                for i in 0..row_len {
                    row[i] = src[i].wrapping_add(prev[i]);
                }
            }
            3 => {
                // Average of left and above, floored.
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                    let up = prev[i] as u16;
                    row[i] = src[i].wrapping_add(((left + up) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] } else { 0 };
                    let up = prev[i];
                    let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
                    row[i] = src[i].wrapping_add(paeth(left, up, up_left));
                }
            }
            other => return Err(PdfError::InvalidPredictor(other)),
        }

        sink.write(&row)?;
        std::mem::swap(&mut prev, &mut row);
    }
    Ok(())
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// TIFF predictor 2: horizontal differencing reversed per sample, one
/// channel at a time. Rows are independent.
fn revert_tiff(params: &PredictorParams, data: &[u8], sink: &mut dyn OutputSink) -> Result<()> {
    let row_len = params.row_length();
    if row_len == 0 {
        return sink.write(data);
    }
    let mut out = data.to_vec();
    let colors = params.colors;

    for row in out.chunks_mut(row_len) {
        match params.bits_per_component {
            8 => {
                for i in colors..row.len() {
                    row[i] = row[i].wrapping_add(row[i - colors]);
                }
            }
            16 => {
                // Big-endian 16-bit samples.
                let samples = row.len() / 2;
                for s in colors..samples {
                    let prev = u16::from_be_bytes([row[2 * (s - colors)], row[2 * (s - colors) + 1]]);
                    let cur = u16::from_be_bytes([row[2 * s], row[2 * s + 1]]);
                    let sum = cur.wrapping_add(prev);
                    row[2 * s..2 * s + 2].copy_from_slice(&sum.to_be_bytes());
                }
            }
            bpc @ (1 | 2 | 4) => {
                // Unpack sub-byte samples, difference, and repack.
                let total = row.len() * 8 / bpc;
                let mask = (1u16 << bpc) - 1;
                let mut samples = Vec::with_capacity(total);
                for s in 0..total {
                    let bit = s * bpc;
                    let byte = row[bit / 8] as u16;
                    samples.push((byte >> (8 - bpc - bit % 8)) & mask);
                }
                for s in colors..total {
                    samples[s] = (samples[s] + samples[s - colors]) & mask;
                }
                for byte in row.iter_mut() {
                    *byte = 0;
                }
                for (s, &sample) in samples.iter().enumerate() {
                    let bit = s * bpc;
                    row[bit / 8] |= (sample << (8 - bpc - bit % 8)) as u8;
                }
            }
            other => {
                return Err(PdfError::ValueOutOfRange(format!(
                    "unsupported bits per component: {}",
                    other
                )));
            }
        }
    }

    sink.write(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_up_rows() {
        let params = PredictorParams {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns: 3,
            early_change: true,
        };
        let mut out = Vec::new();
        revert(&params, &[2, 1, 2, 3, 2, 1, 2, 3], &mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3, 2, 4, 6]);
    }

    #[test]
    fn tiff_byte_samples() {
        let params = PredictorParams {
            predictor: 2,
            colors: 1,
            bits_per_component: 8,
            columns: 4,
            early_change: true,
        };
        let mut out = Vec::new();
        revert(&params, &[1, 1, 1, 1], &mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn unknown_row_filter() {
        let params = PredictorParams {
            predictor: 10,
            colors: 1,
            bits_per_component: 8,
            columns: 2,
            early_change: true,
        };
        let mut out = Vec::new();
        let err = revert(&params, &[9, 0, 0], &mut out).unwrap_err();
        assert!(matches!(err, PdfError::InvalidPredictor(9)));
    }
}
