//! LZW decoder tests.

use tinta_core::filter::{decode_to_vec, FilterKind};
use tinta_core::{PdfError, PredictorParams};

/// Example stream from PDF 1.7 Annex H.
const ADOBE_SAMPLE: &[u8] = b"\x80\x0b\x60\x50\x22\x0c\x0c\x85\x01";

#[test]
fn decode_adobe_sample() {
    assert_eq!(
        decode_to_vec(FilterKind::Lzw, ADOBE_SAMPLE, None).unwrap(),
        b"-----A---B"
    );
}

#[test]
fn decode_adobe_sample_split_blocks() {
    let mut out = Vec::new();
    let mut session = FilterKind::Lzw.session();
    session.begin_decode(None).unwrap();
    for chunk in ADOBE_SAMPLE.chunks(2) {
        session.block(&mut out, chunk).unwrap();
    }
    session.end(&mut out).unwrap();
    assert_eq!(out, b"-----A---B");
}

#[test]
fn decode_with_late_change_thresholds() {
    // The sample never grows the code width, so both settings agree.
    let params = PredictorParams {
        early_change: false,
        ..PredictorParams::default()
    };
    assert_eq!(
        decode_to_vec(FilterKind::Lzw, ADOBE_SAMPLE, Some(&params)).unwrap(),
        b"-----A---B"
    );
}

#[test]
fn missing_eod_is_tolerated() {
    // CLEAR, then the literal '-'; the trailing bits are padding.
    assert_eq!(
        decode_to_vec(FilterKind::Lzw, b"\x80\x0b\x60", None).unwrap(),
        b"-"
    );
}

#[test]
fn code_outside_dictionary() {
    // 9-bit code 300 with an empty dictionary.
    let err = decode_to_vec(FilterKind::Lzw, &[0x96, 0x00], None).unwrap_err();
    assert!(matches!(err, PdfError::ValueOutOfRange(_)));
}

#[test]
fn kwkwk_before_any_output() {
    // First data code is 258 (== table size), which has no previous
    // entry to extend.
    let err = decode_to_vec(FilterKind::Lzw, &[0x81, 0x00], None).unwrap_err();
    assert!(matches!(err, PdfError::ValueOutOfRange(_)));
}

#[test]
fn encode_is_unsupported() {
    let mut session = FilterKind::Lzw.session();
    assert!(matches!(
        session.begin_encode().unwrap_err(),
        PdfError::UnsupportedFilter(_)
    ));
}
