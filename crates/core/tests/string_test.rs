//! PdfString carrier tests.

use tinta_core::string::{
    utf16be_to_utf8, utf8_to_utf16be, Conversion, PdfString, PDFDOC_ENCODING,
};
use tinta_core::{PdfEncrypt, PdfEncryptAlgorithm, PdfError, PdfPermissions};

#[test]
fn length_excludes_terminators() {
    let s = PdfString::new("abc");
    assert_eq!(s.len(), 3);
    assert_eq!(s.as_bytes(), b"abc");
    assert!(!s.is_empty());
    assert!(PdfString::new("").is_empty());
}

#[test]
fn unicode_detection_from_bom() {
    assert!(PdfString::from_bytes(&[0xFE, 0xFF, 0x00, 0x41], false).is_unicode());
    assert!(!PdfString::new("plain text").is_unicode());
    assert!(!PdfString::from_bytes(&[0xFE], false).is_unicode());
}

#[test]
fn from_utf8_converts_to_utf16be() {
    let s = PdfString::from_utf8("Hi");
    assert!(s.is_unicode());
    assert_eq!(s.as_bytes(), &[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]);
    assert_eq!(s.unicode_len(), 2);
}

#[test]
fn from_utf8_handles_astral_planes() {
    // U+1F389 encodes as a surrogate pair.
    let s = PdfString::from_utf8("\u{1F389}");
    assert_eq!(s.as_bytes(), &[0xFE, 0xFF, 0xD8, 0x3C, 0xDF, 0x89]);
}

#[test]
fn from_hex_data_parses_pairs() {
    let s = PdfString::from_hex_data(b"48 65 6C 6C 6F").unwrap();
    assert!(s.is_hex());
    assert_eq!(s.as_bytes(), b"Hello");

    // Odd trailing nibble is completed with zero.
    let s = PdfString::from_hex_data(b"7").unwrap();
    assert_eq!(s.as_bytes(), b"p");

    assert!(matches!(
        PdfString::from_hex_data(b"4G").unwrap_err(),
        PdfError::InvalidStream(_)
    ));
}

#[test]
fn write_literal_with_escapes() {
    let s = PdfString::new("a(b)\\c\nd");
    let mut out = Vec::new();
    s.write(&mut out, None).unwrap();
    assert_eq!(out, b"(a\\(b\\)\\\\c\\nd)");
}

#[test]
fn write_hex_form() {
    let s = PdfString::from_bytes(&[0x01, 0xAB], true);
    let mut out = Vec::new();
    s.write(&mut out, None).unwrap();
    assert_eq!(out, b"<01AB>");
}

#[test]
fn write_encrypted_is_hex_and_roundtrips() {
    let mut enc = PdfEncrypt::new(
        "",
        "",
        PdfPermissions::all(),
        PdfEncryptAlgorithm::Rc4V2,
        128,
    )
    .unwrap();
    enc.generate_encryption_key(&[0xAA; 16]);
    enc.set_current_reference(3, 0);

    let s = PdfString::new("secret contents");
    let mut out = Vec::new();
    s.write(&mut out, Some(&mut enc)).unwrap();

    assert_eq!(out.first(), Some(&b'<'));
    assert_eq!(out.last(), Some(&b'>'));

    let payload = PdfString::from_hex_data(&out[1..out.len() - 1]).unwrap();
    assert_eq!(
        enc.decrypt(payload.as_bytes()).unwrap(),
        b"secret contents"
    );
}

#[test]
fn to_unicode_maps_pdfdoc_encoding() {
    // 0x80 is the bullet in PDFDocEncoding.
    let s = PdfString::from_bytes(&[b'A', 0x80], false);
    let u = s.to_unicode();
    assert!(u.is_unicode());
    assert_eq!(u.as_bytes(), &[0xFE, 0xFF, 0x00, 0x41, 0x20, 0x22]);

    // Already-unicode strings are returned unchanged.
    let same = u.to_unicode();
    assert_eq!(same, u);
}

#[test]
fn pdfdoc_encoding_specials() {
    assert_eq!(PDFDOC_ENCODING[0x18], 0x02D8); // breve
    assert_eq!(PDFDOC_ENCODING[0x80], 0x2022); // bullet
    assert_eq!(PDFDOC_ENCODING[0x92], 0x2122); // trademark
    assert_eq!(PDFDOC_ENCODING[0xA0], 0x20AC); // euro
    assert_eq!(PDFDOC_ENCODING[b'A' as usize], 0x0041);
    assert_eq!(PDFDOC_ENCODING[0xE9], 0x00E9);
}

#[test]
fn utf8_utf16_roundtrip() {
    let text = "H\u{E9}llo \u{1F389} \u{4E16}\u{754C}";
    let utf16 = utf8_to_utf16be(text.as_bytes(), Conversion::Strict).unwrap();
    assert_eq!(utf16be_to_utf8(&utf16, Conversion::Strict).unwrap(), text);
}

#[test]
fn utf8_strict_rejects_malformed() {
    assert!(matches!(
        utf8_to_utf16be(&[0x48, 0xFF, 0x49], Conversion::Strict).unwrap_err(),
        PdfError::InvalidStream(_)
    ));
}

#[test]
fn utf8_lenient_substitutes_replacement() {
    let utf16 = utf8_to_utf16be(&[0x48, 0xFF, 0x49], Conversion::Lenient).unwrap();
    assert_eq!(
        utf16be_to_utf8(&utf16, Conversion::Strict).unwrap(),
        "H\u{FFFD}I"
    );
}

#[test]
fn utf16_unpaired_surrogate() {
    // A high surrogate followed by a plain character.
    let data = [0xD8, 0x00, 0x00, 0x41];
    assert!(matches!(
        utf16be_to_utf8(&data, Conversion::Strict).unwrap_err(),
        PdfError::InvalidStream(_)
    ));
    assert_eq!(
        utf16be_to_utf8(&data, Conversion::Lenient).unwrap(),
        "\u{FFFD}A"
    );
}

#[test]
fn utf16_odd_tail() {
    let data = [0x00, 0x41, 0x42];
    assert!(utf16be_to_utf8(&data, Conversion::Strict).is_err());
    assert_eq!(
        utf16be_to_utf8(&data, Conversion::Lenient).unwrap(),
        "A\u{FFFD}"
    );
}

#[test]
fn utf16_bom_is_stripped() {
    let data = [0xFE, 0xFF, 0x00, 0x41];
    assert_eq!(utf16be_to_utf8(&data, Conversion::Strict).unwrap(), "A");
}

#[test]
fn clone_is_cheap_and_equal() {
    let s = PdfString::from_utf8("shared buffer");
    let t = s.clone();
    assert_eq!(s, t);
    assert_eq!(s.as_bytes().as_ptr(), t.as_bytes().as_ptr());
}
