//! tinta - PDF stream filters and standard-security encryption.
//!
//! This crate implements the byte-level compatibility surfaces of a PDF
//! reader/writer: the streaming stream-filter pipeline (ASCIIHex,
//! ASCII85, Flate with predictor reversal, RunLength, LZW) and the PDF
//! 1.6 standard security handler (RC4 and AES-128 object encryption),
//! together with the [`string::PdfString`] carrier for encrypted, hex
//! and unicode string content.

pub mod codec;
pub mod error;
pub mod filter;
pub mod security;
pub mod string;

pub use error::{PdfError, Result};
pub use filter::{FilterKind, FilterSession, OutputSink, PredictorParams};
pub use security::{EncryptDict, PdfEncrypt, PdfEncryptAlgorithm, PdfPermissions};
pub use string::PdfString;
