mod boyer_moore;
mod compressor;
mod error;
mod extractor;
mod frame;
mod framer;

pub use boyer_moore::BoyerMoore;
pub use compressor::{Compressor, Decompressor};
pub use error::FormatError;
pub use extractor::{BitPackerFactory, Extractor, ExtractorConfig, ExtractorFactory};
pub use frame::{decode_time_tag, FrameFormat, TimeTag};
pub use framer::{Frame, Framer};
