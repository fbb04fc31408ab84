use crate::extractor::Extractor;

struct BitWriter {
    buf: Vec<u8>,
    acc: u64,
    nbits: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self { buf: Vec::new(), acc: 0, nbits: 0 }
    }

    fn push(&mut self, value: u64, width: u32) {
        debug_assert!(width <= 57, "accumulator can't hold more than 57 pending bits plus a full byte");
        self.acc |= (value & ((1u64 << width) - 1)) << self.nbits;
        self.nbits += width;
        while self.nbits >= 8 {
            self.buf.push((self.acc & 0xff) as u8);
            self.acc >>= 8;
            self.nbits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.buf.push((self.acc & 0xff) as u8);
        }
        self.buf
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u64,
    nbits: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, acc: 0, nbits: 0 }
    }

    fn pull(&mut self, width: u32) -> Option<u64> {
        while self.nbits < width {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            self.acc |= u64::from(byte) << self.nbits;
            self.nbits += 8;
        }
        let mask = (1u64 << width) - 1;
        let v = self.acc & mask;
        self.acc >>= width;
        self.nbits -= width;
        Some(v)
    }
}

/// Bitstream dropper: reads `bits_per_input_word`-wide words from the
/// input and writes `extractor`'s packed, narrower words to the output.
/// A `header_bytes` prefix (the frame's sync word and time tag) is copied
/// through untouched so it reaches the receiver intact.
pub struct Compressor<'a> {
    extractor: &'a dyn Extractor,
    header_bytes: usize,
}

impl<'a> Compressor<'a> {
    pub fn new(extractor: &'a dyn Extractor, header_bytes: usize) -> Self {
        Self { extractor, header_bytes }
    }

    pub fn compress(&self, input: &[u8]) -> Vec<u8> {
        let header = &input[..self.header_bytes.min(input.len())];
        let payload = &input[self.header_bytes.min(input.len())..];

        let word_width = self.extractor.config().bits_per_input_word;
        let packed_width = self.extractor.config().packed_width();

        let mut reader = BitReader::new(payload);
        let mut writer = BitWriter::new();
        while let Some(word) = reader.pull(word_width) {
            writer.push(self.extractor.extract(word), packed_width);
        }

        let mut out = Vec::with_capacity(header.len() + payload.len());
        out.extend_from_slice(header);
        out.extend(writer.finish());
        out
    }
}

/// Inverse of [`Compressor`]: expands packed words back to
/// `bits_per_input_word` width, zero-filling every dropped bit.
pub struct Decompressor<'a> {
    extractor: &'a dyn Extractor,
    header_bytes: usize,
}

impl<'a> Decompressor<'a> {
    pub fn new(extractor: &'a dyn Extractor, header_bytes: usize) -> Self {
        Self { extractor, header_bytes }
    }

    pub fn decompress(&self, input: &[u8]) -> Vec<u8> {
        let header = &input[..self.header_bytes.min(input.len())];
        let payload = &input[self.header_bytes.min(input.len())..];

        let word_width = self.extractor.config().bits_per_input_word;
        let packed_width = self.extractor.config().packed_width();

        let mut reader = BitReader::new(payload);
        let mut writer = BitWriter::new();
        while let Some(packed) = reader.pull(packed_width) {
            writer.push(self.extractor.restore(packed), word_width);
        }

        let mut out = Vec::with_capacity(header.len() + payload.len());
        out.extend_from_slice(header);
        out.extend(writer.finish());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{BitPackerFactory, ExtractorConfig, ExtractorFactory};

    #[test]
    fn compress_then_decompress_keeps_selected_bits() {
        let config = ExtractorConfig::parse("8:1:0,2,4,6").unwrap();
        let extractor = BitPackerFactory.build(config).unwrap();

        let header = [0xed, 0xde, 0xad, 0xab];
        let payload = [0b1111_1111u8, 0b0000_0000u8];
        let mut frame = header.to_vec();
        frame.extend_from_slice(&payload);

        let compressed = Compressor::new(extractor.as_ref(), header.len()).compress(&frame);
        assert_eq!(&compressed[..4], &header);

        let decompressed = Decompressor::new(extractor.as_ref(), header.len()).decompress(&compressed);
        assert_eq!(&decompressed[..4], &header);
        assert_eq!(decompressed[4], 0b0101_0101);
        assert_eq!(decompressed[5], 0b0000_0000);
    }
}
