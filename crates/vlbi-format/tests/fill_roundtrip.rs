use vlbi_block::BlockPool;
use vlbi_format::{BitPackerFactory, Compressor, Decompressor, ExtractorConfig, ExtractorFactory, Framer, FrameFormat};

const FILL: u64 = 0x1122_3344_1122_3344;

fn block_with(bytes: &[u8]) -> vlbi_block::Block {
    let pool = BlockPool::new(bytes.len(), 1).unwrap();
    let mut b = pool.get();
    b.as_mut_slice().copy_from_slice(bytes);
    b
}

/// Framer(Mark5B) -> compressor -> decompressor, with an identity
/// extractor (every bit of every 8-bit word kept), should hand back a
/// payload whose every 8-byte word still equals the fill pattern it was
/// built from.
#[test]
fn fill_pattern_survives_framer_and_compressor_round_trip() {
    let format = FrameFormat::Mark5B;
    let header_size = format.header_size(0);
    let frame_size = format.frame_size(0);
    let payload_size = frame_size - header_size;
    assert_eq!(payload_size % 8, 0);

    let mut frame = vec![0u8; frame_size];
    frame[..4].copy_from_slice(format.sync_word());
    for chunk in frame[header_size..].chunks_exact_mut(8) {
        chunk.copy_from_slice(&FILL.to_le_bytes());
    }

    let mut framer = Framer::new(format, 0);
    let located = framer.feed(block_with(&frame));
    assert_eq!(located.len(), 1);
    let located_frame = &located[0].block;

    let extractor_config = ExtractorConfig::parse("8:8:0").unwrap();
    let extractor = BitPackerFactory.build(extractor_config).unwrap();

    let compressed = Compressor::new(extractor.as_ref(), header_size).compress(located_frame.as_slice());
    let decompressed = Decompressor::new(extractor.as_ref(), header_size).decompress(&compressed);

    assert_eq!(&decompressed[..4], format.sync_word());
    for word in decompressed[header_size..].chunks_exact(8) {
        assert_eq!(u64::from_le_bytes(word.try_into().unwrap()), FILL);
    }
}
