use crate::error::FormatError;

/// Parsed channel extractor specification: from each `bits_per_input_word`
/// bit input word, pull `bits_per_channel` bits starting at each entry in
/// `channels` (a bit offset into the word) and pack them contiguously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub channels: Vec<u32>,
    pub bits_per_channel: u32,
    pub bits_per_input_word: u32,
}

impl ExtractorConfig {
    /// Parses `"<bits_per_input_word>:<bits_per_channel>:<ch0>,<ch1>,..."`,
    /// e.g. `"32:2:0,4,8,12"`.
    pub fn parse(spec: &str) -> Result<Self, FormatError> {
        let fields: Vec<&str> = spec.split(':').collect();
        let [word, per_chan, chans] = fields[..] else {
            return Err(FormatError::BadExtractorSpec(spec.to_string()));
        };
        let bits_per_input_word: u32 =
            word.parse().map_err(|_| FormatError::BadExtractorSpec(spec.to_string()))?;
        let bits_per_channel: u32 =
            per_chan.parse().map_err(|_| FormatError::BadExtractorSpec(spec.to_string()))?;
        let channels = chans
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<u32>, _>>()
            .map_err(|_| FormatError::BadExtractorSpec(spec.to_string()))?;
        if channels.is_empty() || bits_per_channel == 0 || bits_per_input_word == 0 {
            return Err(FormatError::BadExtractorSpec(spec.to_string()));
        }
        let config = ExtractorConfig { channels, bits_per_channel, bits_per_input_word };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), FormatError> {
        for &ch in &self.channels {
            if ch * self.bits_per_channel + self.bits_per_channel > self.bits_per_input_word {
                return Err(FormatError::ChannelOverflow {
                    bits_per_input_word: self.bits_per_input_word,
                    channels: self.channels.len(),
                    bits_per_channel: self.bits_per_channel,
                });
            }
        }
        Ok(())
    }

    pub fn packed_width(&self) -> u32 {
        self.channels.len() as u32 * self.bits_per_channel
    }
}

/// Per-word compiled extractor. The shipped implementation is a plain
/// Rust bit-packer; the contract only requires a per-word function, so a
/// future implementation could swap in a code-generated one without
/// touching `Compressor`/`Decompressor`.
pub trait Extractor: Send + Sync {
    /// Drops bits from `word`, keeping only the configured channels,
    /// packed contiguously starting at bit 0 of the result.
    fn extract(&self, word: u64) -> u64;

    /// Inverse of `extract`: expands a packed word back to
    /// `bits_per_input_word` bits, zero-filling every bit not covered by
    /// a channel.
    fn restore(&self, packed: u64) -> u64;

    fn config(&self) -> &ExtractorConfig;
}

pub trait ExtractorFactory {
    fn build(&self, config: ExtractorConfig) -> Result<Box<dyn Extractor>, FormatError>;
}

struct BitPacker {
    config: ExtractorConfig,
}

impl Extractor for BitPacker {
    fn extract(&self, word: u64) -> u64 {
        let mut out = 0u64;
        for (i, &ch) in self.config.channels.iter().enumerate() {
            let mask = (1u64 << self.config.bits_per_channel) - 1;
            let bits = (word >> (ch * self.config.bits_per_channel)) & mask;
            out |= bits << (i as u32 * self.config.bits_per_channel);
        }
        out
    }

    fn restore(&self, packed: u64) -> u64 {
        let mut out = 0u64;
        for (i, &ch) in self.config.channels.iter().enumerate() {
            let mask = (1u64 << self.config.bits_per_channel) - 1;
            let bits = (packed >> (i as u32 * self.config.bits_per_channel)) & mask;
            out |= bits << (ch * self.config.bits_per_channel);
        }
        out
    }

    fn config(&self) -> &ExtractorConfig {
        &self.config
    }
}

pub struct BitPackerFactory;

impl ExtractorFactory for BitPackerFactory {
    fn build(&self, config: ExtractorConfig) -> Result<Box<dyn Extractor>, FormatError> {
        config.validate()?;
        Ok(Box::new(BitPacker { config }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_spec() {
        let cfg = ExtractorConfig::parse("32:2:0,4,8,12").unwrap();
        assert_eq!(cfg.bits_per_input_word, 32);
        assert_eq!(cfg.bits_per_channel, 2);
        assert_eq!(cfg.channels, vec![0, 4, 8, 12]);
        assert_eq!(cfg.packed_width(), 8);
    }

    #[test]
    fn rejects_channel_past_word_width() {
        let err = ExtractorConfig::parse("8:2:0,4").unwrap_err();
        assert!(matches!(err, FormatError::ChannelOverflow { .. }));
    }

    #[test]
    fn extract_then_restore_zero_fills_dropped_bits() {
        let cfg = ExtractorConfig::parse("8:1:0,2,4,6").unwrap();
        let packer = BitPackerFactory.build(cfg).unwrap();
        let word = 0b1111_1111u64; // all bits set
        let packed = packer.extract(word);
        assert_eq!(packed, 0b1111); // 4 channels, one bit each
        let restored = packer.restore(packed);
        assert_eq!(restored, 0b0101_0101); // only bits 0,2,4,6 survive
    }
}
