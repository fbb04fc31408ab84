use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("unrecognized dataframe format token {0:?}")]
    UnknownFormat(String),
    #[error("channel extractor spec {0:?} is malformed")]
    BadExtractorSpec(String),
    #[error("word size {bits_per_input_word} bits can't hold {channels} channels of {bits_per_channel} bits each")]
    ChannelOverflow { bits_per_input_word: u32, channels: usize, bits_per_channel: u32 },
}
