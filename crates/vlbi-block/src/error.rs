use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("block_size and nblock_per_pool must both be > 0")]
    InvalidShape,
    #[error("pool of {nblock} x {block_size} byte blocks (+ 16 byte slack) overflows a 32-bit arena")]
    Overflow { block_size: usize, nblock: usize },
}
