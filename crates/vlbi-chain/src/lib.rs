pub mod bus;
mod chain;
mod error;
pub mod sigusr1;
mod step;

pub use chain::{Chain, StepSync};
pub use error::ChainError;
pub use step::{Step, StepFn, StepId, user_data};

pub use core_affinity;
pub use tracing;
