pub mod control;
mod error;
mod mode;
mod runtime;
mod submode;

pub use control::{CommandHandler, Response, ResponseCode};
pub use error::{CommandError, ModeError};
pub use mode::{
    diskunavail, fromdisk, fromfile, fromfill, fromio, fromnet, fromvbs, isfork, streamstorbusy, todisk, tofile, toio, tonet, toqueue,
    tovbs, TransferMode,
};
pub use runtime::{Runtime, StepFault};
pub use submode::TransferSubmode;
