pub mod constraints;
mod error;
pub mod protocol;
pub mod tcp;
pub mod udp;

pub use constraints::{CompressionRatio, ConstraintError, ConstraintSet, FrameHint, NetworkParams, constrain};
pub use error::NetError;
pub use protocol::{Connector, NetProtocol, NotImplementedConnector};
