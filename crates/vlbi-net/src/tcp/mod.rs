mod connector;
mod stream;

use mio::Token;

pub use connector::{ConnectionVariant, PollEvent, SendBehavior, TcpConnector};
pub use stream::{ConnState, TcpStream, TcpTelemetry};

/// Fixed token every [`TcpStream`] is (re)registered under once accepted or
/// connected; [`TcpConnector`] tracks the real per-connection token
/// separately and only ever re-registers interest, never the token itself.
pub(crate) const STREAM: Token = Token(usize::MAX);
