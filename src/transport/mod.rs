//! Transport module - the Unix domain socket the invoker connects to.

mod socket;

pub use socket::{SocketListener, SOCKET_MODE};
