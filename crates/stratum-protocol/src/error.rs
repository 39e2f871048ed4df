use std::error::Error;
use std::fmt;
use std::io;
use stratum_world::WorldError;

#[derive(Debug)]
pub enum NetError {
    /// Socket-level failure or premature EOF. Retryable only by an explicit
    /// reconnect.
    Connection(io::Error),
    /// Malformed frame or payload; the session is aborted, never retried.
    Protocol(String),
    /// The server refused us with an explicit error message.
    Rejected(String),
    /// The server asked for a password and none was configured.
    PasswordRequired,
    /// Grid-side failure while applying world state.
    World(WorldError),
    /// Another load (file or network) is already in flight.
    Busy,
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::Connection(err) => write!(f, "connection error: {}", err),
            NetError::Protocol(msg) => write!(f, "protocol violation: {}", msg),
            NetError::Rejected(msg) => write!(f, "server refused connection: {}", msg),
            NetError::PasswordRequired => write!(f, "server requires a password"),
            NetError::World(err) => write!(f, "world error: {}", err),
            NetError::Busy => write!(f, "a load is already in progress"),
        }
    }
}

impl Error for NetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NetError::Connection(err) => Some(err),
            NetError::World(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for NetError {
    fn from(err: io::Error) -> Self {
        NetError::Connection(err)
    }
}

impl From<WorldError> for NetError {
    fn from(err: WorldError) -> Self {
        NetError::World(err)
    }
}
