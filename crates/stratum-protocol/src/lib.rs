//! Live-server synchronization: wire framing, the message codec, the login
//! state machine, and the tokio TCP client that drives them.

pub mod client;
pub mod error;
pub mod frame;
pub mod message;
pub mod session;

pub use client::{SyncClient, SyncOutcome, SyncTask};
pub use error::NetError;
pub use frame::{FramePump, RawFrame};
pub use message::{Message, Outgoing};
pub use session::{Disconnection, LoginLevel, SessionEvent, SyncOptions, SyncSession};
