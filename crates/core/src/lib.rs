pub mod engine;
pub mod error;
pub mod mount;
pub mod reactor;
pub mod registration;
pub mod server;
pub mod session;
pub mod signal;
pub mod transport;

pub use error::{Result, ServerError};
pub use mount::Mountpoint;
pub use server::{Server, ServerConfig};
pub use session::{SessionRegistry, SessionState};
