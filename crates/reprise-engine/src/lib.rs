pub mod abort;
pub mod analysis;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod formatter;
pub mod loader;
pub mod router;
pub mod session;
pub mod supervisor;
pub mod timing;

pub use abort::AbortHandle;
pub use backend::{Backends, Capability, DesktopCapability, NavigationResult, WebCapability};
pub use error::ReplayError;
pub use reprise_common as common;
pub use session::{ReplaySession, SessionState, SteppingSession};
