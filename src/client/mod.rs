//! Browser-side session handling, usable from any tokio runtime.

mod error;
mod idle;
mod refresh;
mod reqwest_transport;
mod session;
mod transport;

pub use error::ClientError;
pub use idle::{IdleEvent, IdleSettings, IdleTracker};
pub use refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome};
pub use reqwest_transport::ReqwestTransport;
pub use session::{ClientConfig, ClientSessionManager, LoginOutcome, SessionState};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, TransportError};
