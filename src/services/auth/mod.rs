pub mod login_throttle;
pub mod password;
pub mod refresh_store;
pub mod session_service;
pub mod token_codec;

pub use login_throttle::LoginThrottle;
pub use refresh_store::{ConsumeOutcome, RefreshTokenStore};
pub use session_service::{Credentials, LoginOutcome, SessionService, TokenPair};
pub use token_codec::{Principal, TokenCodec, TokenError, TokenSettings};
