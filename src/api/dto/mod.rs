pub mod login;
pub mod user;

pub use login::{LoginRequest, LoginResponse};
pub use user::{MeResponse, SuccessResponse, UserView};
