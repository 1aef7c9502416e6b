pub mod auth;
pub mod cache;
pub mod csrf;
pub mod directory;
pub mod random;
