//! Authentication context extractor.
//!
//! The auth guard verifies the access token and stores an [`AuthCtx`] in the
//! request extensions; handlers take it through [`AuthCtxExtractor`].

mod core;
mod types;

pub use core::AuthCtxExtractor;
pub use types::AuthCtx;
