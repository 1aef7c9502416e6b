//! Resource/action permission model.
//!
//! Pure functions only: no IO, no clock, no panics. The same code answers the
//! server's route guard and the client's rendering gate, so both sides agree
//! on every input by construction.

mod action;
mod model;
mod requirement;
mod resource;

pub use action::{Action, UnknownAction};
pub use model::{Permission, PermissionCheck, Role, all, any, can_perform, has_role};
pub use requirement::{Combinator, Requirement};
pub use resource::{InvalidResource, Resource, resources};
