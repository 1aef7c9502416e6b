pub mod cookies;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod route_table;
mod routes;

pub use route_table::{RouteBuilder, RouteMeta, RouteTable};
pub use routes::routes;
