//! HTTP API module: one route table per listener role.

pub mod handlers;
pub mod listener;
pub mod routes;

pub use handlers::AppState;
pub use listener::{ListenerRole, ListenerSpec, VERSION};
pub use routes::create_router;
