pub mod failures;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod tickets;
pub mod ws;

pub use routes::create_router;
pub use ws::{handle_command, ClientCommand, SessionMessage};
