pub mod dto;
pub mod handlers;
mod middleware;
pub mod response;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
