pub mod context_extractor;
pub mod handlers;
pub mod routes;
pub mod views;

pub use routes::create_router;
