pub mod campaigns;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod scheduler;
pub mod tasks;
pub mod workers;

pub use routes::create_router;
