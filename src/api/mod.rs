pub mod health;
pub mod middleware;
pub mod queue;
pub mod recommendations;

pub use health::health_routes;
pub use queue::queue_routes;
pub use recommendations::{recommendation_routes, AppState};
