mod app;
mod hook;

pub use app::{add_routes, AppState};
