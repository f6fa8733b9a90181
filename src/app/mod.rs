pub mod api;
pub mod refresh;
pub mod scheduler;
pub mod store;
