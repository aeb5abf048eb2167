pub mod app;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;
