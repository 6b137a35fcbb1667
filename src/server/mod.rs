pub mod completion_route;
pub mod server;
