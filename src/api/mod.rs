mod routes;
mod websocket;

pub use routes::routes;
