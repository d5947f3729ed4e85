//! HTTP surface: health probes and the WebSocket upgrade route

mod routes;

pub use routes::build_router;
