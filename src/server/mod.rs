mod http_layers;
mod routes;
mod server;
pub(crate) mod session;
pub mod state;

pub use server::{build_router, run_server};
pub use state::ServerState;
