mod connection;
mod protocol;
mod routes;
mod server;
mod state;

pub use protocol::{CreateGraphResponse, RunGraphRequest, RunGraphResponse, RunStateResponse};
pub use server::{router, GatewayServer};
pub use state::{AppState, RunStore};
