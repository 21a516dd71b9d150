pub mod connection;
mod request;

pub use connection::ConnectionPhase;
pub use request::{RequestIds, TrackedRequest};
