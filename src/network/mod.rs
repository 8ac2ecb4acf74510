pub mod api;
pub mod client;
pub mod transport;

pub use api::{ApiClient, Auth, ChatBackend};
pub use client::{ChatHandle, ChatSession, SessionOptions};
pub use transport::{Channel, ClientFrame, Connector, ServerFrame, WsConnector};
