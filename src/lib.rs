pub mod auth;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod tools;
pub mod transport;

// Direct exports of main types
pub use auth::{BearerClaims, BearerGate, GateRejection};
pub use config::ServerConfig;
pub use dispatch::{Dispatcher, Outcome, OutcomeBody};
pub use registry::{MethodRegistry, ServerInfo};
pub use session::{Session, SessionId, SessionStore};
pub use tools::ToolTable;
pub use transport::{HEADER_SESSION_ID, McpHttpService};
