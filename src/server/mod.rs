//! Server module: host state, exposures and the builder

pub mod builder;
pub mod exposure;
pub mod host;

pub use builder::ServerBuilder;
pub use exposure::WebSocketExposure;
pub use exposure::websocket::hub::{Delivery, Hub, HubSnapshot};
pub use exposure::websocket::session::{Session, SessionId, SessionState};
pub use host::ServerHost;
