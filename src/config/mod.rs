pub mod schema;

pub use schema::{is_truthy, Config, ServiceConfig, SessionsConfig};
