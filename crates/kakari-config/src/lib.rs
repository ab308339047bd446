//! Configuration, filesystem paths, and logging setup shared by the Kakari crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, LoginEncoding, DEFAULT_API_URL, DEFAULT_LANDING_PATH, DEFAULT_LOGIN_PATH, DEFAULT_LOG_LEVEL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
