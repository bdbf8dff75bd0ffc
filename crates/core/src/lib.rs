pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, DocumentKind, LoadOptions};
pub use domain::entry::{DocumentEntry, EntryKind, SlackTimestamp, TimestampError};
pub use errors::{ApplicationError, InterfaceError};
