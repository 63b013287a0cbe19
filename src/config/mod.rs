pub mod paths;
pub mod settings;

pub use settings::{AppConfig, HostKeyCheck, SessionConfig, SshConfig, TransferConfig};
