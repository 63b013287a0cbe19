//! SFTP-backed connection handles.

mod client;
mod fs;
mod handler;

pub use client::{ConnectSettings, SftpConnector};
pub use fs::SftpFs;
pub use handler::HostKeyPolicy;
