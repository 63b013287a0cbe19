//! SFTP relay core library
//!
//! Owns authenticated SFTP sessions on behalf of remote callers and runs
//! file operations and streaming ZIP downloads over them. The binary wires
//! these pieces together; a presentation layer drives them through
//! [`session::SessionRegistry`] and [`transfer::TransferEngine`].

pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod security_log;
pub mod session;
pub mod sftp;
pub mod transfer;
pub mod validation;
