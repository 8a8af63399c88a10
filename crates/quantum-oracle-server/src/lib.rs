//! Quantum Oracle server: LfD relay, coin flip and Magic 8 Ball over HTTP,
//! plus the command-line front-end.

pub mod config;
pub mod oracle;
pub mod relay;
pub mod repl;
pub mod transport;
pub mod types;

pub use config::{resolve_addr, OracleConfig};
pub use oracle::Oracle;
pub use relay::Relay;
#[cfg(feature = "http")]
pub use transport::HttpTransport;
