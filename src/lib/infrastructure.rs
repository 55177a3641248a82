//! Adapters for the outside world: the command line, the environment and SMTP

pub mod cli;
pub mod credentials;
pub mod email;
