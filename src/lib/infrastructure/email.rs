//! Email delivery over SMTP

pub mod smtp;
