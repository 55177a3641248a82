//! Domain logic, independent of the SMTP library and the command line

pub mod mail;
