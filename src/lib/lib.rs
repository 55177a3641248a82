#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Compose one HTML email and deliver it through an SMTP relay

pub mod domain;
pub mod infrastructure;
