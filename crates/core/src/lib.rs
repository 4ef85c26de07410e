//! Core business logic for univote.

pub mod services;

pub use services::*;
