//! Field rules for account payloads, plugged into `validator` derives.

pub mod rules;

pub use validator::Validate;
