//! Command handlers
//!
//! The entry points the recording dialog and the upload page call into.

pub mod recording;
