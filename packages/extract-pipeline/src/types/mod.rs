//! Data types for extraction requests, traces and documents.

pub mod config;
pub mod document;
pub mod request;
pub mod response;
pub mod trace;
