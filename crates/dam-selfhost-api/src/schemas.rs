//! API schemas for the DAM self-hosted service
//!
//! This module contains the request and response bodies exchanged over HTTP.
//!
//! # Organization
//!
//! - [`request`] - Schemas for data sent to the service
//! - [`response`] - Schemas for data returned by the service
//!
//! Field names follow the camelCase wire format used by existing callers on the
//! request side, and snake_case on the response side.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;
