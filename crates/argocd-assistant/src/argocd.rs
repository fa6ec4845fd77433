//! Read-only access to the Argo CD management API
//!
//! The [`ResourceClient`] trait is the seam the inspection tools call through; [`ArgoCdClient`]
//! is the HTTP implementation used by the server.
pub mod client;
pub mod types;

pub use client::{ArgoCdClient, ResourceClient};
pub use types::{ApplicationRef, ResourceEventsQuery, ResourceRef};
