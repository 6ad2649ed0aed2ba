//! Client-side data synchronization for the CourseHub backend.
//!
//! A shared [`cache::CacheStore`] holds every server read. The
//! [`query::QueryClient`] decides when reads go to the network, mutations
//! write optimistically and roll back on failure, and [`infinite`] grows paged
//! lists one page at a time. [`features`] wires these to the backend's
//! resources through [`api::ApiClient`].

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod features;
pub mod infinite;
pub mod logging;
pub mod mutation;
pub mod notify;
pub mod query;
pub mod validate;

pub use error::SyncError;
