//! HTTP collaborators: the CourseHub backend and the public posts demo API.
//!
//! Every function returns `Result<_, SyncError>` so it can be used directly as
//! a query fetcher or mutation body.

mod client;
mod envelope;

pub mod auth;
pub mod cart;
pub mod home;
pub mod posts;
pub mod products;
pub mod profile;
pub mod shop;
pub mod shop_courses;
pub mod shop_products;

pub use client::{ApiClient, DEFAULT_TOTAL_COUNT};
pub use envelope::{required, ApiEnvelope, Decoded};
