//! Ready-made queries and mutations for each backend resource.
//!
//! Every function here only builds a [`Query`](crate::query::Query) or a
//! [`Mutation`](crate::mutation::Mutation); nothing runs until it is loaded
//! or passed to [`QueryClient::mutate`](crate::query::QueryClient::mutate).

pub mod auth;
pub mod cart;
pub mod home;
pub mod keys;
pub mod posts;
pub mod products;
pub mod profile;
pub mod shop;
pub mod shop_courses;
pub mod shop_products;

pub use auth::Session;
