//! Shared vocabulary for the Warden authentication/authorization engine.
//!
//! This crate holds the types both halves of the engine speak:
//! - `UserInfo`: who a request acts as
//! - `Attributes`: what a request is trying to do
//! - `StoreError`: how storage collaborators report lookups
//! - `ExpiringCache`: concurrent TTL map used by webhook strategies
//! - `Backoff`: retry schedule for remote calls
//! - `AggregateError`: many errors reported as one

pub mod attributes;
pub mod backoff;
pub mod cache;
pub mod error;
pub mod store;
pub mod user;

pub use attributes::Attributes;
pub use backoff::{Backoff, retry};
pub use cache::ExpiringCache;
pub use error::AggregateError;
pub use store::StoreError;
pub use user::UserInfo;
