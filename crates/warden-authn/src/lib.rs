//! Warden token authentication
//!
//! This crate answers "who presented this credential?" for a bearer token.
//! Independent strategies implement `TokenAuthenticator` and are composed
//! into a priority-ordered aggregate that tries each until one recognizes
//! the token:
//! - `bootstrap`: `id.secret` tokens resolved against bootstrap secrets
//! - `tokenfile`: opaque tokens from a static file
//! - `jwt`: OIDC and service-account JWTs (feature `jwt`)
//! - `webhook`: delegation to a remote token-review service
//!
//! # Features
//!
//! - `jwt`: OIDC and service-account JWT validation
//! - `webhook`: HTTP transport for the token-review webhook
//! - `full` (default): all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_authn::{AuthenticationConfig, AuthenticatorResources};
//!
//! let config = AuthenticationConfig {
//!     enable_bootstrap_token_auth: true,
//!     ..Default::default()
//! };
//! config.validate()?;
//! let authenticator = config.build(AuthenticatorResources {
//!     secret_lister: Some(secrets),
//!     ..Default::default()
//! })?;
//! // let user = authenticator.authenticate_token(token).await?;
//! ```

pub mod authenticator;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod error;
pub mod group_adder;
pub mod tokenfile;
pub mod union;
pub mod webhook;

#[cfg(feature = "jwt")]
pub mod jwt;

pub use authenticator::TokenAuthenticator;
pub use bootstrap::{BootstrapTokenAuthenticator, MemorySecretStore, Secret, SecretLister};
pub use cache::CachedTokenAuthenticator;
pub use config::{AuthenticationConfig, AuthenticatorResources};
pub use error::AuthnError;
pub use group_adder::GroupAdder;
pub use tokenfile::TokenFileAuthenticator;
pub use union::TokenAuthenticators;
pub use webhook::{
    ReviewUser, TokenReviewClient, TokenReviewSpec, TokenReviewStatus, WebhookTokenAuthenticator,
};

#[cfg(feature = "jwt")]
pub use jwt::{OidcAuthenticator, ServiceAccountAuthenticator};

#[cfg(feature = "webhook")]
pub use webhook::{HttpTokenReviewClient, WebhookConnectionConfig};
