//! Tower layers for the gateway's transport stack
//!
//! - [`DefaultHeadersLayer`] - Adds `User-Agent` and `Accept` headers
//! - [`CredentialsLayer`] - Replays cookies set by the API on later requests

mod credentials;
mod default_headers;

pub use credentials::{CookieJar, CredentialsLayer, CredentialsService};
pub use default_headers::{DefaultHeadersLayer, DefaultHeadersService};
