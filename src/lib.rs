//! Social API Mock Server
//!
//! A configuration-driven mock API server: HTTP routes, request validation
//! rules, and response payloads are declared entirely in YAML, so arbitrary
//! third-party APIs can be simulated by editing data files and restarting
//! the process.
//!
//! # Features
//!
//! - **Route templates**: match paths with `{name}` placeholders, first
//!   declaration wins
//! - **Request validation**: a restricted JSON-Schema subset with
//!   `required`, `enum`, type shapes, and `allOf`/`if`/`then` conditional
//!   requirements
//! - **Dynamic responses**: substitute timestamps, random codes, hashes,
//!   mock tokens, and echoed request fields into templated payload trees
//! - **Webhooks**: fire-and-forget outbound calls selected by a
//!   discriminator field in the request
//! - **Redirects**: OAuth-style redirect responses with templated query
//!   parameters
//!
//! # Example Configuration
//!
//! ```yaml
//! routes:
//!   - path: /token
//!     methods:
//!       - method: POST
//!         content_type: application/x-www-form-urlencoded
//!         request_schema:
//!           type: object
//!           required: [grant_type, client_id, client_secret]
//!           allOf:
//!             - if:
//!                 properties:
//!                   grant_type:
//!                     const: authorization_code
//!               then:
//!                 required: [code]
//!         response:
//!           access_token: "{$access_token}"
//!           refresh_token: "{$refresh_token}"
//!           token_type: Bearer
//! ```

pub mod config;
pub mod error;
pub mod matcher;
pub mod router;
pub mod schema;
pub mod server;
pub mod template;
pub mod token;
pub mod webhook;

pub use config::RouteSet;
pub use error::RequestError;
pub use router::{MockRequest, Reply, RequestRouter};
pub use server::build_app;
