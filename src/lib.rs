//! Registry Transport Library
//!
//! This crate provides authenticated HTTP access to Docker Registry API v2
//! endpoints: realm discovery via the opening ping, Bearer token exchange,
//! transparent reauthentication when a token expires, and pagination over
//! `link` response headers.

pub mod credentials;
pub mod error;
pub mod logging;
pub mod mime;
pub mod reference;
pub mod transport;

pub use credentials::{Anonymous, BasicCredential, Bearer, UserPassword};
pub use error::{Diagnostic, DiagnosticError, RegistryError, Result};
pub use logging::Logger;
pub use reference::{Registry, Repository, ResourceName, scheme};
pub use transport::http::{HttpResponse, HttpTransport, ReqwestTransport};
pub use transport::{
    Action, RegistryTransport, RequestOptions, USER_AGENT, parse_next_link_header,
};
