//! Authenticated transport for the Registry v2 protocol
//!
//! Registry API endpoints expect `Bearer` authentication. Tokens are
//! obtained by exchanging a Basic (or anonymous) credential with the auth
//! endpoint announced in the registry's opening ping, are scoped to one
//! resource and capability set, and expire quickly; registries reject
//! requests carrying a stale token with a 401. [`RegistryTransport`]
//! refreshes the token and reissues the request when that happens.

pub mod http;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use futures::Stream;
use futures::stream;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use url::form_urlencoded;

use crate::credentials::{BasicCredential, Bearer};
use crate::error::{DiagnosticError, RegistryError, Result};
use crate::logging::Logger;
use crate::reference::{ResourceName, scheme};
use self::http::{HttpResponse, HttpTransport};

/// User-agent presented on every request.
pub const USER_AGENT: &str = concat!("registry-transport/", env!("CARGO_PKG_VERSION"));

const CHALLENGE: &str = "Bearer ";
const REALM_PREFIX: &str = "realm=";
const SERVICE_PREFIX: &str = "service=";

/// Capability a transport is constructed for; fixes the token scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Pull,
    Push,
    Delete,
    Catalog,
}

impl Action {
    /// Capability list embedded in the authorization scope.
    pub fn capabilities(self) -> &'static str {
        match self {
            Action::Pull => "pull",
            // Delete rides the read/write ACL.
            Action::Push | Action::Delete => "push,pull",
            Action::Catalog => "catalog",
        }
    }
}

impl FromStr for Action {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pull" => Ok(Action::Pull),
            "push" => Ok(Action::Push),
            "delete" => Ok(Action::Delete),
            "catalog" => Ok(Action::Catalog),
            other => Err(RegistryError::State(format!(
                "invalid action supplied to registry transport: {}",
                other
            ))),
        }
    }
}

/// Optional request parameters for [`RegistryTransport::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method; defaults to GET, or PUT when a body is present.
    pub method: Option<Method>,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Content type sent with a body; defaults to `application/json`.
    /// Ignored when there is no body.
    pub content_type: Option<String>,
    /// Acceptable response media types, comma-joined into an `Accept` header.
    pub accepted_mimes: Option<Vec<String>>,
}

/// Realm and service discovered from the ping challenge. Immutable for the
/// life of the transport; the registry is never re-pinged.
#[derive(Debug, Clone)]
struct AuthContext {
    realm: String,
    service: String,
}

/// Parses a `www-authenticate` Bearer challenge.
///
/// The service attribute defaults to the registry host when absent; a
/// missing realm is a state error.
fn parse_challenge(challenge: &str, registry: &str) -> Result<AuthContext> {
    if !challenge.starts_with(CHALLENGE) {
        return Err(RegistryError::State(format!(
            "unexpected \"www-authenticate\" header: {}",
            challenge
        )));
    }

    let mut realm = None;
    let mut service = registry.to_string();
    for token in challenge[CHALLENGE.len()..].split(',') {
        let token = token.trim();
        if let Some(value) = token.strip_prefix(REALM_PREFIX) {
            realm = Some(value.trim_matches('"').to_string());
        } else if let Some(value) = token.strip_prefix(SERVICE_PREFIX) {
            service = value.trim_matches('"').to_string();
        }
    }

    let realm = realm.ok_or_else(|| {
        RegistryError::State(format!(
            "expected a \"{}\" in \"www-authenticate\" header: {}",
            REALM_PREFIX, challenge
        ))
    })?;
    Ok(AuthContext { realm, service })
}

/// Returns the RFC 5988 `rel="next"` target from a `link` header, if any.
pub fn parse_next_link_header(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(header::LINK)?.to_str().ok()?;
    for entry in link.split(',') {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        if !(target.starts_with('<') && target.ends_with('>')) {
            continue;
        }
        if parts.any(|attr| attr.trim() == r#"rel="next""#) {
            return Some(target[1..target.len() - 1].to_string());
        }
    }
    None
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| RegistryError::State(format!("invalid header value: {}", e)))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Transport handling automatic v2 reauthentication.
///
/// Construction is eager: [`RegistryTransport::connect`] pings the registry
/// to discover the token-exchange realm and performs the first exchange, so
/// a connected transport is always ready to issue authenticated requests.
/// Requests may be issued concurrently; the only shared mutable state is the
/// current Bearer token, which refreshes replace atomically.
pub struct RegistryTransport {
    name: Arc<dyn ResourceName>,
    basic: Arc<dyn BasicCredential>,
    transport: Arc<dyn HttpTransport>,
    action: Action,
    auth: AuthContext,
    bearer: Mutex<Bearer>,
    logger: Logger,
}

impl fmt::Debug for RegistryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryTransport")
            .field("name", &self.name.to_string())
            .field("action", &self.action)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl RegistryTransport {
    /// Connects to the registry named by `name` for the given `action`,
    /// performing the discovery ping and the initial token exchange.
    pub async fn connect(
        name: Arc<dyn ResourceName>,
        basic: Arc<dyn BasicCredential>,
        transport: Arc<dyn HttpTransport>,
        action: Action,
    ) -> Result<Self> {
        Self::connect_with_logger(name, basic, transport, action, Logger::default()).await
    }

    pub async fn connect_with_logger(
        name: Arc<dyn ResourceName>,
        basic: Arc<dyn BasicCredential>,
        transport: Arc<dyn HttpTransport>,
        action: Action,
        logger: Logger,
    ) -> Result<Self> {
        let auth = Self::ping(name.as_ref(), transport.as_ref(), &logger).await?;
        let connected = Self {
            name,
            basic,
            transport,
            action,
            auth,
            // Placeholder, replaced by the eager refresh below.
            bearer: Mutex::new(Bearer::new("")),
            logger,
        };
        connected.refresh().await?;
        Ok(connected)
    }

    /// Pings the registry to establish the realm and service for
    /// Basic-to-Bearer exchanges. Called once, during construction.
    async fn ping(
        name: &dyn ResourceName,
        transport: &dyn HttpTransport,
        logger: &Logger,
    ) -> Result<AuthContext> {
        let registry = name.registry();
        let url = format!("{}://{}/v2/", scheme(registry), registry);
        logger.verbose(&format!("Pinging registry at {}", url));

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        let response = transport.request(&url, Method::GET, None, headers).await?;

        if response.status != StatusCode::UNAUTHORIZED {
            return Err(RegistryError::State(format!(
                "unexpected status: {}",
                response.status.as_u16()
            )));
        }

        let challenge = response
            .headers
            .get(header::WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                RegistryError::State(
                    "missing \"www-authenticate\" header in ping response".to_string(),
                )
            })?;

        let auth = parse_challenge(challenge, registry)?;
        logger.detail(&format!(
            "Challenge parsed: realm={}, service={}",
            auth.realm, auth.service
        ));
        Ok(auth)
    }

    /// Exchanges the Basic credential for a fresh Bearer token and installs
    /// it as the current credential.
    ///
    /// Called eagerly at construction and again whenever a request comes
    /// back 401. The Basic credential is re-read on every call since the
    /// caller's credential may itself rotate.
    async fn refresh(&self) -> Result<()> {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("scope", &self.name.scope(self.action))
            .append_pair("service", &self.auth.service)
            .finish();
        let url = format!("{}?{}", self.auth.realm, query);
        self.logger
            .verbose(&format!("Exchanging credentials at {}", self.auth.realm));

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(header::AUTHORIZATION, header_value(&self.basic.authorization())?);
        let response = self.transport.request(&url, Method::GET, None, headers).await?;

        if response.status != StatusCode::OK {
            return Err(RegistryError::State(format!(
                "bad status during token exchange: {}\n{}",
                response.status.as_u16(),
                response.text()
            )));
        }

        let token = serde_json::from_slice::<TokenResponse>(&response.body)
            .ok()
            .and_then(|wrapper| wrapper.token)
            .ok_or_else(|| {
                RegistryError::State(format!("malformed JSON response: {}", response.text()))
            })?;

        *self.lock_bearer() = Bearer::new(token);
        self.logger.detail("Bearer token refreshed");
        Ok(())
    }

    /// Issues one authenticated request.
    ///
    /// If the first attempt comes back 401 Unauthorized, the Bearer token is
    /// refreshed and the request reissued exactly once; there is never a
    /// third attempt. A final status outside `accepted_codes` becomes a
    /// [`DiagnosticError`] decoded from the response body.
    pub async fn request(
        &self,
        url: &str,
        accepted_codes: &[StatusCode],
        options: RequestOptions,
    ) -> Result<HttpResponse> {
        let method = match &options.method {
            Some(method) => method.clone(),
            None if options.body.is_some() => Method::PUT,
            None => Method::GET,
        };

        let mut response = self.attempt(url, &method, &options).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            self.logger
                .verbose("401 from registry, refreshing Bearer token and retrying once");
            self.refresh().await?;
            response = self.attempt(url, &method, &options).await?;
        }

        if !accepted_codes.contains(&response.status) {
            return Err(DiagnosticError::from_response(response.status, &response.body).into());
        }
        Ok(response)
    }

    /// One attempt of [`RegistryTransport::request`]. Headers are rebuilt on
    /// every attempt so a refresh between attempts is picked up.
    async fn attempt(
        &self,
        url: &str,
        method: &Method,
        options: &RequestOptions,
    ) -> Result<HttpResponse> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header_value(&self.lock_bearer().authorization())?,
        );
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));

        if options.body.is_some() {
            let content_type = options.content_type.as_deref().unwrap_or("application/json");
            headers.insert(header::CONTENT_TYPE, header_value(content_type)?);
        }
        if let Some(mimes) = &options.accepted_mimes {
            headers.insert(header::ACCEPT, header_value(&mimes.join(","))?);
        }
        // POST and PUT need an explicit length when there is no body.
        if (*method == Method::POST || *method == Method::PUT) && options.body.is_none() {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        }

        self.transport
            .request(url, method.clone(), options.body.clone(), headers)
            .await
    }

    /// Follows `link: <...>; rel="next"` headers, yielding one response per
    /// page.
    ///
    /// The stream is lazy and finite: each page costs a single authenticated
    /// round trip when polled, and the stream ends when no next link is
    /// present. It carries its own next-URL state and is not restartable;
    /// re-iterating requires a new call with the original URL.
    pub fn paginated_request<'a>(
        &'a self,
        url: &str,
        accepted_codes: &'a [StatusCode],
        options: RequestOptions,
    ) -> impl Stream<Item = Result<HttpResponse>> + 'a {
        stream::try_unfold(Some(url.to_string()), move |next_page| {
            let options = options.clone();
            async move {
                let Some(url) = next_page else {
                    return Ok(None);
                };
                let response = self.request(&url, accepted_codes, options).await?;
                let next_page = parse_next_link_header(&response.headers);
                Ok(Some((response, next_page)))
            }
        })
    }

    /// The resource this transport is bound to.
    pub fn resource(&self) -> &dyn ResourceName {
        self.name.as_ref()
    }

    fn lock_bearer(&self) -> std::sync::MutexGuard<'_, Bearer> {
        // Held only across slot reads and writes, never across a network call.
        self.bearer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_challenge_extracts_realm_and_service() {
        let auth = parse_challenge(
            r#"Bearer realm="https://auth.example.com/token",service="registry.example.com""#,
            "registry.example.com",
        )
        .unwrap();
        assert_eq!(auth.realm, "https://auth.example.com/token");
        assert_eq!(auth.service, "registry.example.com");
    }

    #[test]
    fn test_parse_challenge_attribute_order_and_whitespace() {
        let auth = parse_challenge(
            r#"Bearer service="svc" , realm="https://auth/token" , scope="repository:foo:pull""#,
            "registry.example.com",
        )
        .unwrap();
        assert_eq!(auth.realm, "https://auth/token");
        assert_eq!(auth.service, "svc");
    }

    #[test]
    fn test_parse_challenge_defaults_service_to_registry() {
        let auth = parse_challenge(
            r#"Bearer realm="https://auth/token""#,
            "registry.example.com",
        )
        .unwrap();
        assert_eq!(auth.service, "registry.example.com");
    }

    #[test]
    fn test_parse_challenge_requires_realm() {
        let err = parse_challenge(r#"Bearer service="svc""#, "registry.example.com").unwrap_err();
        assert!(matches!(err, RegistryError::State(_)));
    }

    #[test]
    fn test_parse_challenge_requires_bearer_prefix() {
        let err = parse_challenge(r#"Basic realm="https://auth""#, "registry.example.com")
            .unwrap_err();
        assert!(matches!(err, RegistryError::State(_)));
    }

    #[test]
    fn test_parse_next_link_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::LINK,
            HeaderValue::from_static(r#"<https://x/y?page=2>; rel="next""#),
        );
        assert_eq!(
            parse_next_link_header(&headers),
            Some("https://x/y?page=2".to_string())
        );
    }

    #[test]
    fn test_parse_next_link_header_among_entries() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::LINK,
            HeaderValue::from_static(
                r#"<https://x/y?page=1>; rel="prev", <https://x/y?page=3>; rel="next""#,
            ),
        );
        assert_eq!(
            parse_next_link_header(&headers),
            Some("https://x/y?page=3".to_string())
        );
    }

    #[test]
    fn test_parse_next_link_header_absent() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_next_link_header(&headers), None);

        headers.insert(
            header::LINK,
            HeaderValue::from_static(r#"<https://x/y?page=1>; rel="prev""#),
        );
        assert_eq!(parse_next_link_header(&headers), None);
    }

    #[test]
    fn test_action_capabilities() {
        assert_eq!(Action::Pull.capabilities(), "pull");
        assert_eq!(Action::Push.capabilities(), "push,pull");
        assert_eq!(Action::Delete.capabilities(), "push,pull");
        assert_eq!(Action::Catalog.capabilities(), "catalog");
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("pull".parse::<Action>().unwrap(), Action::Pull);
        assert_eq!("push".parse::<Action>().unwrap(), Action::Push);
        assert_eq!("delete".parse::<Action>().unwrap(), Action::Delete);
        assert_eq!("catalog".parse::<Action>().unwrap(), Action::Catalog);
        assert!("mirror".parse::<Action>().is_err());
    }
}
