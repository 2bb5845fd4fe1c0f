use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::shadow::{is_sentinel_hash, CredentialLookup, HashScheme};
use crate::config::AuthEndpoint;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("access denied")]
    Denied,
    #[error("ticket service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("credential lookup failed: {0}")]
    LookupFailure(String),
}

/// One login attempt's username and password. Lives only as long as the `verify` call.
#[derive(Clone, Copy)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub trait Authenticator {
    fn verify(&self, username: &str, password: &str) -> bool;
}

// ── Ticket tier ───────────────────────────────────────────────────────────────

pub trait TicketIssuer {
    /// `Ok` only when the endpoint issued a ticket. Any other outcome is inconclusive.
    fn request_ticket(&self, credentials: Credentials<'_>) -> Result<(), AuthError>;
}

/// Appends `@realm` to usernames that carry no realm of their own.
pub fn qualify_username<'a>(username: &'a str, realm: &str) -> Cow<'a, str> {
    if username.contains('@') {
        Cow::Borrowed(username)
    } else {
        Cow::Owned(format!("{username}@{realm}"))
    }
}

#[derive(Deserialize)]
struct TicketEnvelope {
    #[serde(default)]
    data: Option<TicketData>,
}

#[derive(Deserialize)]
struct TicketData {
    #[serde(default)]
    ticket: Option<String>,
}

/// Extracts the ticket from an access/ticket response.
pub fn ticket_from_response(status: StatusCode, body: &str) -> Result<String, AuthError> {
    if status != StatusCode::OK {
        return Err(AuthError::ServiceUnavailable(format!("status {status}")));
    }
    let envelope: TicketEnvelope = serde_json::from_str(body)
        .map_err(|e| AuthError::ServiceUnavailable(format!("malformed body: {e}")))?;
    envelope
        .data
        .and_then(|d| d.ticket)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::ServiceUnavailable("response carried no ticket".into()))
}

/// Client for the local management API's ticket endpoint.
pub struct PveTicketClient {
    client: Client,
    url: String,
    realm: String,
}

impl PveTicketClient {
    pub fn new(endpoint: &AuthEndpoint) -> Result<Self, AuthError> {
        // Loopback only, and the proxy certificate is self-signed. Environment proxies
        // are ignored so credentials never leave the host.
        let client = Client::builder()
            .no_proxy()
            .timeout(endpoint.timeout())
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: endpoint.url(),
            realm: endpoint.default_realm.clone(),
        })
    }
}

impl TicketIssuer for PveTicketClient {
    fn request_ticket(&self, credentials: Credentials<'_>) -> Result<(), AuthError> {
        let username = qualify_username(credentials.username, &self.realm);
        let response = self
            .client
            .post(&self.url)
            .form(&[
                ("username", username.as_ref()),
                ("password", credentials.password),
            ])
            .send()
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;
        ticket_from_response(status, &body).map(|_| ())
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

/// Ticket endpoint first, local shadow store second. The first tier can only grant; a
/// failure there is never treated as a denial.
pub struct AuthenticationService {
    tickets: Option<Box<dyn TicketIssuer>>,
    lookup: Box<dyn CredentialLookup>,
    hasher: Box<dyn HashScheme>,
}

impl AuthenticationService {
    pub fn new(
        tickets: Option<Box<dyn TicketIssuer>>,
        lookup: Box<dyn CredentialLookup>,
        hasher: Box<dyn HashScheme>,
    ) -> Self {
        Self {
            tickets,
            lookup,
            hasher,
        }
    }

    fn ticket_tier(&self, credentials: Credentials<'_>) -> Result<(), AuthError> {
        match &self.tickets {
            Some(issuer) => issuer.request_ticket(credentials),
            None => Err(AuthError::ServiceUnavailable("no ticket client".into())),
        }
    }

    fn local_tier(&self, credentials: Credentials<'_>) -> Result<(), AuthError> {
        let stored = self.lookup.password_hash(credentials.username)?;
        if is_sentinel_hash(&stored) {
            return Err(AuthError::Denied);
        }
        let computed = self.hasher.hash(credentials.password, &stored)?;
        if computed == stored {
            Ok(())
        } else {
            Err(AuthError::Denied)
        }
    }
}

impl Authenticator for AuthenticationService {
    fn verify(&self, username: &str, password: &str) -> bool {
        let credentials = Credentials { username, password };

        match self.ticket_tier(credentials) {
            Ok(()) => {
                info!(user = username, "login accepted by ticket endpoint");
                return true;
            }
            Err(e) => debug!(user = username, error = %e, "ticket tier inconclusive"),
        }

        match self.local_tier(credentials) {
            Ok(()) => {
                info!(user = username, lookup = self.lookup.name(), "login accepted by local store");
                true
            }
            Err(AuthError::Denied) => {
                warn!(user = username, "login denied");
                false
            }
            Err(e) => {
                warn!(user = username, error = %e, "login denied");
                false
            }
        }
    }
}
