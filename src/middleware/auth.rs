use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::TokenManager;
use crate::error::{Error, Result};

/// The account a call runs as. Produced only by [`AuthorizationGate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account_id: Uuid,
}

/// Fully-qualified route name used by the bypass list, e.g. `POST /sign/up`.
pub fn method_name(method: &Method, path_template: &str) -> String {
    format!("{} {}", method, path_template)
}

/// Per-call authorization.
///
/// Calls named in the bypass set go through unauthenticated. Everything else
/// needs exactly one `authorization` header carrying a valid auth token.
pub struct AuthorizationGate {
    tokens: Arc<TokenManager>,
    bypass: HashSet<String>,
}

impl AuthorizationGate {
    pub fn new<I, S>(tokens: Arc<TokenManager>, bypass: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens,
            bypass: bypass.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_bypassed(&self, method: &str) -> bool {
        self.bypass.contains(method)
    }

    /// `Ok(None)` for bypassed calls, the verified caller otherwise.
    pub fn authorize(&self, method: &str, headers: &HeaderMap) -> Result<Option<CallerIdentity>> {
        if self.is_bypassed(method) {
            return Ok(None);
        }

        let token = extract_token(headers)?;
        let account_id = self.tokens.verify(token)?;
        Ok(Some(CallerIdentity { account_id }))
    }
}

fn extract_token(headers: &HeaderMap) -> Result<&str> {
    let mut values = headers.get_all(AUTHORIZATION).iter();
    let value = match (values.next(), values.next()) {
        (Some(value), None) => value,
        (None, _) => return Err(Error::authentication("missing authorization header")),
        (Some(_), Some(_)) => return Err(Error::authentication("multiple authorization headers")),
    };

    let value = value
        .to_str()
        .map_err(|_| Error::authentication("authorization header is not ascii"))?
        .trim();
    let token = strip_bearer(value).trim();

    if token.is_empty() {
        return Err(Error::authentication("empty authorization header"));
    }
    Ok(token)
}

/// Drop a leading `Bearer ` scheme, matched without regard to case.
fn strip_bearer(value: &str) -> &str {
    const SCHEME: &str = "bearer ";
    match value.get(..SCHEME.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(SCHEME) => &value[SCHEME.len()..],
        _ => value,
    }
}

/// Route middleware running the gate ahead of every handler.
///
/// Installed with `route_layer` so the matched path template is known.
pub async fn authorize(
    State(gate): State<Arc<AuthorizationGate>>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, Error> {
    let template = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let method = method_name(request.method(), &template);

    if let Some(caller) = gate.authorize(&method, request.headers())? {
        request.extensions_mut().insert(caller);
    }

    Ok(next.run(request).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .copied()
            .ok_or_else(|| Error::authentication("no caller identity on request"))
    }
}
