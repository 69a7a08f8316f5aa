//! HTTP middleware stack for the tenantscope server.
//!
//! Transport layers are built by [`build_http_layers`]. Two route-level
//! middlewares sit inside them: [`tenant_boundary`] on tenant-facing routes
//! and [`require_admin_token`] on admin routes.

use axum::extract::{Request, State};
use axum::http::header::{HeaderName, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tenantscope_core::PrincipalClaims;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::config::NetworkConfig;
use super::error::ApiError;
use super::handlers::AppState;
use crate::scope::IsolationError;

/// Header carrying the admin shared secret.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// The composed Tower layer type produced by [`build_http_layers`].
type HttpLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<
        TimeoutLayer,
        tower::layer::util::Stack<
            TraceLayer<
                tower_http::classify::SharedClassifier<
                    tower_http::classify::ServerErrorsAsFailures,
                >,
            >,
            tower::layer::util::Stack<
                SetRequestIdLayer<MakeRequestUuid>,
                tower::layer::util::Identity,
            >,
        >,
    >,
>;

/// Builds the HTTP-level Tower middleware stack from the network configuration.
///
/// **Middleware ordering (outermost to innermost):**
/// 1. `SetRequestId` -- assigns a UUID v4 `X-Request-Id` to every incoming request
/// 2. `Tracing` -- logs request/response with structured trace spans
/// 3. `Timeout` -- enforces a maximum request processing duration
/// 4. `PropagateRequestId` -- copies `X-Request-Id` from the request to the response
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            x_request_id.clone(),
            MakeRequestUuid,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

// ---------------------------------------------------------------------------
// Bearer claims
// ---------------------------------------------------------------------------

/// Token claims relevant to tenancy. Accepts both plain and `custom:`
/// prefixed names as issued by common identity providers.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: Option<String>,
    #[serde(alias = "custom:tenant_id")]
    tenant_id: Option<String>,
    #[serde(alias = "custom:role")]
    role: Option<String>,
}

/// Extracts principal claims from an `Authorization: Bearer` header.
///
/// `Ok(None)` when no key is configured or no `Authorization` header is
/// present. `Err` when the header is not a well-formed bearer credential or
/// the token does not verify. The scheme name is matched case-insensitively.
fn bearer_claims(
    key: Option<&DecodingKey>,
    headers: &HeaderMap,
) -> Result<Option<PrincipalClaims>, jsonwebtoken::errors::Error> {
    let Some(key) = key else {
        return Ok(None);
    };
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| jsonwebtoken::errors::Error::from(ErrorKind::InvalidToken))?;
    let data =
        jsonwebtoken::decode::<TokenClaims>(token, key, &Validation::new(Algorithm::HS256))?;
    Ok(Some(PrincipalClaims {
        subject: data.claims.sub,
        tenant_id: data.claims.tenant_id,
        role: data.claims.role,
    }))
}

// ---------------------------------------------------------------------------
// Route middleware
// ---------------------------------------------------------------------------

/// Resolves the request's tenant and runs the rest of the request inside its
/// scope. Unresolvable requests are answered here and never reach a handler.
pub async fn tenant_boundary(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let claims = match bearer_claims(state.jwt_key.as_deref(), request.headers()) {
        Ok(claims) => claims,
        Err(err) => {
            warn!(%method, %path, %err, "bearer token rejected");
            return ApiError::from(IsolationError::UnauthenticatedNoTenantClaim).into_response();
        }
    };
    let header = request
        .headers()
        .get(state.scope.guard.tenant_header())
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match state.scope.guard.resolve(claims.as_ref(), header.as_deref()) {
        Ok(ctx) => state.scope.carrier.run_scoped(ctx, next.run(request)).await,
        Err(err) => {
            warn!(%method, %path, reason = err.reason(), "request refused at tenant boundary");
            ApiError::from(err).into_response()
        }
    }
}

/// Requires `x-admin-token` to match the configured token, when one is set.
pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.config.admin_token {
        let presented = request
            .headers()
            .get(ADMIN_TOKEN_HEADER)
            .map_or(&[][..], |v| v.as_bytes());
        if !bool::from(presented.ct_eq(expected.as_bytes())) {
            warn!(path = %request.uri().path(), "admin request without valid token");
            return ApiError::Unauthorized.into_response();
        }
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    use super::*;

    fn token(claims: &serde_json::Value, secret: &[u8]) -> String {
        jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(secret))
            .unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn build_http_layers_does_not_panic_with_defaults() {
        let _layers = build_http_layers(&NetworkConfig::default());
    }

    #[test]
    fn bearer_claims_accept_prefixed_names() {
        let key = DecodingKey::from_secret(b"s3cret");
        let jwt = token(
            &json!({
                "sub": "user-1",
                "custom:tenant_id": "t-1",
                "custom:role": "OWNER",
                "exp": 4_102_444_800_u64,
            }),
            b"s3cret",
        );
        let claims = bearer_claims(Some(&key), &bearer(&jwt)).unwrap().unwrap();
        assert_eq!(claims.tenant_id.as_deref(), Some("t-1"));
        assert_eq!(claims.subject.as_deref(), Some("user-1"));
        assert_eq!(claims.role.as_deref(), Some("OWNER"));
    }

    #[test]
    fn bearer_claims_reject_wrong_signature() {
        let key = DecodingKey::from_secret(b"s3cret");
        let jwt = token(&json!({"tenant_id": "t-1", "exp": 4_102_444_800_u64}), b"other");
        assert!(bearer_claims(Some(&key), &bearer(&jwt)).is_err());
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let key = DecodingKey::from_secret(b"s3cret");
        let jwt = token(&json!({"tenant_id": "t-1", "exp": 4_102_444_800_u64}), b"s3cret");
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("bearer {jwt}")).unwrap(),
        );
        let claims = bearer_claims(Some(&key), &headers).unwrap().unwrap();
        assert_eq!(claims.tenant_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn malformed_authorization_is_an_error() {
        let key = DecodingKey::from_secret(b"s3cret");
        for raw in ["Basic dXNlcjpwdw==", "Bearer", "Bearer   ", "token-without-scheme"] {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_static(raw));
            assert!(bearer_claims(Some(&key), &headers).is_err(), "{raw}");
        }
    }

    #[test]
    fn bearer_claims_absent_without_key_or_header() {
        let key = DecodingKey::from_secret(b"s3cret");
        assert!(bearer_claims(None, &bearer("garbage")).unwrap().is_none());
        assert!(bearer_claims(Some(&key), &HeaderMap::new())
            .unwrap()
            .is_none());
    }
}
