//! Admin bearer-token check for the write paths.
//!
//! Tokens are issued by the identity provider and verified (signature and
//! revocation) at the proxy in front of this service; here we read the
//! payload claims and enforce the organizational rule: the issuing account's
//! email must belong to the configured domain, and the token must not be
//! expired. Requests failing either check never reach the data layer.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppError;

#[derive(Deserialize)]
struct Claims {
    email: Option<String>,
    exp: Option<i64>,
}

pub fn verify_admin(headers: &HeaderMap, allowed_domain: &str) -> Result<String, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;

    let claims = decode_claims(token)?;

    if let Some(exp) = claims.exp {
        if exp <= Utc::now().timestamp() {
            return Err(AppError::Unauthorized("Token expired".into()));
        }
    }

    let email = claims
        .email
        .ok_or_else(|| AppError::Unauthorized("Token has no email claim".into()))?;

    if !email.ends_with(&format!("@{allowed_domain}")) {
        return Err(AppError::Unauthorized("Email domain not allowed".into()));
    }

    Ok(email)
}

fn decode_claims(token: &str) -> Result<Claims, AppError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(invalid_token)?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| invalid_token())?;

    serde_json::from_slice(&bytes).map_err(|_| invalid_token())
}

fn invalid_token() -> AppError {
    AppError::Unauthorized("Invalid bearer token".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn token(email: &str, exp: i64) -> String {
        let payload = URL_SAFE_NO_PAD.encode(json!({ "email": email, "exp": exp }).to_string());
        format!("header.{payload}.signature")
    }

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn accepts_org_domain_email() {
        let exp = Utc::now().timestamp() + 3600;
        let headers = headers_with(&token("admin@esrent.ae", exp));
        assert_eq!(verify_admin(&headers, "esrent.ae").unwrap(), "admin@esrent.ae");
    }

    #[test]
    fn rejects_foreign_domain() {
        let exp = Utc::now().timestamp() + 3600;
        let headers = headers_with(&token("admin@evil.example", exp));
        assert!(matches!(
            verify_admin(&headers, "esrent.ae"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let exp = Utc::now().timestamp() - 10;
        let headers = headers_with(&token("admin@esrent.ae", exp));
        assert!(matches!(
            verify_admin(&headers, "esrent.ae"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejects_missing_or_garbage_token() {
        assert!(verify_admin(&HeaderMap::new(), "esrent.ae").is_err());

        let headers = headers_with("not-a-jwt");
        assert!(verify_admin(&headers, "esrent.ae").is_err());
    }
}
