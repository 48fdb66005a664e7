use anyhow::Result;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization, Cookie},
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::settings::Settings;

/// Cookie carrying the session token on page loads. API calls use a bearer header.
pub const SESSION_COOKIE: &str = "sharex_session";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
}

/// The authenticated viewer. Tokens are issued by the external auth service;
/// we only verify them. The raw token is kept so upstream calls can be made
/// on the viewer's behalf.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub token: String,
}

/// Signs a session token. Issuance belongs to the auth service; this exists
/// for tests and local tooling.
#[allow(dead_code)]
pub fn create_token(user_id: Uuid, secret: &str) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    Settings: FromRef<S>,
{
    type Rejection = axum::http::StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = match parts.extract::<TypedHeader<Authorization<Bearer>>>().await {
            Ok(TypedHeader(Authorization(bearer))) => bearer.token().to_string(),
            Err(_) => parts
                .extract::<TypedHeader<Cookie>>()
                .await
                .ok()
                .and_then(|TypedHeader(cookie)| {
                    cookie.get(SESSION_COOKIE).map(ToString::to_string)
                })
                .ok_or(axum::http::StatusCode::UNAUTHORIZED)?,
        };

        let settings = Settings::from_ref(state);

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(settings.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| axum::http::StatusCode::UNAUTHORIZED)?;

        Ok(Session {
            user_id: data.claims.sub,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_through_verification() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, "test-secret").unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(data.claims.sub, user_id);
        assert!(data.claims.exp > data.claims.iat);
    }

    #[test]
    fn verification_rejects_wrong_secret() {
        let token = create_token(Uuid::new_v4(), "test-secret").unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::default(),
        );

        assert!(result.is_err());
    }
}
