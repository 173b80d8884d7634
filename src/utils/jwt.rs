use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// Claims of an identity token issued by the authentication provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // external identity id
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

/// The verified caller, stored in request extensions by `AuthMiddleware`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub external_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            external_id: claims.sub,
            email: claims.email,
            name: claims.name,
        }
    }
}

#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[Self::issuer_for(&config.domain)]);
        validation.set_audience(&[config.client_id.as_str()]);
        Self {
            decoding_key: DecodingKey::from_secret(config.client_secret.as_bytes()),
            validation,
        }
    }

    /// `https://<domain>/`, the issuer format used by the provider.
    pub fn issuer_for(domain: &str) -> String {
        format!("https://{}/", domain.trim_end_matches('/'))
    }

    pub fn verify_identity_token(&self, token: &str) -> AppResult<Identity> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)?;

        if claims.sub.trim().is_empty() {
            return Err(AppError::AuthError("Identity token has no subject".to_string()));
        }

        Ok(claims.into())
    }
}
