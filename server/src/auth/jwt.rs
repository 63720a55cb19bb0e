// bazaar_server/src/auth/jwt.rs

//! HS256 access and refresh tokens.

use bazaar::models::{Role, UserDto};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const ISSUER: &str = "bazaar";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
  Access,
  Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
  pub sub: Uuid,
  pub email: String,
  pub role: Role,
  pub token_type: TokenType,
  pub exp: i64,
  pub iat: i64,
  pub iss: String,
  /// Unique per token so two tokens minted in the same second still differ.
  pub jti: Uuid,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JwtError {
  #[error("invalid token: {0}")]
  InvalidToken(String),

  #[error("token has expired")]
  ExpiredToken,

  #[error("invalid token signature")]
  InvalidSignature,

  #[error("expected a {expected:?} token")]
  WrongTokenType { expected: TokenType },

  #[error("token generation failed: {0}")]
  GenerationFailed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
  pub access_token: String,
  pub refresh_token: String,
  pub token_type: &'static str,
  pub expires_in: i64,
}

#[derive(Clone)]
pub struct JwtService {
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
  access_ttl: Duration,
  refresh_ttl: Duration,
}

impl JwtService {
  pub fn new(secret: &str, access_minutes: i64, refresh_days: i64) -> Self {
    Self {
      encoding_key: EncodingKey::from_secret(secret.as_bytes()),
      decoding_key: DecodingKey::from_secret(secret.as_bytes()),
      access_ttl: Duration::minutes(access_minutes),
      refresh_ttl: Duration::days(refresh_days),
    }
  }

  fn sign(&self, user: &UserDto, token_type: TokenType, ttl: Duration) -> Result<String, JwtError> {
    let now = Utc::now();
    let claims = Claims {
      sub: user.id,
      email: user.email.clone(),
      role: user.role,
      token_type,
      exp: (now + ttl).timestamp(),
      iat: now.timestamp(),
      iss: ISSUER.to_string(),
      jti: Uuid::new_v4(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
      .map_err(|e| JwtError::GenerationFailed(e.to_string()))
  }

  pub fn issue_pair(&self, user: &UserDto) -> Result<TokenPair, JwtError> {
    Ok(TokenPair {
      access_token: self.sign(user, TokenType::Access, self.access_ttl)?,
      refresh_token: self.sign(user, TokenType::Refresh, self.refresh_ttl)?,
      token_type: "Bearer",
      expires_in: self.access_ttl.num_seconds(),
    })
  }

  /// Decodes and checks signature, expiry, issuer and the token type.
  pub fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);
    validation.leeway = 0;

    let claims = decode::<Claims>(token, &self.decoding_key, &validation)
      .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
        ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        _ => JwtError::InvalidToken(e.to_string()),
      })?
      .claims;
    if claims.token_type != expected {
      return Err(JwtError::WrongTokenType { expected });
    }
    Ok(claims)
  }

  pub fn extract_from_header(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
  }
}
