use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::models::{Claims, TokenType};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn issue(
    token_type: TokenType,
    user_id: u64,
    username: String,
    role: u8,
    staff_id: Option<u64>,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id,
        sub: username,
        role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        staff_id,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(
    user_id: u64,
    username: String,
    role: u8,
    staff_id: Option<u64>,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    issue(TokenType::Access, user_id, username, role, staff_id, secret, ttl).map(|(token, _)| token)
}

pub fn generate_refresh_token(
    user_id: u64,
    username: String,
    role: u8,
    staff_id: Option<u64>,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    issue(TokenType::Refresh, user_id, username, role, staff_id, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}
