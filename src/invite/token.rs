use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Caller-supplied generator for `TokenType::Custom`.
pub type TokenGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Shape/entropy class of a generated credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// 32-char high-entropy identifier, suitable for email/URL delivery.
    Token,
    /// 6-char human-typable code. Low entropy and brute-forceable: operators
    /// should pair it with a short expiry and a low use limit. Activation
    /// routes are rate-limited for the same reason.
    Code,
    /// Delegates to a configured generator; falls back to the `Token` shape
    /// when none is configured, never to an empty token.
    Custom,
}

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const TOKEN_LEN: usize = 32;
pub const CODE_LEN: usize = 6;

fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Generate a token of the requested shape.
/// No uniqueness retry here: the store's UNIQUE index is the authority, and
/// a collision surfaces as a storage error rather than being masked.
pub fn generate(token_type: TokenType, custom: Option<&TokenGenerator>) -> String {
    match token_type {
        TokenType::Token => random_alphanumeric(TOKEN_LEN),
        TokenType::Code => random_alphanumeric(CODE_LEN),
        TokenType::Custom => match custom {
            Some(generator) => {
                let token = generator();
                if token.is_empty() {
                    random_alphanumeric(TOKEN_LEN)
                } else {
                    token
                }
            }
            None => random_alphanumeric(TOKEN_LEN),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_shapes() {
        let token = generate(TokenType::Token, None);
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.bytes().all(|b| CHARSET.contains(&b)));

        let code = generate(TokenType::Code, None);
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| CHARSET.contains(&b)));
    }

    #[test]
    fn custom_generator_is_used() {
        let generator: TokenGenerator = Arc::new(|| "my-custom-token".to_string());
        assert_eq!(generate(TokenType::Custom, Some(&generator)), "my-custom-token");
    }

    #[test]
    fn custom_without_generator_falls_back_to_token_shape() {
        assert_eq!(generate(TokenType::Custom, None).len(), TOKEN_LEN);
        let empty: TokenGenerator = Arc::new(String::new);
        assert_eq!(generate(TokenType::Custom, Some(&empty)).len(), TOKEN_LEN);
    }
}
