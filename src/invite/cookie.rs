use axum::http::{header, HeaderMap, HeaderValue};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Pending-redemption cookie: carries an invite token across the
/// unauthenticated -> authenticated boundary. Value is
/// `hex(token).hex(hmac-sha256(token))` — hex on the token side keeps the
/// value header-safe for custom token shapes, the MAC side makes it
/// tamper-evident. Tampered or garbled values read as absent.

fn mac(secret: &[u8], token: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(token.as_bytes());
    mac
}

pub fn sign_token(secret: &[u8], token: &str) -> String {
    let tag = mac(secret, token).finalize().into_bytes();
    format!("{}.{}", hex::encode(token.as_bytes()), hex::encode(tag))
}

pub fn verify_signed(secret: &[u8], value: &str) -> Option<String> {
    let (token_hex, tag_hex) = value.split_once('.')?;
    let token = String::from_utf8(hex::decode(token_hex).ok()?).ok()?;
    let tag = hex::decode(tag_hex).ok()?;
    // Constant-time comparison via Mac::verify_slice
    mac(secret, &token).verify_slice(&tag).ok()?;
    Some(token)
}

/// Set-Cookie header for the pending token. HttpOnly keeps it away from
/// client script; SameSite=Lax still sends it on the top-level navigations
/// the sign-in/sign-up flow uses.
pub fn pending_cookie(name: &str, secret: &[u8], token: &str, max_age_secs: i64) -> HeaderValue {
    let value = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        name,
        sign_token(secret, token),
        max_age_secs.max(0)
    );
    HeaderValue::from_str(&value)
        .expect("name is validated at config resolve, value is hex and attribute tokens")
}

/// Expire the cookie immediately. Sent on successful resumption and on any
/// terminal failure — the cookie must never linger pointing at a dead token.
pub fn clear_cookie(name: &str) -> HeaderValue {
    let value = format!("{}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax", name);
    HeaderValue::from_str(&value).expect("cookie name is validated at config resolve")
}

/// Read and verify the pending token from request Cookie headers.
pub fn read_pending(headers: &HeaderMap, name: &str, secret: &[u8]) -> Option<String> {
    for header_value in headers.get_all(header::COOKIE) {
        let Ok(raw) = header_value.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            let Some((k, v)) = pair.trim().split_once('=') else {
                continue;
            };
            if k == name {
                return verify_signed(secret, v);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-test-secret-test-sec";

    #[test]
    fn sign_verify_round_trip() {
        let signed = sign_token(SECRET, "abc123");
        assert_eq!(verify_signed(SECRET, &signed), Some("abc123".to_string()));
    }

    #[test]
    fn tampered_value_reads_as_absent() {
        let signed = sign_token(SECRET, "abc123");
        let other = sign_token(SECRET, "zzz999");
        // Token swapped under the original signature
        let (_, tag) = signed.split_once('.').unwrap();
        let (token_hex, _) = other.split_once('.').unwrap();
        let forged = format!("{token_hex}.{tag}");
        assert_eq!(verify_signed(SECRET, &forged), None);
        assert_eq!(verify_signed(SECRET, "garbage"), None);
        assert_eq!(verify_signed(b"other-secret", &signed), None);
    }

    #[test]
    fn read_pending_from_headers() {
        let mut headers = HeaderMap::new();
        let value = format!("other=1; pending={}; extra=2", sign_token(SECRET, "tok"));
        headers.insert(header::COOKIE, HeaderValue::from_str(&value).unwrap());
        assert_eq!(
            read_pending(&headers, "pending", SECRET),
            Some("tok".to_string())
        );
        assert_eq!(read_pending(&headers, "missing", SECRET), None);
    }
}
