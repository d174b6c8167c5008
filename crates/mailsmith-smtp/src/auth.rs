//! CRAM-MD5 (RFC 2195).

use std::fmt::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};

use crate::error::{Error, Result};

type HmacMd5 = Hmac<md5::Md5>;

/// Answers a base64 CRAM-MD5 challenge with `base64(user SP hex(hmac))`.
///
/// # Errors
///
/// Returns [`Error::Authentication`] if the challenge is not valid base64.
pub fn cram_md5_response(challenge_b64: &str, username: &str, password: &str) -> Result<String> {
    let challenge = STANDARD
        .decode(challenge_b64.trim())
        .map_err(|err| Error::Authentication(format!("bad challenge: {err}")))?;

    let mut mac = HmacMd5::new_from_slice(password.as_bytes())
        .map_err(|err| Error::Authentication(err.to_string()))?;
    mac.update(&challenge);
    let digest = mac.finalize().into_bytes();

    let mut answer = String::with_capacity(username.len() + 1 + digest.len() * 2);
    answer.push_str(username);
    answer.push(' ');
    for byte in digest {
        let _ = write!(answer, "{byte:02x}");
    }
    Ok(STANDARD.encode(answer))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc2195_example() {
        let response = cram_md5_response(
            "PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+",
            "tim",
            "tanstaaftanstaaf",
        )
        .unwrap();
        assert_eq!(response, "dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw");
    }

    #[test]
    fn test_bad_challenge() {
        let result = cram_md5_response("not base64!", "tim", "pw");
        assert!(matches!(result, Err(Error::Authentication(_))));
    }
}
