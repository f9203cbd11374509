use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Checks an event report signature.
///
/// With a `secret` configured, OneBot sends `X-Signature: sha1=<hex>`, the
/// HMAC-SHA1 of the raw body keyed by the secret.
pub fn verify(secret: &str, body: &[u8], signature_header: &str) -> bool {
    let Some(hex_sig) = signature_header.strip_prefix("sha1=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha1::new_from_slice(secret.as_bytes()) else {
        return false;
    };

    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // RFC 2202 test case 2.
        assert_eq!(
            sign("Jefe", b"what do ya want for nothing?"),
            "sha1=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"
        );
    }

    #[test]
    fn test_verify() {
        let sig = sign("s3cret", b"{\"post_type\":\"notice\"}");
        assert!(verify("s3cret", b"{\"post_type\":\"notice\"}", &sig));
        assert!(!verify("other", b"{\"post_type\":\"notice\"}", &sig));
        assert!(!verify("s3cret", b"{\"post_type\":\"message\"}", &sig));
        assert!(!verify("s3cret", b"{}", sig.trim_start_matches("sha1=")));
        assert!(!verify("s3cret", b"{}", "sha1=zz"));
    }
}
