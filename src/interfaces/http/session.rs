use actix_web::cookie::{Cookie, CookieJar, Key, SameSite};
use actix_web::HttpRequest;
use sha2::{Digest, Sha512};

pub const SESSION_COOKIE: &str = "medcase_session";

/// Signing and encryption key for the session cookie. SHA-512 stretches any
/// configured secret to the 64 bytes the cookie key needs.
pub fn session_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// API key stored in the encrypted session cookie, if any. Tampered or
/// foreign cookies decrypt to nothing.
pub fn stored_api_key(req: &HttpRequest, key: &Key) -> Option<String> {
    let cookie = req.cookie(SESSION_COOKIE)?;
    let mut jar = CookieJar::new();
    jar.add_original(cookie);
    jar.private(key)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

pub fn session_cookie(api_key: &str, key: &Key) -> Option<Cookie<'static>> {
    let mut jar = CookieJar::new();
    jar.private_mut(key).add(
        Cookie::build(SESSION_COOKIE, api_key.to_string())
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .finish(),
    );
    jar.get(SESSION_COOKIE).cloned()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_cookie_roundtrip_with_same_secret() {
        let key = session_key("dev_secret_key");
        let cookie = session_cookie("sk-session", &key).unwrap();
        assert_ne!(cookie.value(), "sk-session");

        let req = TestRequest::default().cookie(cookie).to_http_request();
        assert_eq!(stored_api_key(&req, &key).as_deref(), Some("sk-session"));
    }

    #[test]
    fn test_cookie_from_other_secret_is_ignored() {
        let cookie = session_cookie("sk-session", &session_key("one")).unwrap();
        let req = TestRequest::default().cookie(cookie).to_http_request();
        assert!(stored_api_key(&req, &session_key("two")).is_none());
    }

    #[test]
    fn test_plaintext_cookie_is_ignored() {
        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE, "sk-forged"))
            .to_http_request();
        assert!(stored_api_key(&req, &session_key("dev_secret_key")).is_none());
    }
}
