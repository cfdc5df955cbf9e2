//! Request signing for the asset web API
//!
//! Every request carries an `Authorization` header of the form
//! `timestamp|token|signature` where the signature is
//! `HMAC-SHA256(secret, token ++ timestamp)` rendered as lowercase hex.
use std::{
    fmt,
    str::FromStr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes behind a token, before hex encoding.
pub const TOKEN_BYTES: usize = 32;

/// Age after which the device refuses a token.
pub const TOKEN_EXPIRATION: Duration = Duration::from_secs(60);

pub const HEADER_AUTHORIZATION: &str = "Authorization";

fn mac_for(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, including empty ones.
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC takes keys of any size")
}

/// Sign `token ++ timestamp` with `secret`.
///
/// Returns the hex signature together with the signed message.
pub fn sign(secret: &str, token: &str, timestamp: &str) -> (String, String) {
    let message = format!("{}{}", token, timestamp);
    let mut mac = mac_for(secret);
    mac.update(message.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    (signature, message)
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Material for one CLI invocation. A fresh token is drawn every time.
#[derive(Clone)]
pub struct Credentials {
    secret: String,
    token: String,
    timestamp: u64,
}

impl Credentials {
    pub fn generate(secret: &str) -> Self {
        let mut bytes = [0_u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::with_token(secret, &hex::encode(bytes), unix_now())
    }

    pub fn with_token(secret: &str, token: &str, timestamp: u64) -> Self {
        Self {
            secret: secret.to_owned(),
            token: token.to_owned(),
            timestamp,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn header(&self) -> AuthHeader {
        let timestamp = self.timestamp.to_string();
        let (signature, message) = sign(&self.secret, &self.token, &timestamp);
        log::debug!("**** Authentication Details ****");
        log::debug!("Signature: {}", signature);
        log::debug!("Token: {}", message);
        log::debug!("Timestamp: {}", timestamp);
        AuthHeader {
            timestamp: self.timestamp,
            token: self.token.clone(),
            signature,
        }
    }
}

// The secret never shows up in logs or panics.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthHeader {
    pub timestamp: u64,
    pub token: String,
    pub signature: String,
}

impl AuthHeader {
    /// Check the header the way the device does: signature first, then age.
    pub fn verify(&self, secret: &str, now: u64, max_age: Duration) -> Result<()> {
        let expected = hex::decode(&self.signature)
            .map_err(|_| Error::Invalid(String::from("Signature is not hex encoded")))?;
        let mut mac = mac_for(secret);
        mac.update(self.token.as_bytes());
        mac.update(self.timestamp.to_string().as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| Error::Invalid(String::from("Signature mismatch")))?;

        if now.saturating_sub(self.timestamp) > max_age.as_secs() {
            return Err(Error::Invalid(String::from("Token expired")));
        }
        Ok(())
    }
}

impl fmt::Display for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}|{}|{}", self.timestamp, self.token, self.signature)
    }
}

impl FromStr for AuthHeader {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let mut parts = value.splitn(3, '|');
        let (timestamp, token, signature) = match (parts.next(), parts.next(), parts.next()) {
            (Some(ts), Some(token), Some(sig)) if !ts.is_empty() && !token.is_empty() && !sig.is_empty() => {
                (ts, token, sig)
            }
            _ => {
                return Err(Error::Invalid(String::from(
                    "Authorization header must be timestamp|token|signature",
                )))
            }
        };
        let timestamp = timestamp
            .parse()
            .map_err(|_| Error::Invalid(format!("Invalid timestamp {}", timestamp)))?;
        Ok(AuthHeader {
            timestamp,
            token: token.to_owned(),
            signature: signature.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "yourSecret123!here";
    const TOKEN: &str = "thisIsMyTestTokenForTheCode__!!";

    #[test]
    fn sign_is_deterministic_lowercase_hex() {
        let (first, message) = sign(SECRET, TOKEN, "1700000000");
        let (second, _) = sign(SECRET, TOKEN, "1700000000");

        assert_eq!(first, second);
        assert_eq!(64, first.len());
        assert!(first.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(format!("{}1700000000", TOKEN), message);
    }

    #[test]
    fn sign_matches_rfc4231_vector() {
        // RFC 4231 test case 2, with the message split into token and timestamp.
        let (signature, _) = sign("Jefe", "what do ya want ", "for nothing?");
        assert_eq!(
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843",
            signature
        );
    }

    #[test]
    fn sign_changes_with_every_input() {
        let (base, _) = sign(SECRET, TOKEN, "1700000000");
        assert_ne!(base, sign("otherSecret", TOKEN, "1700000000").0);
        assert_ne!(base, sign(SECRET, "otherToken", "1700000000").0);
        assert_ne!(base, sign(SECRET, TOKEN, "1700000001").0);
    }

    #[test]
    fn generated_tokens_are_fresh() {
        let first = Credentials::generate(SECRET);
        let second = Credentials::generate(SECRET);

        assert_eq!(TOKEN_BYTES * 2, first.token().len());
        assert!(hex::decode(first.token()).is_ok());
        assert_ne!(first.token(), second.token());
    }

    #[test]
    fn header_renders_pipe_delimited() {
        let header = Credentials::with_token(SECRET, TOKEN, 1_700_000_000).header();
        let (signature, _) = sign(SECRET, TOKEN, "1700000000");

        assert_eq!(
            format!("1700000000|{}|{}", TOKEN, signature),
            header.to_string()
        );
    }

    #[test]
    fn header_parses_back() {
        let header = Credentials::with_token(SECRET, TOKEN, 1_700_000_000).header();
        let parsed: AuthHeader = header.to_string().parse().unwrap();
        assert_eq!(header, parsed);
    }

    #[test]
    fn header_parse_rejects_missing_parts() {
        assert!("1700000000|token".parse::<AuthHeader>().is_err());
        assert!("1700000000||sig".parse::<AuthHeader>().is_err());
        assert!("soon|token|sig".parse::<AuthHeader>().is_err());
    }

    #[test]
    fn verify_accepts_fresh_header() {
        let header = Credentials::with_token(SECRET, TOKEN, 1_700_000_000).header();
        assert!(header.verify(SECRET, 1_700_000_030, TOKEN_EXPIRATION).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_secret_and_expired_token() {
        let header = Credentials::with_token(SECRET, TOKEN, 1_700_000_000).header();
        assert!(header.verify("wrong", 1_700_000_000, TOKEN_EXPIRATION).is_err());
        assert!(header.verify(SECRET, 1_700_000_061, TOKEN_EXPIRATION).is_err());
    }
}
