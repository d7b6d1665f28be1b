//! HMAC-signed JWT verification.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::Value;

use super::{IdentityError, IdentityVerifier, Principal};

/// Claims this service cares about. Everything else in the token is ignored.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(rename = "userId", default)]
    user_id: Option<Value>,
    #[serde(default)]
    sub: Option<String>,
}

impl Claims {
    /// `userId` (number or numeric string) wins; a numeric `sub` is the fallback.
    fn principal(&self) -> Option<Principal> {
        let from_user_id = match &self.user_id {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        from_user_id
            .or_else(|| self.sub.as_deref().and_then(|s| s.trim().parse().ok()))
            .map(Principal)
    }
}

/// Verifies HS256/HS384/HS512 tokens signed with a secret shared with the
/// identity service. `exp` is mandatory.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Build a verifier from the raw secret bytes.
    pub fn new(secret: &[u8]) -> Result<Self, IdentityError> {
        if secret.is_empty() {
            return Err(IdentityError::Config("JWT secret is empty".into()));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.set_required_spec_claims(&["exp"]);
        validation.validate_aud = false;
        Ok(Self {
            key: DecodingKey::from_secret(secret),
            validation,
        })
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Principal, IdentityError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => IdentityError::Expired,
                ErrorKind::InvalidSignature => IdentityError::Invalid("bad signature".into()),
                ErrorKind::InvalidAlgorithm => {
                    IdentityError::Invalid("unsupported algorithm".into())
                }
                _ => IdentityError::Invalid(err.to_string()),
            }
        })?;
        data.claims.principal().ok_or(IdentityError::NoPrincipal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &[u8] = b"test-secret-shared-with-the-identity-service";

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn sign(claims: Value, alg: Algorithm, secret: &[u8]) -> String {
        encode(&Header::new(alg), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(SECRET).unwrap()
    }

    #[test]
    fn numeric_user_id_claim() {
        let token = sign(
            json!({"userId": 42, "sub": "alice@example.com", "exp": now() + 600}),
            Algorithm::HS256,
            SECRET,
        );
        assert_eq!(verifier().verify(&token), Ok(Principal(42)));
    }

    #[test]
    fn string_user_id_and_hs512() {
        let token = sign(
            json!({"userId": "7", "exp": now() + 600}),
            Algorithm::HS512,
            SECRET,
        );
        assert_eq!(verifier().verify(&token), Ok(Principal(7)));
    }

    #[test]
    fn numeric_sub_fallback() {
        let token = sign(json!({"sub": "9", "exp": now() + 600}), Algorithm::HS384, SECRET);
        assert_eq!(verifier().verify(&token), Ok(Principal(9)));
    }

    #[test]
    fn no_usable_principal() {
        let token = sign(
            json!({"sub": "alice@example.com", "exp": now() + 600}),
            Algorithm::HS256,
            SECRET,
        );
        assert_eq!(verifier().verify(&token), Err(IdentityError::NoPrincipal));
    }

    #[test]
    fn expired_token() {
        let token = sign(json!({"userId": 1, "exp": now() - 3600}), Algorithm::HS256, SECRET);
        assert_eq!(verifier().verify(&token), Err(IdentityError::Expired));
    }

    #[test]
    fn missing_exp_rejected() {
        let token = sign(json!({"userId": 1}), Algorithm::HS256, SECRET);
        assert!(matches!(
            verifier().verify(&token),
            Err(IdentityError::Invalid(_))
        ));
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = sign(
            json!({"userId": 1, "exp": now() + 600}),
            Algorithm::HS256,
            b"some-other-secret",
        );
        assert!(matches!(
            verifier().verify(&token),
            Err(IdentityError::Invalid(_))
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(verifier().verify("not-a-jwt").is_err());
    }

    #[test]
    fn empty_secret_is_config_error() {
        assert!(matches!(
            JwtVerifier::new(b""),
            Err(IdentityError::Config(_))
        ));
    }
}
