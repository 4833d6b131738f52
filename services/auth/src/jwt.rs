//! Session token encoding
//!
//! A session token is a signed JWT whose payload is [`SessionClaims`].
//! Callers only see `encode` and `decode`; the algorithm follows from the
//! configured [`SigningKeys`] (HS256 for a shared secret, RS256 for a key
//! pair).

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::{config::SigningKeys, error::AuthError, models::SessionClaims};

/// Signs and verifies session tokens
#[derive(Clone)]
pub struct SessionCodec {
    header: Header,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionCodec {
    /// Build a codec from configured key material
    pub fn new(keys: &SigningKeys) -> anyhow::Result<Self> {
        let (algorithm, encoding_key, decoding_key) = match keys {
            SigningKeys::Hmac(secret) => (
                Algorithm::HS256,
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            SigningKeys::Rsa {
                private_key,
                public_key,
            } => (
                Algorithm::RS256,
                EncodingKey::from_rsa_pem(private_key.as_bytes())?,
                DecodingKey::from_rsa_pem(public_key.as_bytes())?,
            ),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(SessionCodec {
            header: Header::new(algorithm),
            encoding_key,
            decoding_key,
            validation,
        })
    }

    /// Sign claims into a session token
    pub fn encode(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        encode(&self.header, claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to sign session token: {}", e)))
    }

    /// Verify a session token and return its claims
    ///
    /// Fails on a bad signature, a malformed payload, or an elapsed session
    /// lifetime (`exp`). The provider access-token expiry is not checked here.
    pub fn decode(&self, token: &str) -> Result<SessionClaims, AuthError> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidSession(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::session::unix_now;
    use uuid::Uuid;

    const SECRET: &str = "test-secret-test-secret-test-secret";

    fn codec() -> SessionCodec {
        SessionCodec::new(&SigningKeys::Hmac(SECRET.to_string())).unwrap()
    }

    fn claims(exp: u64) -> SessionClaims {
        SessionClaims {
            sub: "u1".to_string(),
            email: "a@x.com".to_string(),
            roles: vec![Role::Alumni],
            provider_id: None,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            jti: Uuid::new_v4(),
            iat: exp.saturating_sub(3600),
            exp,
        }
    }

    #[test]
    fn test_encode_decode() {
        let codec = codec();
        let claims = claims(unix_now().unwrap() + 3600);

        let token = codec.encode(&claims).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), claims);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let codec = codec();
        let claims = claims(unix_now().unwrap() + 3600);

        assert_eq!(codec.encode(&claims).unwrap(), codec.encode(&claims).unwrap());
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let codec = codec();
        let token = codec.encode(&claims(unix_now().unwrap() + 3600)).unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = codec
            .encode(&SessionClaims {
                roles: vec![Role::Admin],
                ..claims(unix_now().unwrap() + 3600)
            })
            .unwrap();
        let forged_payload = forged.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_payload;

        let err = codec.decode(&parts.join(".")).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSession(_)));
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let other = SessionCodec::new(&SigningKeys::Hmac(
            "another-secret-another-secret-another".to_string(),
        ))
        .unwrap();
        let token = other.encode(&claims(unix_now().unwrap() + 3600)).unwrap();

        assert!(matches!(codec().decode(&token), Err(AuthError::InvalidSession(_))));
    }

    #[test]
    fn test_elapsed_session_is_rejected() {
        let codec = codec();
        let token = codec.encode(&claims(unix_now().unwrap() - 1)).unwrap();

        assert!(matches!(codec.decode(&token), Err(AuthError::InvalidSession(_))));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            codec().decode("not-a-token"),
            Err(AuthError::InvalidSession(_))
        ));
    }
}
