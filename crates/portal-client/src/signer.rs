//! Challenge-response signing.

use crate::xencode::xencode;
use crate::{SignerError, AC_ID};
use base64::alphabet::Alphabet;
use base64::engine::{general_purpose, GeneralPurpose};
use base64::Engine;
use hmac::{Hmac, Mac};
use md5::Md5;
use serde::Serialize;
use sha1::{Digest, Sha1};

/// `n` field of the login request.
pub(crate) const LOGIN_N: &str = "200";
/// `type` field of the login request.
pub(crate) const LOGIN_TYPE: &str = "1";

const ENC_VER: &str = "srun_bx1";
const INFO_PREFIX: &str = "{SRBX1}";
const PASSWORD_PREFIX: &str = "{MD5}";

const SRUN_ALPHABET: Alphabet =
    match Alphabet::new("LVoJPiCN2R8G90yg+hmFHuacZ1OWMnrsSTXkYpUq/3dlbfKwv6xztjI7DeBE45QA") {
        Ok(alphabet) => alphabet,
        Err(_) => panic!("invalid SRUN base64 alphabet"),
    };

const SRUN_BASE64: GeneralPurpose = GeneralPurpose::new(&SRUN_ALPHABET, general_purpose::PAD);

/// Inputs to a signing operation.
#[derive(Clone, Copy)]
pub struct SignRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub client_ip: &'a str,
    pub challenge: &'a str,
}

/// The three opaque login fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCredentials {
    pub info: String,
    pub password_digest: String,
    pub checksum: String,
}

/// Produces the opaque login fields from a server challenge.
///
/// Implementations must be deterministic and must not log or persist the
/// plaintext password.
pub trait ChallengeSigner: Send + Sync {
    fn sign(&self, request: &SignRequest<'_>) -> Result<SignedCredentials, SignerError>;
}

/// The SRUN `srun_bx1` scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct SrunSigner;

#[derive(Serialize)]
struct InfoPayload<'a> {
    username: &'a str,
    password: &'a str,
    ip: &'a str,
    acid: &'a str,
    enc_ver: &'a str,
}

impl SrunSigner {
    fn info(&self, request: &SignRequest<'_>) -> Result<String, SignerError> {
        let payload = serde_json::to_string(&InfoPayload {
            username: request.username,
            password: request.password,
            ip: request.client_ip,
            acid: AC_ID,
            enc_ver: ENC_VER,
        })?;
        let encrypted = xencode(payload.as_bytes(), request.challenge.as_bytes());
        Ok(format!("{INFO_PREFIX}{}", SRUN_BASE64.encode(encrypted)))
    }

    fn hmac_md5(&self, request: &SignRequest<'_>) -> Result<String, SignerError> {
        let mut mac = Hmac::<Md5>::new_from_slice(request.challenge.as_bytes())
            .map_err(|e| SignerError::Key(e.to_string()))?;
        mac.update(request.password.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl ChallengeSigner for SrunSigner {
    fn sign(&self, request: &SignRequest<'_>) -> Result<SignedCredentials, SignerError> {
        if request.challenge.is_empty() {
            return Err(SignerError::EmptyChallenge);
        }

        let info = self.info(request)?;
        let hmd5 = self.hmac_md5(request)?;

        let token = request.challenge;
        let mut hasher = Sha1::new();
        for part in [
            request.username,
            hmd5.as_str(),
            AC_ID,
            request.client_ip,
            LOGIN_N,
            LOGIN_TYPE,
            info.as_str(),
        ] {
            hasher.update(token.as_bytes());
            hasher.update(part.as_bytes());
        }
        let checksum = hex::encode(hasher.finalize());

        Ok(SignedCredentials {
            info,
            password_digest: format!("{PASSWORD_PREFIX}{hmd5}"),
            checksum,
        })
    }
}
