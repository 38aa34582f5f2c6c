//! Bootstrap token generation
//!
//! Tokens follow the kubeadm format `<id>.<secret>`: a 6-character public
//! identifier naming the durable credential record, and a 16-character
//! private secret authenticating against it. Both halves are drawn from a
//! lowercase alphanumeric alphabet that is safe as a Kubernetes label value
//! and as a secret payload.

use crate::Error;

/// Alphabet for token characters: safe as both a label and a secret value
const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of the public token identifier
pub const TOKEN_ID_LEN: usize = 6;

/// Length of the private token secret
pub const TOKEN_SECRET_LEN: usize = 16;

/// A bootstrap token split into its public identifier and private secret
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapToken {
    id: String,
    secret: String,
}

impl BootstrapToken {
    /// Generate a new random bootstrap token
    ///
    /// Fails if the underlying randomness source is unavailable or yields an
    /// empty value. Generation failure is fatal for the current issuance
    /// attempt; callers retry the whole operation, not just generation.
    pub fn generate() -> Result<Self, Error> {
        let id = random_string(TOKEN_ID_LEN)?;
        let secret = random_string(TOKEN_SECRET_LEN)?;

        if id.is_empty() || secret.is_empty() {
            return Err(Error::token_generation("randomness returned empty value"));
        }

        Ok(Self { id, secret })
    }

    /// The public identifier naming the durable credential record
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The private secret; must never be logged or exposed outside the store
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for BootstrapToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose the secret half in debug output
        f.debug_struct("BootstrapToken")
            .field("id", &self.id)
            .field("secret", &"[redacted]")
            .finish()
    }
}

impl std::fmt::Display for BootstrapToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.id, self.secret)
    }
}

/// Generate a random string over [`TOKEN_ALPHABET`]
///
/// Rejection-samples bytes so every alphabet character is equally likely
/// (256 is not a multiple of 36).
fn random_string(len: usize) -> Result<String, Error> {
    // Largest multiple of the alphabet size that fits in a byte
    const REJECT_ABOVE: u8 = (u8::MAX / 36) * 36;

    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 64];

    while out.len() < len {
        aws_lc_rs::rand::fill(&mut buf)
            .map_err(|_| Error::token_generation("randomness source unavailable"))?;

        for &b in buf.iter() {
            if b >= REJECT_ABOVE {
                continue;
            }
            out.push(TOKEN_ALPHABET[(b % 36) as usize] as char);
            if out.len() == len {
                break;
            }
        }
    }

    Ok(out)
}
