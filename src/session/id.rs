use std::borrow::Borrow;

use data_encoding::HEXLOWER;
use rand::RngCore;
use rand::rngs::OsRng;

/// Number of random bytes in a session id (128 bits).
const SESSION_ID_BYTES: usize = 16;

/// Opaque bearer token naming one session.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Draw a fresh id from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(HEXLOWER.encode(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Ids are bearer credentials; keep them out of debug output.
impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "SessionId({}…)", prefix)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Draw ids from `next` until one is not already taken.
pub(crate) fn unique_id(
    mut taken: impl FnMut(&SessionId) -> bool,
    mut next: impl FnMut() -> SessionId,
) -> SessionId {
    loop {
        let id = next();
        if !taken(&id) {
            return id;
        }
        tracing::warn!("Session id collision detected, drawing a new id");
    }
}
