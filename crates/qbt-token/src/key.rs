/// Server-side keying material for snapshot tags and form nonces.
///
/// Never derivable from anything the client sees. **Redacted in `Debug`.**
#[derive(Clone)]
pub struct TokenKey {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKey")
            .field("bytes", &"<REDACTED>")
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Secret was empty (or whitespace only).
    Empty,
}

impl std::fmt::Display for KeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyError::Empty => write!(f, "token secret is empty"),
        }
    }
}

impl std::error::Error for KeyError {}

impl TokenKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, KeyError> {
        let bytes = bytes.into();
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(KeyError::Empty);
        }
        Ok(Self { bytes })
    }

    pub fn from_secret(secret: &str) -> Result<Self, KeyError> {
        Self::new(secret.as_bytes().to_vec())
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
