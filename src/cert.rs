//! Signing metadata associated with archive entries.

use std::sync::Arc;

/// One signature block file from `META-INF/` (`.RSA`, `.DSA` or `.EC`).
///
/// The block bytes are the raw signature container; this crate does not
/// parse them, it only associates them with the entries they cover.
#[derive(Debug, Clone)]
pub struct SignatureFile {
    /// Entry name of the block file, e.g. `META-INF/SIGNER.RSA`.
    pub name: String,
    /// Raw block bytes (typically a PKCS#7 container).
    pub block: Vec<u8>,
}

/// Signing metadata for a single entry, shared across all entries covered by
/// the same signers. The default value is the "no certification" sentinel.
#[derive(Debug, Clone, Default)]
pub struct Certification {
    signers: Arc<[SignatureFile]>,
}

impl Certification {
    pub(crate) fn new(signers: Vec<SignatureFile>) -> Self {
        Self {
            signers: signers.into(),
        }
    }

    /// The sentinel value for entries with no signing metadata.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_certified(&self) -> bool {
        !self.signers.is_empty()
    }

    pub fn signers(&self) -> &[SignatureFile] {
        &self.signers
    }
}
