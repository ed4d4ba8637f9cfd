//! Identifier types.
//!
//! Document identifiers are `UUIDv5` values derived from the owning user, the
//! document kind and its ordinal, so rebuilding documents from the same
//! snapshot yields the same identifiers.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for document identifiers.
const DOCUMENT_NAMESPACE: Uuid = Uuid::from_u128(0x6d75_7369_635f_7072_6f66_696c_655f_6964);

/// Unique identifier of a retrievable document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// Derive a stable identifier for the `ordinal`-th document of `kind`.
    #[must_use]
    pub fn derive(user_id: &str, kind: &str, ordinal: usize) -> Self {
        let name = format!("{user_id}\u{1f}{kind}\u{1f}{ordinal}");
        Self(Uuid::new_v5(&DOCUMENT_NAMESPACE, name.as_bytes()))
    }

    /// Create a random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Borrow the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
