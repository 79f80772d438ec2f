//! Fragment key derivation.

use sha2::{Digest, Sha256};

use crate::application::pagination::PageNumber;

/// The post list on the home page, varied on the page number.
pub const INDEX_PAGE_FRAGMENT: &str = "index_page";

const KEY_PREFIX: &str = "template.cache";

/// `template.cache.<name>.<sha256 of vary-on values>`.
///
/// Each vary-on value is hashed followed by a `:` separator so `["ab", "c"]`
/// and `["a", "bc"]` never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    name: &'static str,
    key: String,
}

impl FragmentKey {
    pub fn new<S: AsRef<str>>(name: &'static str, vary_on: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for value in vary_on {
            hasher.update(value.as_ref().as_bytes());
            hasher.update(b":");
        }
        let digest = hex::encode(hasher.finalize());
        Self {
            name,
            key: format!("{KEY_PREFIX}.{name}.{digest}"),
        }
    }

    pub fn index_page(page: PageNumber) -> Self {
        Self::new(INDEX_PAGE_FRAGMENT, &[page.to_string()])
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}
