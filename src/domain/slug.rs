//! Group slug derivation and validation.
//!
//! Slugs are lowercase ASCII built from `[a-z0-9-_]`. Titles in any script are
//! transliterated by the `slug` crate before being hyphenated.

use std::future::Future;

use slug::slugify;
use thiserror::Error;

const MAX_SUFFIX_ATTEMPTS: usize = 32;
pub const MAX_SLUG_LEN: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{slug}` may only contain lowercase latin letters, digits, `-` and `_`")]
    InvalidCharacters { slug: String },
    #[error("slug is longer than {MAX_SLUG_LEN} characters")]
    TooLong,
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a base slug from a group title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut candidate = slugify(input);
    if candidate.len() > MAX_SLUG_LEN {
        candidate.truncate(MAX_SLUG_LEN);
        while candidate.ends_with('-') {
            candidate.pop();
        }
    }

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Checks a slug typed by hand.
pub fn validate_slug(input: &str) -> Result<(), SlugError> {
    if input.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if input.len() > MAX_SLUG_LEN {
        return Err(SlugError::TooLong);
    }
    let valid = input
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
    if !valid {
        return Err(SlugError::InvalidCharacters {
            slug: input.to_string(),
        });
    }
    Ok(())
}

/// Derive a slug and suffix it (`-2`, `-3`, …) until `is_unique` accepts it.
pub async fn generate_unique_slug<F, Fut, E>(
    input: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_unique(base.clone())
        .await
        .map_err(SlugAsyncError::Predicate)?
    {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_unique(candidate.clone())
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}
