//! Project key derivation.
//!
//! A key is the first three characters of the business area and of the project name,
//! upper-cased and joined by an underscore: `("Foundation", "Finance")` gives `FIN_FOU`.

use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::{BitbucketError, Result};

/// Characters taken from each input.
pub const KEY_PART_LEN: usize = 3;

/// Numeric suffixes tried once random permutations are exhausted.
pub const MAX_KEY_SUFFIX: usize = 99;

static PROJECT_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("valid project key regex"));

/// True if `key` is a valid Bitbucket project key.
pub fn is_valid_project_key(key: &str) -> bool {
    PROJECT_KEY.is_match(key)
}

/// The upper-cased first [`KEY_PART_LEN`] characters of `input`.
///
/// Rejects input that is too short or whose leading characters are not ASCII letters or
/// digits, so the resulting key is always well-formed.
fn key_part(input: &str, what: &str) -> Result<String> {
    let trimmed = input.trim();
    let part: String = trimmed.chars().take(KEY_PART_LEN).collect();

    if part.chars().count() < KEY_PART_LEN {
        return Err(BitbucketError::InvalidProjectKey {
            message: format!(
                "{} '{}' must have at least {} characters",
                what, trimmed, KEY_PART_LEN
            ),
        });
    }
    if !part.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(BitbucketError::InvalidProjectKey {
            message: format!(
                "{} '{}' must start with {} ASCII letters or digits",
                what, trimmed, KEY_PART_LEN
            ),
        });
    }
    Ok(part.to_ascii_uppercase())
}

fn join_key(business: &str, project: &str) -> Result<String> {
    let key = format!("{}_{}", business, project);
    if !is_valid_project_key(&key) {
        return Err(BitbucketError::InvalidProjectKey {
            message: format!("'{}' must start with a letter", key),
        });
    }
    Ok(key)
}

/// Derive the deterministic project key for a project and business area.
pub fn generate_project_key(project_name: &str, business_area: &str) -> Result<String> {
    let business = key_part(business_area, "Business area")?;
    let project = key_part(project_name, "Project name")?;
    join_key(&business, &project)
}

/// Derive a key from a random permutation of the project name's letters and digits.
pub fn permuted_project_key<R: Rng + ?Sized>(
    project_name: &str,
    business_area: &str,
    rng: &mut R,
) -> Result<String> {
    let business = key_part(business_area, "Business area")?;
    let mut pool: Vec<char> = project_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    pool.shuffle(rng);

    let shuffled: String = pool.into_iter().collect();
    let project = key_part(&shuffled, "Project name")?;
    join_key(&business, &project)
}

/// Find a project key for which `exists` reports false.
///
/// Tries the deterministic key first, then up to `max_attempts` random permutations of the
/// project name, then the deterministic key with a numeric suffix (`FIN_FOU1`, `FIN_FOU2`,
/// ...). A candidate already found to exist is never checked or returned again.
pub fn generate_unique_project_key<R, F>(
    project_name: &str,
    business_area: &str,
    rng: &mut R,
    max_attempts: usize,
    mut exists: F,
) -> Result<String>
where
    R: Rng + ?Sized,
    F: FnMut(&str) -> Result<bool>,
{
    let original = generate_project_key(project_name, business_area)?;
    if !exists(&original)? {
        return Ok(original);
    }

    let mut taken = HashSet::from([original.clone()]);

    for _ in 0..max_attempts {
        let candidate = permuted_project_key(project_name, business_area, rng)?;
        if taken.contains(&candidate) {
            continue;
        }
        if !exists(&candidate)? {
            return Ok(candidate);
        }
        tracing::debug!(key = %candidate, "permuted project key already exists");
        taken.insert(candidate);
    }

    for suffix in 1..=MAX_KEY_SUFFIX {
        let candidate = format!("{}{}", original, suffix);
        if !taken.contains(&candidate) && !exists(&candidate)? {
            return Ok(candidate);
        }
    }

    Err(BitbucketError::KeyGenerationExhausted {
        prefix: original,
        attempts: max_attempts + MAX_KEY_SUFFIX,
    })
}
