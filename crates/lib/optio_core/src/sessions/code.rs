//! Session invite code generation.

use std::future::Future;

use rand::{Rng, rng};
use tracing::debug;

use super::SessionError;
use crate::store::{StoreError, StoreResult};

/// RFC 4648 base32 alphabet: no 0/1/8/9, so codes read aloud cleanly.
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Characters per code (40 bits).
pub const CODE_LENGTH: usize = 8;

/// Draws before giving up on finding a free code.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Generates short, human-friendly session codes.
#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    max_attempts: u32,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl CodeGenerator {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Draw a random code.
    pub fn generate_code(&self) -> String {
        let mut rng = rng();
        (0..CODE_LENGTH)
            .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
            .collect()
    }

    /// Draw codes until `is_active` reports one free.
    ///
    /// The answer is only true at the moment of the check; callers still need
    /// a uniqueness constraint behind the insert.
    pub async fn generate_unique_code<F, Fut>(&self, mut is_active: F) -> Result<String, SessionError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = StoreResult<bool>>,
    {
        self.claim_unique_code(|code| {
            let check = is_active(code.clone());
            async move { Ok::<_, StoreError>((!check.await?).then_some(code)) }
        })
        .await
    }

    /// Draw codes until `try_claim` takes one, returning what it produced.
    ///
    /// `Ok(None)` means the code was taken, whether seen by a lookup or by a
    /// unique constraint at insert, and costs one attempt like any other.
    pub async fn claim_unique_code<T, F, Fut>(&self, mut try_claim: F) -> Result<T, SessionError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = StoreResult<Option<T>>>,
    {
        for attempt in 1..=self.max_attempts {
            if let Some(claimed) = try_claim(self.generate_code()).await? {
                return Ok(claimed);
            }
            debug!(attempt, "session code collision");
        }
        Err(SessionError::CodeGenerationExhausted(self.max_attempts))
    }
}
