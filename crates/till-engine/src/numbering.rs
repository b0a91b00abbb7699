//! # Business Identifier Assignment
//!
//! Runs a commit attempt under a transaction or cart number and retries
//! with a fresh number when the UNIQUE column rejects it.
//!
//! ```text
//! supplied number?
//!   ├── yes ─► one attempt ─► collision ─► CONFLICT (never regenerated)
//!   └── no  ─► next() ─► attempt ─► collision ─► next() ─► ... ─► CONFLICT
//!                                                after max_attempts
//! ```
//!
//! An attempt owns its unit of work: by the time it reports a collision the
//! unit of work has been rolled back, so a retry starts from clean state.

use std::future::Future;

use till_core::{CoreError, IdentifierKind, IdentifierSource};
use till_db::DbError;
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// How one commit attempt ended, when it didn't succeed.
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// The identifier was already taken. Nothing was written.
    Collision,
    Failed(EngineError),
}

impl AttemptError {
    /// Classifies an insert failure: a UNIQUE hit on `kind`'s column is a
    /// collision, anything else a plain failure.
    pub(crate) fn from_insert(kind: IdentifierKind, err: DbError) -> Self {
        if err.is_unique_violation_on(kind.column()) {
            AttemptError::Collision
        } else {
            AttemptError::Failed(err.into())
        }
    }
}

impl From<EngineError> for AttemptError {
    fn from(err: EngineError) -> Self {
        AttemptError::Failed(err)
    }
}

impl From<DbError> for AttemptError {
    fn from(err: DbError) -> Self {
        AttemptError::Failed(err.into())
    }
}

impl From<CoreError> for AttemptError {
    fn from(err: CoreError) -> Self {
        AttemptError::Failed(err.into())
    }
}

/// Runs `attempt` with a supplied or generated identifier until it commits,
/// fails for another reason, or the attempt budget is spent.
pub(crate) async fn with_identifier<T, F, Fut>(
    ids: &dyn IdentifierSource,
    kind: IdentifierKind,
    supplied: Option<&str>,
    max_attempts: u32,
    mut attempt: F,
) -> EngineResult<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    if let Some(number) = supplied {
        return match attempt(number.to_string()).await {
            Ok(value) => Ok(value),
            Err(AttemptError::Collision) => {
                warn!(kind = ?kind, number = %number, "Supplied identifier already in use");
                Err(conflict(kind, number))
            }
            Err(AttemptError::Failed(err)) => Err(err),
        };
    }

    let max_attempts = max_attempts.max(1);
    let mut last = String::new();

    for tries in 1..=max_attempts {
        let number = ids.next(kind);
        match attempt(number.clone()).await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Collision) => {
                warn!(kind = ?kind, number = %number, attempt = tries, max_attempts, "Identifier collision, retrying");
                last = number;
            }
            Err(AttemptError::Failed(err)) => return Err(err),
        }
    }

    warn!(kind = ?kind, max_attempts, "Identifier attempts exhausted");
    Err(conflict(kind, &last))
}

fn conflict(kind: IdentifierKind, number: &str) -> EngineError {
    EngineError::Conflict {
        field: kind.column().to_string(),
        value: number.to_string(),
    }
}
