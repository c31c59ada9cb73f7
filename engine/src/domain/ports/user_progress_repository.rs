//! Port for per-user progression state and the XP ledger.
//!
//! The ledger and the cached total live behind one port because every grant
//! writes both in a single transaction, together with the achievement log
//! entries describing the grant.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AchievementLogEntry, UserId, UserProgress, XpLogEntry};

use super::define_port_error;

define_port_error! {
    /// Errors raised by progression repository adapters.
    pub enum UserProgressRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "progress repository connection failed: {message}"; transient,
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "progress repository query failed: {message}",
        /// Optimistic concurrency check failed.
        RevisionMismatch { expected: u32, actual: u32 } =>
            "revision mismatch: expected {expected}, found {actual}",
    }
}

/// Everything written atomically for one XP grant.
#[derive(Debug, Clone, PartialEq)]
pub struct XpGrantCommit {
    /// Ledger row to append.
    pub entry: XpLogEntry,
    /// Successor progress state; its revision is already incremented.
    pub progress: UserProgress,
    /// Revision read before computing `progress`; `None` for a first grant.
    pub expected_revision: Option<u32>,
    /// Achievement log rows describing the grant.
    pub achievements: Vec<AchievementLogEntry>,
}

/// Result of recomputing a user's total from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalReconciliation {
    /// Counter value before reconciliation.
    pub recorded_total: i64,
    /// Sum of all ledger entries, now stored in the counter.
    pub ledger_total: i64,
}

impl TotalReconciliation {
    /// Whether the counter had diverged from the ledger.
    #[must_use]
    pub const fn drifted(&self) -> bool {
        self.recorded_total != self.ledger_total
    }
}

/// Port for progression state storage.
///
/// # Revision Semantics
///
/// - The first grant inserts progress at revision 1 with
///   `expected_revision: None`; if a row already exists the commit fails
///   with [`UserProgressRepositoryError::RevisionMismatch`].
/// - Later grants must present the revision they read; the adapter applies
///   the commit only when the stored revision still matches.
/// - A failed revision check writes nothing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserProgressRepository: Send + Sync {
    /// Fetch progress for a user; `None` until their first grant.
    async fn find_progress(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserProgress>, UserProgressRepositoryError>;

    /// Append the ledger entry, store the new progress and append the
    /// achievement rows in one transaction.
    async fn commit_xp_grant(&self, commit: &XpGrantCommit)
    -> Result<(), UserProgressRepositoryError>;

    /// Recompute the cached total from the ledger and repair it if needed.
    async fn reconcile_total(
        &self,
        user_id: &UserId,
    ) -> Result<TotalReconciliation, UserProgressRepositoryError>;

    /// Users whose last activity is at or after `since`.
    async fn list_active_users(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<UserId>, UserProgressRepositoryError>;

    /// Zero the streak of every user inactive since before `active_since`.
    ///
    /// Returns the number of streaks reset.
    async fn reset_lapsed_streaks(
        &self,
        active_since: DateTime<Utc>,
    ) -> Result<u64, UserProgressRepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn revision_mismatch_error_formats_correctly() {
        let error = UserProgressRepositoryError::revision_mismatch(2_u32, 5_u32);
        let message = error.to_string();

        assert!(message.contains("expected 2"));
        assert!(message.contains("found 5"));
        assert!(!error.is_transient());
    }

    #[rstest]
    #[case(10, 10, false)]
    #[case(10, 15, true)]
    fn reconciliation_reports_drift(
        #[case] recorded_total: i64,
        #[case] ledger_total: i64,
        #[case] drifted: bool,
    ) {
        let outcome = TotalReconciliation {
            recorded_total,
            ledger_total,
        };
        assert_eq!(outcome.drifted(), drifted);
    }
}
