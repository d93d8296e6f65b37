//! Transaction capability and scoped guard.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CrudError, Result};

/// Begin/commit/rollback on the storage connection.
///
/// Calls are synchronous so that [`TransactionScope`] can roll back from
/// `Drop`.
pub trait TransactionManager: Send + Sync {
    fn begin(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;
}

/// An open transaction that is rolled back unless explicitly resolved.
///
/// Dropping an unresolved scope (early return, `?`, unwinding) rolls the
/// transaction back.
#[must_use = "dropping a scope immediately rolls the transaction back"]
pub struct TransactionScope<'a> {
    manager: &'a dyn TransactionManager,
    open: bool,
}

impl<'a> TransactionScope<'a> {
    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns the manager's error if the transaction could not be opened.
    pub fn begin(manager: &'a dyn TransactionManager) -> Result<Self> {
        manager.begin()?;
        tracing::trace!("transaction opened");
        Ok(Self {
            manager,
            open: true,
        })
    }

    /// Commit and close the scope.
    ///
    /// # Errors
    ///
    /// Returns the manager's error; the scope then rolls back on drop.
    pub fn commit(mut self) -> Result<()> {
        self.try_commit()
    }

    /// Commit, keeping the scope open if the commit fails so the caller
    /// decides when to roll back.
    pub fn try_commit(&mut self) -> Result<()> {
        if !self.open {
            return Err(CrudError::Transaction("scope already closed".into()));
        }
        self.manager.commit()?;
        self.open = false;
        tracing::trace!("transaction committed");
        Ok(())
    }

    /// Roll back and close the scope.
    pub fn rollback(mut self) -> Result<()> {
        self.open = false;
        self.manager.rollback()?;
        tracing::trace!("transaction rolled back");
        Ok(())
    }

    /// Close the scope without committing or rolling back.
    ///
    /// The transaction stays open on the connection.
    pub fn release(mut self) {
        self.open = false;
        tracing::warn!("transaction released while still open");
    }

    /// Resolve the scope according to an early-return policy.
    pub fn finish_early(self, policy: EarlyReturnPolicy) -> Result<()> {
        match policy {
            EarlyReturnPolicy::Rollback => self.rollback(),
            EarlyReturnPolicy::Commit => self.commit(),
            EarlyReturnPolicy::LeaveOpen => {
                self.release();
                Ok(())
            }
        }
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = self.manager.rollback() {
                tracing::error!(error = %e, "rollback on drop failed");
            } else {
                tracing::debug!("transaction rolled back on drop");
            }
        }
    }
}

impl fmt::Debug for TransactionScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionScope")
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

/// What to do with the open transaction when a hook short-circuits the
/// update with its own response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyReturnPolicy {
    /// Discard any writes made so far.
    #[default]
    Rollback,
    /// Keep writes made so far.
    Commit,
    /// Neither commit nor roll back; the caller owns the transaction.
    LeaveOpen,
}

impl FromStr for EarlyReturnPolicy {
    type Err = CrudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "rollback" => Ok(Self::Rollback),
            "commit" => Ok(Self::Commit),
            "leave_open" => Ok(Self::LeaveOpen),
            other => Err(CrudError::InvalidConfig(format!(
                "unknown early-return policy '{other}' (expected rollback, commit or leave-open)"
            ))),
        }
    }
}

impl fmt::Display for EarlyReturnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rollback => "rollback",
            Self::Commit => "commit",
            Self::LeaveOpen => "leave-open",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        begins: AtomicUsize,
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
        refuse_commit: bool,
    }

    impl TransactionManager for Counting {
        fn begin(&self) -> Result<()> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn commit(&self) -> Result<()> {
            if self.refuse_commit {
                return Err(CrudError::Transaction("serialization failure".into()));
            }
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn rollback(&self) -> Result<()> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Counting {
        fn counts(&self) -> (usize, usize, usize) {
            (
                self.begins.load(Ordering::SeqCst),
                self.commits.load(Ordering::SeqCst),
                self.rollbacks.load(Ordering::SeqCst),
            )
        }
    }

    #[test]
    fn test_commit_does_not_roll_back_on_drop() {
        let tx = Counting::default();
        TransactionScope::begin(&tx).unwrap().commit().unwrap();
        assert_eq!(tx.counts(), (1, 1, 0));
    }

    #[test]
    fn test_drop_rolls_back_once() {
        let tx = Counting::default();
        {
            let _scope = TransactionScope::begin(&tx).unwrap();
        }
        assert_eq!(tx.counts(), (1, 0, 1));
    }

    #[test]
    fn test_explicit_rollback_is_not_repeated_on_drop() {
        let tx = Counting::default();
        TransactionScope::begin(&tx).unwrap().rollback().unwrap();
        assert_eq!(tx.counts(), (1, 0, 1));
    }

    #[test]
    fn test_failed_try_commit_keeps_scope_open() {
        let tx = Counting {
            refuse_commit: true,
            ..Default::default()
        };
        let mut scope = TransactionScope::begin(&tx).unwrap();

        assert!(scope.try_commit().is_err());
        assert_eq!(tx.counts(), (1, 0, 0));

        scope.rollback().unwrap();
        assert_eq!(tx.counts(), (1, 0, 1));
    }

    #[test]
    fn test_release_leaves_transaction_open() {
        let tx = Counting::default();
        TransactionScope::begin(&tx).unwrap().release();
        assert_eq!(tx.counts(), (1, 0, 0));
    }

    #[test]
    fn test_finish_early_follows_policy() {
        let tx = Counting::default();
        TransactionScope::begin(&tx)
            .unwrap()
            .finish_early(EarlyReturnPolicy::Commit)
            .unwrap();
        TransactionScope::begin(&tx)
            .unwrap()
            .finish_early(EarlyReturnPolicy::Rollback)
            .unwrap();
        TransactionScope::begin(&tx)
            .unwrap()
            .finish_early(EarlyReturnPolicy::LeaveOpen)
            .unwrap();
        assert_eq!(tx.counts(), (3, 1, 1));
    }

    #[test]
    fn test_policy_parses() {
        assert_eq!(
            "leave-open".parse::<EarlyReturnPolicy>().unwrap(),
            EarlyReturnPolicy::LeaveOpen
        );
        assert_eq!(
            "COMMIT".parse::<EarlyReturnPolicy>().unwrap(),
            EarlyReturnPolicy::Commit
        );
        assert!("sometimes".parse::<EarlyReturnPolicy>().is_err());
        assert_eq!(EarlyReturnPolicy::default(), EarlyReturnPolicy::Rollback);
    }
}
