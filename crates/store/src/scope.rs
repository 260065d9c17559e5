//! Transactional scope coordinator.

use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::{StoreError, TransactionalStore, UnitOfWork};

/// Runs a unit of work so that every write inside it commits or rolls back
/// together.
///
/// The work receives the open transaction handle explicitly; every gateway
/// call goes through it. Errors, timeouts and cancellation all roll back.
#[derive(Debug, Clone)]
pub struct TransactionScope<S> {
    store: S,
    timeout: Option<Duration>,
}

enum Abort {
    Timeout(Duration),
    Cancelled,
}

impl Abort {
    fn reason(&self) -> &'static str {
        match self {
            Abort::Timeout(_) => "timeout",
            Abort::Cancelled => "cancelled",
        }
    }

    fn into_error(self) -> StoreError {
        match self {
            Abort::Timeout(limit) => StoreError::Timeout(limit),
            Abort::Cancelled => StoreError::Cancelled,
        }
    }
}

impl<S: TransactionalStore> TransactionScope<S> {
    /// Creates a scope without a deadline.
    pub fn new(store: S) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Rolls back any unit of work still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs `work` in a fresh transaction and commits if it returns `Ok`.
    pub async fn execute<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<T, E>> + Send,
        T: Send,
        E: From<StoreError> + Send,
    {
        self.execute_until(std::future::pending::<()>(), work).await
    }

    /// Like [`execute`](Self::execute), but rolls back as soon as `cancel`
    /// resolves.
    #[tracing::instrument(skip_all)]
    pub async fn execute_until<T, E, F, C>(&self, cancel: C, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<T, E>> + Send,
        C: Future<Output = ()> + Send,
        T: Send,
        E: From<StoreError> + Send,
    {
        let mut tx = self.store.begin().await?;

        let outcome = {
            let run = work(&mut tx);
            let bounded = async {
                match self.timeout {
                    Some(limit) => tokio::time::timeout(limit, run)
                        .await
                        .map_err(|_| Abort::Timeout(limit)),
                    None => Ok(run.await),
                }
            };
            tokio::select! {
                result = bounded => result,
                _ = cancel => Err(Abort::Cancelled),
            }
        };

        match outcome {
            Ok(Ok(value)) => match tx.commit().await {
                Ok(()) => Ok(value),
                Err(err) => {
                    metrics::counter!("transaction_rollbacks_total", "reason" => "commit")
                        .increment(1);
                    tracing::warn!(error = %err, "Commit failed, transaction rolled back");
                    Err(err.into())
                }
            },
            Ok(Err(err)) => {
                rollback(tx, "error").await;
                Err(err)
            }
            Err(abort) => {
                rollback(tx, abort.reason()).await;
                Err(abort.into_error().into())
            }
        }
    }
}

async fn rollback<Tx: UnitOfWork>(tx: Tx, reason: &'static str) {
    metrics::counter!("transaction_rollbacks_total", "reason" => reason).increment(1);
    tracing::warn!(reason, "Rolling back transaction");
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "Rollback failed");
    }
}
