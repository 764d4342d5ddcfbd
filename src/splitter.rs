//! C8: the online shard split/merge state machine.
//!
//! A split moves a contiguous hash range from a source shard to a new
//! target shard without taking the whole system offline. The state machine
//! is deliberately conservative: each phase either completes within its
//! retry budget or the split aborts back to `Idle`, leaving the source shard
//! fully operational throughout.
//!
//! ```text
//! Idle -> Drain -> Pause -> Flush -> Handover -> Resume -> Idle
//!           \__________________abort_________________/
//! ```
//!
//! The actual event copy happens here, against the two persisters directly,
//! via `GetNextEventAfter` (`AccessManagerEventPersister::events_after`): a
//! batch is copied on every drain poll (so the backlog shrinks while new
//! writes keep landing on the source) and a final catch-up batch is copied
//! once writes are paused, before handover. `SplitTarget::handover_from` is
//! left to do only what it alone can: flip the target shard's routing table
//! to start serving the moved range, not replay the log itself.

use std::time::Duration;

use crate::error::{AccessManagerError, Result};
use crate::events::EventPosition;
use crate::ids::Identity;
use crate::persistence::AccessManagerEventPersister;

/// Phase of an in-progress split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPhase {
    /// No split in progress.
    Idle,
    /// Waiting for in-flight writes on the source shard to finish, while
    /// continuously copying newly-written events to the target.
    Drain,
    /// New writes to the moving range are rejected; only reads proceed.
    Pause,
    /// The source shard's in-memory event buffer is flushed to the
    /// persister so the final catch-up copy sees every write.
    Flush,
    /// The target shard takes ownership of the range now that every event
    /// up to the flushed position has been copied.
    Handover,
    /// Routing has moved to the target shard; the source shard resumes
    /// normal operation over its remaining range.
    Resume,
}

/// Retry budget for a phase's wait loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    /// Maximum number of polls before giving up.
    pub max_retries: u32,
    /// Delay between polls.
    pub interval: Duration,
}

impl RetryBudget {
    /// A new budget.
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self { max_retries, interval }
    }
}

/// Source-shard capabilities the splitter needs during a drain/flush/handover.
#[async_trait::async_trait]
pub trait SplitSource: Send + Sync {
    /// Whether all writes in flight when the drain began have completed.
    async fn drained(&self) -> Result<bool>;

    /// Stop accepting new writes to the moving range. Reads continue.
    async fn pause_operations(&self) -> Result<()>;

    /// Flush the in-memory event buffer to the persister, returning the
    /// position the final catch-up copy should read up to.
    async fn flush_event_buffers(&self) -> Result<EventPosition>;

    /// Resume normal read/write operation (over the shard's remaining
    /// range, once routing has moved).
    async fn resume_operations(&self) -> Result<()>;
}

/// Target-shard capabilities during handover.
#[async_trait::async_trait]
pub trait SplitTarget: Send + Sync {
    /// Take ownership of the moving range now that every event up to
    /// `position` has been copied into the target's persister. Flips the
    /// target shard's routing, it does not replay events itself.
    async fn handover_from(&self, position: EventPosition) -> Result<()>;
}

/// Drives one split from `Idle` to `Resume`, or aborts back to `Idle` if a
/// phase's retry budget is exhausted.
pub struct ShardSplitter {
    drain_budget: RetryBudget,
    flush_budget: RetryBudget,
    phase: SplitPhase,
}

impl ShardSplitter {
    /// A splitter with the given per-phase retry budgets, initially `Idle`.
    pub fn new(drain_budget: RetryBudget, flush_budget: RetryBudget) -> Self {
        Self { drain_budget, flush_budget, phase: SplitPhase::Idle }
    }

    /// Current phase.
    pub fn phase(&self) -> SplitPhase {
        self.phase
    }

    /// Run the full split, copying events from `source_persister` into
    /// `target_persister` as it goes. On any phase failure, resumes the
    /// source shard's normal operation and returns to `Idle` before
    /// propagating the error, so a failed split never leaves the source
    /// shard stuck mid-pause.
    #[allow(clippy::too_many_arguments)]
    pub async fn run<U, G, P, A, S, T>(
        &mut self,
        source: &S,
        target: &T,
        source_persister: &(dyn AccessManagerEventPersister<U, G, P, A> + Sync),
        target_persister: &(dyn AccessManagerEventPersister<U, G, P, A> + Sync),
    ) -> Result<()>
    where
        U: Identity,
        G: Identity,
        P: Identity,
        A: Identity,
        S: SplitSource,
        T: SplitTarget,
    {
        self.phase = SplitPhase::Drain;
        let mut copied_through = None;
        let drained = self
            .wait_for_drain(source, source_persister, target_persister, &mut copied_through)
            .await
            .map_err(|e| {
                e
            });
        let drained = match drained {
            Ok(d) => d,
            Err(e) => {
                self.abort(source).await;
                return Err(e);
            }
        };
        if !drained {
            self.abort(source).await;
            return Err(AccessManagerError::DrainTimeout(format!(
                "source did not drain within {} retries",
                self.drain_budget.max_retries
            )));
        }

        self.phase = SplitPhase::Pause;
        if let Err(e) = source.pause_operations().await {
            self.abort(source).await;
            return Err(e);
        }

        self.phase = SplitPhase::Flush;
        let flushed_position = match self.flush_with_retries(source).await {
            Ok(position) => position,
            Err(e) => {
                self.abort(source).await;
                return Err(e);
            }
        };

        if let Err(e) =
            self.copy_events(source_persister, target_persister, copied_through, Some(flushed_position)).await
        {
            self.abort(source).await;
            return Err(e);
        }

        self.phase = SplitPhase::Handover;
        if let Err(e) = target.handover_from(flushed_position).await {
            self.abort(source).await;
            return Err(e);
        }

        self.phase = SplitPhase::Resume;
        source.resume_operations().await?;
        self.phase = SplitPhase::Idle;
        Ok(())
    }

    /// Copy every event strictly after `after` from `source_persister` to
    /// `target_persister`, returning the position of the last copied event
    /// (or `after` unchanged if nothing new was found). `up_to`, when given,
    /// stops the copy at that position so a final catch-up copy doesn't pick
    /// up writes that landed after the flush it is meant to catch up to.
    async fn copy_events<U, G, P, A>(
        &self,
        source_persister: &(dyn AccessManagerEventPersister<U, G, P, A> + Sync),
        target_persister: &(dyn AccessManagerEventPersister<U, G, P, A> + Sync),
        after: Option<EventPosition>,
        up_to: Option<EventPosition>,
    ) -> Result<Option<EventPosition>>
    where
        U: Identity,
        G: Identity,
        P: Identity,
        A: Identity,
    {
        let batch = source_persister
            .events_after(after)
            .map_err(|e| AccessManagerError::NextEventRetrievalFailed(e.to_string()))?;
        let mut last = after;
        for recorded in batch {
            if let Some(up_to) = up_to {
                if recorded.position > up_to {
                    break;
                }
            }
            target_persister.create_event(recorded.event, recorded.event_id, recorded.position.tx_time)?;
            last = Some(recorded.position);
        }
        Ok(last)
    }

    async fn wait_for_drain<U, G, P, A, S: SplitSource>(
        &self,
        source: &S,
        source_persister: &(dyn AccessManagerEventPersister<U, G, P, A> + Sync),
        target_persister: &(dyn AccessManagerEventPersister<U, G, P, A> + Sync),
        copied_through: &mut Option<EventPosition>,
    ) -> Result<bool>
    where
        U: Identity,
        G: Identity,
        P: Identity,
        A: Identity,
    {
        for _ in 0..self.drain_budget.max_retries {
            *copied_through = self.copy_events(source_persister, target_persister, *copied_through, None).await?;
            if source.drained().await? {
                return Ok(true);
            }
            tokio::time::sleep(self.drain_budget.interval).await;
        }
        Ok(false)
    }

    async fn flush_with_retries<S: SplitSource>(&self, source: &S) -> Result<EventPosition> {
        let mut last_err = None;
        for _ in 0..self.flush_budget.max_retries {
            match source.flush_event_buffers().await {
                Ok(position) => return Ok(position),
                Err(e) => last_err = Some(e),
            }
            tokio::time::sleep(self.flush_budget.interval).await;
        }
        Err(last_err.unwrap_or_else(|| AccessManagerError::FlushFailed("no attempts made".into())))
    }

    async fn abort<S: SplitSource>(&mut self, source: &S) {
        let _ = source.resume_operations().await;
        self.phase = SplitPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AccessManagerEvent;
    use crate::persistence::InMemoryEventPersister;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct FlakySource {
        drained_after: u32,
        polls: AtomicU32,
        paused: Mutex<bool>,
        resumed: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl SplitSource for FlakySource {
        async fn drained(&self) -> Result<bool> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(n >= self.drained_after)
        }
        async fn pause_operations(&self) -> Result<()> {
            *self.paused.lock().unwrap() = true;
            Ok(())
        }
        async fn flush_event_buffers(&self) -> Result<EventPosition> {
            Ok(EventPosition { tx_time: crate::events::TransactionTime::from_micros(1), sequence: 0 })
        }
        async fn resume_operations(&self) -> Result<()> {
            *self.resumed.lock().unwrap() = true;
            Ok(())
        }
    }

    struct NoOpTarget;

    #[async_trait::async_trait]
    impl SplitTarget for NoOpTarget {
        async fn handover_from(&self, _position: EventPosition) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn split_completes_and_resumes_source() {
        let source = FlakySource {
            drained_after: 2,
            polls: AtomicU32::new(0),
            paused: Mutex::new(false),
            resumed: Mutex::new(false),
        };
        let target = NoOpTarget;
        let source_persister: InMemoryEventPersister<String, String, String, String> = InMemoryEventPersister::new();
        let target_persister: InMemoryEventPersister<String, String, String, String> = InMemoryEventPersister::new();
        let mut splitter = ShardSplitter::new(
            RetryBudget::new(10, Duration::from_millis(1)),
            RetryBudget::new(3, Duration::from_millis(1)),
        );
        splitter.run(&source, &target, &source_persister, &target_persister).await.unwrap();
        assert_eq!(splitter.phase(), SplitPhase::Idle);
        assert!(*source.paused.lock().unwrap());
        assert!(*source.resumed.lock().unwrap());
    }

    #[tokio::test]
    async fn drain_timeout_resumes_source_and_aborts() {
        let source = FlakySource {
            drained_after: 1000,
            polls: AtomicU32::new(0),
            paused: Mutex::new(false),
            resumed: Mutex::new(false),
        };
        let target = NoOpTarget;
        let source_persister: InMemoryEventPersister<String, String, String, String> = InMemoryEventPersister::new();
        let target_persister: InMemoryEventPersister<String, String, String, String> = InMemoryEventPersister::new();
        let mut splitter = ShardSplitter::new(
            RetryBudget::new(3, Duration::from_millis(1)),
            RetryBudget::new(3, Duration::from_millis(1)),
        );
        let err = splitter.run(&source, &target, &source_persister, &target_persister).await.unwrap_err();
        assert!(matches!(err, AccessManagerError::DrainTimeout(_)));
        assert_eq!(splitter.phase(), SplitPhase::Idle);
    }

    #[tokio::test]
    async fn events_written_before_the_split_are_copied_to_the_target() {
        let source = FlakySource {
            drained_after: 1,
            polls: AtomicU32::new(0),
            paused: Mutex::new(false),
            resumed: Mutex::new(false),
        };
        let target = NoOpTarget;
        let source_persister: InMemoryEventPersister<String, String, String, String> = InMemoryEventPersister::new();
        source_persister
            .create_event(
                AccessManagerEvent::UserAdd { user: "u1".into() },
                crate::events::EventId::generate(),
                crate::events::TransactionTime::now(),
            )
            .unwrap();
        let target_persister: InMemoryEventPersister<String, String, String, String> = InMemoryEventPersister::new();
        let mut splitter = ShardSplitter::new(
            RetryBudget::new(10, Duration::from_millis(1)),
            RetryBudget::new(3, Duration::from_millis(1)),
        );
        splitter.run(&source, &target, &source_persister, &target_persister).await.unwrap();
        assert_eq!(target_persister.len(), 1);
    }
}
