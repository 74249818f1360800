use std::time::Duration;

use bson::oid::ObjectId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::CascadeConfig;
use crate::errors::Result;
use crate::services::denormalize::{Denormalizer, MembershipDelta, PlayerChangeSet};

/// Follow-up work queued by a write and executed after it returns.
#[derive(Debug, Clone, PartialEq)]
pub enum CascadeJob {
    /// Re-derive the projections of every game the player belongs to.
    PlayerProjection {
        job_id: Uuid,
        player_id: ObjectId,
        fields: PlayerChangeSet,
    },
    /// Keep players' `gameIds` in step with a game's membership.
    PlayerGames {
        job_id: Uuid,
        game_id: ObjectId,
        delta: MembershipDelta,
    },
}

impl CascadeJob {
    pub fn player_projection(player_id: ObjectId, fields: PlayerChangeSet) -> Self {
        CascadeJob::PlayerProjection {
            job_id: Uuid::new_v4(),
            player_id,
            fields,
        }
    }

    pub fn player_games(game_id: ObjectId, delta: MembershipDelta) -> Self {
        CascadeJob::PlayerGames {
            job_id: Uuid::new_v4(),
            game_id,
            delta,
        }
    }

    pub fn job_id(&self) -> Uuid {
        match self {
            CascadeJob::PlayerProjection { job_id, .. } | CascadeJob::PlayerGames { job_id, .. } => *job_id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CascadeJob::PlayerProjection { .. } => "player_projection",
            CascadeJob::PlayerGames { .. } => "player_games",
        }
    }
}

#[derive(Clone)]
pub struct CascadeQueue {
    sender: mpsc::UnboundedSender<CascadeJob>,
}

impl CascadeQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CascadeJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Never blocks and never fails the caller.
    pub fn enqueue(&self, job: CascadeJob) {
        let job_id = job.job_id();
        let kind = job.kind();
        match self.sender.send(job) {
            Ok(()) => tracing::debug!(%job_id, kind, "cascade job queued"),
            Err(_) => tracing::error!(%job_id, kind, "❌ Cascade worker is gone, job dropped"),
        }
    }
}

pub struct CascadeWorker {
    receiver: mpsc::UnboundedReceiver<CascadeJob>,
    denormalizer: Denormalizer,
    config: CascadeConfig,
}

impl CascadeWorker {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<CascadeJob>,
        denormalizer: Denormalizer,
        config: CascadeConfig,
    ) -> Self {
        Self {
            receiver,
            denormalizer,
            config,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drains jobs in arrival order until every queue handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("🔄 Cascade worker started");
        while let Some(job) = self.receiver.recv().await {
            self.process(&job).await;
        }
        tracing::info!("Cascade worker stopped");
    }

    /// Runs whatever is queued right now, then returns.
    #[cfg(test)]
    pub async fn drain(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(job) = self.receiver.try_recv() {
            self.process(&job).await;
            processed += 1;
        }
        processed
    }

    async fn process(&self, job: &CascadeJob) {
        let job_id = job.job_id();
        let mut attempt: u32 = 0;
        loop {
            match self.execute(job).await {
                Ok(()) => {
                    tracing::debug!(%job_id, kind = job.kind(), attempt, "cascade job done");
                    return;
                }
                Err(e) if attempt < self.config.max_retries => {
                    let delay = retry_delay(self.config.backoff, attempt);
                    tracing::warn!(%job_id, kind = job.kind(), attempt, error = %e, "⚠️ Cascade job failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(%job_id, kind = job.kind(), attempt, error = %e, "❌ Cascade job abandoned");
                    return;
                }
            }
        }
    }

    async fn execute(&self, job: &CascadeJob) -> Result<()> {
        match job {
            CascadeJob::PlayerProjection { player_id, fields, .. } => {
                let rewritten = self.denormalizer.propagate_player(*player_id, fields).await?;
                tracing::info!(player_id = %player_id, games = rewritten, "Player projections propagated");
            }
            CascadeJob::PlayerGames { game_id, delta, .. } => {
                self.denormalizer.relink_player_games(*game_id, delta).await?;
                tracing::info!(
                    game_id = %game_id,
                    added = delta.added.len(),
                    removed = delta.removed.len(),
                    "Player game links updated"
                );
            }
        }
        Ok(())
    }
}

/// `base * 2^attempt`, saturating at `Duration::MAX`.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}
