use crate::audio_store::AudioStore;
use crate::error::handle_error;
use crate::session_store::SessionStore;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Task that expires sessions whose calls went quiet without a final event.
pub async fn reap_idle_sessions(sessions: Arc<SessionStore>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let expired = sessions.expire_idle();
        if expired > 0 {
            info!(expired, active = sessions.len(), "reaped idle sessions");
        }
    }
}

/// Task that deletes served and stale audio artifacts.
pub async fn reclaim_audio(audio: Arc<AudioStore>, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match audio.reclaim().await {
            Ok(0) => (),
            Ok(removed) => debug!(removed, dir=?audio.dir(), "reclaimed audio artifacts"),
            Err(e) => handle_error(&e, "failed to reclaim audio artifacts"),
        }
    }
}
