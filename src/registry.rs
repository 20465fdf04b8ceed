use std::sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicU64, Ordering},
};

use tracing::debug;

use crate::session::Session;

/// Tracks live sessions for broadcast without keeping them alive.
///
/// Entries are weak handles in join order. A session that has been torn down
/// simply fails to resolve and is pruned the next time the registry is
/// consulted, so a broadcast can never reach a dangling connection.
#[derive(Default)]
pub struct Registry {
    sessions: Mutex<Vec<Weak<Session>>>,
    registered: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a non-owning reference to `session` and returns its 1-based
    /// registration ordinal. Ordinals increase monotonically and are never
    /// reused, even after sessions disconnect.
    pub fn register(&self, session: &Arc<Session>) -> u64 {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.push(Arc::downgrade(session));
        self.registered.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Sends `message` to every session alive right now, as a priority send
    /// so it is not delayed behind a long echo backlog. Returns how many
    /// sessions it was delivered to.
    ///
    /// Live sessions are resolved under the lock, then `send` runs on the
    /// snapshot without it, so new connections can register mid-broadcast.
    /// They will not receive this message; neither will sessions that died
    /// before resolution.
    pub fn broadcast(&self, message: &str) -> usize {
        let live = self.snapshot();
        for session in &live {
            session.send(message, true);
        }
        debug!(delivered = live.len(), "broadcast");
        live.len()
    }

    /// Upgrades every entry, pruning the ones whose session is gone.
    fn snapshot(&self) -> Vec<Arc<Session>> {
        let mut sessions = self.sessions.lock().unwrap();
        let mut live = Vec::with_capacity(sessions.len());
        sessions.retain(|entry| match entry.upgrade() {
            Some(session) => {
                live.push(session);
                true
            }
            None => false,
        });
        live
    }
}
