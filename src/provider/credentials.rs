use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Round-robin credential selection with exponential cooldown (spec §4.1).
///
/// A credential that returns `rate_limit` or `auth_error` is placed on a
/// cooldown deadline, doubling on each consecutive failure and capped at 10
/// minutes; a successful use resets its cooldown and failure streak. This is
/// the per-provider exclusive critical section called out in spec §5 — state
/// is `Mutex`-guarded but every operation inside is O(1), so no suspension
/// point is ever reached while the lock is held.
pub struct CredentialPool {
    secrets: Vec<String>,
    state: Mutex<Vec<CredentialState>>,
    cursor: AtomicU32,
}

#[derive(Clone, Copy)]
struct CredentialState {
    cooldown_until: Option<Instant>,
    consecutive_failures: u32,
}

const BASE_COOLDOWN: Duration = Duration::from_secs(1);
const MAX_COOLDOWN: Duration = Duration::from_secs(10 * 60);

impl CredentialPool {
    pub fn new(secrets: Vec<String>) -> Self {
        let state = vec![
            CredentialState {
                cooldown_until: None,
                consecutive_failures: 0,
            };
            secrets.len()
        ];
        Self {
            secrets,
            state: Mutex::new(state),
            cursor: AtomicU32::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Select the next credential not currently in cooldown, round-robin.
    /// Returns `None` only when every credential is on cooldown.
    pub fn select(&self) -> Option<(usize, &str)> {
        if self.secrets.is_empty() {
            return None;
        }
        let now = Instant::now();
        let n = self.secrets.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) as usize;
        let state = self.state.lock().expect("credential pool mutex poisoned");
        for offset in 0..n {
            let idx = (start + offset) % n;
            let available = state[idx]
                .cooldown_until
                .map(|deadline| now >= deadline)
                .unwrap_or(true);
            if available {
                return Some((idx, self.secrets[idx].as_str()));
            }
        }
        None
    }

    /// Reset cooldown and failure streak after a successful call.
    pub fn record_success(&self, idx: usize) {
        let mut state = self.state.lock().expect("credential pool mutex poisoned");
        if let Some(s) = state.get_mut(idx) {
            s.cooldown_until = None;
            s.consecutive_failures = 0;
        }
    }

    /// Place a credential on cooldown after `rate_limit` or `auth_error`,
    /// doubling the window per consecutive failure, capped at 10 minutes.
    pub fn record_failure(&self, idx: usize) {
        let mut state = self.state.lock().expect("credential pool mutex poisoned");
        if let Some(s) = state.get_mut(idx) {
            s.consecutive_failures = s.consecutive_failures.saturating_add(1);
            let backoff = BASE_COOLDOWN
                .saturating_mul(1 << s.consecutive_failures.min(10))
                .min(MAX_COOLDOWN);
            s.cooldown_until = Some(Instant::now() + backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_cycles_through_credentials() {
        let pool = CredentialPool::new(vec!["a".into(), "b".into()]);
        let (idx1, _) = pool.select().unwrap();
        let (idx2, _) = pool.select().unwrap();
        assert_ne!(idx1, idx2);
    }

    #[test]
    fn failed_credential_goes_on_cooldown() {
        let pool = CredentialPool::new(vec!["only".into()]);
        let (idx, _) = pool.select().unwrap();
        pool.record_failure(idx);
        assert!(pool.select().is_none());
    }

    #[test]
    fn success_resets_cooldown() {
        let pool = CredentialPool::new(vec!["only".into()]);
        let (idx, _) = pool.select().unwrap();
        pool.record_failure(idx);
        pool.record_success(idx);
        assert!(pool.select().is_some());
    }

    #[test]
    fn empty_pool_selects_none() {
        let pool = CredentialPool::new(vec![]);
        assert!(pool.select().is_none());
    }
}
