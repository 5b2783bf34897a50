//! Bearer credential pool with per-credential rolling quota windows.
//!
//! The pool is the only owner of quota state: callers hold [`CredentialLease`]
//! handles and go through pool operations to record use or invalidate.
//!
//! ```rust
//! use pprovider::CredentialPool;
//!
//! let pool = CredentialPool::new(["gsk-one", "gsk-two"]).expect("pool should build");
//! let lease = pool.acquire().expect("a credential should be available");
//! assert!(lease.expose().starts_with("gsk-"));
//!
//! pool.invalidate(lease.id()).expect("invalidate should work");
//! assert_eq!(pool.len().expect("len"), 1);
//! ```

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use pcommon::{Clock, SystemClock};
use rand::seq::SliceRandom;

use crate::{ProviderError, ProviderOperationHooks};

#[derive(PartialEq, Eq)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // SAFETY: zero bytes are valid UTF-8 and the string is never read again.
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

/// Stable handle of a credential inside one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CredentialId(usize);

impl CredentialId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for CredentialId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "credential-{}", self.0)
    }
}

/// A credential handed out by the pool for one request.
#[derive(Clone)]
pub struct CredentialLease {
    id: CredentialId,
    token: Arc<SecretString>,
}

impl CredentialLease {
    pub fn id(&self) -> CredentialId {
        self.id
    }

    pub fn expose(&self) -> &str {
        self.token.expose()
    }
}

impl std::fmt::Debug for CredentialLease {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialLease")
            .field("id", &self.id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub max_calls_per_window: u32,
    pub window: Duration,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            max_calls_per_window: 30,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct CredentialSlot {
    id: CredentialId,
    token: Arc<SecretString>,
    call_count: u32,
    // None until the first recorded use.
    window_start: Option<Instant>,
}

impl CredentialSlot {
    fn lease(&self) -> CredentialLease {
        CredentialLease {
            id: self.id,
            token: Arc::clone(&self.token),
        }
    }
}

pub struct CredentialPool {
    slots: Mutex<Vec<CredentialSlot>>,
    policy: QuotaPolicy,
    clock: Arc<dyn Clock>,
}

impl CredentialPool {
    pub fn new<I, S>(tokens: I) -> Result<Self, ProviderError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut slots = Vec::new();
        for (index, token) in tokens.into_iter().enumerate() {
            let token = SecretString::new(token.into().trim());
            if token.is_empty() {
                return Err(ProviderError::invalid_request(
                    "credential tokens must not be empty",
                ));
            }

            slots.push(CredentialSlot {
                id: CredentialId(index),
                token: Arc::new(token),
                call_count: 0,
                window_start: None,
            });
        }

        if slots.is_empty() {
            return Err(ProviderError::invalid_request(
                "credential pool requires at least one credential",
            ));
        }

        Ok(Self {
            slots: Mutex::new(slots),
            policy: QuotaPolicy::default(),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_policy(mut self, policy: QuotaPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> QuotaPolicy {
        self.policy
    }

    /// Number of credentials that have not been invalidated.
    pub fn len(&self) -> Result<usize, ProviderError> {
        Ok(self.slots()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ProviderError> {
        Ok(self.slots()?.is_empty())
    }

    /// Number of credentials currently under their quota.
    pub fn available(&self) -> Result<usize, ProviderError> {
        let slots = self.slots()?;
        Ok(slots.iter().filter(|slot| self.is_eligible(slot)).count())
    }

    /// Picks a credential under quota, uniformly at random among the eligible ones.
    ///
    /// Does not count as a use; see [`CredentialPool::acquire`].
    pub fn select_credential(&self) -> Result<CredentialLease, ProviderError> {
        let slots = self.slots()?;
        let index = self.pick_eligible(&slots)?;
        Ok(slots[index].lease())
    }

    /// Counts one call against the credential's window.
    ///
    /// Returns `false` when the credential is no longer in the pool.
    pub fn record_use(&self, lease: &CredentialLease) -> Result<bool, ProviderError> {
        let now = self.clock.now();
        let mut slots = self.slots()?;
        let Some(slot) = slots.iter_mut().find(|slot| slot.id == lease.id) else {
            return Ok(false);
        };

        Self::count_use(slot, now);
        Ok(true)
    }

    /// Selects and records use of a credential under one lock acquisition.
    pub fn acquire(&self) -> Result<CredentialLease, ProviderError> {
        let now = self.clock.now();
        let mut slots = self.slots()?;
        let index = self.pick_eligible(&slots)?;
        let slot = &mut slots[index];
        Self::count_use(slot, now);
        Ok(slot.lease())
    }

    /// Permanently removes a credential. Returns whether it was still present.
    pub fn invalidate(&self, id: CredentialId) -> Result<bool, ProviderError> {
        let mut slots = self.slots()?;
        let before = slots.len();
        slots.retain(|slot| slot.id != id);
        Ok(slots.len() != before)
    }

    /// Resets every credential whose window has elapsed. Returns how many were reset.
    pub fn sweep_expired_windows(&self) -> Result<usize, ProviderError> {
        let now = self.clock.now();
        let mut slots = self.slots()?;
        let mut reset = 0;

        for slot in slots.iter_mut() {
            let Some(window_start) = slot.window_start else {
                continue;
            };

            if now.saturating_duration_since(window_start) >= self.policy.window {
                slot.call_count = 0;
                slot.window_start = Some(now);
                reset += 1;
            }
        }

        Ok(reset)
    }

    fn count_use(slot: &mut CredentialSlot, now: Instant) {
        if slot.window_start.is_none() {
            slot.window_start = Some(now);
        }
        slot.call_count = slot.call_count.saturating_add(1);
    }

    fn is_eligible(&self, slot: &CredentialSlot) -> bool {
        slot.call_count < self.policy.max_calls_per_window
    }

    fn pick_eligible(&self, slots: &[CredentialSlot]) -> Result<usize, ProviderError> {
        if slots.is_empty() {
            return Err(ProviderError::credentials_exhausted(
                "no credentials remain in the pool",
            ));
        }

        let eligible = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| self.is_eligible(slot))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        eligible
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or_else(|| {
                ProviderError::quota_exhausted(format!(
                    "all {} credentials reached {} calls in the current window",
                    slots.len(),
                    self.policy.max_calls_per_window
                ))
            })
    }

    fn slots(&self) -> Result<MutexGuard<'_, Vec<CredentialSlot>>, ProviderError> {
        self.slots
            .lock()
            .map_err(|_| ProviderError::other("credential pool lock poisoned"))
    }
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("credentials", &self.len().unwrap_or_default())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Background task that resets expired quota windows on a fixed period.
///
/// The task stops when the sweeper is dropped.
#[derive(Debug)]
pub struct WindowSweeper {
    handle: tokio::task::JoinHandle<()>,
}

impl WindowSweeper {
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        pool: Arc<CredentialPool>,
        period: Duration,
        hooks: Arc<dyn ProviderOperationHooks>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match pool.sweep_expired_windows() {
                    Ok(reset) => hooks.on_windows_swept(reset),
                    Err(error) => hooks.on_failure("sweep", 1, &error),
                }
            }
        });

        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for WindowSweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
