use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::Session;

use crate::clock::Clock;
use crate::error::BookingError;
use crate::models::{utc_of, Countdown, Lock, LockRequest};
use crate::services::backend::BookingBackend;

#[derive(Debug, Clone, PartialEq)]
pub struct HeldLock {
    pub lock: Lock,
    pub expires_at: DateTime<Utc>,
}

impl HeldLock {
    pub fn id(&self) -> Uuid {
        self.lock.id
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Single source of truth for the session's reservation.
#[derive(Debug, Clone, PartialEq)]
pub enum LockState {
    Idle,
    Requesting {
        vet_id: Uuid,
        start: DateTime<FixedOffset>,
        duration_minutes: u32,
    },
    Held(HeldLock),
    Releasing {
        lock_id: Uuid,
    },
    /// The countdown ran out. Same as `Idle` except for what the user is told.
    Expired,
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTick {
    Inactive,
    Remaining(Countdown),
    Expired { lock_id: Uuid },
}

pub struct LockNegotiator {
    backend: Arc<dyn BookingBackend>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: LockState,
}

impl LockNegotiator {
    pub fn new(backend: Arc<dyn BookingBackend>, clock: Arc<dyn Clock>, ttl_seconds: i64) -> Self {
        Self {
            backend,
            clock,
            ttl: Duration::seconds(ttl_seconds),
            state: LockState::Idle,
        }
    }

    pub fn state(&self) -> &LockState {
        &self.state
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The held lock, unless its expiry has already passed.
    pub fn held(&self) -> Option<&HeldLock> {
        match &self.state {
            LockState::Held(held) if !held.is_expired(self.clock.now()) => Some(held),
            _ => None,
        }
    }

    pub fn countdown(&self) -> Option<Countdown> {
        self.held().map(|held| Countdown {
            lock_id: held.id(),
            remaining_seconds: held.remaining_seconds(self.clock.now()),
        })
    }

    /// Reserves `start` with `vet_id`, releasing any lock already held first.
    ///
    /// On rejection the negotiator is back in `Idle` and the error carries the
    /// backend's message.
    pub async fn acquire(
        &mut self,
        session: &Session,
        vet_id: Uuid,
        start: DateTime<FixedOffset>,
        duration_minutes: u32,
    ) -> Result<HeldLock, BookingError> {
        self.release(session).await;

        debug!("Requesting lock for vet {} at {} ({} min)", vet_id, start, duration_minutes);
        self.state = LockState::Requesting { vet_id, start, duration_minutes };

        let request = LockRequest {
            vet_id,
            appointment_time: start,
            duration_minutes,
        };

        match self.backend.create_lock(session, &request).await {
            Ok(lock) => {
                let expires_at = self.expiry_for(&lock);
                info!("Lock {} held until {}", lock.id, expires_at);
                let held = HeldLock { lock, expires_at };
                self.state = LockState::Held(held.clone());
                Ok(held)
            }
            Err(e) => {
                warn!("Lock request for vet {} at {} rejected: {}", vet_id, start, e);
                self.state = LockState::Idle;
                Err(BookingError::lock_rejected(&e))
            }
        }
    }

    /// Best-effort release. Always ends in `Idle`; returns whether a delete
    /// request was sent.
    pub async fn release(&mut self, session: &Session) -> bool {
        let lock_id = match std::mem::replace(&mut self.state, LockState::Idle) {
            LockState::Held(held) => held.id(),
            LockState::Releasing { lock_id } => lock_id,
            _ => return false,
        };

        self.state = LockState::Releasing { lock_id };
        debug!("Releasing lock {}", lock_id);

        if let Err(e) = self.backend.release_lock(session, lock_id).await {
            warn!("Failed to release lock {}, leaving it to expire server-side: {}", lock_id, e);
        }

        self.state = LockState::Idle;
        true
    }

    /// Recomputes the countdown from the stored expiry. Moves `Held` to
    /// `Expired` once it reaches zero.
    pub fn tick(&mut self) -> LockTick {
        let now = self.clock.now();
        match &self.state {
            LockState::Held(held) if held.is_expired(now) => {
                let lock_id = held.id();
                info!("Lock {} expired", lock_id);
                self.state = LockState::Expired;
                LockTick::Expired { lock_id }
            }
            LockState::Held(held) => LockTick::Remaining(Countdown {
                lock_id: held.id(),
                remaining_seconds: held.remaining_seconds(now),
            }),
            _ => LockTick::Inactive,
        }
    }

    /// The backend consumed the lock when it created the appointment.
    pub fn consume(&mut self) {
        if let LockState::Held(held) = &self.state {
            debug!("Lock {} consumed by booking", held.id());
        }
        self.state = LockState::Idle;
    }

    pub fn acknowledge_expiry(&mut self) {
        if self.state == LockState::Expired {
            self.state = LockState::Idle;
        }
    }

    /// Adopts the session's live server-side lock, if any.
    pub async fn resume(&mut self, session: &Session) -> Result<Option<HeldLock>, BookingError> {
        if matches!(self.state, LockState::Held(_)) {
            return Ok(self.held().cloned());
        }

        let Some(lock) = self.backend.current_lock(session).await? else {
            debug!("No lock to resume");
            return Ok(None);
        };

        let expires_at = self.expiry_for(&lock);
        if expires_at <= self.clock.now() {
            debug!("Ignoring expired lock {}", lock.id);
            return Ok(None);
        }

        info!("Resumed lock {} held until {}", lock.id, expires_at);
        let held = HeldLock { lock, expires_at };
        self.state = LockState::Held(held.clone());
        Ok(Some(held))
    }

    fn expiry_for(&self, lock: &Lock) -> DateTime<Utc> {
        lock.expires_at
            .as_ref()
            .map(utc_of)
            .unwrap_or_else(|| self.clock.now() + self.ttl)
    }
}
