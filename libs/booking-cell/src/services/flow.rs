use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_backend::BackendClient;
use shared_config::AppConfig;
use shared_models::Session;

use crate::clock::{Clock, SystemClock};
use crate::error::BookingError;
use crate::models::{AppointmentType, BookingConfirmation, BookingForm, Countdown, Slot};
use crate::services::availability::AvailabilityService;
use crate::services::backend::{BookingBackend, RestBookingBackend};
use crate::services::lock::{LockNegotiator, LockState, LockTick};
use crate::services::submit::BookingSubmitter;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowNotice {
    Booked(String),
    Validation(String),
    SlotsUnavailable(String),
    LockRejected(String),
    LockExpired(String),
    SlotTaken(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Idle,
    Requesting,
    Held { lock_id: Uuid, remaining_seconds: i64 },
    Releasing,
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSnapshot {
    pub form: BookingForm,
    pub slots: Vec<Slot>,
    pub slots_error: Option<String>,
    pub lock: LockStatus,
    pub notice: Option<FlowNotice>,
    pub busy: bool,
    pub can_submit: bool,
}

struct FlowState {
    session: Session,
    clinic_id: Uuid,
    form: BookingForm,
    slots: Vec<Slot>,
    slots_error: Option<String>,
    notice: Option<FlowNotice>,
    negotiator: LockNegotiator,
    availability: AvailabilityService,
    submitter: BookingSubmitter,
    closed: bool,
    published: Arc<RwLock<FlowSnapshot>>,
}

impl FlowState {
    fn ensure_open(&self) -> Result<(), BookingError> {
        if self.closed {
            Err(BookingError::Closed)
        } else {
            Ok(())
        }
    }

    async fn refresh_slots(&mut self) -> Result<Vec<Slot>, BookingError> {
        let Some((vet_id, date, appointment_type)) = self.form.availability_inputs() else {
            self.slots.clear();
            self.slots_error = None;
            return Ok(Vec::new());
        };

        match self.availability
            .available_slots(&self.session, vet_id, date, appointment_type)
            .await
        {
            Ok(slots) => {
                self.slots = slots.clone();
                self.slots_error = None;
                Ok(slots)
            }
            Err(e) => {
                self.slots.clear();
                self.slots_error = Some(e.to_string());
                self.notice = Some(FlowNotice::SlotsUnavailable(e.to_string()));
                Err(e)
            }
        }
    }

    /// Releases any held lock, applies the change, and re-fetches
    /// availability when it depends on what changed.
    async fn change_selection(
        &mut self,
        apply: impl FnOnce(&mut BookingForm),
        refetch: bool,
    ) -> Result<Vec<Slot>, BookingError> {
        self.ensure_open()?;

        self.negotiator.release(&self.session).await;
        self.negotiator.acknowledge_expiry();
        self.notice = None;

        apply(&mut self.form);
        self.form.clear_slot();

        if refetch {
            self.refresh_slots().await
        } else {
            Ok(self.slots.clone())
        }
    }

    async fn select_time(&mut self, slot: Slot) -> Result<Countdown, BookingError> {
        self.ensure_open()?;

        let Some((vet_id, date, appointment_type)) = self.form.availability_inputs() else {
            return Err(BookingError::Validation(
                "Please select a vet, appointment type and date first.".to_string(),
            ));
        };

        if !self.slots.contains(&slot) {
            return Err(BookingError::Validation(format!("{} is not an available time slot.", slot)));
        }

        let start = slot
            .on(date, self.availability.offset())
            .ok_or_else(|| BookingError::Validation(format!("{} does not exist on {}", slot, date)))?;

        self.notice = None;
        self.negotiator.acknowledge_expiry();
        self.form.time = Some(slot);

        match self.negotiator
            .acquire(&self.session, vet_id, start, appointment_type.duration_minutes())
            .await
        {
            Ok(held) => Ok(Countdown {
                lock_id: held.id(),
                remaining_seconds: held.remaining_seconds(self.negotiator.now()),
            }),
            Err(e) => {
                self.form.clear_slot();
                self.notice = Some(FlowNotice::LockRejected(e.to_string()));
                if let Err(refresh_error) = self.refresh_slots().await {
                    debug!("Slot refresh after lock rejection failed: {}", refresh_error);
                }
                Err(e)
            }
        }
    }

    async fn submit(&mut self) -> Result<BookingConfirmation, BookingError> {
        self.ensure_open()?;

        let result = self.submitter
            .submit(&self.session, self.clinic_id, &mut self.form, &mut self.negotiator)
            .await;

        match &result {
            Ok(confirmation) => {
                self.notice = Some(FlowNotice::Booked(confirmation.message.clone()));
            }
            Err(BookingError::SlotTaken) => {
                self.notice = Some(FlowNotice::SlotTaken(BookingError::SlotTaken.to_string()));
                if let Err(refresh_error) = self.refresh_slots().await {
                    debug!("Slot refresh after conflict failed: {}", refresh_error);
                }
            }
            Err(BookingError::Validation(message)) => {
                self.notice = Some(FlowNotice::Validation(message.clone()));
            }
            Err(e) => {
                self.notice = Some(FlowNotice::Error(e.to_string()));
            }
        }

        result
    }

    fn tick(&mut self) -> LockTick {
        if self.closed {
            return LockTick::Inactive;
        }

        let tick = self.negotiator.tick();
        if let LockTick::Expired { .. } = tick {
            self.form.clear_slot();
            self.notice = Some(FlowNotice::LockExpired(BookingError::LockExpired.to_string()));
            self.publish();
        }
        tick
    }

    async fn resume(&mut self) -> Result<Option<Countdown>, BookingError> {
        self.ensure_open()?;

        let Some(held) = self.negotiator.resume(&self.session).await? else {
            return Ok(None);
        };

        let (date, slot) = Slot::of_instant(&held.lock.appointment_time, self.availability.offset());
        self.form.vet_id = Some(held.lock.vet_id);
        self.form.date = Some(date);
        self.form.time = Some(slot);
        if let Some(appointment_type) = held.lock.duration_minutes.and_then(AppointmentType::from_duration) {
            self.form.appointment_type = Some(appointment_type);
        }

        Ok(Some(Countdown {
            lock_id: held.id(),
            remaining_seconds: held.remaining_seconds(self.negotiator.now()),
        }))
    }

    async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.negotiator.release(&self.session).await {
            info!("Released lock while closing booking flow");
        }
        self.publish();
    }

    fn has_lock_to_release(&self) -> bool {
        matches!(
            self.negotiator.state(),
            LockState::Held(_) | LockState::Releasing { .. } | LockState::Requesting { .. }
        )
    }

    /// Stores the current idle view for readers that can't wait for the mutex.
    fn publish(&self) {
        let snapshot = self.snapshot(false);
        *self.published.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot;
    }

    fn snapshot(&self, busy: bool) -> FlowSnapshot {
        let lock = match self.negotiator.state() {
            LockState::Idle => LockStatus::Idle,
            LockState::Requesting { .. } => LockStatus::Requesting,
            LockState::Held(held) => LockStatus::Held {
                lock_id: held.id(),
                remaining_seconds: held.remaining_seconds(self.negotiator.now()),
            },
            LockState::Releasing { .. } => LockStatus::Releasing,
            LockState::Expired => LockStatus::Expired,
        };

        FlowSnapshot {
            form: self.form.clone(),
            slots: self.slots.clone(),
            slots_error: self.slots_error.clone(),
            lock,
            notice: self.notice.clone(),
            busy,
            can_submit: !busy && self.form.time.is_some() && self.negotiator.held().is_some(),
        }
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One booking form session for a clinic.
///
/// All operations run one at a time behind a single async mutex, so a new lock
/// is only ever requested after the previous one has been released. A
/// background task ticks the lock countdown once per second until the flow is
/// closed or dropped.
pub struct BookingFlow {
    inner: Arc<Mutex<FlowState>>,
    busy: Arc<AtomicBool>,
    published: Arc<RwLock<FlowSnapshot>>,
    ticker: Option<JoinHandle<()>>,
}

impl BookingFlow {
    /// Must be called from within a Tokio runtime.
    pub fn start(
        backend: Arc<dyn BookingBackend>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
        session: Session,
        clinic_id: Uuid,
    ) -> Self {
        let published = Arc::new(RwLock::new(FlowSnapshot {
            form: BookingForm::default(),
            slots: Vec::new(),
            slots_error: None,
            lock: LockStatus::Idle,
            notice: None,
            busy: false,
            can_submit: false,
        }));

        let state = FlowState {
            session,
            clinic_id,
            form: BookingForm::default(),
            slots: Vec::new(),
            slots_error: None,
            notice: None,
            negotiator: LockNegotiator::new(backend.clone(), clock, config.lock_ttl_seconds),
            availability: AvailabilityService::new(backend.clone(), config.clinic_utc_offset),
            submitter: BookingSubmitter::new(backend),
            closed: false,
            published: published.clone(),
        };

        let inner = Arc::new(Mutex::new(state));
        let ticker = spawn_ticker(Arc::downgrade(&inner));
        debug!("Booking flow started for clinic {}", clinic_id);

        Self {
            inner,
            busy: Arc::new(AtomicBool::new(false)),
            published,
            ticker: Some(ticker),
        }
    }

    /// Flow against the configured REST backend using the system clock.
    pub fn from_config(config: &AppConfig, session: Session, clinic_id: Uuid) -> Result<Self, BookingError> {
        let client = BackendClient::new(config)?;
        let backend: Arc<dyn BookingBackend> = Arc::new(RestBookingBackend::new(client));
        Ok(Self::start(backend, Arc::new(SystemClock), config, session, clinic_id))
    }

    /// True while a selection, reservation or submission is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Current view of the form. Never waits for an operation in flight:
    /// while one runs, this is the view from before it started, with `busy` set.
    pub fn snapshot(&self) -> FlowSnapshot {
        let busy = self.is_busy();
        if let Ok(state) = self.inner.try_lock() {
            return state.snapshot(busy);
        }

        let mut snapshot = self.published
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        snapshot.busy = busy;
        snapshot.can_submit = snapshot.can_submit && !busy;
        snapshot
    }

    pub async fn select_pet(&self, pet_id: Option<Uuid>) -> Result<(), BookingError> {
        let mut state = self.inner.lock().await;
        let _busy = BusyGuard::enter(&self.busy);
        let result = state.change_selection(|form| form.pet_id = pet_id, false).await;
        state.publish();
        result.map(|_| ())
    }

    pub async fn select_vet(&self, vet_id: Option<Uuid>) -> Result<Vec<Slot>, BookingError> {
        let mut state = self.inner.lock().await;
        let _busy = BusyGuard::enter(&self.busy);
        let result = state.change_selection(|form| form.vet_id = vet_id, true).await;
        state.publish();
        result
    }

    pub async fn select_type(&self, appointment_type: Option<AppointmentType>) -> Result<Vec<Slot>, BookingError> {
        let mut state = self.inner.lock().await;
        let _busy = BusyGuard::enter(&self.busy);
        let result = state.change_selection(|form| form.appointment_type = appointment_type, true).await;
        state.publish();
        result
    }

    pub async fn select_date(&self, date: Option<NaiveDate>) -> Result<Vec<Slot>, BookingError> {
        let mut state = self.inner.lock().await;
        let _busy = BusyGuard::enter(&self.busy);
        let result = state.change_selection(|form| form.date = date, true).await;
        state.publish();
        result
    }

    pub async fn set_notes(&self, notes: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.form.notes = notes.into();
        state.publish();
    }

    pub async fn refresh_slots(&self) -> Result<Vec<Slot>, BookingError> {
        let mut state = self.inner.lock().await;
        state.ensure_open()?;
        let _busy = BusyGuard::enter(&self.busy);
        let result = state.refresh_slots().await;
        state.publish();
        result
    }

    /// Reserves `slot`, releasing whatever was held before.
    pub async fn select_time(&self, slot: Slot) -> Result<Countdown, BookingError> {
        let mut state = self.inner.lock().await;
        let _busy = BusyGuard::enter(&self.busy);
        let result = state.select_time(slot).await;
        state.publish();
        result
    }

    pub async fn submit(&self) -> Result<BookingConfirmation, BookingError> {
        let mut state = self.inner.lock().await;
        let _busy = BusyGuard::enter(&self.busy);
        let result = state.submit().await;
        state.publish();
        result
    }

    /// Advances the countdown once. The background ticker calls this every second.
    pub async fn tick(&self) -> LockTick {
        let mut state = self.inner.lock().await;
        state.tick()
    }

    /// Picks up a reservation this session already holds on the backend.
    pub async fn resume(&self) -> Result<Option<Countdown>, BookingError> {
        let mut state = self.inner.lock().await;
        let _busy = BusyGuard::enter(&self.busy);
        let result = state.resume().await;
        state.publish();
        result
    }

    pub async fn dismiss_notice(&self) {
        let mut state = self.inner.lock().await;
        state.notice = None;
        state.publish();
    }

    /// Stops the countdown and releases any held lock.
    pub async fn close(mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        let mut state = self.inner.lock().await;
        state.shutdown().await;
    }
}

impl Drop for BookingFlow {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }

        if let Ok(state) = self.inner.try_lock() {
            if state.closed || !state.has_lock_to_release() {
                return;
            }
        }

        // Fire-and-forget; the server-side expiry covers us if this never runs.
        match Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    inner.lock().await.shutdown().await;
                });
            }
            Err(_) => warn!("Booking flow dropped outside a runtime; held lock left to expire"),
        }
    }
}

fn spawn_ticker(inner: Weak<Mutex<FlowState>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let Some(shared) = inner.upgrade() else { break };
            let mut state = shared.lock().await;
            if state.closed {
                break;
            }
            state.tick();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
    use shared_models::ApiError;

    use crate::clock::ManualClock;
    use crate::models::{AppointmentRecord, BookingRequest, Lock, LockRequest};

    struct GrantingBackend;

    #[async_trait]
    impl BookingBackend for GrantingBackend {
        async fn vet_bookings(
            &self,
            _session: &Session,
            _vet_id: Uuid,
            _from: DateTime<FixedOffset>,
            _to: DateTime<FixedOffset>,
        ) -> Result<Vec<AppointmentRecord>, ApiError> {
            Ok(Vec::new())
        }

        async fn create_lock(&self, _session: &Session, request: &LockRequest) -> Result<Lock, ApiError> {
            Ok(Lock {
                id: Uuid::new_v4(),
                vet_id: request.vet_id,
                user_id: None,
                appointment_time: request.appointment_time,
                expires_at: None,
                duration_minutes: Some(request.duration_minutes),
            })
        }

        async fn release_lock(&self, _session: &Session, _lock_id: Uuid) -> Result<(), ApiError> {
            Ok(())
        }

        async fn current_lock(&self, _session: &Session) -> Result<Option<Lock>, ApiError> {
            Ok(None)
        }

        async fn create_appointment(
            &self,
            _session: &Session,
            _request: &BookingRequest,
        ) -> Result<AppointmentRecord, ApiError> {
            Err(ApiError::NotFound("not used".to_string()))
        }
    }

    #[tokio::test]
    async fn closed_flow_ignores_ticks() {
        let clock = ManualClock::new(Utc::now());
        let config = AppConfig::for_base_url("http://localhost");
        let flow = BookingFlow::start(
            Arc::new(GrantingBackend),
            Arc::new(clock.clone()),
            &config,
            Session::new(Uuid::new_v4(), "jwtToken=x"),
            Uuid::new_v4(),
        );

        flow.select_vet(Some(Uuid::new_v4())).await.unwrap();
        flow.select_type(Some(AppointmentType::CheckUp)).await.unwrap();
        flow.select_date(Some(NaiveDate::from_ymd_opt(2025, 6, 20).unwrap())).await.unwrap();
        flow.select_time("10:00".parse().unwrap()).await.unwrap();

        flow.inner.lock().await.closed = true;
        clock.advance(ChronoDuration::seconds(600));

        assert_eq!(flow.tick().await, LockTick::Inactive);
        let state = flow.inner.lock().await;
        assert!(matches!(state.negotiator.state(), LockState::Held(_)));
        assert!(state.form.time.is_some());
    }
}
