//! Booking orchestrator
//!
//! Creates bookings without double-booking a vehicle:
//! - lock the vehicle row, then check bookability and overlaps
//! - price the range and insert the booking as pending/unpaid
//! - charge digital methods through the gateway, bounded by a timeout
//! - commit, then publish events and queue notifications
//!
//! Renter and administrator actions on existing bookings (cancel, manual
//! settlement, soft delete) go through the same state machine with the
//! booking row locked.

use carrent_core::{
    config::BookingConfig,
    events::BookingEvent,
    models::{
        Actor, Booking, ChargeStatus, DateRange, NewBooking, NewPayment, PaymentMethod,
        PricingBreakdown,
    },
    traits::{
        BookingRepository, BookingStore, ChargeOutcome, ChargeRequest, EventSink, PaginatedResponse,
        Pagination, PaginationMeta, PaymentGateway, TransactionManager, UnitOfWork,
        VehicleRepository,
    },
    AppError, AppResult,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::availability::assert_available;
use crate::constants::{
    BOOKING_INSERT_ATTEMPTS, DEFAULT_PAYMENT_TIMEOUT_SECS, MAX_SPECIAL_REQUESTS_LEN,
};
use crate::notifications::{publish_all, NotificationDispatcher};
use crate::policy::BookingPolicy;
use crate::pricing::PricingPolicy;
use crate::state_machine::{BookingState, BookingTrigger};

/// Input to [`BookingService::create_booking`]
#[derive(Debug, Clone)]
pub struct CreateBookingCommand {
    pub vehicle_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub payment_method: PaymentMethod,
    /// Gateway token; required for digital methods
    pub payment_method_ref: Option<String>,
    /// Defaults to the vehicle's registered location
    pub pickup_location: Option<String>,
    /// Defaults to the pickup location
    pub dropoff_location: Option<String>,
    pub special_requests: Option<String>,
}

impl CreateBookingCommand {
    fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    fn method_ref(&self) -> Option<&str> {
        non_blank(self.payment_method_ref.as_deref())
    }
}

/// A created booking with the breakdown it was priced at
#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub pricing: PricingBreakdown,
}

/// Tunables for [`BookingService`]
#[derive(Debug, Clone)]
pub struct BookingServiceSettings {
    pub pricing: PricingPolicy,
    pub payment_timeout: Duration,
    pub max_special_requests_len: usize,
}

impl Default for BookingServiceSettings {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            payment_timeout: Duration::from_secs(DEFAULT_PAYMENT_TIMEOUT_SECS),
            max_special_requests_len: MAX_SPECIAL_REQUESTS_LEN,
        }
    }
}

impl BookingServiceSettings {
    pub fn from_config(config: &BookingConfig) -> Self {
        Self {
            pricing: PricingPolicy::from_config(config),
            payment_timeout: Duration::from_secs(config.payment_timeout_secs),
            max_special_requests_len: config.max_special_requests_len,
        }
    }
}

/// Result of the check-then-insert step
struct Reservation {
    booking: Booking,
    owner_id: i64,
    pricing: PricingBreakdown,
}

pub struct BookingService {
    transactions: Arc<dyn TransactionManager>,
    bookings: Arc<dyn BookingRepository>,
    vehicles: Arc<dyn VehicleRepository>,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventSink>,
    notifications: NotificationDispatcher,
    settings: BookingServiceSettings,
}

impl BookingService {
    pub fn new(
        transactions: Arc<dyn TransactionManager>,
        bookings: Arc<dyn BookingRepository>,
        vehicles: Arc<dyn VehicleRepository>,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventSink>,
        notifications: NotificationDispatcher,
        settings: BookingServiceSettings,
    ) -> Self {
        Self {
            transactions,
            bookings,
            vehicles,
            gateway,
            events,
            notifications,
            settings,
        }
    }

    pub fn settings(&self) -> &BookingServiceSettings {
        &self.settings
    }

    /// Create a booking as of today
    ///
    /// # Errors
    ///
    /// - `Validation` when the request is malformed
    /// - `VehicleUnavailable` / `DateConflict` when the vehicle cannot take it
    /// - `PaymentFailed` when a digital charge is declined, errors or times out;
    ///   the booking is still stored, as payment_failed
    pub async fn create_booking(
        &self,
        actor_id: i64,
        command: CreateBookingCommand,
    ) -> AppResult<BookingReceipt> {
        self.create_booking_on(actor_id, command, Utc::now().date_naive())
            .await
    }

    /// Same as [`Self::create_booking`] with an explicit "today"
    #[instrument(
        skip(self, command),
        fields(vehicle_id = command.vehicle_id, method = %command.payment_method)
    )]
    pub async fn create_booking_on(
        &self,
        actor_id: i64,
        command: CreateBookingCommand,
        today: NaiveDate,
    ) -> AppResult<BookingReceipt> {
        self.validate(&command, today)?;
        let range = command.range();

        info!(
            "Creating booking for renter {} on vehicle {}: {}",
            actor_id, command.vehicle_id, range
        );

        let mut attempt = 0;
        let (mut uow, reservation) = loop {
            attempt += 1;
            let mut uow = self.transactions.begin().await?;

            match self.reserve(uow.as_mut(), actor_id, &command, today).await {
                Ok(reservation) => break (uow, reservation),
                Err(AppError::BookingOverlap(vehicle_id)) => {
                    rollback_quietly(uow.as_mut()).await;
                    if attempt >= BOOKING_INSERT_ATTEMPTS {
                        warn!(
                            "Overlap persisted after {} attempts for vehicle {}",
                            attempt, vehicle_id
                        );
                        return Err(date_conflict(vehicle_id, range));
                    }
                    warn!(
                        "Store rejected overlapping insert for vehicle {}, retrying",
                        vehicle_id
                    );
                }
                Err(e) => return abort(uow, e).await,
            }
        };

        let Reservation {
            mut booking,
            owner_id,
            pricing,
        } = reservation;

        let mut events = vec![BookingEvent::BookingCreated {
            booking_id: booking.id,
            vehicle_id: booking.vehicle_id,
            renter_id: booking.renter_id,
            range,
            total_amount: booking.total_amount,
            payment_method: booking.payment_method,
            at: Utc::now(),
        }];

        if !booking.payment_method.is_digital() {
            commit(uow.as_mut(), range, booking.vehicle_id).await?;
            info!(
                "Booking {} created pending {} settlement",
                booking.id, booking.payment_method
            );
            self.after_create(&booking, owner_id, &events).await;
            return Ok(BookingReceipt { booking, pricing });
        }

        let request = ChargeRequest {
            booking_id: booking.id,
            method: booking.payment_method,
            method_ref: command.method_ref().unwrap_or_default().to_string(),
            amount: booking.total_amount,
            currency: pricing.currency.clone(),
        };
        let outcome = self.charge(&request).await;

        events.push(BookingEvent::PaymentAttempted {
            booking_id: booking.id,
            amount: request.amount,
            method: request.method,
            success: outcome.success,
            reference: outcome.reference.clone(),
            message: outcome.message.clone(),
            at: Utc::now(),
        });

        let trigger = if outcome.success {
            BookingTrigger::PaymentSucceeded
        } else {
            BookingTrigger::PaymentFailed
        };
        let payment = NewPayment {
            booking_id: booking.id,
            amount: request.amount,
            method: request.method,
            status: if outcome.success {
                ChargeStatus::Succeeded
            } else {
                ChargeStatus::Failed
            },
            transaction_reference: outcome.reference.clone(),
            gateway_response: outcome.raw.clone(),
            processed_at: Some(Utc::now()),
        };

        let settled = async {
            uow.insert_payment(&payment).await?;
            apply_transition(uow.as_mut(), booking.clone(), trigger, Some(actor_id)).await
        }
        .await;
        let event = match settled {
            Ok((updated, event)) => {
                booking = updated;
                event
            }
            Err(e) => return abort(uow, e).await,
        };
        events.push(event);

        commit(uow.as_mut(), range, booking.vehicle_id).await?;
        publish_all(self.events.as_ref(), &events).await;

        if outcome.success {
            info!(
                "Booking {} confirmed, reference {:?}",
                booking.id, outcome.reference
            );
            self.notifications
                .spawn_booking_created(booking.clone(), owner_id);
            Ok(BookingReceipt { booking, pricing })
        } else {
            let message = outcome
                .message
                .unwrap_or_else(|| "Payment was declined".to_string());
            warn!("Booking {} payment failed: {}", booking.id, message);
            Err(AppError::PaymentFailed {
                booking_id: booking.id,
                message,
            })
        }
    }

    /// Booking visible to its renter, the vehicle owner and administrators
    #[instrument(skip(self))]
    pub async fn get_booking(&self, actor: Actor, booking_id: i64) -> AppResult<Booking> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .filter(|b| !b.is_deleted() || actor.is_admin())
            .ok_or(AppError::BookingNotFound(booking_id))?;

        let owner_id = self
            .vehicles
            .find_by_id(booking.vehicle_id)
            .await?
            .map(|v| v.owner_id);
        BookingPolicy::ensure_view(&actor, &booking, owner_id)?;

        Ok(booking)
    }

    /// The actor's own bookings, newest first
    #[instrument(skip(self))]
    pub async fn list_renter_bookings(
        &self,
        actor: Actor,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Booking>> {
        let (data, total) = self
            .bookings
            .list_by_renter(actor.id, pagination.limit(), pagination.offset())
            .await?;

        debug!("Listed {} of {} bookings for renter {}", data.len(), total, actor.id);

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(total, pagination.page, pagination.per_page),
        })
    }

    /// Cancel a pending or confirmed booking, releasing its dates
    #[instrument(skip(self))]
    pub async fn cancel_booking(&self, actor: Actor, booking_id: i64) -> AppResult<Booking> {
        let mut uow = self.transactions.begin().await?;

        let result = async {
            let booking = lock_live_booking(uow.as_mut(), booking_id).await?;
            BookingPolicy::ensure_cancel(&actor, &booking)?;
            let owner_id = uow
                .get_vehicle(booking.vehicle_id)
                .await?
                .map(|v| v.owner_id);
            let (booking, event) =
                apply_transition(uow.as_mut(), booking, BookingTrigger::Cancel, Some(actor.id))
                    .await?;
            Ok::<_, AppError>((booking, event, owner_id))
        }
        .await;

        let (booking, event, owner_id) = match result {
            Ok(done) => done,
            Err(e) => return abort(uow, e).await,
        };
        uow.commit().await?;

        info!("Booking {} cancelled by user {}", booking.id, actor.id);
        publish_all(self.events.as_ref(), std::slice::from_ref(&event)).await;
        if let Some(owner_id) = owner_id {
            self.notifications
                .spawn_booking_cancelled(booking.clone(), owner_id);
        }

        Ok(booking)
    }

    /// Record a manual settlement of a cash or bank transfer booking
    #[instrument(skip(self))]
    pub async fn mark_paid(
        &self,
        actor: Actor,
        booking_id: i64,
        reference: Option<String>,
    ) -> AppResult<Booking> {
        BookingPolicy::ensure_admin(&actor, booking_id, "mark paid")?;
        let reference = non_blank(reference.as_deref()).map(str::to_string);

        let mut uow = self.transactions.begin().await?;

        let result = async {
            let booking = lock_live_booking(uow.as_mut(), booking_id).await?;
            if booking.payment_method.is_digital() {
                return Err(AppError::Validation(format!(
                    "Booking {} is paid through the gateway and cannot be settled manually",
                    booking.id
                )));
            }
            // Fails before the payment row is written if the booking is not pending/unpaid
            BookingState::new(booking.status, booking.payment_status)
                .apply(booking.id, BookingTrigger::MarkPaid)?;

            uow.insert_payment(&NewPayment {
                booking_id: booking.id,
                amount: booking.total_amount,
                method: booking.payment_method,
                status: ChargeStatus::Succeeded,
                transaction_reference: reference.clone(),
                gateway_response: Some(json!({ "manual": true, "settled_by": actor.id })),
                processed_at: Some(Utc::now()),
            })
            .await?;
            apply_transition(uow.as_mut(), booking, BookingTrigger::MarkPaid, Some(actor.id)).await
        }
        .await;

        let (booking, event) = match result {
            Ok(done) => done,
            Err(e) => return abort(uow, e).await,
        };
        uow.commit().await?;

        info!("Booking {} marked paid by admin {}", booking.id, actor.id);
        publish_all(self.events.as_ref(), std::slice::from_ref(&event)).await;
        self.notifications.spawn_booking_confirmed(booking.clone());

        Ok(booking)
    }

    /// Soft-delete a booking, cancelling it first if it still holds its dates
    #[instrument(skip(self))]
    pub async fn delete_booking(&self, actor: Actor, booking_id: i64) -> AppResult<()> {
        BookingPolicy::ensure_admin(&actor, booking_id, "delete")?;

        let mut uow = self.transactions.begin().await?;

        let result = async {
            let booking = lock_live_booking(uow.as_mut(), booking_id).await?;
            let state = BookingState::new(booking.status, booking.payment_status);

            let cancelled = if state.can_apply(BookingTrigger::Cancel) {
                let owner_id = uow
                    .get_vehicle(booking.vehicle_id)
                    .await?
                    .map(|v| v.owner_id);
                let (booking, event) = apply_transition(
                    uow.as_mut(),
                    booking,
                    BookingTrigger::Cancel,
                    Some(actor.id),
                )
                .await?;
                Some((booking, event, owner_id))
            } else {
                None
            };

            if !uow.soft_delete_booking(booking_id).await? {
                return Err(AppError::BookingNotFound(booking_id));
            }
            Ok::<_, AppError>(cancelled)
        }
        .await;

        let cancelled = match result {
            Ok(done) => done,
            Err(e) => return abort(uow, e).await,
        };
        uow.commit().await?;

        info!("Booking {} deleted by admin {}", booking_id, actor.id);
        if let Some((booking, event, owner_id)) = cancelled {
            publish_all(self.events.as_ref(), std::slice::from_ref(&event)).await;
            if let Some(owner_id) = owner_id {
                self.notifications.spawn_booking_cancelled(booking, owner_id);
            }
        }

        Ok(())
    }

    fn validate(&self, command: &CreateBookingCommand, today: NaiveDate) -> AppResult<()> {
        if command.end_date <= command.start_date {
            return Err(AppError::Validation(
                "end_date must be after start_date".to_string(),
            ));
        }
        if command.start_date <= today {
            return Err(AppError::Validation(
                "start_date must be after today".to_string(),
            ));
        }
        if command.payment_method.requires_reference() && command.method_ref().is_none() {
            return Err(AppError::Validation(format!(
                "payment_method_ref is required for {} payments",
                command.payment_method
            )));
        }
        if let Some(requests) = &command.special_requests {
            if requests.chars().count() > self.settings.max_special_requests_len {
                return Err(AppError::Validation(format!(
                    "special_requests must be at most {} characters",
                    self.settings.max_special_requests_len
                )));
            }
        }
        Ok(())
    }

    /// Lock, check, price and insert the pending booking
    async fn reserve(
        &self,
        uow: &mut dyn UnitOfWork,
        actor_id: i64,
        command: &CreateBookingCommand,
        today: NaiveDate,
    ) -> AppResult<Reservation> {
        let range = command.range();

        uow.lock_vehicle(command.vehicle_id).await?;
        let vehicle = assert_available(uow, command.vehicle_id, range, today).await?;

        let pricing = self.settings.pricing.quote(vehicle.daily_rate, &range);
        debug!(
            "Priced {} days at {}: total {}",
            pricing.total_days, pricing.daily_rate, pricing.total_amount
        );

        let pickup_location = non_blank(command.pickup_location.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| vehicle.location.clone());
        let dropoff_location = non_blank(command.dropoff_location.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| pickup_location.clone());

        let initial = BookingState::initial();
        let booking = uow
            .insert_booking(&NewBooking {
                renter_id: actor_id,
                vehicle_id: vehicle.id,
                range,
                // Stored and charged in cents
                total_amount: pricing.total_amount.round_dp(2),
                status: initial.status,
                payment_method: command.payment_method,
                payment_status: initial.payment_status,
                pickup_location,
                dropoff_location,
                special_requests: command.special_requests.clone(),
            })
            .await?;

        Ok(Reservation {
            booking,
            owner_id: vehicle.owner_id,
            pricing,
        })
    }

    /// Charge through the gateway; errors and timeouts count as declines
    async fn charge(&self, request: &ChargeRequest) -> ChargeOutcome {
        match tokio::time::timeout(self.settings.payment_timeout, self.gateway.charge(request)).await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(booking_id = request.booking_id, error = %e, "Payment gateway call failed");
                ChargeOutcome::declined(e.to_string())
            }
            Err(_) => {
                warn!(
                    booking_id = request.booking_id,
                    timeout_secs = self.settings.payment_timeout.as_secs_f64(),
                    "Payment gateway timed out"
                );
                ChargeOutcome::declined("Payment gateway timed out")
            }
        }
    }

    async fn after_create(&self, booking: &Booking, owner_id: i64, events: &[BookingEvent]) {
        publish_all(self.events.as_ref(), events).await;
        self.notifications
            .spawn_booking_created(booking.clone(), owner_id);
    }
}

/// Apply a trigger to a locked booking and persist the new state
pub(crate) async fn apply_transition<S>(
    store: &mut S,
    mut booking: Booking,
    trigger: BookingTrigger,
    actor_id: Option<i64>,
) -> AppResult<(Booking, BookingEvent)>
where
    S: BookingStore + ?Sized,
{
    let from = booking.status;
    let next = BookingState::new(booking.status, booking.payment_status).apply(booking.id, trigger)?;

    store
        .update_booking_status(booking.id, next.status, next.payment_status)
        .await?;

    debug!("Booking {}: {} -> {} on {}", booking.id, from, next.status, trigger);

    booking.status = next.status;
    booking.payment_status = next.payment_status;
    booking.updated_at = Utc::now();

    let event = BookingEvent::BookingStateChanged {
        booking_id: booking.id,
        from,
        to: next.status,
        payment_status: next.payment_status,
        trigger: trigger.to_string(),
        actor_id,
        at: booking.updated_at,
    };
    Ok((booking, event))
}

/// Lock a booking that has not been soft-deleted
pub(crate) async fn lock_live_booking<S>(store: &mut S, booking_id: i64) -> AppResult<Booking>
where
    S: BookingStore + ?Sized,
{
    store
        .get_booking_for_update(booking_id)
        .await?
        .filter(|b| !b.is_deleted())
        .ok_or(AppError::BookingNotFound(booking_id))
}

async fn commit(uow: &mut dyn UnitOfWork, range: DateRange, vehicle_id: i64) -> AppResult<()> {
    uow.commit().await.map_err(|e| match e {
        AppError::BookingOverlap(_) => date_conflict(vehicle_id, range),
        other => other,
    })
}

/// Roll back and return `err`
pub(crate) async fn abort<T>(mut uow: Box<dyn UnitOfWork>, err: AppError) -> AppResult<T> {
    rollback_quietly(uow.as_mut()).await;
    Err(err)
}

async fn rollback_quietly(uow: &mut dyn UnitOfWork) {
    if let Err(e) = uow.rollback().await {
        error!("Failed to roll back unit of work: {}", e);
    }
}

fn date_conflict(vehicle_id: i64, range: DateRange) -> AppError {
    AppError::DateConflict {
        vehicle_id,
        start_date: range.start,
        end_date: range.end,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrent_core::models::{BookingStatus, PaymentStatus};

    fn command(start: NaiveDate, end: NaiveDate, method: PaymentMethod) -> CreateBookingCommand {
        CreateBookingCommand {
            vehicle_id: 1,
            start_date: start,
            end_date: end,
            payment_method: method,
            payment_method_ref: None,
            pickup_location: None,
            dropoff_location: None,
            special_requests: None,
        }
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" tok ")), Some("tok"));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_settings_from_config() {
        let config = BookingConfig {
            payment_timeout_secs: 3,
            max_special_requests_len: 200,
            ..Default::default()
        };
        let settings = BookingServiceSettings::from_config(&config);
        assert_eq!(settings.payment_timeout, Duration::from_secs(3));
        assert_eq!(settings.max_special_requests_len, 200);
    }

    #[test]
    fn test_command_method_ref_ignores_blank() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut cmd = command(day, day, PaymentMethod::Visa);
        cmd.payment_method_ref = Some("   ".to_string());
        assert!(cmd.method_ref().is_none());
    }

    struct NullStore {
        updates: Vec<(i64, BookingStatus, PaymentStatus)>,
    }

    #[async_trait::async_trait]
    impl BookingStore for NullStore {
        async fn insert_booking(&mut self, _booking: &NewBooking) -> AppResult<Booking> {
            unreachable!()
        }

        async fn update_booking_status(
            &mut self,
            id: i64,
            status: BookingStatus,
            payment_status: PaymentStatus,
        ) -> AppResult<()> {
            self.updates.push((id, status, payment_status));
            Ok(())
        }

        async fn insert_payment(
            &mut self,
            _payment: &NewPayment,
        ) -> AppResult<carrent_core::models::Payment> {
            unreachable!()
        }

        async fn get_booking_for_update(&mut self, _id: i64) -> AppResult<Option<Booking>> {
            Ok(None)
        }

        async fn soft_delete_booking(&mut self, _id: i64) -> AppResult<bool> {
            Ok(false)
        }
    }

    fn pending_booking() -> Booking {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        NewBooking {
            renter_id: 3,
            vehicle_id: 1,
            range: DateRange::new(day, day),
            total_amount: rust_decimal::Decimal::ONE,
            status: BookingStatus::Pending,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Unpaid,
            pickup_location: String::new(),
            dropoff_location: String::new(),
            special_requests: None,
        }
        .into_booking(42, Utc::now())
    }

    #[tokio::test]
    async fn test_apply_transition_persists_and_emits_event() {
        let mut store = NullStore { updates: vec![] };
        let (booking, event) =
            apply_transition(&mut store, pending_booking(), BookingTrigger::MarkPaid, Some(9))
                .await
                .unwrap();

        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(
            store.updates,
            vec![(42, BookingStatus::Confirmed, PaymentStatus::Paid)]
        );
        assert!(matches!(
            event,
            BookingEvent::BookingStateChanged {
                from: BookingStatus::Pending,
                to: BookingStatus::Confirmed,
                actor_id: Some(9),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_rejected_transition_writes_nothing() {
        let mut store = NullStore { updates: vec![] };
        let err = apply_transition(&mut store, pending_booking(), BookingTrigger::Complete, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition { booking_id: 42, .. }));
        assert!(store.updates.is_empty());
    }

    #[tokio::test]
    async fn test_deleted_booking_is_not_found() {
        let mut store = NullStore { updates: vec![] };
        let err = lock_live_booking(&mut store, 5).await.unwrap_err();
        assert!(matches!(err, AppError::BookingNotFound(5)));
    }
}
