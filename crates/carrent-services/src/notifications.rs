//! Post-commit side effects: domain event sinks and notification dispatch
//!
//! Nothing here can fail a booking operation. Errors are logged and dropped.

use async_trait::async_trait;
use carrent_core::events::BookingEvent;
use carrent_core::models::{Booking, BookingStatus, NotificationKind, PaymentMethod};
use carrent_core::traits::{EventSink, Notifier, UserDirectory};
use carrent_core::AppResult;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Writes every event as a structured log record
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: &BookingEvent) -> AppResult<()> {
        match event {
            BookingEvent::BookingCreated {
                booking_id,
                vehicle_id,
                renter_id,
                range,
                total_amount,
                payment_method,
                ..
            } => info!(
                event = "booking_created",
                booking_id,
                vehicle_id,
                renter_id,
                range = %range,
                total_amount = %total_amount,
                payment_method = %payment_method,
                "Booking created"
            ),
            BookingEvent::PaymentAttempted {
                booking_id,
                amount,
                method,
                success,
                reference,
                message,
                ..
            } => info!(
                event = "payment_attempted",
                booking_id,
                amount = %amount,
                method = %method,
                success,
                reference = ?reference,
                message = ?message,
                "Payment attempted"
            ),
            BookingEvent::BookingStateChanged {
                booking_id,
                from,
                to,
                payment_status,
                trigger,
                actor_id,
                ..
            } => info!(
                event = "booking_state_changed",
                booking_id,
                from = %from,
                to = %to,
                payment_status = %payment_status,
                trigger = %trigger,
                actor_id = ?actor_id,
                "Booking state changed"
            ),
        }
        Ok(())
    }
}

/// Forwards each event to several sinks
///
/// A failing sink is logged and does not stop delivery to the others.
#[derive(Clone, Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl EventSink for FanoutEventSink {
    async fn publish(&self, event: &BookingEvent) -> AppResult<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.publish(event).await {
                warn!(
                    booking_id = event.booking_id(),
                    event = event.event_type(),
                    error = %e,
                    "Event sink rejected event"
                );
            }
        }
        Ok(())
    }
}

/// Publish events in order, logging failures
pub async fn publish_all(sink: &dyn EventSink, events: &[BookingEvent]) {
    for event in events {
        if let Err(e) = sink.publish(event).await {
            warn!(
                booking_id = event.booking_id(),
                event = event.event_type(),
                error = %e,
                "Failed to publish booking event"
            );
        }
    }
}

/// Who gets told what after a booking operation commits
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn UserDirectory>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            notifier,
            directory,
        }
    }

    /// Queue the creation notices in the background
    pub fn spawn_booking_created(&self, booking: Booking, owner_id: i64) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.booking_created(&booking, owner_id).await })
    }

    pub fn spawn_booking_cancelled(&self, booking: Booking, owner_id: i64) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.booking_cancelled(&booking, owner_id).await })
    }

    /// Renter only; sent after a manual settlement
    pub fn spawn_booking_confirmed(&self, booking: Booking) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher
                .send(
                    booking.renter_id,
                    NotificationKind::BookingConfirmed,
                    booking_payload(&booking),
                )
                .await
        })
    }

    /// Renter, owner, and for cash bookings every administrator
    pub async fn booking_created(&self, booking: &Booking, owner_id: i64) {
        let payload = booking_payload(booking);

        let renter_kind = if booking.status == BookingStatus::Confirmed {
            NotificationKind::BookingConfirmed
        } else {
            NotificationKind::BookingPending
        };
        self.send(booking.renter_id, renter_kind, payload.clone()).await;
        self.send(owner_id, NotificationKind::VehicleBooked, payload.clone())
            .await;

        if booking.payment_method == PaymentMethod::Cash {
            match self.directory.admin_ids().await {
                Ok(admins) => {
                    for admin_id in admins {
                        self.send(admin_id, NotificationKind::CashBookingReview, payload.clone())
                            .await;
                    }
                }
                Err(e) => warn!(
                    booking_id = booking.id,
                    error = %e,
                    "Could not resolve administrators for cash booking review"
                ),
            }
        }
    }

    pub async fn booking_cancelled(&self, booking: &Booking, owner_id: i64) {
        let payload = booking_payload(booking);
        self.send(booking.renter_id, NotificationKind::BookingCancelled, payload.clone())
            .await;
        if owner_id != booking.renter_id {
            self.send(owner_id, NotificationKind::BookingCancelled, payload)
                .await;
        }
    }

    async fn send(&self, user_id: i64, kind: NotificationKind, payload: JsonValue) {
        match self.notifier.notify(user_id, kind, payload).await {
            Ok(()) => debug!(user_id, kind = %kind, "Notification queued"),
            Err(e) => warn!(user_id, kind = %kind, error = %e, "Failed to queue notification"),
        }
    }
}

fn booking_payload(booking: &Booking) -> JsonValue {
    json!({
        "booking_id": booking.id,
        "vehicle_id": booking.vehicle_id,
        "start_date": booking.start_date,
        "end_date": booking.end_date,
        "total_amount": booking.total_amount,
        "status": booking.status,
        "payment_method": booking.payment_method,
        "payment_status": booking.payment_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrent_core::models::PaymentStatus;
    use carrent_core::AppError;
    use chrono::{NaiveDate, Utc};
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(i64, NotificationKind)>>,
        fail_for: Option<i64>,
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(&self, user_id: i64, kind: NotificationKind, _payload: JsonValue) -> AppResult<()> {
            if self.fail_for == Some(user_id) {
                return Err(AppError::Queue("redis down".to_string()));
            }
            self.sent.lock().push((user_id, kind));
            Ok(())
        }
    }

    struct Admins(Vec<i64>);

    #[async_trait]
    impl UserDirectory for Admins {
        async fn admin_ids(&self) -> AppResult<Vec<i64>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn publish(&self, _event: &BookingEvent) -> AppResult<()> {
            Err(AppError::Database("event log offline".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingSink(Mutex<usize>);

    #[async_trait]
    impl EventSink for CountingSink {
        async fn publish(&self, _event: &BookingEvent) -> AppResult<()> {
            *self.0.lock() += 1;
            Ok(())
        }
    }

    fn booking(method: PaymentMethod, status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: 11,
            renter_id: 5,
            vehicle_id: 3,
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            total_amount: dec!(118.80),
            status,
            payment_method: method,
            payment_status: PaymentStatus::Unpaid,
            pickup_location: "Depot".to_string(),
            dropoff_location: "Depot".to_string(),
            special_requests: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn dispatcher(recorder: Arc<Recorder>) -> NotificationDispatcher {
        NotificationDispatcher::new(recorder, Arc::new(Admins(vec![100, 101])))
    }

    #[tokio::test]
    async fn test_cash_booking_notifies_admins() {
        let recorder = Arc::new(Recorder::default());
        dispatcher(recorder.clone())
            .booking_created(&booking(PaymentMethod::Cash, BookingStatus::Pending), 8)
            .await;

        let sent = recorder.sent.lock().clone();
        assert_eq!(
            sent,
            vec![
                (5, NotificationKind::BookingPending),
                (8, NotificationKind::VehicleBooked),
                (100, NotificationKind::CashBookingReview),
                (101, NotificationKind::CashBookingReview),
            ]
        );
    }

    #[tokio::test]
    async fn test_card_booking_skips_admins() {
        let recorder = Arc::new(Recorder::default());
        dispatcher(recorder.clone())
            .booking_created(&booking(PaymentMethod::Visa, BookingStatus::Confirmed), 8)
            .await;

        let sent = recorder.sent.lock().clone();
        assert_eq!(
            sent,
            vec![
                (5, NotificationKind::BookingConfirmed),
                (8, NotificationKind::VehicleBooked),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_notification_does_not_stop_others() {
        let recorder = Arc::new(Recorder {
            fail_for: Some(5),
            ..Default::default()
        });
        dispatcher(recorder.clone())
            .booking_cancelled(&booking(PaymentMethod::Visa, BookingStatus::Cancelled), 8)
            .await;

        assert_eq!(
            recorder.sent.lock().clone(),
            vec![(8, NotificationKind::BookingCancelled)]
        );
    }

    #[tokio::test]
    async fn test_fanout_survives_failing_sink() {
        let counter = Arc::new(CountingSink::default());
        let fanout = FanoutEventSink::new(vec![Arc::new(FailingSink)]).with(counter.clone());

        let event = BookingEvent::BookingStateChanged {
            booking_id: 1,
            from: BookingStatus::Pending,
            to: BookingStatus::Cancelled,
            payment_status: PaymentStatus::Unpaid,
            trigger: "cancel".to_string(),
            actor_id: Some(5),
            at: Utc::now(),
        };
        fanout.publish(&event).await.unwrap();
        publish_all(&fanout, &[event.clone(), event]).await;

        assert_eq!(*counter.0.lock(), 3);
    }
}
