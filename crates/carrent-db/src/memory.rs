//! In-memory marketplace store
//!
//! Implements every storage trait of the booking core against process memory.
//! Writes made through a unit of work are staged and become visible to others
//! only on commit. Vehicle and booking locks are per-id `tokio::sync::Mutex`es
//! whose owned guards live as long as the unit of work, so N concurrent
//! bookings of one vehicle serialize exactly as they do under `FOR UPDATE`.
//!
//! Used by the service and HTTP test suites.

use async_trait::async_trait;
use carrent_core::{
    models::{
        BookedRange, Booking, BookingStatus, DateRange, NewBooking, NewPayment, Payment,
        PaymentStatus, Vehicle,
    },
    traits::{
        BookingRepository, BookingStore, TransactionManager, UnitOfWork, UserDirectory,
        VehicleRepository, VehicleStore,
    },
    AppError, AppResult,
};
use chrono::{NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

#[derive(Default)]
struct State {
    vehicles: HashMap<i64, Vehicle>,
    bookings: BTreeMap<i64, Booking>,
    payments: Vec<Payment>,
    admins: Vec<i64>,
}

impl State {
    /// Live bookings of `vehicle_id` overlapping `range`, ignoring `exclude`
    fn overlapping(
        &self,
        vehicle_id: i64,
        range: &DateRange,
        exclude: Option<i64>,
    ) -> impl Iterator<Item = &Booking> + '_ {
        let range = *range;
        self.bookings.values().filter(move |b| {
            b.vehicle_id == vehicle_id
                && Some(b.id) != exclude
                && b.status.blocks_availability()
                && b.range().overlaps(&range)
        })
    }
}

#[derive(Default)]
struct Inner {
    state: RwLock<State>,
    vehicle_locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
    booking_locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
    next_booking_id: AtomicI64,
    next_payment_id: AtomicI64,
    /// Number of upcoming booking inserts to reject as overlapping
    injected_overlaps: AtomicUsize,
}

impl Inner {
    fn lock_for(map: &Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>, id: i64) -> Arc<AsyncMutex<()>> {
        map.lock().entry(id).or_default().clone()
    }
}

/// Process-local implementation of the booking core's stores
#[derive(Clone, Default)]
pub struct InMemoryMarketplace {
    inner: Arc<Inner>,
}

impl InMemoryMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a vehicle listing
    pub fn upsert_vehicle(&self, vehicle: Vehicle) {
        self.inner.state.write().vehicles.insert(vehicle.id, vehicle);
    }

    pub fn set_admins(&self, admins: Vec<i64>) {
        self.inner.state.write().admins = admins;
    }

    /// Insert a committed booking directly, bypassing availability rules
    pub fn seed_booking(&self, booking: NewBooking) -> Booking {
        let id = self.inner.next_booking_id.fetch_add(1, Ordering::SeqCst) + 1;
        let booking = booking.into_booking(id, Utc::now());
        self.inner
            .state
            .write()
            .bookings
            .insert(id, booking.clone());
        booking
    }

    /// Reject the next `count` booking inserts as exclusion-constraint overlaps
    pub fn inject_overlaps(&self, count: usize) {
        self.inner.injected_overlaps.store(count, Ordering::SeqCst);
    }

    /// Snapshot of all bookings, soft-deleted ones included
    pub fn bookings(&self) -> Vec<Booking> {
        self.inner.state.read().bookings.values().cloned().collect()
    }

    pub fn booking(&self, id: i64) -> Option<Booking> {
        self.inner.state.read().bookings.get(&id).cloned()
    }

    pub fn booking_count(&self) -> usize {
        self.inner.state.read().bookings.len()
    }

    /// Snapshot of all payment rows
    pub fn payments(&self) -> Vec<Payment> {
        self.inner.state.read().payments.clone()
    }

    pub fn payments_for(&self, booking_id: i64) -> Vec<Payment> {
        self.inner
            .state
            .read()
            .payments
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TransactionManager for InMemoryMarketplace {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            inner: Arc::clone(&self.inner),
            guards: Vec::new(),
            locked_vehicles: HashSet::new(),
            locked_bookings: HashSet::new(),
            staged_bookings: BTreeMap::new(),
            staged_payments: Vec::new(),
            finished: false,
        }))
    }
}

#[async_trait]
impl BookingRepository for InMemoryMarketplace {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Booking>> {
        Ok(self.booking(id))
    }

    async fn list_by_renter(
        &self,
        renter_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Booking>, i64)> {
        let state = self.inner.state.read();
        let mut own: Vec<&Booking> = state
            .bookings
            .values()
            .filter(|b| b.renter_id == renter_id && !b.is_deleted())
            .collect();
        own.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = own.len() as i64;
        let page = own
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn list_due_for_start(&self, today: NaiveDate) -> AppResult<Vec<Booking>> {
        let state = self.inner.state.read();
        Ok(state
            .bookings
            .values()
            .filter(|b| {
                b.status == BookingStatus::Confirmed && b.start_date <= today && !b.is_deleted()
            })
            .cloned()
            .collect())
    }

    async fn list_due_for_completion(&self, today: NaiveDate) -> AppResult<Vec<Booking>> {
        let state = self.inner.state.read();
        Ok(state
            .bookings
            .values()
            .filter(|b| {
                b.status == BookingStatus::Ongoing && b.end_date < today && !b.is_deleted()
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl VehicleRepository for InMemoryMarketplace {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Vehicle>> {
        Ok(self.inner.state.read().vehicles.get(&id).cloned())
    }
}

#[async_trait]
impl UserDirectory for InMemoryMarketplace {
    async fn admin_ids(&self) -> AppResult<Vec<i64>> {
        Ok(self.inner.state.read().admins.clone())
    }
}

/// Unit of work over an [`InMemoryMarketplace`]
pub struct MemoryUnitOfWork {
    inner: Arc<Inner>,
    guards: Vec<OwnedMutexGuard<()>>,
    locked_vehicles: HashSet<i64>,
    locked_bookings: HashSet<i64>,
    /// Inserted or modified bookings, keyed by id
    staged_bookings: BTreeMap<i64, Booking>,
    staged_payments: Vec<Payment>,
    finished: bool,
}

impl MemoryUnitOfWork {
    fn ensure_open(&self) -> AppResult<()> {
        if self.finished {
            return Err(AppError::Transaction(
                "Unit of work already finished".to_string(),
            ));
        }
        Ok(())
    }

    /// Current view of a booking: staged copy first, committed state otherwise
    fn current_booking(&self, id: i64) -> Option<Booking> {
        self.staged_bookings
            .get(&id)
            .cloned()
            .or_else(|| self.inner.state.read().bookings.get(&id).cloned())
    }

    fn staged_overlap(&self, vehicle_id: i64, range: &DateRange) -> Option<&Booking> {
        self.staged_bookings.values().find(|b| {
            b.vehicle_id == vehicle_id && b.status.blocks_availability() && b.range().overlaps(range)
        })
    }

    /// Overlap check standing in for the exclusion constraint
    fn violates_exclusion(&self, state: &State, booking: &Booking) -> bool {
        if !booking.status.blocks_availability() {
            return false;
        }
        state
            .overlapping(booking.vehicle_id, &booking.range(), Some(booking.id))
            .any(|existing| {
                self.staged_bookings
                    .get(&existing.id)
                    .map(|staged| staged.status.blocks_availability())
                    .unwrap_or(true)
            })
    }

    fn release(&mut self) {
        self.finished = true;
        self.staged_bookings.clear();
        self.staged_payments.clear();
        self.guards.clear();
    }
}

#[async_trait]
impl VehicleStore for MemoryUnitOfWork {
    async fn get_vehicle(&mut self, id: i64) -> AppResult<Option<Vehicle>> {
        self.ensure_open()?;
        Ok(self.inner.state.read().vehicles.get(&id).cloned())
    }

    async fn list_overlapping_bookings(
        &mut self,
        vehicle_id: i64,
        range: DateRange,
    ) -> AppResult<Vec<BookedRange>> {
        self.ensure_open()?;

        let committed: Vec<Booking> = {
            let state = self.inner.state.read();
            state
                .bookings
                .values()
                .filter(|b| b.vehicle_id == vehicle_id && !self.staged_bookings.contains_key(&b.id))
                .cloned()
                .collect()
        };

        let mut found: Vec<BookedRange> = committed
            .iter()
            .chain(self.staged_bookings.values().filter(|b| b.vehicle_id == vehicle_id))
            .filter(|b| b.status.blocks_availability() && b.range().overlaps(&range))
            .map(|b| BookedRange {
                booking_id: b.id,
                range: b.range(),
                status: b.status,
            })
            .collect();
        found.sort_by_key(|r| r.range.start);
        Ok(found)
    }
}

#[async_trait]
impl BookingStore for MemoryUnitOfWork {
    async fn insert_booking(&mut self, booking: &NewBooking) -> AppResult<Booking> {
        self.ensure_open()?;

        let injected = self
            .inner
            .injected_overlaps
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            warn!(
                "Injected overlap rejected booking for vehicle {}",
                booking.vehicle_id
            );
            return Err(AppError::BookingOverlap(booking.vehicle_id));
        }

        let id = self.inner.next_booking_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = booking.clone().into_booking(id, Utc::now());

        let conflicts = {
            let state = self.inner.state.read();
            self.violates_exclusion(&state, &row)
        } || self.staged_overlap(row.vehicle_id, &row.range()).is_some();
        if conflicts && row.status.blocks_availability() {
            return Err(AppError::BookingOverlap(booking.vehicle_id));
        }

        debug!("Staged booking {} for vehicle {}", id, row.vehicle_id);
        self.staged_bookings.insert(id, row.clone());
        Ok(row)
    }

    async fn update_booking_status(
        &mut self,
        id: i64,
        status: BookingStatus,
        payment_status: PaymentStatus,
    ) -> AppResult<()> {
        self.ensure_open()?;

        let mut booking = self
            .current_booking(id)
            .ok_or(AppError::BookingNotFound(id))?;
        booking.status = status;
        booking.payment_status = payment_status;
        booking.updated_at = Utc::now();
        self.staged_bookings.insert(id, booking);
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> AppResult<Payment> {
        self.ensure_open()?;

        if self.current_booking(payment.booking_id).is_none() {
            return Err(AppError::Database(format!(
                "Payment references unknown booking {}",
                payment.booking_id
            )));
        }

        let id = self.inner.next_payment_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = payment.clone().into_payment(id, Utc::now());
        self.staged_payments.push(row.clone());
        Ok(row)
    }

    async fn get_booking_for_update(&mut self, id: i64) -> AppResult<Option<Booking>> {
        self.ensure_open()?;

        if self.locked_bookings.insert(id) {
            let lock = Inner::lock_for(&self.inner.booking_locks, id);
            self.guards.push(lock.lock_owned().await);
        }
        Ok(self.current_booking(id))
    }

    async fn soft_delete_booking(&mut self, id: i64) -> AppResult<bool> {
        self.ensure_open()?;

        let Some(mut booking) = self.current_booking(id) else {
            return Ok(false);
        };
        if booking.is_deleted() {
            return Ok(false);
        }
        let now = Utc::now();
        booking.deleted_at = Some(now);
        booking.updated_at = now;
        self.staged_bookings.insert(id, booking);
        Ok(true)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_vehicle(&mut self, vehicle_id: i64) -> AppResult<()> {
        self.ensure_open()?;

        if self.locked_vehicles.insert(vehicle_id) {
            let lock = Inner::lock_for(&self.inner.vehicle_locks, vehicle_id);
            self.guards.push(lock.lock_owned().await);
        }
        Ok(())
    }

    async fn commit(&mut self) -> AppResult<()> {
        self.ensure_open()?;

        {
            let mut state = self.inner.state.write();
            if let Some(conflict) = self
                .staged_bookings
                .values()
                .find(|b| self.violates_exclusion(&state, b))
            {
                let vehicle_id = conflict.vehicle_id;
                drop(state);
                self.release();
                return Err(AppError::BookingOverlap(vehicle_id));
            }

            for (id, booking) in std::mem::take(&mut self.staged_bookings) {
                state.bookings.insert(id, booking);
            }
            state.payments.append(&mut self.staged_payments);
        }

        self.release();
        Ok(())
    }

    async fn rollback(&mut self) -> AppResult<()> {
        if !self.finished {
            debug!(
                "Rolling back {} staged bookings",
                self.staged_bookings.len()
            );
            self.release();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrent_core::models::PaymentMethod;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, d).unwrap()
    }

    fn new_booking(vehicle_id: i64, start: u32, end: u32) -> NewBooking {
        NewBooking {
            renter_id: 7,
            vehicle_id,
            range: DateRange::new(day(start), day(end)),
            total_amount: dec!(100),
            status: BookingStatus::Pending,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Unpaid,
            pickup_location: "Depot".to_string(),
            dropoff_location: "Depot".to_string(),
            special_requests: None,
        }
    }

    #[tokio::test]
    async fn test_staged_writes_invisible_until_commit() {
        let store = InMemoryMarketplace::new();
        let mut uow = store.begin().await.unwrap();
        uow.insert_booking(&new_booking(1, 10, 12)).await.unwrap();
        assert_eq!(store.booking_count(), 0);

        uow.commit().await.unwrap();
        assert_eq!(store.booking_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_discards_writes_and_releases_lock() {
        let store = InMemoryMarketplace::new();
        {
            let mut uow = store.begin().await.unwrap();
            uow.lock_vehicle(1).await.unwrap();
            uow.insert_booking(&new_booking(1, 10, 12)).await.unwrap();
        }
        assert_eq!(store.booking_count(), 0);

        let mut uow = store.begin().await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), uow.lock_vehicle(1))
            .await
            .expect("vehicle lock released on drop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_overlap_sees_staged_and_committed_rows() {
        let store = InMemoryMarketplace::new();
        store.seed_booking(new_booking(1, 10, 15));

        let mut uow = store.begin().await.unwrap();
        let found = uow
            .list_overlapping_bookings(1, DateRange::new(day(15), day(20)))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let err = uow.insert_booking(&new_booking(1, 14, 16)).await.unwrap_err();
        assert!(matches!(err, AppError::BookingOverlap(1)));
    }

    #[tokio::test]
    async fn test_cancelled_booking_releases_range() {
        let store = InMemoryMarketplace::new();
        let existing = store.seed_booking(new_booking(1, 10, 15));

        let mut uow = store.begin().await.unwrap();
        uow.update_booking_status(existing.id, BookingStatus::Cancelled, PaymentStatus::Unpaid)
            .await
            .unwrap();
        let found = uow
            .list_overlapping_bookings(1, DateRange::new(day(12), day(13)))
            .await
            .unwrap();
        assert!(found.is_empty());
        uow.insert_booking(&new_booking(1, 12, 13)).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(store.booking_count(), 2);
    }

    #[tokio::test]
    async fn test_commit_rejects_racing_unlocked_insert() {
        let store = InMemoryMarketplace::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.insert_booking(&new_booking(1, 10, 12)).await.unwrap();
        second.insert_booking(&new_booking(1, 11, 13)).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, AppError::BookingOverlap(1)));
        assert_eq!(store.booking_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_overlap_fires_once() {
        let store = InMemoryMarketplace::new();
        store.inject_overlaps(1);

        let mut uow = store.begin().await.unwrap();
        assert!(uow.insert_booking(&new_booking(1, 10, 12)).await.is_err());
        assert!(uow.insert_booking(&new_booking(1, 10, 12)).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_by_renter_skips_deleted() {
        let store = InMemoryMarketplace::new();
        let kept = store.seed_booking(new_booking(1, 1, 2));
        let deleted = store.seed_booking(new_booking(1, 5, 6));

        let mut uow = store.begin().await.unwrap();
        assert!(uow.soft_delete_booking(deleted.id).await.unwrap());
        uow.commit().await.unwrap();

        let (page, total) = store.list_by_renter(7, 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].id, kept.id);
        assert!(store.booking(deleted.id).unwrap().is_deleted());
    }
}
