use crate::models::{Booking, BookingStatus};
use crate::repository::BookingStore;
use futures_util::stream::{self, StreamExt};
use skybook_core::provider::ProviderApi;
use std::sync::Arc;

/// Read-path reconciliation: refresh local state from the authoritative
/// remote order for bookings that are still in flight. A transient remote
/// outage never corrupts the local record: the last known state is returned
/// unmodified.
pub struct ReconciliationSync {
    provider: Arc<dyn ProviderApi>,
    store: Arc<dyn BookingStore>,
    /// Concurrent remote fetches while reconciling a list page.
    fan_out: usize,
}

impl ReconciliationSync {
    pub fn new(provider: Arc<dyn ProviderApi>, store: Arc<dyn BookingStore>, fan_out: usize) -> Self {
        Self {
            provider,
            store,
            fan_out: fan_out.max(1),
        }
    }

    /// Reconcile a single booking, returning the (possibly advanced) record.
    pub async fn sync_one(&self, mut booking: Booking) -> Booking {
        if !matches!(
            booking.status,
            BookingStatus::Held | BookingStatus::Processing
        ) {
            return booking;
        }
        let Some(order_id) = booking.duffel_order_id.clone() else {
            return booking;
        };

        let order = match self.provider.get_order(&order_id).await {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, order_id = %order_id, error = %e,
                    "Reconciliation fetch failed, keeping last known state");
                return booking;
            }
        };

        let mut changed = false;

        if order.cancelled_at.is_some() {
            if let Err(t) = booking.transition(BookingStatus::Cancelled) {
                tracing::error!(booking_id = %booking.id, error = %t, "Cancel sync rejected");
            } else {
                booking.push_note("system", "Remote order cancelled, synced on read");
                changed = true;
            }
        } else if !order.documents.is_empty() {
            booking.mark_issued(order.documents.clone(), order.booking_reference.clone());
            changed = true;
        } else if booking.status == BookingStatus::Processing {
            // The hold itself already succeeded upstream; the local record
            // just never caught up.
            if let Err(t) = booking.transition(BookingStatus::Held) {
                tracing::error!(booking_id = %booking.id, error = %t, "Hold sync rejected");
            } else {
                changed = true;
            }
        }

        if changed {
            if booking.pnr.is_none() {
                booking.pnr = order.booking_reference.clone();
            }
            if let Err(e) = self.store.update(&booking).await {
                tracing::error!(booking_id = %booking.id, error = %e, "Failed to persist reconciled state");
            }
        }

        booking
    }

    /// Reconcile a page of bookings with bounded concurrent fan-out,
    /// preserving input order.
    pub async fn sync_page(&self, bookings: Vec<Booking>) -> Vec<Booking> {
        stream::iter(bookings.into_iter().map(|b| self.sync_one(b)))
            .buffered(self.fan_out)
            .collect()
            .await
    }
}
