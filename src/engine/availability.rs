use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{BookingId, ProviderId, ShiftSlot, SlotKey, SlotStatus};
use super::store::{FulfillmentStore, StoreError};

const DEFAULT_HORIZON_DAYS: u32 = 175;

/// Bounds the future window providers can manage capacity in. Slots in the
/// past are immutable; slots beyond the horizon do not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityPolicy {
    pub horizon_days: u32,
}

impl Default for AvailabilityPolicy {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }
}

impl AvailabilityPolicy {
    pub fn new(horizon_days: u32) -> Self {
        Self { horizon_days }
    }

    fn check_window(&self, date: NaiveDate, today: NaiveDate) -> Result<(), AvailabilityError> {
        if date < today {
            return Err(AvailabilityError::PastDate(date));
        }

        let horizon_end = today + Duration::days(self.horizon_days as i64);
        if date > horizon_end {
            return Err(AvailabilityError::OutOfHorizon {
                date,
                horizon_days: self.horizon_days,
            });
        }

        Ok(())
    }
}

/// The only statuses a provider may set directly. `Booked` has no variant
/// here: it is derived state owned by the acceptance commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotToggle {
    Available,
    Blocked,
}

impl SlotToggle {
    fn to_status(self) -> SlotStatus {
        match self {
            SlotToggle::Available => SlotStatus::Available,
            SlotToggle::Blocked => SlotStatus::Blocked,
        }
    }
}

/// Rejections raised by the ledger.
#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("date {0} is in the past and immutable")]
    PastDate(NaiveDate),
    #[error("date {date} is beyond the {horizon_days}-day scheduling horizon")]
    OutOfHorizon { date: NaiveDate, horizon_days: u32 },
    #[error("slot on {date} ({}) is booked by '{}' and cannot be modified", slot.label(), booking_id.0)]
    CannotModifyBookedSlot {
        date: NaiveDate,
        slot: ShiftSlot,
        booking_id: BookingId,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A slot a bulk operation left untouched because a booking owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSlot {
    pub date: NaiveDate,
    pub slot: ShiftSlot,
    pub booking_id: BookingId,
}

/// Result of a bulk toggle: how many slots changed and which booked ones
/// were skipped rather than failing the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkToggleOutcome {
    pub applied: usize,
    pub skipped_booked: Vec<SkippedSlot>,
}

/// One entry of a provider's forward calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub date: NaiveDate,
    pub slot: ShiftSlot,
    pub status: SlotStatus,
}

/// Per-provider shift calendar. Source of truth for whether a provider can
/// receive an offer for a given date and shift.
pub struct AvailabilityLedger<S> {
    store: Arc<S>,
    policy: AvailabilityPolicy,
}

impl<S> AvailabilityLedger<S>
where
    S: FulfillmentStore,
{
    pub fn new(store: Arc<S>, policy: AvailabilityPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> AvailabilityPolicy {
        self.policy
    }

    pub fn status(
        &self,
        provider_id: &ProviderId,
        date: NaiveDate,
        slot: ShiftSlot,
    ) -> Result<SlotStatus, AvailabilityError> {
        let key = SlotKey {
            provider_id: provider_id.clone(),
            date,
            slot,
        };
        Ok(self.store.slot_status(&key)?)
    }

    /// Provider-initiated toggle between `available` and `blocked`. A slot
    /// currently booked stays booked until the owning booking is cancelled
    /// or completed.
    pub fn set_status(
        &self,
        provider_id: &ProviderId,
        date: NaiveDate,
        slot: ShiftSlot,
        desired: SlotToggle,
        today: NaiveDate,
    ) -> Result<(), AvailabilityError> {
        self.policy.check_window(date, today)?;

        let key = SlotKey {
            provider_id: provider_id.clone(),
            date,
            slot,
        };
        if let SlotStatus::Booked { booking_id } = self.store.slot_status(&key)? {
            return Err(AvailabilityError::CannotModifyBookedSlot {
                date,
                slot,
                booking_id,
            });
        }

        self.store.put_slot_status(key, desired.to_status())?;
        Ok(())
    }

    /// Bulk toggle covering every shift of `days` consecutive dates.
    /// Booked slots are skipped and reported instead of failing the batch;
    /// the window rules still apply to the range itself.
    pub fn set_range(
        &self,
        provider_id: &ProviderId,
        from: NaiveDate,
        days: u32,
        desired: SlotToggle,
        today: NaiveDate,
    ) -> Result<BulkToggleOutcome, AvailabilityError> {
        let mut outcome = BulkToggleOutcome {
            applied: 0,
            skipped_booked: Vec::new(),
        };

        for offset in 0..days {
            let date = from + Duration::days(offset as i64);
            self.policy.check_window(date, today)?;

            for slot in ShiftSlot::ALL {
                let key = SlotKey {
                    provider_id: provider_id.clone(),
                    date,
                    slot,
                };
                match self.store.slot_status(&key)? {
                    SlotStatus::Booked { booking_id } => {
                        outcome.skipped_booked.push(SkippedSlot {
                            date,
                            slot,
                            booking_id,
                        });
                    }
                    _ => {
                        self.store.put_slot_status(key, desired.to_status())?;
                        outcome.applied += 1;
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Forward calendar view from `from` for `days` dates, bounded by the
    /// horizon.
    pub fn calendar(
        &self,
        provider_id: &ProviderId,
        from: NaiveDate,
        days: u32,
        today: NaiveDate,
    ) -> Result<Vec<CalendarEntry>, AvailabilityError> {
        let mut entries = Vec::new();

        for offset in 0..days {
            let date = from + Duration::days(offset as i64);
            self.policy.check_window(date, today)?;

            for slot in ShiftSlot::ALL {
                let key = SlotKey {
                    provider_id: provider_id.clone(),
                    date,
                    slot,
                };
                entries.push(CalendarEntry {
                    date,
                    slot,
                    status: self.store.slot_status(&key)?,
                });
            }
        }

        Ok(entries)
    }

    /// Whether the provider can currently take an offer for this slot.
    pub fn is_open(
        &self,
        provider_id: &ProviderId,
        date: NaiveDate,
        slot: ShiftSlot,
        today: NaiveDate,
    ) -> Result<bool, AvailabilityError> {
        if self.policy.check_window(date, today).is_err() {
            return Ok(false);
        }

        Ok(matches!(
            self.status(provider_id, date, slot)?,
            SlotStatus::Available
        ))
    }
}
