use chrono::NaiveDate;

use crate::domain::{
    entities::user_data::UserDataEntity, value_objects::user_data_patch::UserDataPatch,
};

/// Resets the daily counters when the record was last played on another day.
///
/// Returns the (possibly reset) record together with the patch that has to be
/// persisted. A record already dated `today` is returned untouched with no patch.
/// A record without a `last_play_date` counts as stale.
pub fn reconcile_daily_state(
    mut record: UserDataEntity,
    today: NaiveDate,
) -> (UserDataEntity, Option<UserDataPatch>) {
    if record.last_play_date == Some(today) {
        return (record, None);
    }

    let patch = UserDataPatch::daily_reset(today);
    patch.apply_to(&mut record);
    (record, Some(patch))
}

/// Per-request sequencing of a daily-state read: `Fetched -> Reconciled -> Persisted`.
///
/// The store write belongs between `Reconciled` and `Persisted` and is only needed
/// when [`DailyStateSync::pending_patch`] returns a patch.
#[derive(Debug, Clone, PartialEq)]
pub enum DailyStateSync {
    Fetched(UserDataEntity),
    Reconciled {
        record: UserDataEntity,
        patch: Option<UserDataPatch>,
    },
    Persisted(UserDataEntity),
}

impl DailyStateSync {
    pub fn fetched(record: UserDataEntity) -> Self {
        Self::Fetched(record)
    }

    /// Later stages are returned unchanged.
    pub fn reconcile(self, today: NaiveDate) -> Self {
        match self {
            Self::Fetched(record) => {
                let (record, patch) = reconcile_daily_state(record, today);
                Self::Reconciled { record, patch }
            }
            other => other,
        }
    }

    pub fn pending_patch(&self) -> Option<&UserDataPatch> {
        match self {
            Self::Reconciled { patch, .. } => patch.as_ref(),
            _ => None,
        }
    }

    /// Only a reconciled state can become persisted.
    pub fn mark_persisted(self) -> Self {
        match self {
            Self::Reconciled { record, .. } => Self::Persisted(record),
            other => other,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetched(_) => "fetched",
            Self::Reconciled { .. } => "reconciled",
            Self::Persisted(_) => "persisted",
        }
    }

    pub fn record(&self) -> &UserDataEntity {
        match self {
            Self::Fetched(record) | Self::Reconciled { record, .. } | Self::Persisted(record) => {
                record
            }
        }
    }

    pub fn into_record(self) -> UserDataEntity {
        match self {
            Self::Fetched(record) | Self::Reconciled { record, .. } | Self::Persisted(record) => {
                record
            }
        }
    }
}
