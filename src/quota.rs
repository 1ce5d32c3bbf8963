// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quotas and the cell that carries them between threads.
//!
//! A quota is a bound on an observed value. A zero bound (`0` bytes, `0` files, [`Duration::ZERO`])
//! disables the quota: every value meets it.
//!
//! Quotas come in two groups that the rotation engine checks at different times, active-file
//! quotas before and after every write and archived-set quotas on pruning. Each group carries a
//! dirty flag so a live change forces a check right away. [`QuotaCell`] hands (values, flags) to the
//! engine as one consistent snapshot.

use crate::spinlock::Spinlock;
use std::time::Duration;

/// A bound that is disabled at zero.
pub trait Quota: Copy {
    fn is_unbounded(self) -> bool;
    fn allows(self, observed: Self) -> bool;
}

macro_rules! quota_for_ordered {
    ($($ty:ty => $zero:expr),* $(,)?) => {
        $(
            impl Quota for $ty {
                #[inline]
                fn is_unbounded(self) -> bool {
                    self == $zero
                }
                #[inline]
                fn allows(self, observed: Self) -> bool {
                    self.is_unbounded() || observed <= self
                }
            }
        )*
    };
}

quota_for_ordered!(Duration => Duration::ZERO, u64 => 0, usize => 0);

/// Whether `observed` stays within `bound`.
#[inline]
pub fn meets<Q: Quota>(observed: Q, bound: Q) -> bool {
    bound.allows(observed)
}

/// Limits on the file currently being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveFileQuotas {
    pub max_age: Duration,
    /// Bytes.
    pub max_size: u64,
}

impl ActiveFileQuotas {
    pub fn allow(&self, age: Duration, size: u64) -> bool {
        meets(age, self.max_age) && meets(size, self.max_size)
    }
}

/// Limits on the set of archived files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchivedFileQuotas {
    /// Age of each archived file.
    pub max_age: Duration,
    pub max_count: usize,
    /// Sum of archived file sizes, in bytes.
    pub max_total_size: u64,
    /// Archived files plus the active one.
    pub max_log_files: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaSnapshot {
    pub active: ActiveFileQuotas,
    pub archived: ArchivedFileQuotas,
    pub active_dirty: bool,
    pub archived_dirty: bool,
}

/// Quota values plus their dirty flags, written from any thread and consumed by the engine.
#[derive(Debug)]
pub(crate) struct QuotaCell {
    state: Spinlock<QuotaSnapshot>,
}

impl QuotaCell {
    pub(crate) fn new(active: ActiveFileQuotas, archived: ArchivedFileQuotas) -> Self {
        QuotaCell {
            state: Spinlock::new(QuotaSnapshot {
                active,
                archived,
                active_dirty: false,
                archived_dirty: false,
            }),
        }
    }

    pub(crate) fn update_active(&self, f: impl FnOnce(&mut ActiveFileQuotas)) {
        self.state.with_mut(|state| {
            f(&mut state.active);
            state.active_dirty = true;
        });
    }

    pub(crate) fn update_archived(&self, f: impl FnOnce(&mut ArchivedFileQuotas)) {
        self.state.with_mut(|state| {
            f(&mut state.archived);
            state.archived_dirty = true;
        });
    }

    /// Current values without touching the flags.
    pub(crate) fn peek(&self) -> QuotaSnapshot {
        self.state.snapshot()
    }

    /// Current values and flags in one read; the flags are cleared.
    pub(crate) fn take(&self) -> QuotaSnapshot {
        self.state.with_mut(|state| {
            let snapshot = *state;
            state.active_dirty = false;
            state.archived_dirty = false;
            snapshot
        })
    }
}
