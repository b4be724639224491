//! The [`Monitor`] trait and the records it persists.

use std::borrow::Cow;

use gridiag_core::{Quantity, Timestamp};
use indexmap::IndexMap;

use crate::error::MonitorError;
use crate::TIME_DIM;

/// One timestep's worth of named fields plus its timestamp.
///
/// Raw fields borrow from the driver state; derived fields are owned.
/// Field order is insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct StateRecord<'a> {
    /// Time of the record, exactly as the driver supplied it.
    pub time: Timestamp,
    /// Named fields, excluding `"time"`.
    pub fields: IndexMap<String, Cow<'a, Quantity>>,
}

impl<'a> StateRecord<'a> {
    /// An empty record at `time`.
    pub fn new(time: Timestamp) -> Self {
        Self {
            time,
            fields: IndexMap::new(),
        }
    }

    /// Add a field, returning the one it replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        quantity: Cow<'a, Quantity>,
    ) -> Option<Cow<'a, Quantity>> {
        self.fields.insert(name.into(), quantity)
    }

    /// Look up a field.
    pub fn get(&self, name: &str) -> Option<&Quantity> {
        self.fields.get(name).map(|q| q.as_ref())
    }

    /// All keys of the record: `"time"` first, then fields in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(TIME_DIM).chain(self.fields.keys().map(String::as_str))
    }

    /// Detach from the driver state by cloning any borrowed fields.
    pub fn into_owned(self) -> StateRecord<'static> {
        StateRecord {
            time: self.time,
            fields: self
                .fields
                .into_iter()
                .map(|(k, v)| (k, Cow::Owned(v.into_owned())))
                .collect(),
        }
    }
}

/// Constant fields (grid metadata) stored once per run.
pub type ConstantRecord<'a> = IndexMap<String, &'a Quantity>;

/// A backend that persists diagnostics for one rank.
///
/// Every method is collective: all ranks call it in the same order with
/// records of the same shape.
pub trait Monitor {
    /// Persist one timestep.
    fn store(&mut self, record: &StateRecord<'_>) -> Result<(), MonitorError>;

    /// Persist fields that do not vary in time.
    fn store_constant(&mut self, fields: &ConstantRecord<'_>) -> Result<(), MonitorError>;

    /// Flush anything buffered and release the store.
    fn cleanup(&mut self) -> Result<(), MonitorError>;
}

impl<M: Monitor + ?Sized> Monitor for Box<M> {
    fn store(&mut self, record: &StateRecord<'_>) -> Result<(), MonitorError> {
        (**self).store(record)
    }

    fn store_constant(&mut self, fields: &ConstantRecord<'_>) -> Result<(), MonitorError> {
        (**self).store_constant(fields)
    }

    fn cleanup(&mut self) -> Result<(), MonitorError> {
        (**self).cleanup()
    }
}
