use serde::{Deserialize, Serialize};

/// Identity of one issued oracle request. Ids only ever increase.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct RequestId(pub u64);

/// Tracks the single request allowed in flight for one logical slot
/// (current melody analysis, variation, corpus placement).
///
/// A response is applied only when its id is still the latest issued for
/// the slot; `invalidate` makes every outstanding id stale.
#[derive(Clone, Debug, Default)]
pub struct RequestSlot {
    latest: u64,
    in_flight: Option<RequestId>,
}

impl RequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Issue a new id, or `None` while a request is already in flight.
    pub fn begin(&mut self) -> Option<RequestId> {
        if self.in_flight.is_some() {
            return None;
        }
        self.latest += 1;
        let id = RequestId(self.latest);
        self.in_flight = Some(id);
        Some(id)
    }

    /// Whether a response carrying `id` may still be applied.
    pub fn is_current(&self, id: RequestId) -> bool {
        self.in_flight == Some(id)
    }

    /// Close out `id`. Returns false for stale ids, which leave the slot as is.
    pub fn finish(&mut self, id: RequestId) -> bool {
        if !self.is_current(id) {
            log::debug!("dropping stale response {:?} (latest {})", id, self.latest);
            return false;
        }
        self.in_flight = None;
        true
    }

    /// Abandon whatever is in flight. Its eventual response will be dropped.
    pub fn invalidate(&mut self) {
        if let Some(id) = self.in_flight.take() {
            log::debug!("invalidated in-flight request {:?}", id);
        }
    }
}
