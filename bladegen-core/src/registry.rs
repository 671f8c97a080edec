//! Memoization of generated functions with per-key placeholders.
//!
//! Reserving a key holds the table lock only briefly. The owner then
//! generates without any registry lock held; other workers asking for the same
//! key block on that key's condition variable until the owner completes or
//! fails it.

use std::collections::HashMap;
use std::sync::Arc;

use log::trace;
use parking_lot::{Condvar, Mutex};

use crate::error::{GenError, Result};
use crate::request::ResolutionKey;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotState {
    InProgress,
    Done(String),
    Failed,
}

#[derive(Debug)]
pub struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    fn new() -> Self {
        Slot {
            state: Mutex::new(SlotState::InProgress),
            ready: Condvar::new(),
        }
    }

    fn settle(&self, state: SlotState) {
        let mut current = self.state.lock();
        if *current == SlotState::InProgress {
            *current = state;
            self.ready.notify_all();
        }
    }
}

/// Exclusive right to generate one key. Dropping it unfinished fails the key.
pub struct OwnerTicket {
    key: ResolutionKey,
    slot: Arc<Slot>,
}

impl OwnerTicket {
    pub fn key(&self) -> &ResolutionKey {
        &self.key
    }

    pub fn complete(self, output_name: &str) {
        trace!("completed {} as {}", self.key, output_name);
        self.slot.settle(SlotState::Done(output_name.to_string()));
    }

    pub fn fail(self) {
        self.slot.settle(SlotState::Failed);
    }
}

impl Drop for OwnerTicket {
    fn drop(&mut self) {
        self.slot.settle(SlotState::Failed);
    }
}

pub enum Reservation {
    Done(String),
    Owner(OwnerTicket),
    Pending(Arc<Slot>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFunctionRecord {
    pub key: ResolutionKey,
    pub output_name: Option<String>,
    pub complete: bool,
}

#[derive(Default)]
pub struct Registry {
    slots: Mutex<HashMap<ResolutionKey, Arc<Slot>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Return the finished name, claim the key, or hand back the slot to wait on.
    pub fn reserve(&self, key: &ResolutionKey) -> Reservation {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            let slot = Arc::clone(slot);
            drop(slots);
            let state = slot.state.lock().clone();
            return match state {
                SlotState::Done(name) => Reservation::Done(name),
                _ => Reservation::Pending(slot),
            };
        }
        let slot = Arc::new(Slot::new());
        slots.insert(key.clone(), Arc::clone(&slot));
        trace!("reserved {}", key);
        Reservation::Owner(OwnerTicket { key: key.clone(), slot })
    }

    /// Block until another worker settles `slot`.
    pub fn wait(&self, key: &ResolutionKey, slot: &Slot) -> Result<String> {
        let mut state = slot.state.lock();
        while *state == SlotState::InProgress {
            slot.ready.wait(&mut state);
        }
        match &*state {
            SlotState::Done(name) => Ok(name.clone()),
            _ => Err(GenError::DependencyFailed(key.to_string())),
        }
    }

    pub fn lookup(&self, key: &ResolutionKey) -> Option<String> {
        let slot = self.slots.lock().get(key).cloned()?;
        let state = slot.state.lock().clone();
        match state {
            SlotState::Done(name) => Some(name),
            _ => None,
        }
    }

    pub fn records(&self) -> Vec<GeneratedFunctionRecord> {
        let slots = self.slots.lock();
        let mut records: Vec<GeneratedFunctionRecord> = slots
            .iter()
            .map(|(key, slot)| {
                let state = slot.state.lock().clone();
                let output_name = match &state {
                    SlotState::Done(name) => Some(name.clone()),
                    _ => None,
                };
                GeneratedFunctionRecord {
                    key: key.clone(),
                    complete: output_name.is_some(),
                    output_name,
                }
            })
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn key(op: &str) -> ResolutionKey {
        ResolutionKey {
            operation: op.to_string(),
            arguments: vec!["mv".to_string(), "mv".to_string()],
            float: "double".to_string(),
            metric: "default".to_string(),
            forced_return: None,
            passing: None,
        }
    }

    #[test]
    fn test_reserve_then_complete() {
        let registry = Registry::new();
        let k = key("gp");
        let ticket = match registry.reserve(&k) {
            Reservation::Owner(t) => t,
            _ => panic!("first reservation should own the key"),
        };
        assert!(matches!(registry.reserve(&k), Reservation::Pending(_)));
        ticket.complete("gp_mv_mv");
        match registry.reserve(&k) {
            Reservation::Done(name) => assert_eq!(name, "gp_mv_mv"),
            _ => panic!("completed key should be returned directly"),
        }
        assert_eq!(registry.lookup(&k).as_deref(), Some("gp_mv_mv"));
    }

    #[test]
    fn test_dropped_ticket_fails_waiters() {
        let registry = Registry::new();
        let k = key("dual");
        let ticket = match registry.reserve(&k) {
            Reservation::Owner(t) => t,
            _ => panic!("expected ownership"),
        };
        drop(ticket);
        let slot = match registry.reserve(&k) {
            Reservation::Pending(slot) => slot,
            _ => panic!("failed key should not look complete"),
        };
        assert!(matches!(registry.wait(&k, &slot), Err(GenError::DependencyFailed(_))));
    }

    #[test]
    fn test_waiter_is_woken_by_owner() {
        let registry = Arc::new(Registry::new());
        let k = key("subtract");
        let ticket = match registry.reserve(&k) {
            Reservation::Owner(t) => t,
            _ => panic!("expected ownership"),
        };

        let waiter = {
            let registry = Arc::clone(&registry);
            let k = k.clone();
            thread::spawn(move || match registry.reserve(&k) {
                Reservation::Pending(slot) => registry.wait(&k, &slot),
                Reservation::Done(name) => Ok(name),
                Reservation::Owner(_) => panic!("key was already reserved"),
            })
        };

        ticket.complete("subtract_mv_mv");
        assert_eq!(waiter.join().unwrap().unwrap(), "subtract_mv_mv");
        let records = registry.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].complete);
    }
}
