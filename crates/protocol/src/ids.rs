//! Call id generation
//!
//! Every outbound operation that expects correlation carries an id of the
//! form `<kind>:<name>:<n>`, e.g. `call_service:/add_two_ints:7`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues strictly increasing integers starting at 0
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id; never repeats, even under concurrent callers
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// The operation a call id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Subscribe,
    Unsubscribe,
    Advertise,
    Unadvertise,
    Publish,
    CallService,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Subscribe => "subscribe",
            CallKind::Unsubscribe => "unsubscribe",
            CallKind::Advertise => "advertise",
            CallKind::Unadvertise => "unadvertise",
            CallKind::Publish => "publish",
            CallKind::CallService => "call_service",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats `<kind>:<name>:<n>`
pub fn call_id(kind: CallKind, name: &str, n: u64) -> String {
    format!("{kind}:{name}:{n}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_start_at_zero_and_increase() {
        let ids = IdGenerator::new();
        for expected in 0..20 {
            assert_eq!(ids.next_id(), expected);
        }
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let ids = Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..500).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn test_call_id_format() {
        assert_eq!(call_id(CallKind::CallService, "/add", 3), "call_service:/add:3");
        assert_eq!(call_id(CallKind::Subscribe, "/scan", 0), "subscribe:/scan:0");
    }
}
