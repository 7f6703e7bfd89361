//! Quark interning for the AFNIX engine.
//!
//! A quark is a stable process-wide integer standing for a string name.
//! Equal strings always intern to the same quark and distinct strings never
//! collide, which makes quarks O(1) dispatch keys: reflective method lookup
//! compares integers, never strings.
//!
//! The registry is a single table behind a read/write lock with a
//! double-checked insert: the common case (the name is already interned)
//! takes only the read lock.

use std::fmt::{Debug, Display};
use std::sync::{Arc, OnceLock, RwLock};

use rustc_hash::FxHashMap;

/// An interned name. Immutable once assigned; copyable and comparable in O(1).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quark(u32);

struct QuarkTable {
    names: Vec<Arc<str>>,
    index: FxHashMap<Arc<str>, u32>,
}

static TABLE: OnceLock<RwLock<QuarkTable>> = OnceLock::new();

fn table() -> &'static RwLock<QuarkTable> {
    TABLE.get_or_init(|| {
        RwLock::new(QuarkTable {
            names: Vec::new(),
            index: FxHashMap::default(),
        })
    })
}

impl Quark {
    /// Interns `name`, returning its stable quark.
    ///
    /// Idempotent for equal strings and injective across distinct strings
    /// within one process run. Safe to call concurrently: losers of the
    /// insert race observe the winner's quark.
    pub fn intern(name: &str) -> Quark {
        let lock = table();
        {
            let guard = lock.read().unwrap_or_else(|e| e.into_inner());
            if let Some(&id) = guard.index.get(name) {
                return Quark(id);
            }
        }
        let mut guard = lock.write().unwrap_or_else(|e| e.into_inner());
        // Another thread may have interned the name while the read lock was
        // released.
        if let Some(&id) = guard.index.get(name) {
            return Quark(id);
        }
        let id = guard.names.len() as u32;
        let shared: Arc<str> = Arc::from(name);
        guard.names.push(shared.clone());
        guard.index.insert(shared, id);
        Quark(id)
    }

    /// Interns a batch of names at once, returning their quarks in order.
    ///
    /// Zones are primed once at module-initialization time so dispatch code
    /// never pays the string comparison.
    pub fn zone(names: &[&str]) -> Vec<Quark> {
        names.iter().map(|name| Quark::intern(name)).collect()
    }

    /// The interned name this quark stands for.
    pub fn as_str(&self) -> Arc<str> {
        let guard = table().read().unwrap_or_else(|e| e.into_inner());
        guard.names[self.0 as usize].clone()
    }

    /// The raw integer key.
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl Display for Quark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Debug for Quark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Quark({}, {:?})", self.0, self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_intern_idempotent() {
        let a = Quark::intern("get-info");
        let b = Quark::intern("get-info");
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
        assert_eq!(&*a.as_str(), "get-info");
    }

    #[test]
    fn test_intern_injective() {
        let a = Quark::intern("alpha-quark");
        let b = Quark::intern("beta-quark");
        assert_ne!(a, b);
        assert_eq!(&*a.as_str(), "alpha-quark");
        assert_eq!(&*b.as_str(), "beta-quark");
    }

    #[test]
    fn test_zone_order() {
        let zone = Quark::zone(&["zone-one", "zone-two", "zone-three"]);
        assert_eq!(zone.len(), 3);
        assert_eq!(&*zone[1].as_str(), "zone-two");
        // Priming the zone again yields the same quarks.
        let again = Quark::zone(&["zone-one", "zone-two", "zone-three"]);
        assert_eq!(zone, again);
    }

    #[test]
    fn test_concurrent_interning() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| Quark::intern("concurrent-quark")))
            .collect();
        let quarks: Vec<Quark> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for quark in &quarks[1..] {
            assert_eq!(quarks[0], *quark);
        }
    }
}
