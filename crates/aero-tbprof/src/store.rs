//! Block record store: one record per distinct translated start address.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::counter::{Counter, CounterMode};
use crate::host::{InsnView, Symbol, TranslatedBlock};

/// Shared handle to a block record. Cloned into the host's execution callback registration.
pub type BlockHandle = Arc<BlockRecord>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsnRecord {
    pub bytes: Vec<u8>,
    pub disas: String,
}

impl InsnRecord {
    fn capture(view: InsnView<'_>) -> Self {
        let disas = match view.disas {
            Some(text) => text.into_owned(),
            None => raw_bytes_listing(&view.bytes),
        };
        Self {
            bytes: view.bytes.into_owned(),
            disas,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn raw_bytes_listing(bytes: &[u8]) -> String {
    let mut out = String::from(".byte");
    for (i, b) in bytes.iter().enumerate() {
        out.push_str(if i == 0 { " " } else { ", " });
        let _ = write!(out, "0x{b:02x}");
    }
    out
}

/// Counting record for one translated start address.
///
/// Identity fields are fixed at first sight. The counters are shared with every vCPU through
/// [`BlockHandle`] clones and advance according to the profiler's [`CounterMode`].
#[derive(Debug)]
pub struct BlockRecord {
    id: u64,
    start_address: u64,
    static_insns: u64,
    symbol: Option<Symbol>,
    insns: Vec<InsnRecord>,

    pub(crate) interval_count: Counter,
    pub(crate) execution_count: Counter,
    translation_count: Counter,
    shape_changes: Counter,
}

impl BlockRecord {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn start_address(&self) -> u64 {
        self.start_address
    }

    /// Instruction count recorded at first translation.
    pub fn static_insns(&self) -> u64 {
        self.static_insns
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        self.symbol.as_ref()
    }

    pub fn insns(&self) -> &[InsnRecord] {
        &self.insns
    }

    /// Instructions attributed to the currently open interval.
    pub fn interval_count(&self) -> u64 {
        self.interval_count.get()
    }

    pub fn execution_count(&self) -> u64 {
        self.execution_count.get()
    }

    pub fn translation_count(&self) -> u64 {
        self.translation_count.get()
    }

    /// Re-translations whose instruction count differed from the first translation.
    pub fn shape_changes(&self) -> u64 {
        self.shape_changes.get()
    }

    pub fn dynamic_insns(&self) -> u64 {
        self.execution_count().saturating_mul(self.static_insns)
    }

    pub fn snapshot(&self) -> BlockSnapshot {
        BlockSnapshot {
            id: self.id,
            start_address: self.start_address,
            static_insns: self.static_insns,
            execution_count: self.execution_count(),
            translation_count: self.translation_count(),
            shape_changes: self.shape_changes(),
            symbol: self.symbol.clone(),
            insns: self.insns.clone(),
        }
    }
}

/// Point-in-time copy of a record, used by the shutdown reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSnapshot {
    pub id: u64,
    pub start_address: u64,
    pub static_insns: u64,
    pub execution_count: u64,
    pub translation_count: u64,
    pub shape_changes: u64,
    pub symbol: Option<Symbol>,
    pub insns: Vec<InsnRecord>,
}

impl BlockSnapshot {
    pub fn dynamic_insns(&self) -> u64 {
        self.execution_count.saturating_mul(self.static_insns)
    }

    pub fn symbol_name(&self) -> &str {
        self.symbol.as_ref().map_or("", |s| s.name.as_str())
    }
}

/// Outcome of [`BlockStore::lookup_or_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    FirstSight,
    Retranslated { shape_changed: bool },
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Records in id order; `id == index`.
    records: Vec<BlockHandle>,
    by_address: FxHashMap<u64, usize>,
}

#[derive(Debug, Default)]
pub struct BlockStore {
    inner: Mutex<StoreInner>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the record for `block`, creating it on first sight.
    ///
    /// Re-translation only bumps `translation_count`. A different instruction count on
    /// re-translation is counted in `shape_changes` but the record keeps its first-sight shape
    /// and accumulated counters.
    pub fn lookup_or_create<B>(
        &self,
        block: &B,
        capture_insns: bool,
        mode: CounterMode,
    ) -> (BlockHandle, Translation)
    where
        B: TranslatedBlock + ?Sized,
    {
        let vaddr = block.vaddr();
        let n_insns = block.n_insns() as u64;

        let mut inner = self.inner.lock().expect("block store lock poisoned");
        if let Some(&index) = inner.by_address.get(&vaddr) {
            let record = Arc::clone(&inner.records[index]);
            drop(inner);

            record.translation_count.add(1, mode);
            let shape_changed = n_insns != record.static_insns;
            if shape_changed {
                record.shape_changes.add(1, mode);
            }
            return (record, Translation::Retranslated { shape_changed });
        }

        let insns = if capture_insns {
            (0..block.n_insns()).map(|i| InsnRecord::capture(block.insn(i))).collect()
        } else {
            Vec::new()
        };

        let id = inner.records.len() as u64;
        let record = Arc::new(BlockRecord {
            id,
            start_address: vaddr,
            static_insns: n_insns,
            symbol: block.symbol(),
            insns,
            interval_count: Counter::new(0),
            execution_count: Counter::new(0),
            translation_count: Counter::new(1),
            shape_changes: Counter::new(0),
        });
        let index = inner.records.len();
        inner.by_address.insert(vaddr, index);
        inner.records.push(Arc::clone(&record));
        (record, Translation::FirstSight)
    }

    pub fn get(&self, vaddr: u64) -> Option<BlockHandle> {
        let inner = self.inner.lock().expect("block store lock poisoned");
        inner
            .by_address
            .get(&vaddr)
            .map(|&index| Arc::clone(&inner.records[index]))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("block store lock poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every record in ascending id order while holding the store lock.
    pub fn for_each(&self, mut f: impl FnMut(&BlockRecord)) {
        let inner = self.inner.lock().expect("block store lock poisoned");
        for record in &inner.records {
            f(record);
        }
    }

    /// Snapshot every record in ascending id order.
    pub fn snapshots(&self) -> Vec<BlockSnapshot> {
        let mut out = Vec::new();
        self.for_each(|record| out.push(record.snapshot()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    struct Tb {
        vaddr: u64,
        insns: Vec<(Vec<u8>, Option<&'static str>)>,
        symbol: Option<&'static str>,
    }

    impl TranslatedBlock for Tb {
        fn vaddr(&self) -> u64 {
            self.vaddr
        }

        fn n_insns(&self) -> usize {
            self.insns.len()
        }

        fn insn(&self, index: usize) -> InsnView<'_> {
            let (bytes, disas) = &self.insns[index];
            InsnView {
                bytes: Cow::Borrowed(bytes),
                disas: disas.map(Cow::Borrowed),
            }
        }

        fn symbol(&self) -> Option<Symbol> {
            self.symbol.map(|name| Symbol {
                name: name.to_string(),
                offset: 0,
            })
        }
    }

    fn tb(vaddr: u64, n: usize) -> Tb {
        Tb {
            vaddr,
            insns: vec![(vec![0x13, 0x00, 0x00, 0x00], Some("nop")); n],
            symbol: Some("main"),
        }
    }

    #[test]
    fn ids_follow_first_sight_order() {
        let store = BlockStore::new();
        let (a, _) = store.lookup_or_create(&tb(0x2000, 1), true, CounterMode::Atomic);
        let (b, _) = store.lookup_or_create(&tb(0x1000, 1), true, CounterMode::Atomic);
        let (a2, _) = store.lookup_or_create(&tb(0x2000, 1), true, CounterMode::Atomic);

        assert_eq!(a.id(), 0);
        assert_eq!(b.id(), 1);
        assert_eq!(a2.id(), 0);
        assert_eq!(store.get(0x1000).map(|r| r.id()), Some(1));
        assert_eq!(store.get(0x2000).map(|r| r.id()), Some(0));
        assert!(store.get(0x3000).is_none());
        assert_eq!(store.len(), 2);
        assert!(Arc::ptr_eq(&a, &a2));
    }

    #[test]
    fn retranslation_keeps_first_shape() {
        let store = BlockStore::new();
        let (first, t) = store.lookup_or_create(&tb(0x1000, 4), true, CounterMode::Atomic);
        assert_eq!(t, Translation::FirstSight);
        first.execution_count.add(10, CounterMode::Atomic);

        let (again, t) = store.lookup_or_create(&tb(0x1000, 2), true, CounterMode::Atomic);
        assert_eq!(t, Translation::Retranslated { shape_changed: true });
        assert_eq!(again.static_insns(), 4);
        assert_eq!(again.insns().len(), 4);
        assert_eq!(again.execution_count(), 10);
        assert_eq!(again.translation_count(), 2);
        assert_eq!(again.shape_changes(), 1);
    }

    #[test]
    fn capture_can_be_disabled() {
        let store = BlockStore::new();
        let (record, _) = store.lookup_or_create(&tb(0x1000, 3), false, CounterMode::Atomic);
        assert_eq!(record.static_insns(), 3);
        assert!(record.insns().is_empty());
    }

    #[test]
    fn missing_disassembly_falls_back_to_raw_bytes() {
        let store = BlockStore::new();
        let block = Tb {
            vaddr: 0x4000,
            insns: vec![(vec![0x01, 0x45], None)],
            symbol: None,
        };
        let (record, _) = store.lookup_or_create(&block, true, CounterMode::Atomic);
        assert_eq!(record.insns()[0].disas, ".byte 0x01, 0x45");
        assert_eq!(record.insns()[0].len(), 2);
        assert!(record.symbol().is_none());
        assert_eq!(record.snapshot().symbol_name(), "");
    }
}
