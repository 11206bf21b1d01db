//! Basic-block vector (BBV) interval sampler.
//!
//! Each closed interval produces one line: the marker `T`, then `:<id>:<count> ` for every block
//! that executed in the interval (ascending id), then a newline. An interval in which nothing ran
//! is a bare `T\n`.

use std::fmt::Write as _;

use crate::counter::CounterMode;
use crate::output::OutputSink;
use crate::store::BlockStore;

#[derive(Debug)]
pub struct IntervalSampler {
    sink: Option<OutputSink>,
    intervals: u64,
    line: String,
}

impl IntervalSampler {
    pub fn new(sink: Option<OutputSink>) -> Self {
        Self {
            sink,
            intervals: 0,
            line: String::new(),
        }
    }

    /// Number of flushes performed so far (whether or not a destination is attached).
    pub fn intervals(&self) -> u64 {
        self.intervals
    }

    pub fn has_output(&self) -> bool {
        self.sink.as_ref().is_some_and(OutputSink::is_open)
    }

    /// Close the current interval: report and zero every nonzero `interval_count`.
    ///
    /// Counters are drained even without a destination so counter evolution does not depend on
    /// whether BBV output is enabled.
    pub fn flush(&mut self, store: &BlockStore, mode: CounterMode) {
        let render = self.has_output();
        let line = &mut self.line;
        line.clear();
        line.push('T');

        store.for_each(|record| {
            if record.interval_count.get() == 0 {
                return;
            }
            let count = record.interval_count.take(mode);
            if render && count > 0 {
                let _ = write!(line, ":{}:{} ", record.id(), count);
            }
        });
        line.push('\n');

        if render {
            if let Some(sink) = self.sink.as_mut() {
                sink.write_str(&self.line);
            }
        }
        self.intervals += 1;
    }

    pub fn into_sink(self) -> Option<OutputSink> {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{InsnView, Symbol, TranslatedBlock};
    use std::borrow::Cow;

    struct Tb(u64);

    impl TranslatedBlock for Tb {
        fn vaddr(&self) -> u64 {
            self.0
        }

        fn n_insns(&self) -> usize {
            1
        }

        fn insn(&self, _index: usize) -> InsnView<'_> {
            InsnView {
                bytes: Cow::Borrowed(&[0x90]),
                disas: None,
            }
        }

        fn symbol(&self) -> Option<Symbol> {
            None
        }
    }

    #[test]
    fn flush_without_destination_still_drains() {
        let store = BlockStore::new();
        let (a, _) = store.lookup_or_create(&Tb(0x1000), false, CounterMode::Atomic);
        let (b, _) = store.lookup_or_create(&Tb(0x2000), false, CounterMode::Atomic);
        a.interval_count.add(5, CounterMode::Atomic);
        b.interval_count.add(9, CounterMode::Atomic);

        let mut sampler = IntervalSampler::new(None);
        assert!(!sampler.has_output());
        sampler.flush(&store, CounterMode::Atomic);

        assert_eq!(sampler.intervals(), 1);
        assert_eq!(a.interval_count(), 0);
        assert_eq!(b.interval_count(), 0);
    }
}
