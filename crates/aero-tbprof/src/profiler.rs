use std::sync::{Arc, Mutex};

use crate::config::ProfilerConfig;
use crate::counter::{Counter, CounterMode};
use crate::error::{ConfigError, ProfilerError, Result};
use crate::host::{HostRuntime, TranslatedBlock};
use crate::output::{OutputSink, Outputs};
use crate::report::{render_block_map, RankedReport};
use crate::sampler::IntervalSampler;
use crate::store::{BlockHandle, BlockRecord, BlockStore, Translation};

/// Totals returned by [`Profiler::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileSummary {
    /// BBV intervals closed, including the final partial one.
    pub intervals: u64,
    pub total_dynamic_insns: u64,
    pub blocks: usize,
    pub retranslated_blocks: usize,
}

/// Destinations written once, at shutdown.
#[derive(Debug)]
struct ShutdownSinks {
    pc_map: Option<OutputSink>,
    report: Option<OutputSink>,
    report_json: Option<OutputSink>,
}

/// Profiling state for one run.
///
/// Owned by the embedding for the lifetime of the guest process and shared by reference with
/// every vCPU thread. The translation hook only takes the store lock; the execution hook touches
/// atomics and takes the sampler lock only when an interval closes.
#[derive(Debug)]
pub struct Profiler {
    config: ProfilerConfig,
    store: BlockStore,
    insns_in_interval: Counter,
    sampler: Mutex<IntervalSampler>,
    shutdown: Mutex<ShutdownSinks>,
}

impl Profiler {
    /// Parse plugin arguments and open the configured destinations.
    pub fn from_args<I, S>(args: I) -> std::result::Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let config = ProfilerConfig::from_args(args)?;
        Ok(Self::new(config))
    }

    pub fn new(config: ProfilerConfig) -> Self {
        let outputs = Outputs::open(&config);
        Self::with_outputs(config, outputs)
    }

    pub fn with_outputs(config: ProfilerConfig, outputs: Outputs) -> Self {
        Self {
            config,
            store: BlockStore::new(),
            insns_in_interval: Counter::new(0),
            sampler: Mutex::new(IntervalSampler::new(outputs.bbv)),
            shutdown: Mutex::new(ShutdownSinks {
                pc_map: outputs.pc_map,
                report: outputs.report,
                report_json: outputs.report_json,
            }),
        }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Instructions executed since the current interval opened.
    pub fn insns_in_interval(&self) -> u64 {
        self.insns_in_interval.get()
    }

    /// Intervals closed so far.
    pub fn intervals(&self) -> u64 {
        self.sampler.lock().expect("sampler lock poisoned").intervals()
    }

    fn mode(&self) -> CounterMode {
        self.config.counters
    }

    /// Translation hook: resolve the block's record and register its execution counter.
    pub fn on_translate<H: HostRuntime>(&self, host: &mut H, block: &H::Block) -> BlockHandle {
        let handle = self.translate(block);
        host.register_exec_counter(block, Arc::clone(&handle));
        handle
    }

    /// Resolve (or create) the record for `block` without registering a callback.
    pub fn translate<B: TranslatedBlock + ?Sized>(&self, block: &B) -> BlockHandle {
        let (handle, outcome) = self
            .store
            .lookup_or_create(block, self.config.capture_insns, self.mode());
        if matches!(outcome, Translation::Retranslated { shape_changed: true }) {
            tracing::debug!(
                "block {} at {:#x} re-translated with {} insns (recorded {}); keeping first shape",
                handle.id(),
                handle.start_address(),
                block.n_insns(),
                handle.static_insns()
            );
        }
        handle
    }

    /// Execution hook: one dynamic execution of `block`.
    #[inline]
    pub fn on_exec(&self, block: &BlockRecord) {
        let mode = self.mode();
        let n = block.static_insns();

        block.interval_count.add(n, mode);
        let total = self.insns_in_interval.add(n, mode);
        if total > self.config.interval_size {
            self.close_interval(block);
        }
        block.execution_count.add(1, mode);
    }

    /// Close every interval that `block`'s execution just overran.
    ///
    /// The instructions past the boundary are taken out of `block` before each flush and put
    /// back afterwards, so each closed interval reports exactly `interval_size` instructions. A
    /// block larger than the interval closes several intervals in one execution.
    #[cold]
    fn close_interval(&self, block: &BlockRecord) {
        let mode = self.mode();
        let interval = self.config.interval_size;
        let mut sampler = self.sampler.lock().expect("sampler lock poisoned");

        // Another vCPU may have closed these intervals while we waited for the lock.
        loop {
            let total = self.insns_in_interval.get();
            if total <= interval {
                break;
            }
            let overflow = total - interval;

            self.insns_in_interval.drain_up_to(interval, mode);
            // Only what this block actually holds is carried; instructions other vCPUs added
            // to the running total stay in their own blocks' counts.
            let carried = block.interval_count.drain_up_to(overflow, mode);
            sampler.flush(&self.store, mode);
            block.interval_count.add(carried, mode);
        }
    }

    /// Final flush, ranking report, block map; closes every destination.
    pub fn finish<H: HostRuntime>(self, host: &mut H) -> Result<ProfileSummary> {
        let mode = self.mode();
        let mut sampler = self.sampler.into_inner().expect("sampler lock poisoned");
        sampler.flush(&self.store, mode);
        let intervals = sampler.intervals();
        if let Some(sink) = sampler.into_sink() {
            if let Err(err) = sink.close() {
                tracing::warn!("bb-out-file: close failed: {err}");
            }
        }

        let blocks = self.store.snapshots();
        let sinks = self.shutdown.into_inner().expect("shutdown sinks lock poisoned");

        if let Some(mut sink) = sinks.pc_map {
            sink.write_str(&render_block_map(&blocks));
            if let Err(err) = sink.close() {
                tracing::warn!("pc-out-file: close failed: {err}");
            }
        }

        let mut report = RankedReport::build(&blocks, self.config.top);
        report.intervals = intervals;
        let text = report.render();
        match sinks.report {
            Some(mut sink) => {
                sink.write_str(&text);
                sink.close().map_err(|e| ProfilerError::io("report-file", e))?;
            }
            None => host.outs(&text),
        }

        if let Some(mut sink) = sinks.report_json {
            let mut json = report.to_json_pretty()?;
            json.push('\n');
            sink.write_str(&json);
            sink.close().map_err(|e| ProfilerError::io("report-json", e))?;
        }

        let summary = ProfileSummary {
            intervals,
            total_dynamic_insns: report.total_dynamic_insns,
            blocks: report.blocks_seen,
            retranslated_blocks: report.retranslated_blocks,
        };
        tracing::info!(
            intervals = summary.intervals,
            dynamic_insns = summary.total_dynamic_insns,
            blocks = summary.blocks,
            "profiling finished"
        );
        Ok(summary)
    }
}
