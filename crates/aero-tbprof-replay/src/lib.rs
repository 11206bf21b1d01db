//! Drive an [`aero_tbprof::Profiler`] from a recorded event trace.
//!
//! The trace stands in for a live JIT: `translate` events go through the translation hook,
//! `exec` events through the execution hook of the handle registered for that address.

pub mod disasm;
pub mod host;
pub mod trace;

use std::io::{BufRead, Write};

use aero_tbprof::Profiler;

pub use disasm::Arch;
pub use host::{ReplayBlock, ReplayHost};
pub use trace::{TraceError, TraceEvent, TraceInsn};

/// Event totals for one replayed trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: u64,
    pub translations: u64,
    pub executions: u64,
}

pub fn replay<R: BufRead, W: Write>(
    input: R,
    profiler: &Profiler,
    host: &mut ReplayHost<W>,
) -> Result<ReplayStats, TraceError> {
    let mut stats = ReplayStats::default();

    for event in trace::events(input) {
        let (line, event) = event?;
        stats.events += 1;

        match event {
            TraceEvent::Header { arch } => {
                tracing::debug!(%arch, "trace header");
                host.set_arch(Arch::from_name(&arch));
            }
            TraceEvent::Translate {
                vaddr,
                insns,
                symbol,
                symbol_offset,
            } => {
                if insns.is_empty() {
                    return Err(TraceError::EmptyBlock { line, vaddr });
                }
                let block = ReplayBlock::new(host.arch(), vaddr, insns, symbol, symbol_offset);
                profiler.on_translate(host, &block);
                stats.translations += 1;
            }
            TraceEvent::Exec { vaddr, repeat } => {
                let handle = host
                    .handle(vaddr)
                    .ok_or(TraceError::UntranslatedExec { line, vaddr })?;
                for _ in 0..repeat {
                    profiler.on_exec(&handle);
                }
                stats.executions += repeat;
            }
        }
    }

    Ok(stats)
}
