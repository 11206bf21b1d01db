//! Execution profiling for a block-translating CPU emulator.
//!
//! The host JIT reports each translated block once ([`Profiler::on_translate`]) and every
//! dynamic execution of it ([`Profiler::on_exec`]). From that stream the profiler produces:
//!
//! - a basic-block vector (BBV) stream, one line per fixed-size instruction interval, suitable
//!   for SimPoint-style phase analysis;
//! - an `F:<id>:<pc>:<symbol>` map tying BBV ids back to guest addresses;
//! - a ranking of the hottest blocks by dynamic instructions and by invocations, rendered at
//!   [`Profiler::finish`].
//!
//! Options use the host plugin convention (`bb-out-file=...`, `interval-size=...`); see
//! [`ProfilerConfig::from_args`].

pub mod config;
pub mod counter;
pub mod error;
pub mod host;
pub mod output;
pub mod profiler;
pub mod report;
pub mod sampler;
pub mod store;

pub use config::{ProfilerConfig, DEFAULT_INTERVAL_SIZE};
pub use counter::CounterMode;
pub use error::{ConfigError, ProfilerError};
pub use host::{HostRuntime, InsnView, Symbol, TranslatedBlock};
pub use output::{OutputSink, Outputs};
pub use profiler::{ProfileSummary, Profiler};
pub use report::{RankedReport, ReportEntry};
pub use store::{BlockHandle, BlockRecord, BlockSnapshot, BlockStore, InsnRecord};
