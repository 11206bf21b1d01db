use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::ProfilerConfig;

/// A buffered text destination opened at startup and closed once at shutdown.
///
/// Write failures during the run disable the sink instead of propagating: the hooks that write
/// through it have no way to report errors to the guest.
pub struct OutputSink {
    label: &'static str,
    writer: Option<BufWriter<Box<dyn Write + Send>>>,
}

impl std::fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink")
            .field("label", &self.label)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

impl OutputSink {
    pub fn new(label: &'static str, writer: impl Write + Send + 'static) -> Self {
        Self {
            label,
            writer: Some(BufWriter::new(Box::new(writer))),
        }
    }

    /// Create (truncate) `path`. Failure disables the artifact rather than aborting the run.
    pub fn open_file(label: &'static str, path: &Path) -> Option<Self> {
        match File::create(path) {
            Ok(file) => Some(Self::new(label, file)),
            Err(err) => {
                tracing::warn!("{label}: cannot open {}: {err}; output disabled", path.display());
                None
            }
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Write `text`, disabling the sink on the first failure.
    pub fn write_str(&mut self, text: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(err) = writer.write_all(text.as_bytes()) {
            tracing::warn!("{}: write failed: {err}; output disabled", self.label);
            self.writer = None;
        }
    }

    /// Flush and close. Called exactly once at shutdown.
    pub fn close(mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

/// Every destination a profiling run may write to.
#[derive(Debug, Default)]
pub struct Outputs {
    pub bbv: Option<OutputSink>,
    pub pc_map: Option<OutputSink>,
    pub report: Option<OutputSink>,
    pub report_json: Option<OutputSink>,
}

impl Outputs {
    /// Open the files named by `config`. Destinations that cannot be opened stay disabled.
    pub fn open(config: &ProfilerConfig) -> Self {
        let open = |label, path: &Option<PathBuf>| {
            path.as_deref()
                .and_then(|path| OutputSink::open_file(label, path))
        };
        Self {
            bbv: open("bb-out-file", &config.bb_out_file),
            pc_map: open("pc-out-file", &config.pc_out_file),
            report: open("report-file", &config.report_file),
            report_json: open("report-json", &config.report_json),
        }
    }
}
