use std::path::PathBuf;

use crate::counter::CounterMode;
use crate::error::ConfigError;

pub const DEFAULT_INTERVAL_SIZE: u64 = 100_000_000;

/// Profiler options, parsed from host plugin arguments (`key=value` strings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilerConfig {
    /// Destination of the basic-block vector stream. `None` disables interval sampling output.
    pub bb_out_file: Option<PathBuf>,
    /// Destination of the `F:<id>:<pc>:<symbol>` block map.
    pub pc_out_file: Option<PathBuf>,
    /// Interval length in dynamically executed guest instructions.
    pub interval_size: u64,
    pub counters: CounterMode,
    /// Destination of the ranking report. `None` routes it to the host output channel.
    pub report_file: Option<PathBuf>,
    pub report_json: Option<PathBuf>,
    /// Rows per ranking view; `None` lists every block.
    pub top: Option<usize>,
    /// Capture per-instruction bytes/disassembly on first translation.
    pub capture_insns: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            bb_out_file: None,
            pc_out_file: None,
            interval_size: DEFAULT_INTERVAL_SIZE,
            counters: CounterMode::Atomic,
            report_file: None,
            report_json: None,
            top: None,
            capture_insns: true,
        }
    }
}

impl ProfilerConfig {
    /// Parse plugin arguments.
    ///
    /// Later occurrences of a key override earlier ones. Any unrecognized or malformed option
    /// rejects the whole set.
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        for arg in args {
            config.apply(arg.as_ref())?;
        }
        Ok(config)
    }

    fn apply(&mut self, opt: &str) -> Result<(), ConfigError> {
        let Some((key, value)) = opt.split_once('=') else {
            return Err(ConfigError::MissingValue(opt.to_string()));
        };

        match key {
            "bb-out-file" => self.bb_out_file = non_empty_path(value),
            "pc-out-file" => self.pc_out_file = non_empty_path(value),
            "report-file" => self.report_file = non_empty_path(value),
            "report-json" => self.report_json = non_empty_path(value),
            "interval-size" => self.interval_size = parse_positive("interval-size", value)?,
            "top" => {
                let top = parse_positive("top", value)?;
                self.top = Some(usize::try_from(top).unwrap_or(usize::MAX));
            }
            "counters" => {
                self.counters = match value {
                    "atomic" => CounterMode::Atomic,
                    "unsynchronized" => CounterMode::Unsynchronized,
                    _ => {
                        return Err(ConfigError::InvalidChoice {
                            key: "counters",
                            value: value.to_string(),
                            expected: "atomic, unsynchronized",
                        })
                    }
                }
            }
            "insns" => self.capture_insns = parse_bool("insns", value)?,
            _ => return Err(ConfigError::UnknownOption(opt.to_string())),
        }
        Ok(())
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn parse_positive(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    let parsed: u64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidInteger {
            key,
            value: value.to_string(),
        })?;
    if parsed == 0 {
        return Err(ConfigError::ZeroNotAllowed { key });
    }
    Ok(parsed)
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidChoice {
            key,
            value: value.to_string(),
            expected: "on, off, true, false, yes, no",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_options() {
        let config = ProfilerConfig::from_args(Vec::<String>::new()).unwrap();
        assert_eq!(config, ProfilerConfig::default());
        assert_eq!(config.interval_size, 100_000_000);
        assert_eq!(config.counters, CounterMode::Atomic);
        assert!(config.bb_out_file.is_none());
        assert!(config.capture_insns);
    }

    #[test]
    fn recognized_options_are_applied() {
        let config = ProfilerConfig::from_args([
            "bb-out-file=/tmp/run.bb",
            "pc-out-file=/tmp/run.pc",
            "interval-size=5000",
            "counters=unsynchronized",
            "top=50",
            "insns=off",
        ])
        .unwrap();

        assert_eq!(config.bb_out_file, Some(PathBuf::from("/tmp/run.bb")));
        assert_eq!(config.pc_out_file, Some(PathBuf::from("/tmp/run.pc")));
        assert_eq!(config.interval_size, 5000);
        assert_eq!(config.counters, CounterMode::Unsynchronized);
        assert_eq!(config.top, Some(50));
        assert!(!config.capture_insns);
    }

    #[test]
    fn last_occurrence_wins() {
        let config =
            ProfilerConfig::from_args(["interval-size=10", "interval-size=20"]).unwrap();
        assert_eq!(config.interval_size, 20);
    }

    #[test]
    fn unknown_option_is_fatal() {
        let err = ProfilerConfig::from_args(["bogus=1"]).unwrap_err();
        assert_eq!(err, ConfigError::UnknownOption("bogus=1".to_string()));
    }

    #[test]
    fn option_without_value_is_fatal() {
        let err = ProfilerConfig::from_args(["inline"]).unwrap_err();
        assert_eq!(err, ConfigError::MissingValue("inline".to_string()));
    }

    #[test]
    fn malformed_interval_size_is_fatal() {
        assert!(matches!(
            ProfilerConfig::from_args(["interval-size=12abc"]),
            Err(ConfigError::InvalidInteger {
                key: "interval-size",
                ..
            })
        ));
        assert!(matches!(
            ProfilerConfig::from_args(["interval-size=-5"]),
            Err(ConfigError::InvalidInteger { .. })
        ));
        assert_eq!(
            ProfilerConfig::from_args(["interval-size=0"]).unwrap_err(),
            ConfigError::ZeroNotAllowed {
                key: "interval-size"
            }
        );
    }

    #[test]
    fn invalid_choices_are_fatal() {
        assert!(matches!(
            ProfilerConfig::from_args(["counters=relaxed"]),
            Err(ConfigError::InvalidChoice {
                key: "counters",
                ..
            })
        ));
        assert!(matches!(
            ProfilerConfig::from_args(["insns=maybe"]),
            Err(ConfigError::InvalidChoice { key: "insns", .. })
        ));
    }

    #[test]
    fn empty_path_disables_destination() {
        let config = ProfilerConfig::from_args(["bb-out-file="]).unwrap();
        assert!(config.bb_out_file.is_none());
    }
}
