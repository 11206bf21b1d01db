//! Post-run ranking of translated blocks.
//!
//! Two views over the same record set: by dynamic instructions (`executions * static size`) and
//! by invocation count. Both express their metric as a percentage of the run's total dynamic
//! instruction count.

use std::fmt::Write as _;

use serde::Serialize;

use crate::store::{BlockSnapshot, InsnRecord};

/// Rendered in place of a percentage when no instruction executed during the run.
pub const PERCENT_PLACEHOLDER: &str = "n/a";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub id: u64,
    pub start_address: u64,
    pub static_insns: u64,
    pub executions: u64,
    pub translations: u64,
    /// The value the view is sorted by.
    pub metric: u64,
    /// `None` when the run executed no instructions.
    pub percent: Option<f64>,
    /// Empty when the address did not resolve to a symbol.
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_offset: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub insns: Vec<InsnRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedReport {
    pub total_dynamic_insns: u64,
    pub blocks_seen: usize,
    pub retranslated_blocks: usize,
    pub shape_changes: u64,
    /// Intervals closed, whether or not a BBV destination was attached; filled in at shutdown.
    pub intervals: u64,
    pub by_dynamic_insns: Vec<ReportEntry>,
    pub by_invocations: Vec<ReportEntry>,
}

pub fn percent_of(metric: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(metric as f64 * 100.0 / total as f64)
}

fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(p) => format!("{p:.4}%"),
        None => PERCENT_PLACEHOLDER.to_string(),
    }
}

impl RankedReport {
    /// Rank `blocks`. `top` truncates each view after sorting; totals always cover every block.
    pub fn build(blocks: &[BlockSnapshot], top: Option<usize>) -> Self {
        let total = blocks
            .iter()
            .fold(0u64, |acc, b| acc.saturating_add(b.dynamic_insns()));
        let limit = top.unwrap_or(usize::MAX);

        let mut by_weight: Vec<&BlockSnapshot> = blocks.iter().collect();
        by_weight.sort_by(|a, b| b.dynamic_insns().cmp(&a.dynamic_insns()));
        let by_dynamic_insns = by_weight
            .into_iter()
            .take(limit)
            .map(|b| entry(b, b.dynamic_insns(), total, true))
            .collect();

        let mut by_count: Vec<&BlockSnapshot> = blocks.iter().collect();
        by_count.sort_by(|a, b| b.execution_count.cmp(&a.execution_count));
        let by_invocations = by_count
            .into_iter()
            .take(limit)
            .map(|b| entry(b, b.execution_count, total, false))
            .collect();

        Self {
            total_dynamic_insns: total,
            blocks_seen: blocks.len(),
            retranslated_blocks: blocks.iter().filter(|b| b.translation_count > 1).count(),
            shape_changes: blocks.iter().map(|b| b.shape_changes).sum(),
            intervals: 0,
            by_dynamic_insns,
            by_invocations,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "collected {} translation blocks", self.blocks_seen);

        out.push_str("## Blocks (by dynamic instructions)\n\n");
        for e in &self.by_dynamic_insns {
            render_entry(&mut out, e);
            for insn in &e.insns {
                let _ = writeln!(out, "      {}", insn.disas);
            }
        }

        out.push_str("\n## Blocks (by dynamic invocations)\n\n");
        for e in &self.by_invocations {
            render_entry(&mut out, e);
        }

        out.push_str("\n## Summary\n\n");
        let _ = writeln!(out, "  Dynamic instruction count:   {}", self.total_dynamic_insns);
        let _ = writeln!(out, "  Translation blocks seen:     {}", self.blocks_seen);
        let _ = writeln!(out, "  Retranslated blocks:         {}", self.retranslated_blocks);
        let _ = writeln!(out, "  Retranslation shape changes: {}", self.shape_changes);
        let _ = writeln!(out, "  Intervals closed:            {}", self.intervals);
        out
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn entry(b: &BlockSnapshot, metric: u64, total: u64, with_insns: bool) -> ReportEntry {
    ReportEntry {
        id: b.id,
        start_address: b.start_address,
        static_insns: b.static_insns,
        executions: b.execution_count,
        translations: b.translation_count,
        metric,
        percent: percent_of(metric, total),
        symbol: b.symbol_name().to_string(),
        symbol_offset: b.symbol.as_ref().map(|s| s.offset),
        insns: if with_insns { b.insns.clone() } else { Vec::new() },
    }
}

fn render_entry(out: &mut String, e: &ReportEntry) {
    let _ = writeln!(
        out,
        "  0x{:016x} {} {} {}",
        e.start_address,
        e.metric,
        format_percent(e.percent),
        e.symbol
    );
}

/// Render the `F:<id>:<pc>:<symbol>` cross-reference, one line per block in ascending id order.
///
/// Ids match the ones used in the BBV stream.
pub fn render_block_map(blocks: &[BlockSnapshot]) -> String {
    let mut sorted: Vec<&BlockSnapshot> = blocks.iter().collect();
    sorted.sort_by_key(|b| b.id);

    let mut out = String::new();
    for b in sorted {
        let _ = writeln!(out, "F:{}:{:x}:{}", b.id, b.start_address, b.symbol_name());
    }
    out
}
