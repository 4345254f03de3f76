//! Instruction profiler: per-opcode execution counters, enabled via
//! `SessionConfig::enable_iprof`.
//!
//! A counter map keyed by opcode, with a pretty-printer for the summary line
//! logged at `sym_exec` completion.

use crate::opcode::Opcode;
use rustc_hash::FxHashMap;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct InstructionProfiler {
    totals: FxHashMap<Opcode, Duration>,
    counts: FxHashMap<Opcode, u64>,
}

impl InstructionProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, opcode: Opcode, elapsed: Duration) {
        *self.totals.entry(opcode).or_default() += elapsed;
        *self.counts.entry(opcode).or_default() += 1;
    }

    pub fn count_for(&self, opcode: Opcode) -> u64 {
        *self.counts.get(&opcode).unwrap_or(&0)
    }

    /// Sorted (descending total time) per-opcode summary: `(opcode, average,
    /// total, count)`.
    pub fn summary(&self) -> Vec<(Opcode, Duration, Duration, u64)> {
        let mut rows: Vec<_> = self
            .totals
            .iter()
            .filter_map(|(opcode, total)| {
                let count = *self.counts.get(opcode).unwrap_or(&0);
                (count > 0).then(|| {
                    let average = Duration::from_secs_f64(total.as_secs_f64() / count as f64);
                    (*opcode, average, *total, count)
                })
            })
            .collect();
        rows.sort_by(|a, b| b.2.cmp(&a.2));
        rows
    }

    pub fn pretty(&self) -> String {
        let mut out = String::new();
        for (opcode, average, total, count) in self.summary() {
            out.push_str(&format!(
                "{:<16} avg={average:?} total={total:?} ({count} calls)\n",
                opcode.name()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_per_opcode() {
        let mut profiler = InstructionProfiler::new();
        profiler.record(Opcode::Jump, Duration::from_millis(1));
        profiler.record(Opcode::Jump, Duration::from_millis(3));
        assert_eq!(profiler.count_for(Opcode::Jump), 2);
        let summary = profiler.summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].3, 2);
    }

    #[test]
    fn unseen_opcode_has_zero_count() {
        let profiler = InstructionProfiler::new();
        assert_eq!(profiler.count_for(Opcode::Sstore), 0);
    }
}
