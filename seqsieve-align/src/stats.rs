/// Per-worker pipeline counters.
///
/// Each worker owns one instance and merges it into the query-level totals at join
/// time, so the hot path never touches shared state.
#[derive(Clone, Copy, Debug, Default)]
pub struct Statistics {
    pub target_hits0: u64,
    pub target_hits1: u64,
    pub target_hits2: u64,
    pub target_hits3: u64,
    pub target_hits4: u64,
    pub target_hits5: u64,
    pub gapped_filter_hits1: u64,
    pub gapped_filter_hits2: u64,
    pub extensions_computed: u64,
    pub trivial_aln: u64,
    pub cbs_targets: u64,
    pub swipe_escalations: u64,
}

impl Statistics {
    pub fn add(&mut self, other: &Statistics) {
        self.target_hits0 += other.target_hits0;
        self.target_hits1 += other.target_hits1;
        self.target_hits2 += other.target_hits2;
        self.target_hits3 += other.target_hits3;
        self.target_hits4 += other.target_hits4;
        self.target_hits5 += other.target_hits5;
        self.gapped_filter_hits1 += other.gapped_filter_hits1;
        self.gapped_filter_hits2 += other.gapped_filter_hits2;
        self.extensions_computed += other.extensions_computed;
        self.trivial_aln += other.trivial_aln;
        self.cbs_targets += other.cbs_targets;
        self.swipe_escalations += other.swipe_escalations;
    }
}
