use crate::wavefront::{Heuristic, Penalties};

/// Gapped extension engine selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtensionMode {
    BandedFast,
    BandedSlow,
    Full,
    Global,
}

/// Immutable configuration of the extension pipeline.
///
/// Built once by the front-end from the CLI flags and passed by shared reference into
/// every stage; nothing mutates it after construction, so tests freely build
/// alternative instances.
#[derive(Clone, Debug)]
pub struct ExtensionConfig {
    pub mode: ExtensionMode,
    pub max_evalue: f64,
    /// X-drop of the ungapped extension stage, in raw score units
    pub raw_ungapped_xdrop: i32,
    /// minimum fractional band overlap for merging chained HSPs into one DP band
    pub min_band_overlap: f64,
    /// maximum HSPs kept per target; 0 means unlimited
    pub max_hsps: usize,
    pub max_target_seqs: i64,
    /// keep matches within this percentage of the best bit score; 100 disables
    pub toppercent: f64,
    pub min_id: f64,
    pub approx_min_id: f64,
    pub query_cover: f64,
    pub subject_cover: f64,
    pub query_or_target_cover: f64,
    /// ranking loop: stop when tail/previous-tail falls below this factor
    pub ranking_score_drop_factor: f64,
    pub ranking_cutoff_bitscore: f64,
    /// hard cap on processed targets per query; 0 disables
    pub target_hard_cap: i64,
    /// stop after the first reported match per query
    pub mapany: bool,
    /// explicit ranking chunk size; 0 = derive from sensitivity
    pub ext_chunk_size: i64,
    pub no_ranking: bool,
    pub global_ranking_targets: i64,
    /// comp-based-stats mode 0..4 (0 = off, 1 = Hauser, >= 2 adds matrix adjust)
    pub comp_based_stats: u32,
    pub swipe_all: bool,
    pub add_self_aln: bool,
    /// k-mer prefilter length; 0 disables the filter
    pub filter_kmer_len: usize,
    pub filter_kmer_cutoff: f64,
    pub gapped_filter: bool,
    pub gapped_filter_evalue1: f64,
    pub gapped_filter_evalue2: f64,
    pub gapped_filter_window: i32,
    /// run the anchored wavefront path instead of banded swipe
    pub anchored_swipe: bool,
    /// anchor clipping window and per-column score threshold
    pub anchor_window: i32,
    pub anchor_score: f64,
    /// largest DP matrix (cells) allowed in the 8-bit score-only lanes
    pub max_swipe_dp: i64,
    /// bin-packing granularity of the DP batch sort
    pub band_bin: i32,
    pub col_bin: i32,
    /// query contexts (1 for plain protein, 6 for translated search)
    pub contexts: usize,
    /// narrow the band when a chained HSP covers this fraction of either sequence
    pub narrow_band_cov: f64,
    pub narrow_band_factor: f64,
    /// mask fraction above which a frame is dropped from the alt-HSP rescan
    pub fully_masked_threshold: f64,
    pub wfa_penalties: Penalties,
    pub wfa_heuristic: Heuristic,
    pub wfa_max_score: Option<i32>,
    /// absent means unlimited; a configured 0 is normalised to absent
    pub wfa_max_memory: Option<u64>,
}

impl ExtensionConfig {
    /// Band width of the banded swipe for a query of length `len`.
    pub fn band(&self, len: i32) -> i32 {
        match self.mode {
            ExtensionMode::BandedFast => match len {
                _ if len < 50 => 12,
                _ if len < 100 => 16,
                _ if len < 250 => 30,
                _ if len < 350 => 40,
                _ => 64,
            },
            _ => match len {
                _ if len < 50 => 15,
                _ if len < 100 => 20,
                _ if len < 150 => 30,
                _ if len < 200 => 50,
                _ if len < 250 => 60,
                _ if len < 350 => 100,
                _ if len < 500 => 120,
                _ => 150,
            },
        }
    }

    /// True when any identity/coverage filter is active.
    pub fn have_filters(&self) -> bool {
        self.min_id > 0.0
            || self.approx_min_id > 0.0
            || self.query_cover > 0.0
            || self.subject_cover > 0.0
            || self.query_or_target_cover > 0.0
    }

    /// Normalises a configured WFA memory budget: 0 means unlimited.
    pub fn set_wfa_max_memory(&mut self, budget: u64) {
        self.wfa_max_memory = if budget == 0 {
            log::debug!("wfa memory budget 0 treated as unlimited");
            None
        } else {
            Some(budget)
        };
    }
}

impl Default for ExtensionConfig {
    fn default() -> ExtensionConfig {
        ExtensionConfig {
            mode: ExtensionMode::BandedFast,
            max_evalue: 0.001,
            raw_ungapped_xdrop: 20,
            min_band_overlap: 0.9,
            max_hsps: 1,
            max_target_seqs: 25,
            toppercent: 100.0,
            min_id: 0.0,
            approx_min_id: 0.0,
            query_cover: 0.0,
            subject_cover: 0.0,
            query_or_target_cover: 0.0,
            ranking_score_drop_factor: 0.95,
            ranking_cutoff_bitscore: 25.0,
            target_hard_cap: 0,
            mapany: false,
            ext_chunk_size: 0,
            no_ranking: false,
            global_ranking_targets: 0,
            comp_based_stats: 1,
            swipe_all: false,
            add_self_aln: false,
            filter_kmer_len: 0,
            filter_kmer_cutoff: 0.6,
            gapped_filter: false,
            gapped_filter_evalue1: 2000.0,
            gapped_filter_evalue2: 10.0,
            gapped_filter_window: 200,
            anchored_swipe: false,
            anchor_window: 12,
            anchor_score: 1.0,
            max_swipe_dp: 32 * 1024 * 1024,
            band_bin: 24,
            col_bin: 400,
            contexts: 1,
            narrow_band_cov: 0.0,
            narrow_band_factor: 0.0,
            fully_masked_threshold: 0.98,
            wfa_penalties: Penalties {
                mismatch: 4,
                gap_open: 6,
                gap_extend: 2,
            },
            wfa_heuristic: Heuristic::None,
            wfa_max_score: None,
            wfa_max_memory: None,
        }
    }
}
