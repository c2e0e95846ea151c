//! Gap-affine wavefront alignment.
//!
//! Tracks, per score and per diagonal, the furthest-reaching query offset of the
//! match (`M`), insertion (`I`) and deletion (`D`) states. Each step extends every
//! diagonal along its match run (eight letters at a time via 64-bit compares), then
//! derives the next score's wavefront from the mismatch and gap predecessors.
//!
//! Backtrace is piggybacked: every cell carries a packed 2-bit CIGAR prefix; when the
//! prefix saturates it is offloaded to a block arena and the in-cell prefix restarts.
//! The arena is freed wholesale when the alignment ends.
//!
//! Heuristics prune diagonals between steps; under a heuristic the result is the best
//! alignment within the explored region, reported explicitly through
//! [`WfaStatus`].

pub mod anchored;
mod pcigar;

use seqsieve_seq::alphabet::Letter;

use crate::hsp::EditOp;
use pcigar::{BtArena, BtCell};

/// Alignment costs; match is free, the rest are non-negative penalties.
#[derive(Clone, Copy, Debug)]
pub struct Penalties {
    pub mismatch: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
}

/// Diagonal pruning strategy applied between cost steps.
#[derive(Clone, Copy, Debug)]
pub enum Heuristic {
    None,
    /// fixed diagonal band
    BandedStatic { band_min_k: i32, band_max_k: i32 },
    /// band re-centred on the best diagonal every `steps` cost steps
    BandedAdaptive { band_min_k: i32, band_max_k: i32, steps: i32 },
    /// drop diagonals too far behind the furthest antidiagonal
    WfaAdaptive { min_wavefront_length: i32, max_distance_threshold: i32, steps: i32 },
    /// drop diagonals more than `xdrop` behind the best antidiagonal
    XDrop { xdrop: i32, steps: i32 },
    /// abort when progress falls `zdrop` behind the best seen
    ZDrop { zdrop: i32, steps: i32 },
}

/// Termination state of one wavefront alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WfaStatus {
    Successful,
    /// the heuristic pruned every live diagonal before the end was reached
    Unfeasible,
    MaxScoreReached,
    Oom,
}

/// Result of one alignment; `cigar` is filled only when the aligner was built with
/// transcript support.
#[derive(Clone, Debug)]
pub struct WfaResult {
    pub status: WfaStatus,
    /// accumulated penalty of the alignment (0 for a perfect match)
    pub score: i32,
    pub cigar: Vec<EditOp>,
    /// query/text positions reached (end-to-end: the sequence lengths)
    pub pattern_end: i32,
    pub text_end: i32,
}

const NULL_OFFSET: i32 = i32::MIN / 2;

#[derive(Clone, Copy)]
struct Cell {
    offset: i32,
    bt: BtCell,
}

impl Cell {
    fn null() -> Cell {
        Cell {
            offset: NULL_OFFSET,
            bt: BtCell::new(),
        }
    }

    fn is_null(&self) -> bool {
        self.offset == NULL_OFFSET
    }
}

/// One wavefront: cells for a contiguous diagonal range `lo..=hi`.
#[derive(Clone)]
struct Wavefront {
    lo: i32,
    hi: i32,
    cells: Vec<Cell>,
}

impl Wavefront {
    fn new(lo: i32, hi: i32) -> Wavefront {
        Wavefront {
            lo,
            hi,
            cells: vec![Cell::null(); (hi - lo + 1).max(0) as usize],
        }
    }

    fn get(&self, k: i32) -> Cell {
        if k < self.lo || k > self.hi {
            Cell::null()
        } else {
            self.cells[(k - self.lo) as usize]
        }
    }

    fn set(&mut self, k: i32, cell: Cell) {
        if k >= self.lo && k <= self.hi {
            self.cells[(k - self.lo) as usize] = cell;
        }
    }

    fn live_cells(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_null()).count()
    }

    fn memory(&self) -> u64 {
        self.cells.len() as u64 * std::mem::size_of::<Cell>() as u64
    }
}

#[derive(Clone)]
struct Level {
    m: Wavefront,
    i: Wavefront,
    d: Wavefront,
}

/// Free-end margins of an ends-free alignment; zero everywhere means end-to-end.
#[derive(Clone, Copy, Debug, Default)]
pub struct EndsFree {
    pub pattern_begin_free: i32,
    pub pattern_end_free: i32,
    pub text_begin_free: i32,
    pub text_end_free: i32,
}

/// The wavefront aligner; reusable across calls, scratch memory grows to the largest
/// alignment seen.
pub struct WfaAligner {
    penalties: Penalties,
    heuristic: Heuristic,
    max_score: Option<i32>,
    max_memory: Option<u64>,
    compute_cigar: bool,
}

impl WfaAligner {
    pub fn new(penalties: Penalties) -> WfaAligner {
        assert!(penalties.mismatch > 0 && penalties.gap_open >= 0 && penalties.gap_extend > 0);
        WfaAligner {
            penalties,
            heuristic: Heuristic::None,
            max_score: None,
            max_memory: None,
            compute_cigar: true,
        }
    }

    pub fn with_heuristic(mut self, heuristic: Heuristic) -> WfaAligner {
        self.heuristic = heuristic;
        self
    }

    pub fn with_max_score(mut self, max_score: i32) -> WfaAligner {
        self.max_score = Some(max_score);
        self
    }

    /// A budget of 0 means unlimited (absent).
    pub fn with_max_memory(mut self, max_memory: u64) -> WfaAligner {
        self.max_memory = if max_memory == 0 { None } else { Some(max_memory) };
        self
    }

    pub fn score_only(mut self) -> WfaAligner {
        self.compute_cigar = false;
        self
    }

    /// Global alignment of the full sequences.
    pub fn align_end_to_end(&self, pattern: &[Letter], text: &[Letter]) -> WfaResult {
        self.align(pattern, text, EndsFree::default())
    }

    /// Ends-free alignment: the given margins at either end of either sequence may
    /// stay unaligned for free.
    pub fn align_ends_free(&self, pattern: &[Letter], text: &[Letter], ends: EndsFree) -> WfaResult {
        self.align(pattern, text, ends)
    }

    fn align(&self, pattern: &[Letter], text: &[Letter], ends: EndsFree) -> WfaResult {
        let n = pattern.len() as i32;
        let m = text.len() as i32;
        let mut arena = BtArena::new();
        let mut levels: Vec<Option<Level>> = Vec::new();

        // initial wavefront: free begins seed extra diagonals at score 0
        let lo0 = -ends.text_begin_free;
        let hi0 = ends.pattern_begin_free;
        let mut level0 = Level {
            m: Wavefront::new(lo0, hi0),
            i: Wavefront::new(lo0, hi0),
            d: Wavefront::new(lo0, hi0),
        };
        for k in lo0..=hi0 {
            let offset = k.max(0); // pattern_begin_free skips pattern; text free starts at i = 0
            level0.m.set(
                k,
                Cell {
                    offset,
                    bt: BtCell::new(),
                },
            );
        }
        self.extend_level(&mut level0, pattern, text, &mut arena);
        if let Some(k) = self.find_done(&level0, n, m, &ends) {
            return self.finish(WfaStatus::Successful, 0, &level0, k, &arena);
        }
        levels.push(Some(level0));

        let lookback = self.max_lookback() as i32;
        let mut last_live = 0i32;
        let mut best_antidiag = 0i64;
        let mut memory = 0u64;
        let mut score = 0i32;
        loop {
            score += 1;
            if let Some(max_score) = self.max_score {
                if score > max_score {
                    return self.best_effort(WfaStatus::MaxScoreReached, score, &levels, &arena);
                }
            }
            if score - last_live > lookback {
                // no live cell can seed any further level
                return self.best_effort(WfaStatus::Unfeasible, score, &levels, &arena);
            }

            let next = self.compute_level(&levels, score, n, m, &mut arena);
            let mut next = match next {
                Some(l) => l,
                None => {
                    levels.push(None);
                    continue;
                }
            };
            self.extend_level(&mut next, pattern, text, &mut arena);
            self.prune(&mut next, score, &mut best_antidiag);
            if let Heuristic::ZDrop { zdrop, .. } = self.heuristic {
                let current = level_antidiag(&next);
                if current != i64::MIN && best_antidiag - current > zdrop as i64 {
                    levels.push(Some(next));
                    return self.best_effort(WfaStatus::Unfeasible, score, &levels, &arena);
                }
            }
            if let Some(k) = self.find_done(&next, n, m, &ends) {
                return self.finish(WfaStatus::Successful, score, &next, k, &arena);
            }
            if next.m.live_cells() > 0 || next.i.live_cells() > 0 || next.d.live_cells() > 0 {
                last_live = score;
            }
            memory += next.m.memory() + next.i.memory() + next.d.memory();
            if let Some(budget) = self.max_memory {
                if memory + arena.memory() > budget {
                    return WfaResult {
                        status: WfaStatus::Oom,
                        score,
                        cigar: Vec::new(),
                        pattern_end: 0,
                        text_end: 0,
                    };
                }
            }
            levels.push(Some(next));
        }
    }

    fn max_lookback(&self) -> usize {
        let p = self.penalties;
        (p.mismatch.max(p.gap_open + p.gap_extend)) as usize + 1
    }

    /// Derives the wavefront at `score` from its mismatch and gap predecessors.
    fn compute_level(
        &self,
        levels: &[Option<Level>],
        score: i32,
        n: i32,
        m: i32,
        arena: &mut BtArena,
    ) -> Option<Level> {
        let p = self.penalties;
        let get = |s: i32| -> Option<&Level> {
            if s < 0 {
                None
            } else {
                levels.get(s as usize).and_then(|l| l.as_ref())
            }
        };
        let mism = get(score - p.mismatch);
        let open = get(score - p.gap_open - p.gap_extend);
        let ext = get(score - p.gap_extend);
        if mism.is_none() && open.is_none() && ext.is_none() {
            return None;
        }

        let mut lo = i32::MAX;
        let mut hi = i32::MIN;
        for l in [mism, open, ext].into_iter().flatten() {
            lo = lo.min(l.m.lo).min(l.i.lo).min(l.d.lo);
            hi = hi.max(l.m.hi).max(l.i.hi).max(l.d.hi);
        }
        if lo == i32::MAX {
            return None;
        }
        let lo = (lo - 1).max(-(m - 1).max(0) - 1);
        let hi = (hi + 1).min((n - 1).max(0) + 1);
        let mut level = Level {
            m: Wavefront::new(lo, hi),
            i: Wavefront::new(lo, hi),
            d: Wavefront::new(lo, hi),
        };
        let mut any = false;
        for k in lo..=hi {
            // offsets beyond the sequences are dead
            let valid = |c: &Cell| {
                !c.is_null() && c.offset >= 0 && c.offset <= n && c.offset - k >= 0 && c.offset - k <= m
            };
            // insertion: consumes one pattern letter (diag k-1 -> k, offset + 1)
            let i_open = open.map(|l| l.m.get(k - 1)).unwrap_or_else(Cell::null);
            let i_ext = ext.map(|l| l.i.get(k - 1)).unwrap_or_else(Cell::null);
            let i_cell = {
                let src = if i_open.offset >= i_ext.offset { i_open } else { i_ext };
                if src.is_null() {
                    Cell::null()
                } else {
                    Cell {
                        offset: src.offset + 1,
                        bt: if self.compute_cigar {
                            arena.push_op(src.bt, pcigar::OP_INS)
                        } else {
                            src.bt
                        },
                    }
                }
            };
            let i_cell = if valid(&i_cell) { i_cell } else { Cell::null() };
            // deletion: consumes one text letter (diag k+1 -> k, offset unchanged)
            let d_open = open.map(|l| l.m.get(k + 1)).unwrap_or_else(Cell::null);
            let d_ext = ext.map(|l| l.d.get(k + 1)).unwrap_or_else(Cell::null);
            let d_cell = {
                let src = if d_open.offset >= d_ext.offset { d_open } else { d_ext };
                if src.is_null() {
                    Cell::null()
                } else {
                    Cell {
                        offset: src.offset,
                        bt: if self.compute_cigar {
                            arena.push_op(src.bt, pcigar::OP_DEL)
                        } else {
                            src.bt
                        },
                    }
                }
            };
            let d_cell = if valid(&d_cell) { d_cell } else { Cell::null() };
            // mismatch: both advance one
            let x_src = mism.map(|l| l.m.get(k)).unwrap_or_else(Cell::null);
            let x_cell = if x_src.is_null() {
                Cell::null()
            } else {
                Cell {
                    offset: x_src.offset + 1,
                    bt: if self.compute_cigar {
                        arena.push_op(x_src.bt, pcigar::OP_MISMATCH)
                    } else {
                        x_src.bt
                    },
                }
            };
            let x_cell = if valid(&x_cell) { x_cell } else { Cell::null() };
            let mut best = x_cell;
            if !i_cell.is_null() && i_cell.offset > best.offset {
                best = i_cell;
            }
            if !d_cell.is_null() && d_cell.offset > best.offset {
                best = d_cell;
            }
            if !best.is_null() || !i_cell.is_null() || !d_cell.is_null() {
                any = true;
            }
            level.i.set(k, i_cell);
            level.d.set(k, d_cell);
            level.m.set(k, best);
        }
        if any {
            Some(level)
        } else {
            None
        }
    }

    /// Extends every live `M` diagonal along its run of matching letters.
    fn extend_level(&self, level: &mut Level, pattern: &[Letter], text: &[Letter], arena: &mut BtArena) {
        for idx in 0..level.m.cells.len() {
            let k = level.m.lo + idx as i32;
            let cell = level.m.cells[idx];
            if cell.is_null() {
                continue;
            }
            let i = cell.offset;
            let j = i - k;
            if j < 0 {
                continue;
            }
            let run = match_run(pattern, text, i as usize, j as usize);
            if run > 0 {
                let mut bt = cell.bt;
                if self.compute_cigar {
                    for _ in 0..run {
                        bt = arena.push_op(bt, pcigar::OP_MATCH);
                    }
                }
                level.m.cells[idx] = Cell {
                    offset: i + run as i32,
                    bt,
                };
            }
        }
    }

    fn find_done(&self, level: &Level, n: i32, m: i32, ends: &EndsFree) -> Option<i32> {
        let mut best: Option<(i64, i32)> = None;
        for idx in 0..level.m.cells.len() {
            let k = level.m.lo + idx as i32;
            let cell = level.m.cells[idx];
            if cell.is_null() {
                continue;
            }
            let i = cell.offset;
            let j = i - k;
            let pattern_done = i >= n - ends.pattern_end_free;
            let text_done = j >= m - ends.text_end_free;
            if (i == n && text_done) || (j == m && pattern_done) || (i == n && j == m) {
                let antidiag = i as i64 + j as i64;
                if best.map(|(a, _)| antidiag > a).unwrap_or(true) {
                    best = Some((antidiag, k));
                }
            }
        }
        best.map(|(_, k)| k)
    }

    fn prune(&self, level: &mut Level, score: i32, best_antidiag: &mut i64) {
        let current = level_antidiag(level);
        if current > *best_antidiag {
            *best_antidiag = current;
        }
        let kill = |wf: &mut Wavefront, pred: &dyn Fn(i32, &Cell) -> bool| {
            for idx in 0..wf.cells.len() {
                let k = wf.lo + idx as i32;
                let cell = wf.cells[idx];
                if !cell.is_null() && pred(k, &cell) {
                    wf.cells[idx] = Cell::null();
                }
            }
        };
        match self.heuristic {
            Heuristic::None => {}
            Heuristic::BandedStatic { band_min_k, band_max_k } => {
                let out = move |k: i32, _c: &Cell| k < band_min_k || k > band_max_k;
                kill(&mut level.m, &out);
                kill(&mut level.i, &out);
                kill(&mut level.d, &out);
            }
            Heuristic::BandedAdaptive { band_min_k, band_max_k, steps } => {
                if steps > 0 && score % steps == 0 {
                    // re-centre the band on the best diagonal
                    let best_k = best_diag(level);
                    let half = (band_max_k - band_min_k) / 2;
                    let min_k = best_k - half;
                    let max_k = best_k + half;
                    let out = move |k: i32, _c: &Cell| k < min_k || k > max_k;
                    kill(&mut level.m, &out);
                    kill(&mut level.i, &out);
                    kill(&mut level.d, &out);
                }
            }
            Heuristic::WfaAdaptive { min_wavefront_length, max_distance_threshold, steps } => {
                if steps > 0 && score % steps == 0 && (level.m.hi - level.m.lo) >= min_wavefront_length {
                    let max_ad = current;
                    let out = move |k: i32, c: &Cell| {
                        let ad = c.offset as i64 + (c.offset - k) as i64;
                        max_ad - ad > max_distance_threshold as i64
                    };
                    kill(&mut level.m, &out);
                }
            }
            Heuristic::XDrop { xdrop, steps } => {
                if steps > 0 && score % steps == 0 {
                    let best = *best_antidiag;
                    let out = move |k: i32, c: &Cell| {
                        let ad = c.offset as i64 + (c.offset - k) as i64;
                        best - ad > xdrop as i64
                    };
                    kill(&mut level.m, &out);
                }
            }
            Heuristic::ZDrop { .. } => {}
        }
    }

    fn finish(&self, status: WfaStatus, score: i32, level: &Level, k: i32, arena: &BtArena) -> WfaResult {
        let cell = level.m.get(k);
        let cigar = if self.compute_cigar {
            arena.unwind(cell.bt)
        } else {
            Vec::new()
        };
        WfaResult {
            status,
            score,
            cigar,
            pattern_end: cell.offset,
            text_end: cell.offset - k,
        }
    }

    /// Best partially explored cell; used for the heuristic termination statuses.
    fn best_effort(
        &self,
        status: WfaStatus,
        score: i32,
        levels: &[Option<Level>],
        arena: &BtArena,
    ) -> WfaResult {
        let mut best: Option<(i64, Cell, i32)> = None;
        for level in levels.iter().flatten() {
            for idx in 0..level.m.cells.len() {
                let k = level.m.lo + idx as i32;
                let cell = level.m.cells[idx];
                if cell.is_null() {
                    continue;
                }
                let ad = cell.offset as i64 + (cell.offset - k) as i64;
                if best.map(|(a, _, _)| ad > a).unwrap_or(true) {
                    best = Some((ad, cell, k));
                }
            }
        }
        match best {
            Some((_, cell, k)) => WfaResult {
                status,
                score,
                cigar: if self.compute_cigar { arena.unwind(cell.bt) } else { Vec::new() },
                pattern_end: cell.offset,
                text_end: cell.offset - k,
            },
            None => WfaResult {
                status,
                score,
                cigar: Vec::new(),
                pattern_end: 0,
                text_end: 0,
            },
        }
    }
}

fn level_antidiag(level: &Level) -> i64 {
    let mut best = i64::MIN;
    for idx in 0..level.m.cells.len() {
        let k = level.m.lo + idx as i32;
        let cell = level.m.cells[idx];
        if cell.is_null() {
            continue;
        }
        best = best.max(cell.offset as i64 + (cell.offset - k) as i64);
    }
    best
}

fn best_diag(level: &Level) -> i32 {
    let mut best = 0;
    let mut best_ad = i64::MIN;
    for idx in 0..level.m.cells.len() {
        let k = level.m.lo + idx as i32;
        let cell = level.m.cells[idx];
        if cell.is_null() {
            continue;
        }
        let ad = cell.offset as i64 + (cell.offset - k) as i64;
        if ad > best_ad {
            best_ad = ad;
            best = k;
        }
    }
    best
}

/// Length of the common prefix of `pattern[i..]` and `text[j..]`, compared eight
/// letters at a time.
fn match_run(pattern: &[Letter], text: &[Letter], mut i: usize, mut j: usize) -> usize {
    let mut n = 0usize;
    while i + 8 <= pattern.len() && j + 8 <= text.len() {
        let a = u64::from_le_bytes(pattern[i..i + 8].try_into().unwrap());
        let b = u64::from_le_bytes(text[j..j + 8].try_into().unwrap());
        let x = a ^ b;
        if x == 0 {
            n += 8;
            i += 8;
            j += 8;
        } else {
            return n + (x.trailing_zeros() / 8) as usize;
        }
    }
    while i < pattern.len() && j < text.len() && pattern[i] == text[j] {
        n += 1;
        i += 1;
        j += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqsieve_seq::alphabet::encode_seq;

    fn penalties() -> Penalties {
        Penalties {
            mismatch: 4,
            gap_open: 6,
            gap_extend: 2,
        }
    }

    fn cigar_consumes(cigar: &[EditOp]) -> (i32, i32) {
        let mut p = 0;
        let mut t = 0;
        for op in cigar {
            match op {
                EditOp::Match | EditOp::Substitution(_) => {
                    p += 1;
                    t += 1;
                }
                EditOp::Insertion(n) => p += *n as i32,
                EditOp::Deletion(_) => t += 1,
                _ => {}
            }
        }
        (p, t)
    }

    #[test]
    fn identical_sequences_align_for_free() {
        let a = encode_seq("MKTFFVLLLCTFTVFS");
        let r = WfaAligner::new(penalties()).align_end_to_end(&a, &a);
        assert_eq!(r.status, WfaStatus::Successful);
        assert_eq!(r.score, 0);
        assert_eq!(r.cigar, vec![EditOp::Match; 16]);
    }

    #[test]
    fn single_mismatch_costs_mismatch_penalty() {
        let a = encode_seq("MKTFFVLLLCTFTVFS");
        let b = encode_seq("MKTFFVLALCTFTVFS");
        let r = WfaAligner::new(penalties()).align_end_to_end(&a, &b);
        assert_eq!(r.status, WfaStatus::Successful);
        assert_eq!(r.score, 4);
        let subs = r
            .cigar
            .iter()
            .filter(|op| matches!(op, EditOp::Substitution(_)))
            .count();
        assert_eq!(subs, 1);
        let (p, t) = cigar_consumes(&r.cigar);
        assert_eq!((p, t), (16, 16));
    }

    #[test]
    fn single_gap_costs_open_plus_extend() {
        let a = encode_seq("MKTFFVLLCTFTVFS"); // 15
        let b = encode_seq("MKTFFVLLLCTFTVFS"); // 16
        let r = WfaAligner::new(penalties()).align_end_to_end(&a, &b);
        assert_eq!(r.status, WfaStatus::Successful);
        assert_eq!(r.score, 8); // open 6 + extend 2
        let dels = r
            .cigar
            .iter()
            .filter(|op| matches!(op, EditOp::Deletion(_)))
            .count();
        assert_eq!(dels, 1);
        let (p, t) = cigar_consumes(&r.cigar);
        assert_eq!((p, t), (15, 16));
    }

    #[test]
    fn affine_gap_prefers_one_long_gap() {
        let a = encode_seq("MKTFFVCTFTVFS"); // 3-residue gap vs b
        let b = encode_seq("MKTFFVLLLCTFTVFS");
        let r = WfaAligner::new(penalties()).align_end_to_end(&a, &b);
        assert_eq!(r.status, WfaStatus::Successful);
        assert_eq!(r.score, 6 + 3 * 2);
        // exactly one run of deletions
        let mut runs = 0;
        let mut in_del = false;
        for op in &r.cigar {
            let is_del = matches!(op, EditOp::Deletion(_));
            if is_del && !in_del {
                runs += 1;
            }
            in_del = is_del;
        }
        assert_eq!(runs, 1);
    }

    #[test]
    fn long_sequences_roundtrip_through_the_offload_arena() {
        // more than 32 ops forces pcigar block offload
        let a = encode_seq(&"MKTFFVLLLCTFTVFSAYSRGVFRRD".repeat(8));
        let r = WfaAligner::new(penalties()).align_end_to_end(&a, &a);
        assert_eq!(r.status, WfaStatus::Successful);
        assert_eq!(r.cigar.len(), a.len());
        assert!(r.cigar.iter().all(|op| matches!(op, EditOp::Match)));
    }

    #[test]
    fn max_score_budget_reports_status() {
        let a = encode_seq("WWWWWWWWWWWWWWWW");
        let b = encode_seq("AAAAAAAAAAAAAAAA");
        let r = WfaAligner::new(penalties())
            .with_max_score(5)
            .align_end_to_end(&a, &b);
        assert_eq!(r.status, WfaStatus::MaxScoreReached);
    }

    #[test]
    fn memory_budget_reports_oom() {
        let a = encode_seq(&"MKTFFVLLLCTFTVFSAYSRGVFRRD".repeat(4));
        let b = encode_seq(&"GDLKFRHAIESKHTDRRFVGRSYAKF".repeat(4));
        let r = WfaAligner::new(penalties())
            .with_max_memory(64)
            .align_end_to_end(&a, &b);
        assert_eq!(r.status, WfaStatus::Oom);
    }

    #[test]
    fn zero_memory_budget_means_unlimited() {
        let a = encode_seq("MKTFFVLLLCTFTVFS");
        let r = WfaAligner::new(penalties())
            .with_max_memory(0)
            .align_end_to_end(&a, &a);
        assert_eq!(r.status, WfaStatus::Successful);
    }

    #[test]
    fn banded_heuristic_still_finds_near_diagonal_alignment() {
        let a = encode_seq("MKTFFVLLLCTFTVFSAYSRGVFRRD");
        let b = encode_seq("MKTFFVLALCTFTVFSAYSRGVFRAD");
        let exact = WfaAligner::new(penalties()).align_end_to_end(&a, &b);
        let banded = WfaAligner::new(penalties())
            .with_heuristic(Heuristic::BandedStatic {
                band_min_k: -8,
                band_max_k: 8,
            })
            .align_end_to_end(&a, &b);
        assert_eq!(banded.status, WfaStatus::Successful);
        assert_eq!(banded.score, exact.score);
    }

    #[test]
    fn ends_free_skips_trailing_text() {
        let a = encode_seq("MKTFFVLL");
        let b = encode_seq("MKTFFVLLAYSRGVFRRD");
        let r = WfaAligner::new(penalties()).align_ends_free(
            &a,
            &b,
            EndsFree {
                pattern_begin_free: 0,
                pattern_end_free: 0,
                text_begin_free: 0,
                text_end_free: 10,
            },
        );
        assert_eq!(r.status, WfaStatus::Successful);
        assert_eq!(r.score, 0);
        assert_eq!(r.pattern_end, 8);
    }

    #[test]
    fn score_only_mode_skips_the_cigar() {
        let a = encode_seq("MKTFFVLLLCTFTVFS");
        let b = encode_seq("MKTFFVLALCTFTVFS");
        let r = WfaAligner::new(penalties()).score_only().align_end_to_end(&a, &b);
        assert_eq!(r.status, WfaStatus::Successful);
        assert_eq!(r.score, 4);
        assert!(r.cigar.is_empty());
    }
}
