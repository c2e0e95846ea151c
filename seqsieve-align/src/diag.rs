use crate::interval::Interval;

/// A maximal scoring run on one diagonal of the DP matrix.
///
/// `i`/`j` are the query/subject begin positions; the diagonal is `i - j`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiagonalSegment {
    pub i: i32,
    pub j: i32,
    pub len: i32,
    pub score: i32,
    pub ident: i32,
}

impl DiagonalSegment {
    pub fn new(i: i32, j: i32, len: i32, score: i32) -> DiagonalSegment {
        DiagonalSegment {
            i,
            j,
            len,
            score,
            ident: 0,
        }
    }

    pub fn diag(&self) -> i32 {
        self.i - self.j
    }

    pub fn query_end(&self) -> i32 {
        self.i + self.len
    }

    pub fn subject_end(&self) -> i32 {
        self.j + self.len
    }

    pub fn query_range(&self) -> Interval {
        Interval::new(self.i, self.query_end())
    }

    pub fn subject_range(&self) -> Interval {
        Interval::new(self.j, self.subject_end())
    }

    /// Ordering by (diagonal, subject begin); the chaining stage expects this.
    pub fn cmp_diag(a: &DiagonalSegment, b: &DiagonalSegment) -> std::cmp::Ordering {
        a.diag().cmp(&b.diag()).then(a.j.cmp(&b.j))
    }
}

/// A chained approximation of an HSP, used as the band definition for the gapped
/// stage.
#[derive(Clone, Debug, Default)]
pub struct ApproxHsp {
    pub d_min: i32,
    pub d_max: i32,
    pub score: i32,
    pub query_range: Interval,
    pub subject_range: Interval,
    /// best individual segment of the run, the anchor for anchored extension
    pub max_diag: DiagonalSegment,
    pub frame: u8,
}
