//! Substitution matrices, alignment statistics and composition adjustment.
//!
//! This crate provides:
//!  - [`ScoreMatrix`](crate::ScoreMatrix): an amino-acid substitution matrix over the
//!    internal alphabet, loadable from the NCBI format, together with its
//!    Karlin–Altschul parameters, gap penalties, E-value and bit-score conversion
//!  - [`BiasCorrection`](crate::BiasCorrection): the windowed composition-bias score
//!    correction applied to query positions
//!  - [`TargetMatrix`](crate::TargetMatrix): a per-(query, target) compositionally
//!    scaled matrix with an integer width chosen to fit the DP lanes
//!  - [`composition`](crate::composition): residue frequency vectors

mod errors;
mod matrix;
mod bias;
mod target_matrix;
pub mod composition;

pub use errors::ScoringError;
pub use matrix::{ScoreMatrix, SubstitutionMatrixList};
pub use bias::BiasCorrection;
pub use target_matrix::{adjust_rule, MatrixAdjustRule, TargetMatrix};
