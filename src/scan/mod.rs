//! Contribution scanning: the hint registry, round caches and the index.

pub mod cache;
pub mod hint;
pub mod index;

pub use cache::{CacheStats, RecordingCache, ScanCache};
pub use hint::HintRecord;
pub use index::{
    BindingSpec, Contribution, ContributionAnnotation, ContributionIndex, ContributionKind,
    SubcomponentSpec,
};
