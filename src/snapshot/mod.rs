//! The listening-snapshot core: working-set acquisition, feature
//! normalization, mood scoring and deterministic ranking.

pub mod features;
pub mod mood;
pub mod pipeline;
pub mod scoring;
pub mod sources;
pub mod tiebreak;

pub use mood::{Mood, MoodScores, Stats};
pub use pipeline::{
    build_snapshot, ExampleTrack, ScoredTrack, ScoringMode, Snapshot, SnapshotOutcome,
    SnapshotParams,
};
pub use scoring::{PlaySignals, ScoringStrategy};
pub use sources::{FetchOptions, Source};
