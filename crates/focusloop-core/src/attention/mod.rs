mod tracker;

pub use tracker::{
    ActivityKind, AttentionTracker, Distraction, ScoreBand, HISTORY_CAP, SCORE_TICK_MS,
};
