use serde::{Deserialize, Serialize};

/// Stages of a single extraction job, in the order they are entered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Decoding,
    Partitioning,
    Compressing,
    Extracting,
    Merging,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decoding => write!(f, "decoding"),
            Self::Partitioning => write!(f, "partitioning"),
            Self::Compressing => write!(f, "compressing"),
            Self::Extracting => write!(f, "extracting"),
            Self::Merging => write!(f, "merging"),
        }
    }
}
