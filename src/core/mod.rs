//! Core Module - Detector contract, registry and aggregation engine

pub mod detector;
pub mod engine;
pub mod registry;
pub mod risk;

pub use detector::{Detector, DetectorBase};
pub use engine::{analyze_with_detector, AnalysisEngine, EngineStatsSnapshot};
pub use registry::{DetectorDescriptor, DetectorRegistry};
pub use risk::{combine_results, highest, highest_label, priority, priority_of};
