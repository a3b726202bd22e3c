//! Business artifacts and the generation collaborator.

pub mod generator;
pub mod types;

pub use generator::{
    ArtifactGenerator, HttpArtifactGenerator, OfflineGenerator, into_artifacts, localized_failure,
};
pub use types::{
    Automation, BeforeAfter, BusinessArtifacts, DemoMode, GenerationRequest, GenerationResponse,
    Kpi, Loops, Package, Policy, Role,
};
