pub mod agents;
pub mod generator;
pub mod progress;
pub mod proofread;
pub mod section_repository;
pub mod validation;

pub use agents::{agent_for, AgentContext, AgentOutput, SectionAgent};
pub use generator::{ContentGenerator, GenerationInput, GenerationRequest, GenerationResponse, StubGenerator};
pub use progress::{ProgressReport, SectionProgress};
pub use proofread::ProofreadResult;
pub use section_repository::SectionRepository;
pub use validation::{IssueLevel, ValidationReport};
