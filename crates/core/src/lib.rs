pub mod audit;
pub mod capability;
pub mod catalogue;
pub mod config;
pub mod council;
pub mod domain;
pub mod errors;
pub mod motor;
pub mod reviewers;
pub mod store;
pub mod text;

pub use capability::{
    evaluate_capability, required_operations, CapabilityAssessment, CapabilityEvaluator,
    DeterministicCapabilityEvaluator,
};
pub use catalogue::RuleCatalogue;
pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat};
pub use council::DeliberationCouncil;
pub use domain::concept::{operation, Concept, ConceptId, Confidence, Operation};
pub use domain::decision::{Decision, DecisionKind};
pub use domain::opinion::{DeliberationMethod, DeliberationResult, Opinion, Priority, Stance};
pub use domain::translation::{RecognizedConcept, SentenceStructure, Translation};
pub use errors::{ApplicationError, ConfigurationError, OperationError, ReviewError};
pub use motor::{MotorSettings, ReasoningMotor, RequestClass, SocialKind};
pub use reviewers::{Reviewer, Situation};
pub use store::{ConceptCatalogue, ConceptStore, OperationRegistry, ShadowedWord};
