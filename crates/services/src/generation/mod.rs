pub mod openai;
pub mod ports;
pub mod service;

pub use openai::OpenAiBackend;
pub use ports::{
    GenerationBackend, GenerationError, GenerationInput, GenerationOutcome, GenerationService,
    ProposalGenerationRequest, RfqGenerationRequest,
};
pub use service::GenerationServiceImpl;
