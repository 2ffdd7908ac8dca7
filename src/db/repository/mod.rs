mod explanations;
mod quota;

pub use explanations::ExplanationRepository;
pub use quota::QuotaRepository;
