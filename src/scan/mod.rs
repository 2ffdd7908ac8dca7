mod orchestrator;

pub use orchestrator::{ScanOrchestrator, ScanRequest, ScanStage};
