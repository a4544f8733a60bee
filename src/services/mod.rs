pub mod chat;
pub mod execution;
pub mod intent;
pub mod orchestrator;
