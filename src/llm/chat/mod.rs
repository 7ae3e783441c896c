pub mod coordinator;
pub mod transcript;
