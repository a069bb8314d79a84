pub mod backend;
pub mod context;
pub mod memory;
pub mod service;

pub use backend::SearchBackend;
pub use context::AppContext;
pub use memory::MemoryStore;
pub use service::{DynRetrievalService, RetrievalService};
