pub mod chunking;
pub mod document;
pub mod error;
pub mod gemini;
pub mod index;
pub mod rag;
pub mod session;

pub use error::{Result, TutorError};
