//! Prompt context construction
//!
//! Turns retrieved or caller-supplied articles into a budgeted context block
//! and wraps it in the prompt templates used by the orchestrator.

mod assembler;
pub mod prompt;

pub use assembler::{
    truncate_at_word, ContextAssembler, ContextDocument, ContextEntry, PromptContext, NO_ABSTRACT,
};
