//! Prompt module for LLM-based operations.
//!
//! This module provides prompt templates for the LLM classification layer.

pub mod industry_affiliation;

pub use industry_affiliation::*;
