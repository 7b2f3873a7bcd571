//! Core domain types
//!
//! These types are value objects: built once, never mutated, and passed
//! between the executor and scheduler by value.

pub mod job;
pub mod result;
pub mod summary;
