//! Reusable validation rules for engine inputs.

pub mod rules;
