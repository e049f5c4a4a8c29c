// src/core/mod.rs

/// Scan records, business contexts and the attributed records built from them.
pub mod models;

/// Typed attribution and validation errors.
pub mod error;

/// Lookups against the asset inventory's cloud API.
pub mod inventory;

/// Fans out identifier lookups and resolves them into one result.
pub mod attributor;

pub mod validator;

pub mod producer;

/// Handling of records that fail attribution or validation.
pub mod failure;
