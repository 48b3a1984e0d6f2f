// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that define what the system is about:
// the frozen feature schema, input records, predictions and
// the errors a scoring call can end in.
//
// Rules for this layer:
//   - NO burn types
//   - NO file or network I/O
//   - Only structs, enums, traits and pure rules

// Typed schema / scoring failures
pub mod error;

// Raw and encoded feature records
pub mod record;

// The training ↔ inference contract
pub mod schema;

// Model selector, threshold, prediction result
pub mod prediction;

// Realism fixes for hand-typed activity profiles
pub mod profile;

// Core abstractions (traits) that other layers implement
pub mod traits;
