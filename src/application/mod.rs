// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination

// Raw export → processed splits + schema
pub mod process_use_case;

// Processed splits → new artifact version
pub mod train_use_case;

// Feature record → churn prediction
pub mod predict_use_case;
