// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the raw activity export and model-ready
// rows.
//
//   raw parquet / csv
//       │
//       ▼
//   TableLoader       → reads files into an in-memory Table
//       │
//       ▼
//   Preprocessor      → engineered features, one-hot, schema
//       │
//       ▼
//   time_split        → chronological train / val / test
//       │
//       ▼
//   write_parquet     → processed layer on disk
//       │
//       ▼
//   FeatureMatrix     → dense rows in schema order
//       │
//       ▼
//   ChurnDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   ChurnBatcher      → stacks samples into tensor batches

/// Column store shared by every step
pub mod table;

/// Reads parquet / csv files and directories
pub mod loader;

/// Writes tables as parquet
pub mod writer;

/// Feature engineering and schema derivation
pub mod preprocessor;

/// Chronological train / validation / test split
pub mod splitter;

/// Feature matrix and Burn's Dataset implementation
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
