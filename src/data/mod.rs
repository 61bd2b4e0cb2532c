/// Data layer: core types, loading, and search.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv      simulated source
///        │                            │
///        ▼                            ▼
///   ┌──────────┐               ┌──────────┐
///   │  loader   │              │  sample   │
///   └──────────┘               └──────────┘
///        │                            │
///        └─────────────┬──────────────┘
///                      ▼
///               ┌──────────────┐
///               │    Dataset    │  columns, Vec<Row> with stable RowIds
///               └──────────────┘
///                      │
///                      ▼
///               ┌──────────┐
///               │  filter   │  case-insensitive row search
///               └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod sample;
