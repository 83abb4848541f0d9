//! Input ingestion.
//!
//! - CSV option chains and price bars with header aliasing
//! - JSON analysis inputs

mod loader;

pub use loader::{
    load_bars, load_contracts, load_input, parse_bars, parse_contracts, AliasTable, BAR_ALIASES,
    CONTRACT_ALIASES,
};
