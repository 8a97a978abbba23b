//! Universe resolution and history loading.
//!
//! Parses symbol lists from configuration and loads each symbol's history
//! through the series store, skipping symbols that cannot be loaded.

use crate::domain::error::StagescanError;
use crate::domain::run_report::{SymbolFailure, SymbolStage};
use crate::domain::series::SymbolHistory;
use crate::ports::data_port::SeriesStorePort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// The symbols to process: the configured list when present, otherwise
/// everything the store lists. Always sorted.
pub fn resolve_universe(
    store: &dyn SeriesStorePort,
    configured: Option<&[String]>,
) -> Result<Vec<String>, StagescanError> {
    let mut symbols = match configured {
        Some(list) => list.to_vec(),
        None => store.list_symbols()?,
    };
    symbols.sort();
    symbols.dedup();
    Ok(symbols)
}

#[derive(Debug, Default)]
pub struct LoadedUniverse {
    pub histories: Vec<SymbolHistory>,
    pub failures: Vec<SymbolFailure>,
    pub rejected_bars: usize,
}

/// Loads `[start, end]` history for each symbol in order.
///
/// Fetch errors and empty histories are recorded as load failures; the
/// remaining symbols still load.
pub fn load_histories(
    store: &dyn SeriesStorePort,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> LoadedUniverse {
    let mut loaded = LoadedUniverse::default();

    for symbol in symbols {
        let raw = match store.fetch_ohlcv(symbol, start, end) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping symbol, fetch failed");
                loaded.failures.push(load_failure(symbol, e.to_string()));
                continue;
            }
        };

        let mut raw = raw;
        raw.sort_by_key(|bar| bar.date);
        let history = SymbolHistory::new(symbol.clone(), raw);
        loaded.rejected_bars += history.rejected_bars;

        if history.bars.is_empty() {
            warn!(symbol = %symbol, "skipping symbol, no usable bars");
            loaded.failures.push(load_failure(symbol, "no data found".to_string()));
            continue;
        }

        debug!(symbol = %symbol, bars = history.bar_count(), "loaded history");
        loaded.histories.push(history);
    }

    info!(
        loaded = loaded.histories.len(),
        skipped = loaded.failures.len(),
        rejected_bars = loaded.rejected_bars,
        "universe loaded"
    );
    loaded
}

fn load_failure(symbol: &str, reason: String) -> SymbolFailure {
    SymbolFailure {
        symbol: symbol.to_string(),
        stage: SymbolStage::Load,
        reason,
    }
}
