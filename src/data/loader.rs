//! CSV and JSON ingestion for option chains and price bars.
//!
//! CSV files are comma-separated with a header row. Header names are matched
//! case-insensitively against [`CONTRACT_ALIASES`] / [`BAR_ALIASES`], so
//! exports from different brokers load without renaming columns.

use crate::engine::AnalysisInput;
use crate::gex::OptionContract;
use crate::market::{validate_bars, OhlcBar};
use crate::pricing::OptionType;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{debug, info, warn};

/// Canonical field plus accepted header spellings.
pub type AliasTable = &'static [(&'static str, &'static [&'static str])];

pub const CONTRACT_ALIASES: AliasTable = &[
    ("ticker", &["ticker", "symbol", "ativo"]),
    ("type", &["type", "tipo", "option_type", "side"]),
    ("strike", &["strike", "strike_price", "exercicio"]),
    ("gamma", &["gamma"]),
    ("open_interest", &["oi", "open_interest", "openinterest", "contratos"]),
    ("implied_volatility", &["iv", "implied_volatility", "vol"]),
];

pub const BAR_ALIASES: AliasTable = &[
    ("timestamp", &["timestamp", "date", "datetime", "time", "data"]),
    ("open", &["open", "o", "abertura"]),
    ("high", &["high", "h", "maxima"]),
    ("low", &["low", "l", "minima"]),
    ("close", &["close", "c", "fechamento"]),
    ("volume", &["volume", "v"]),
];

/// Header positions resolved against an alias table.
#[derive(Debug)]
struct ColumnMap {
    columns: Vec<(&'static str, usize)>,
}

impl ColumnMap {
    fn resolve(header: &str, aliases: AliasTable) -> Self {
        let mut columns = Vec::new();
        for (idx, raw) in header.split(',').enumerate() {
            let name = raw.trim().trim_matches('"').to_lowercase();
            let canonical = aliases
                .iter()
                .find(|(_, names)| names.contains(&name.as_str()))
                .map(|(canonical, _)| *canonical);

            match canonical {
                Some(field) if columns.iter().any(|(f, _)| *f == field) => {
                    warn!(column = %name, field, "Duplicate column for field, keeping the first");
                }
                Some(field) => columns.push((field, idx)),
                None => warn!(column = %name, "Ignoring unrecognised column"),
            }
        }
        Self { columns }
    }

    fn has(&self, field: &str) -> bool {
        self.columns.iter().any(|(f, _)| *f == field)
    }

    fn require(&self, fields: &[&str]) -> Result<()> {
        let missing: Vec<&str> = fields.iter().copied().filter(|f| !self.has(f)).collect();
        if !missing.is_empty() {
            bail!("Missing required columns: {}", missing.join(", "));
        }
        Ok(())
    }

    /// Trimmed cell for `field`; `None` when the column is absent or blank.
    fn get<'a>(&self, parts: &[&'a str], field: &str) -> Option<&'a str> {
        let (_, idx) = self.columns.iter().find(|(f, _)| *f == field)?;
        let cell = parts.get(*idx).copied()?.trim().trim_matches('"');
        (!cell.is_empty()).then_some(cell)
    }

    fn decimal(&self, parts: &[&str], field: &str) -> Result<Option<Decimal>> {
        self.get(parts, field)
            .map(|cell| {
                cell.parse::<Decimal>()
                    .or_else(|_| Decimal::from_scientific(cell))
                    .with_context(|| format!("Invalid {field}: {cell}"))
            })
            .transpose()
    }

    fn required_decimal(&self, parts: &[&str], field: &str) -> Result<Decimal> {
        self.decimal(parts, field)?
            .with_context(|| format!("Missing value for {field}"))
    }
}

/// Split content into the header line and numbered, non-blank data lines.
fn split_rows(content: &str) -> Result<(&str, Vec<(usize, &str)>)> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        bail!("CSV file is empty");
    };
    let rows: Vec<(usize, &str)> = lines.map(|(idx, line)| (idx + 1, line)).collect();
    if rows.is_empty() {
        bail!("CSV file contains no data rows");
    }
    Ok((header, rows))
}

/// Parse an option chain from CSV text.
pub fn parse_contracts(content: &str) -> Result<Vec<OptionContract>> {
    let (header, rows) = split_rows(content)?;
    let map = ColumnMap::resolve(header, CONTRACT_ALIASES);
    map.require(&["type", "strike", "open_interest"])?;
    if !map.has("gamma") && !map.has("implied_volatility") {
        bail!("Contracts need a gamma or implied volatility column");
    }

    let mut contracts = Vec::with_capacity(rows.len());
    for (line_num, line) in rows {
        let contract = parse_contract_row(&map, line)
            .with_context(|| format!("Failed to parse line {line_num}: {line}"))?;
        contracts.push(contract);
    }

    debug!(contracts = contracts.len(), "Parsed option chain");
    Ok(contracts)
}

fn parse_contract_row(map: &ColumnMap, line: &str) -> Result<OptionContract> {
    let parts: Vec<&str> = line.split(',').collect();

    let option_type: OptionType = map
        .get(&parts, "type")
        .context("Missing value for type")?
        .parse()
        .map_err(anyhow::Error::msg)?;

    let open_interest = map.required_decimal(&parts, "open_interest")?;
    let open_interest = if open_interest.is_sign_negative() || !open_interest.fract().is_zero() {
        None
    } else {
        open_interest.to_u64()
    }
    .with_context(|| format!("Open interest must be a non-negative integer: {open_interest}"))?;

    let implied_volatility = map
        .decimal(&parts, "implied_volatility")?
        .map(|iv| iv.to_f64().context("Implied volatility out of range"))
        .transpose()?;

    Ok(OptionContract {
        ticker: map.get(&parts, "ticker").map(str::to_string),
        strike: map.required_decimal(&parts, "strike")?,
        option_type,
        gamma: map.decimal(&parts, "gamma")?,
        open_interest,
        implied_volatility,
    })
}

/// Parse OHLC bars from CSV text, in file order.
pub fn parse_bars(content: &str) -> Result<Vec<OhlcBar>> {
    let (header, rows) = split_rows(content)?;
    let map = ColumnMap::resolve(header, BAR_ALIASES);
    map.require(&["open", "high", "low", "close"])?;

    let mut bars = Vec::with_capacity(rows.len());
    for (line_num, line) in rows {
        let bar = parse_bar_row(&map, line)
            .with_context(|| format!("Failed to parse line {line_num}: {line}"))?;
        bars.push(bar);
    }

    validate_bars(&bars).context("Invalid bar data")?;
    debug!(bars = bars.len(), "Parsed price bars");
    Ok(bars)
}

fn parse_bar_row(map: &ColumnMap, line: &str) -> Result<OhlcBar> {
    let parts: Vec<&str> = line.split(',').collect();

    let timestamp = map
        .get(&parts, "timestamp")
        .map(|cell| parse_timestamp(cell).with_context(|| format!("Invalid timestamp: {cell}")))
        .transpose()?;

    Ok(OhlcBar {
        timestamp,
        open: map.required_decimal(&parts, "open")?,
        high: map.required_decimal(&parts, "high")?,
        low: map.required_decimal(&parts, "low")?,
        close: map.required_decimal(&parts, "close")?,
        volume: map.decimal(&parts, "volume")?.unwrap_or(Decimal::ZERO),
    })
}

/// RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_timestamp(cell: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = cell.parse::<DateTime<Utc>>() {
        return Ok(ts);
    }
    let date = NaiveDate::parse_from_str(cell, "%Y-%m-%d")?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .context("Invalid time of day")
}

/// Load an option chain CSV file.
pub fn load_contracts<P: AsRef<Path>>(path: P) -> Result<Vec<OptionContract>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;
    let contracts = parse_contracts(&content)
        .with_context(|| format!("Failed to load contracts from {}", path.display()))?;
    info!(path = %path.display(), contracts = contracts.len(), "Loaded option chain");
    Ok(contracts)
}

/// Load a price-bar CSV file.
pub fn load_bars<P: AsRef<Path>>(path: P) -> Result<Vec<OhlcBar>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;
    let bars = parse_bars(&content)
        .with_context(|| format!("Failed to load bars from {}", path.display()))?;
    info!(path = %path.display(), bars = bars.len(), "Loaded price bars");
    Ok(bars)
}

/// Load a full [`AnalysisInput`] from a JSON file.
pub fn load_input<P: AsRef<Path>>(path: P) -> Result<AnalysisInput> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    let input: AnalysisInput = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse analysis input: {}", path.display()))?;
    info!(
        path = %path.display(),
        contracts = input.contracts.len(),
        bars = input.bars.len(),
        "Loaded analysis input"
    );
    Ok(input)
}
