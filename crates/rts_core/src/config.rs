//! Startup config-file loading into blueprint registries (§6, §10.4).
//!
//! Three file shapes are consumed once at startup from an asset directory:
//! CSV config categories (buildings/units/weapons/technologies, one row per
//! `object_name`), language JSON files keyed by language code, and campaign
//! key-value files mapping a campaign name to its mission list. None of this
//! module touches the filesystem directly — callers hand it already-read
//! strings, keeping `rts_core` free of IO (the teacher's own crate-boundary
//! convention: `rts_core` has no IO, `rts_tools`/`rts_headless` do the
//! reading).
//!
//! The CSV grammar is the literal ad hoc one described in §6: a cell is a
//! `(a;b;c)` tuple, a `[a;b;c]` list, one of the literals `True`/`False`/
//! `None`, a numeric string, or else a plain string. No mainstream crate
//! decodes this exact grammar, so [`csv_value::parse`] hand-rolls it; plain
//! row/column splitting is left to the `csv` crate (`config::load_csv_rows`),
//! matching `rts_tools`'s existing role as the data-validation crate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::Fixed;
use crate::player::ResourceKind;
use crate::production::{BlueprintRegistry, BuildingBlueprint, TechBlueprint, UnitBlueprint};

/// Errors raised while parsing config data (§7's Config-missing kind: report
/// and skip the offending row rather than aborting the whole load).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A CSV row was missing a column the loader required.
    #[error("row for {object_name:?} is missing column {column:?}")]
    MissingColumn {
        /// The `object_name` key of the offending row.
        object_name: String,
        /// The column name that was absent.
        column: String,
    },
    /// A cell's grammar didn't parse (malformed tuple/list/literal).
    #[error("malformed value cell {cell:?} for {object_name:?}.{column}")]
    MalformedCell {
        /// The `object_name` key of the offending row.
        object_name: String,
        /// The column name.
        column: String,
        /// The raw cell text that failed to parse.
        cell: String,
    },
    /// Underlying CSV row/column parse failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// Underlying JSON parse failure (language files).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for this module.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A decoded CSV cell value, per §6's tuple/list/literal/numeric/string
/// grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum CsvValue {
    /// `None`.
    None,
    /// `True` / `False`.
    Bool(bool),
    /// A bare integer.
    Int(i64),
    /// A bare decimal.
    Float(f64),
    /// Anything that isn't one of the above.
    Str(String),
    /// `(a;b;c)`.
    Tuple(Vec<CsvValue>),
    /// `[a;b;c]`.
    List(Vec<CsvValue>),
}

impl CsvValue {
    /// Read this value as an integer, if it decoded as `Int` or a whole
    /// `Float`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Read this value as a [`Fixed`], if numeric.
    #[must_use]
    pub fn as_fixed(&self) -> Option<Fixed> {
        match self {
            Self::Int(v) => Some(Fixed::from_num(*v)),
            Self::Float(v) => Some(Fixed::from_num(*v)),
            _ => None,
        }
    }

    /// Read this value as a string slice, if it decoded as `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Parse one raw CSV cell per §6's ad hoc grammar: `(a;b;c)` → [`CsvValue::Tuple`],
/// `[a;b;c]` → [`CsvValue::List`], `True`/`False`/`None` → literals, a numeric
/// string → `Int`/`Float`, else `Str`.
#[must_use]
pub fn parse_cell(raw: &str) -> CsvValue {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        return CsvValue::Tuple(split_items(inner).iter().map(|s| parse_cell(s)).collect());
    }
    if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return CsvValue::List(split_items(inner).iter().map(|s| parse_cell(s)).collect());
    }
    match trimmed {
        "True" => return CsvValue::Bool(true),
        "False" => return CsvValue::Bool(false),
        "None" | "" => return CsvValue::None,
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return CsvValue::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return CsvValue::Float(f);
    }
    CsvValue::Str(trimmed.to_string())
}

fn split_items(inner: &str) -> Vec<String> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner.split(';').map(str::trim).map(str::to_string).collect()
}

/// One parsed config row, keyed by `object_name` with the rest of its
/// columns decoded per §6's grammar.
#[derive(Debug, Clone)]
pub struct ConfigRow {
    /// The row's `object_name` key.
    pub object_name: String,
    /// Every other column, by header name.
    pub fields: HashMap<String, CsvValue>,
}

impl ConfigRow {
    /// Look up a required column, returning [`ConfigError::MissingColumn`]
    /// if absent (§7's Config-missing handling: report, don't crash the
    /// whole load — the caller decides whether to skip just this row).
    pub fn require(&self, column: &str) -> ConfigResult<&CsvValue> {
        self.fields.get(column).ok_or_else(|| ConfigError::MissingColumn {
            object_name: self.object_name.clone(),
            column: column.to_string(),
        })
    }
}

/// Parse a whole CSV document (header row + data rows) into [`ConfigRow`]s,
/// decoding every non-`object_name` cell per §6's grammar. `object_name`
/// must be the first column, matching §6's "each row has `object_name` as
/// the key".
pub fn parse_csv_rows(csv_text: &str) -> ConfigResult<Vec<ConfigRow>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(csv_text.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut fields = HashMap::new();
        let mut object_name = String::new();
        for (i, cell) in record.iter().enumerate() {
            let Some(header) = headers.get(i) else { continue };
            if header == "object_name" {
                object_name = cell.trim().to_string();
            } else {
                fields.insert(header.clone(), parse_cell(cell));
            }
        }
        rows.push(ConfigRow { object_name, fields });
    }
    Ok(rows)
}

/// Decode a `(steel;electronics;ammunition;conscripts)`-style cost tuple
/// into a resource-kind cost map, skipping any component that isn't a
/// recognized [`ResourceKind`] name or isn't numeric. Missing/zero entries
/// are simply absent from the result.
fn parse_cost_tuple(row: &ConfigRow, column: &str) -> ConfigResult<HashMap<ResourceKind, i64>> {
    let value = row.require(column)?;
    let CsvValue::Tuple(items) = value else {
        return Err(ConfigError::MalformedCell {
            object_name: row.object_name.clone(),
            column: column.to_string(),
            cell: format!("{value:?}"),
        });
    };
    let mut cost = HashMap::new();
    for (kind, item) in crate::player::ALL_RESOURCE_KINDS.iter().zip(items.iter()) {
        if let Some(amount) = item.as_i64() {
            if amount != 0 {
                cost.insert(*kind, amount);
            }
        }
    }
    Ok(cost)
}

/// Build one [`UnitBlueprint`] from a units.csv row. Expects `cost` (a
/// resource-kind tuple cell) and `production_time` (seconds, numeric).
pub fn unit_blueprint_from_row(row: &ConfigRow) -> ConfigResult<UnitBlueprint> {
    let cost = parse_cost_tuple(row, "cost")?;
    let production_time_seconds = row
        .require("production_time")?
        .as_fixed()
        .ok_or_else(|| ConfigError::MalformedCell {
            object_name: row.object_name.clone(),
            column: "production_time".to_string(),
            cell: "non-numeric".to_string(),
        })?;
    Ok(UnitBlueprint { id: row.object_name.clone(), cost, production_time_seconds })
}

/// Build one [`BuildingBlueprint`] from a buildings.csv row. Expects `cost`
/// and `construction_time` (seconds, numeric).
pub fn building_blueprint_from_row(row: &ConfigRow) -> ConfigResult<BuildingBlueprint> {
    let cost = parse_cost_tuple(row, "cost")?;
    let construction_time_seconds = row
        .require("construction_time")?
        .as_fixed()
        .ok_or_else(|| ConfigError::MalformedCell {
            object_name: row.object_name.clone(),
            column: "construction_time".to_string(),
            cell: "non-numeric".to_string(),
        })?;
    Ok(BuildingBlueprint { id: row.object_name.clone(), cost, construction_time_seconds })
}

/// Build one [`TechBlueprint`] from a technologies.csv row. Expects
/// `difficulty` (numeric).
pub fn tech_blueprint_from_row(row: &ConfigRow) -> ConfigResult<TechBlueprint> {
    let difficulty = row.require("difficulty")?.as_fixed().ok_or_else(|| ConfigError::MalformedCell {
        object_name: row.object_name.clone(),
        column: "difficulty".to_string(),
        cell: "non-numeric".to_string(),
    })?;
    Ok(TechBlueprint { id: row.object_name.clone(), difficulty })
}

/// Parse all four config categories and populate a fresh [`BlueprintRegistry`].
/// A row that fails to parse is reported via the returned `Vec<ConfigError>`
/// and otherwise skipped (§7: "Config-missing — report and ignore; do not
/// crash the tick loop"); weapon rows have no blueprint counterpart yet and
/// are accepted but not registered (tracked as a known gap in DESIGN.md).
pub fn load_blueprint_registry(
    units_csv: &str,
    buildings_csv: &str,
    technologies_csv: &str,
) -> (BlueprintRegistry, Vec<ConfigError>) {
    let mut registry = BlueprintRegistry::default();
    let mut errors = Vec::new();

    match parse_csv_rows(units_csv) {
        Ok(rows) => {
            for row in rows {
                match unit_blueprint_from_row(&row) {
                    Ok(bp) => registry.register_unit(bp),
                    Err(e) => errors.push(e),
                }
            }
        }
        Err(e) => errors.push(e),
    }

    match parse_csv_rows(buildings_csv) {
        Ok(rows) => {
            for row in rows {
                match building_blueprint_from_row(&row) {
                    Ok(bp) => registry.register_building(bp),
                    Err(e) => errors.push(e),
                }
            }
        }
        Err(e) => errors.push(e),
    }

    match parse_csv_rows(technologies_csv) {
        Ok(rows) => {
            for row in rows {
                match tech_blueprint_from_row(&row) {
                    Ok(bp) => registry.register_tech(bp),
                    Err(e) => errors.push(e),
                }
            }
        }
        Err(e) => errors.push(e),
    }

    (registry, errors)
}

/// One language's string table, keyed by localization key (§6: "Language
/// JSON files, keyed by language code").
pub type LanguageTable = HashMap<String, String>;

/// Parse a language JSON file's contents into a [`LanguageTable`].
pub fn parse_language_json(json_text: &str) -> ConfigResult<LanguageTable> {
    Ok(serde_json::from_str(json_text)?)
}

/// A campaign's ordered mission list (§6: "Campaign files ... mapping a
/// campaign name to its missions list").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignData {
    /// Campaign display/key name.
    pub name: String,
    /// Mission scenario ids, in play order.
    pub missions: Vec<String>,
}

/// Parse a campaign key-value file (RON) into its [`CampaignData`] entries,
/// keyed by campaign name.
pub fn parse_campaign_file(ron_text: &str) -> ConfigResult<HashMap<String, CampaignData>> {
    let parsed: HashMap<String, Vec<String>> =
        ron::from_str(ron_text).map_err(|e| ConfigError::MalformedCell {
            object_name: "<campaign file>".to_string(),
            column: "missions".to_string(),
            cell: e.to_string(),
        })?;
    Ok(parsed
        .into_iter()
        .map(|(name, missions)| (name.clone(), CampaignData { name, missions }))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tuple_list_and_literal_cells() {
        assert_eq!(parse_cell("(100;50;25;1)"), CsvValue::Tuple(vec![
            CsvValue::Int(100),
            CsvValue::Int(50),
            CsvValue::Int(25),
            CsvValue::Int(1),
        ]));
        assert_eq!(parse_cell("[a;b;c]"), CsvValue::List(vec![
            CsvValue::Str("a".to_string()),
            CsvValue::Str("b".to_string()),
            CsvValue::Str("c".to_string()),
        ]));
        assert_eq!(parse_cell("True"), CsvValue::Bool(true));
        assert_eq!(parse_cell("None"), CsvValue::None);
        assert_eq!(parse_cell("3.5"), CsvValue::Float(3.5));
        assert_eq!(parse_cell("tank_medium"), CsvValue::Str("tank_medium".to_string()));
    }

    #[test]
    fn tank_medium_scenario_row_builds_expected_blueprint() {
        // spec.md §8 scenario 3's literal cost/time.
        let csv = "object_name,cost,production_time\ntank_medium,(100;50;25;1),5\n";
        let rows = parse_csv_rows(csv).unwrap();
        let bp = unit_blueprint_from_row(&rows[0]).unwrap();
        assert_eq!(bp.id, "tank_medium");
        assert_eq!(bp.cost[&ResourceKind::Steel], 100);
        assert_eq!(bp.cost[&ResourceKind::Electronics], 50);
        assert_eq!(bp.cost[&ResourceKind::Ammunition], 25);
        assert_eq!(bp.cost[&ResourceKind::Conscripts], 1);
        assert_eq!(bp.production_time_seconds, Fixed::from_num(5));
    }

    #[test]
    fn missing_column_is_reported_not_fatal() {
        let csv = "object_name,cost\ntank_medium,(100;50;25;1)\n";
        let rows = parse_csv_rows(csv).unwrap();
        assert!(matches!(unit_blueprint_from_row(&rows[0]), Err(ConfigError::MissingColumn { .. })));
    }

    #[test]
    fn language_table_round_trips_simple_json() {
        let json = r#"{"unit.tank.name": "Medium Tank"}"#;
        let table = parse_language_json(json).unwrap();
        assert_eq!(table.get("unit.tank.name").unwrap(), "Medium Tank");
    }

    #[test]
    fn campaign_file_lists_missions_in_order() {
        let ron_text = r#"{"first_campaign": ["mission_01", "mission_02"]}"#;
        let campaigns = parse_campaign_file(ron_text).unwrap();
        let campaign = &campaigns["first_campaign"];
        assert_eq!(campaign.missions, vec!["mission_01".to_string(), "mission_02".to_string()]);
    }
}
