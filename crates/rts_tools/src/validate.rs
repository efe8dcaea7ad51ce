//! Data validation utilities.
//!
//! Walks an asset directory the way the game itself loads it at startup
//! (§6): `units.csv`, `buildings.csv`, `technologies.csv` through
//! [`rts_core::config::load_blueprint_registry`], any `lang/*.json` through
//! [`rts_core::config::parse_language_json`], and any `campaigns/*.ron`
//! through [`rts_core::config::parse_campaign_file`]. Per §7's
//! Config-missing handling, a malformed row is reported and skipped rather
//! than aborting the whole directory; this tool's job is only to surface
//! those reports to a human before they'd otherwise show up at runtime.

use std::fs;
use std::path::Path;

use rts_core::config;
use rts_core::error::{Result, SimError};

/// Validate all config data files in a directory, logging one warning per
/// malformed row/file and returning an error only if a required CSV file is
/// missing outright or unreadable.
///
/// # Errors
///
/// Returns an error if `units.csv`, `buildings.csv`, or `technologies.csv`
/// cannot be read.
pub fn validate_data_directory(path: &Path) -> Result<()> {
    let units_csv = read_required(path, "units.csv")?;
    let buildings_csv = read_required(path, "buildings.csv")?;
    let technologies_csv = read_required(path, "technologies.csv")?;

    let (registry, errors) = config::load_blueprint_registry(&units_csv, &buildings_csv, &technologies_csv);
    for error in &errors {
        tracing::warn!("config row rejected: {error}");
    }
    tracing::info!(
        "loaded {} unit(s), {} building(s), {} tech(s); {} row error(s)",
        registry.unit_count(),
        registry.building_count(),
        registry.tech_count(),
        errors.len()
    );

    validate_language_files(path);
    validate_campaign_files(path);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SimError::ConfigMissing { key: format!("{} config row(s) rejected, see warnings above", errors.len()) })
    }
}

fn read_required(dir: &Path, file_name: &str) -> Result<String> {
    let full = dir.join(file_name);
    fs::read_to_string(&full).map_err(|e| SimError::ConfigMissing { key: format!("{}: {e}", full.display()) })
}

fn validate_language_files(dir: &Path) {
    let lang_dir = dir.join("lang");
    let Ok(entries) = fs::read_dir(&lang_dir) else { return };
    for entry in entries.flatten() {
        let file_path = entry.path();
        if file_path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match fs::read_to_string(&file_path) {
            Ok(text) => match config::parse_language_json(&text) {
                Ok(table) => tracing::info!("{}: {} string(s)", file_path.display(), table.len()),
                Err(e) => tracing::warn!("{}: {e}", file_path.display()),
            },
            Err(e) => tracing::warn!("{}: {e}", file_path.display()),
        }
    }
}

fn validate_campaign_files(dir: &Path) {
    let campaigns_dir = dir.join("campaigns");
    let Ok(entries) = fs::read_dir(&campaigns_dir) else { return };
    for entry in entries.flatten() {
        let file_path = entry.path();
        if file_path.extension().and_then(|e| e.to_str()) != Some("ron") {
            continue;
        }
        match fs::read_to_string(&file_path) {
            Ok(text) => match config::parse_campaign_file(&text) {
                Ok(campaigns) => tracing::info!("{}: {} campaign(s)", file_path.display(), campaigns.len()),
                Err(e) => tracing::warn!("{}: {e}", file_path.display()),
            },
            Err(e) => tracing::warn!("{}: {e}", file_path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn missing_directory_reports_config_missing() {
        let tmp = std::env::temp_dir().join("rts_tools_validate_missing_test");
        let _ = fs::remove_dir_all(&tmp);
        let err = validate_data_directory(&tmp).unwrap_err();
        assert!(matches!(err, SimError::ConfigMissing { .. }));
    }

    #[test]
    fn well_formed_directory_validates_cleanly() {
        let tmp = std::env::temp_dir().join("rts_tools_validate_ok_test");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        write_file(&tmp, "units.csv", "object_name,cost,production_time\ntank_medium,(100;50;25;1),5\n");
        write_file(&tmp, "buildings.csv", "object_name,cost,construction_time\nfactory,(500;0;0;0),30\n");
        write_file(&tmp, "technologies.csv", "object_name,difficulty\narmor_plating,100\n");
        write_file(&tmp, "lang/en.json", r#"{"unit.tank.name": "Medium Tank"}"#);
        write_file(&tmp, "campaigns/main.ron", r#"{"first_campaign": ["mission_01"]}"#);

        validate_data_directory(&tmp).unwrap();
        fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn malformed_row_is_reported_as_error() {
        let tmp = std::env::temp_dir().join("rts_tools_validate_bad_row_test");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        write_file(&tmp, "units.csv", "object_name,cost\ntank_medium,(100;50;25;1)\n");
        write_file(&tmp, "buildings.csv", "object_name,cost,construction_time\n");
        write_file(&tmp, "technologies.csv", "object_name,difficulty\n");

        let err = validate_data_directory(&tmp).unwrap_err();
        assert!(matches!(err, SimError::ConfigMissing { .. }));
        fs::remove_dir_all(&tmp).ok();
    }
}
