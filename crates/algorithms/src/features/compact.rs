//! Compaction of generated column names
//!
//! `dif_norm_rhow_B2_rhow_B3` becomes `dif_norm_rhow_B2_B3`: the
//! reflectance prefix is kept once and the band tokens are gathered after
//! it. Compaction is idempotent.

use chlorocast_core::{FeatureTable, Result};

const QUALIFYING: [&str; 3] = ["rhow", "rhown", "rtoa"];
const PREFIXES: [&str; 2] = ["rhow", "rtoa"];

/// True when `name` holds a reflectance token directly followed by a band
/// token such as `_B4`
fn qualifies(name: &str) -> bool {
    QUALIFYING.iter().any(|token| {
        let pattern = format!("{}_B", token);
        name.match_indices(&pattern).any(|(i, _)| {
            name[i + pattern.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit())
        })
    })
}

/// Compacted form of `name`, or `None` when it is left as is
pub fn compact_name(name: &str) -> Option<String> {
    if !qualifies(name) {
        return None;
    }

    let mut base = Vec::new();
    let mut bands = Vec::new();
    let mut prefix = None;

    for part in name.split('_') {
        if PREFIXES.contains(&part) {
            prefix.get_or_insert(part);
        } else if part.starts_with('B') {
            bands.push(part);
        } else {
            base.push(part);
        }
    }

    let prefix = prefix?;
    if bands.is_empty() {
        return None;
    }

    let compacted = if base.is_empty() {
        format!("{}_{}", prefix, bands.join("_"))
    } else {
        format!("{}_{}_{}", base.join("_"), prefix, bands.join("_"))
    };
    (compacted != name).then_some(compacted)
}

/// Compact every column name of `table`. Returns the number renamed.
pub fn compact_columns(table: &mut FeatureTable) -> Result<usize> {
    let mut renamed = 0;
    table.rename_columns(|name| {
        let new = compact_name(name);
        renamed += usize::from(new.is_some());
        new
    })?;
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact(name: &str) -> String {
        compact_name(name).unwrap_or_else(|| name.to_string())
    }

    #[test]
    fn test_compacts_generated_names() {
        assert_eq!(compact("dif_norm_rhow_B2_rhow_B3"), "dif_norm_rhow_B2_B3");
        assert_eq!(
            compact("dif_norm_4_bands_rtoa_B2_rtoa_B3_rtoa_B4_rtoa_B5"),
            "dif_norm_4_bands_rtoa_B2_B3_B4_B5"
        );
        assert_eq!(
            compact("sum_norm_3bands_rhow_B2_rhow_B4_rhow_B3"),
            "sum_norm_3bands_rhow_B2_B4_B3"
        );
    }

    #[test]
    fn test_leaves_other_names() {
        assert_eq!(compact_name("rhow_B8A"), None);
        assert_eq!(compact_name("Verano"), None);
        assert_eq!(compact_name("Band_3"), None);
        // qualifies, but has no prefix that is kept
        assert_eq!(compact_name("x_rhown_B2"), None);
    }

    #[test]
    fn test_idempotent() {
        let names = [
            "dif_inv_rhow_B2_rhow_B5",
            "dall_gitelson_rtoa_B3_rtoa_B4_rtoa_B2",
            "x_rhown_B2_rhow_B3",
            "a_rhow_B1_rtoa_B2",
            "a__rhow_B1",
            "rhow_B2",
            "Primavera",
        ];
        for name in names {
            let once = compact(name);
            assert_eq!(compact(&once), once, "{}", name);
        }
    }

    #[test]
    fn test_compact_columns() {
        let mut table = FeatureTable::new(vec![]).unwrap();
        table.push_float("rhow_B2", vec![]).unwrap();
        table.push_float("dif_inv_rhow_B2_rhow_B3", vec![]).unwrap();
        assert_eq!(compact_columns(&mut table).unwrap(), 1);
        assert_eq!(table.column_names()[1], "dif_inv_rhow_B2_B3");
    }
}
