//! Feature derivation from sampled reflectances
//!
//! Sampled tables go through a fixed sequence:
//! 1. rows with a missing band value are dropped
//! 2. raw bands are renamed and split into reflectance datasets
//! 3. band-index columns are appended for each complete band set
//! 4. generated names are compacted
//! 5. season one-hot columns are appended, then gaps are forward-filled

mod bands;
mod compact;
mod plan;
mod season;
mod subsets;

pub use bands::{
    raw_band_name, rename_bands, semantic_band_name, ReflectanceType, BAND_COUNT, RHOW_BANDS,
    TOA_BANDS,
};
pub use compact::{compact_columns, compact_name};
pub use plan::{round3, IndexFormula, IndexPlan, RatioDifference};
pub use season::{encode_seasons, Season};
pub use subsets::{rhow_dataset_name, split_reflectance, toa_dataset_name, SampledTable};

use std::collections::BTreeMap;
use tracing::{debug, info};

use chlorocast_core::{FeatureTable, Result};

/// Band sets that get index columns when all four bands are present
pub const BAND_SETS: [[&str; 4]; 2] = [
    ["rtoa_B2", "rtoa_B3", "rtoa_B4", "rtoa_B5"],
    ["rhow_B2", "rhow_B3", "rhow_B4", "rhow_B5"],
];

/// Parameters for feature derivation
#[derive(Debug, Clone, Copy, Default)]
pub struct DeriveParams {
    pub ratio_difference: RatioDifference,
}

/// Append index, season and compacted columns to one reflectance table
pub fn derive_features(table: &mut FeatureTable, params: &DeriveParams) -> Result<()> {
    for band_set in BAND_SETS {
        if !band_set.iter().all(|b| table.has_column(b)) {
            continue;
        }
        let plan = IndexPlan::new(&band_set, params.ratio_difference)?;
        plan.apply(table)?;
        debug!("{} index column(s) over {}", plan.len(), band_set.join(","));
    }

    compact_columns(table)?;
    encode_seasons(table)?;

    let filled = table.forward_fill();
    if filled > 0 {
        debug!("Forward-filled {} missing value(s)", filled);
    }
    Ok(())
}

/// Turn raw sampled tables into model-ready datasets keyed by name
pub fn prepare_datasets(
    sampled: Vec<SampledTable>,
    params: &DeriveParams,
) -> Result<BTreeMap<String, FeatureTable>> {
    let mut cleaned = Vec::with_capacity(sampled.len());
    for mut s in sampled {
        let dropped = s.table.drop_incomplete_rows();
        if dropped > 0 {
            info!("{}: dropped {} incomplete row(s)", s.name(), dropped);
        }
        cleaned.push(s);
    }

    let mut datasets = split_reflectance(cleaned)?;
    for (name, table) in datasets.iter_mut() {
        derive_features(table, params)?;
        debug!("{}: {} rows x {} columns", name, table.len(), table.width());
    }
    Ok(datasets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::{Grouping, NetworkSet};
    use chlorocast_core::RowKey;
    use chrono::NaiveDate;

    fn rhow_table() -> FeatureTable {
        let date = NaiveDate::from_ymd_opt(2023, 8, 1).unwrap();
        let keys = (0..3).map(|i| RowKey::new(date, i as f64, 0.0)).collect();
        let mut t = FeatureTable::new(keys).unwrap();
        for (i, band) in RHOW_BANDS.iter().enumerate() {
            t.push_float(*band, vec![0.01 * (i + 1) as f64; 3]).unwrap();
        }
        t
    }

    #[test]
    fn test_derive_rhow_table() {
        let mut t = rhow_table();
        derive_features(&mut t, &DeriveParams::default()).unwrap();

        // 8 bands + 35 indices + 4 seasons
        assert_eq!(t.width(), 8 + 35 + 4);
        assert!(t.has_column("dif_norm_rhow_B2_B3"));
        assert!(t.has_column("dif_rel_4bands_rhow_B2_B3_B4_B5"));
        assert!(t.has_column("sum_norm_3bands_rhow_B2_B4_B3"));
        assert!(!t.column_names().iter().any(|n| n.starts_with("dif_norm_rtoa")));

        // rhow_B2 = 0.02, rhow_B3 = 0.03
        assert_eq!(t.float_column("dif_norm_rhow_B2_B3").unwrap()[0], -0.2);
        assert_eq!(t.float_column("Verano").unwrap(), &[1.0, 1.0, 1.0]);
        assert_eq!(t.float_column("Invierno").unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_exhaustive_ratio_columns() {
        let mut t = rhow_table();
        let params = DeriveParams {
            ratio_difference: RatioDifference::Exhaustive,
        };
        derive_features(&mut t, &params).unwrap();
        assert_eq!(t.width(), 8 + 44 + 4);
    }

    #[test]
    fn test_incomplete_band_set_skipped() {
        let mut t = rhow_table();
        t.remove_column("rhow_B5");
        derive_features(&mut t, &DeriveParams::default()).unwrap();
        assert_eq!(t.width(), 7 + 4);
    }

    #[test]
    fn test_prepare_drops_incomplete_rows() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 5).unwrap();
        let keys = (0..2).map(|i| RowKey::new(date, i as f64, 0.0)).collect();
        let mut table = FeatureTable::new(keys).unwrap();
        for band in 1..=BAND_COUNT {
            let mut values = vec![0.05 + band as f64 * 0.001; 2];
            if band == 16 {
                values[1] = f64::NAN;
            }
            table.push_float(raw_band_name(band), values).unwrap();
        }

        let datasets = prepare_datasets(
            vec![SampledTable {
                network: NetworkSet::C2xComplex,
                grouping: Grouping::Window9,
                table,
            }],
            &DeriveParams::default(),
        )
        .unwrap();

        assert_eq!(datasets.len(), 2);
        let toa = &datasets["TOA_9x9"];
        let rhow = &datasets["C2X-Complex_rhow_9x9"];
        assert_eq!(toa.len(), 1);
        assert_eq!(rhow.len(), 1);
        assert!(toa.has_column("dif_inv_rtoa_B2_B3"));
        assert_eq!(rhow.float_column("Invierno").unwrap(), &[1.0]);
    }
}
