//! Splitting sampled tables into reflectance datasets

use std::collections::BTreeMap;
use std::ops::Range;
use tracing::debug;

use super::bands::{rename_bands, ReflectanceType, BAND_COUNT, TOA_BANDS};
use crate::sampling::{Grouping, NetworkSet};
use chlorocast_core::{Error, FeatureTable, Result};

/// Raw sampled table of one network set at one grouping
#[derive(Debug, Clone)]
pub struct SampledTable {
    pub network: NetworkSet,
    pub grouping: Grouping,
    pub table: FeatureTable,
}

impl SampledTable {
    /// Key of the raw table, e.g. `C2X-Complex_9x9`
    pub fn name(&self) -> String {
        format!("{}_{}", self.network, self.grouping)
    }
}

/// Key of a processed water-leaving table, e.g. `C2X-Complex_rhow_9x9`
pub fn rhow_dataset_name(network: NetworkSet, grouping: Grouping) -> String {
    format!("{}_rhow_{}", network, grouping)
}

/// Key of a processed top-of-atmosphere table, e.g. `TOA_9x9`
pub fn toa_dataset_name(grouping: Grouping) -> String {
    format!("TOA_{}", grouping)
}

fn band_range(kind: ReflectanceType) -> Range<usize> {
    match kind {
        ReflectanceType::TopOfAtmosphere => 0..TOA_BANDS.len(),
        ReflectanceType::WaterLeaving => TOA_BANDS.len()..BAND_COUNT,
    }
}

/// Rename bands and split each sampled table into reflectance datasets.
///
/// Every input yields its water-leaving table. The widest grouping also
/// yields one top-of-atmosphere table; those bands do not depend on the
/// network set, so only the first such input is used.
pub fn split_reflectance(sampled: Vec<SampledTable>) -> Result<BTreeMap<String, FeatureTable>> {
    let widest = sampled.iter().map(|s| s.grouping).max();
    let mut out = BTreeMap::new();

    for SampledTable {
        network,
        grouping,
        mut table,
    } in sampled
    {
        if table.width() < BAND_COUNT {
            return Err(Error::InvalidParameter {
                name: "bands",
                value: table.width().to_string(),
                reason: format!("{}_{} needs {} band columns", network, grouping, BAND_COUNT),
            });
        }
        rename_bands(&mut table)?;

        if Some(grouping) == widest {
            let key = toa_dataset_name(grouping);
            if out.contains_key(&key) {
                debug!("{} already taken from another network set", key);
            } else {
                let toa = table.slice_columns(band_range(ReflectanceType::TopOfAtmosphere))?;
                out.insert(key, toa);
            }
        }

        let rhow = table.slice_columns(band_range(ReflectanceType::WaterLeaving))?;
        out.insert(rhow_dataset_name(network, grouping), rhow);
    }

    Ok(out)
}
