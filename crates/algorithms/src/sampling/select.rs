//! Raster file selection by date and reflectance network set

use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use chlorocast_core::{Error, Result};

/// Atmospheric-correction network family a raster was processed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NetworkSet {
    C2xComplex,
    C2x,
    C2rcc,
}

impl NetworkSet {
    /// Name used in configuration and dataset names
    pub fn name(&self) -> &'static str {
        match self {
            NetworkSet::C2xComplex => "C2X-Complex",
            NetworkSet::C2x => "C2X",
            NetworkSet::C2rcc => "C2RCC",
        }
    }

    /// Token a raster file name must contain to belong to this set
    pub fn file_token(&self) -> &'static str {
        match self {
            NetworkSet::C2xComplex => "C2XComplexNets",
            NetworkSet::C2x => "C2XNets",
            NetworkSet::C2rcc => "C2RCC",
        }
    }
}

impl fmt::Display for NetworkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "C2X-Complex" => Ok(NetworkSet::C2xComplex),
            "C2X" => Ok(NetworkSet::C2x),
            "C2RCC" => Ok(NetworkSet::C2rcc),
            other => Err(Error::UnrecognizedReflectanceSet(other.to_string())),
        }
    }
}

/// All `.tif` files in `dir` belonging to `network`, sorted by file name
pub fn candidate_rasters(dir: &Path, network: NetworkSet) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(".tif") && name.contains(network.file_token()) {
            files.push(path);
        }
    }
    files.sort();
    debug!("{} {} raster(s) in {}", files.len(), network, dir.display());
    Ok(files)
}

/// Pick the raster for `date` among `candidates`.
///
/// A file matches when its name contains the date as `YYYYMMDD`. The first
/// match in lexicographic order wins; any further matches are reported and
/// ignored.
pub fn select_raster(candidates: &[PathBuf], date: NaiveDate) -> Option<PathBuf> {
    let stamp = date.format("%Y%m%d").to_string();
    let mut matching: Vec<&PathBuf> = candidates
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(&stamp))
        })
        .collect();
    matching.sort();

    let (first, rest) = matching.split_first()?;
    for ignored in rest {
        warn!(
            "Several rasters match {}: using {}, ignoring {}",
            date,
            first.display(),
            ignored.display()
        );
    }
    Some((*first).clone())
}
