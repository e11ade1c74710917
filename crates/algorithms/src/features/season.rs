//! Season encoding

use chrono::{Datelike, NaiveDate};

use chlorocast_core::{FeatureTable, Result};

/// Meteorological season of a date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    /// September to November
    Other,
}

impl Season {
    /// Fixed one-hot column order
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Other];

    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Other,
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_month(date.month())
    }

    /// Column name expected by the trained models
    pub fn column_name(&self) -> &'static str {
        match self {
            Season::Winter => "Invierno",
            Season::Spring => "Primavera",
            Season::Summer => "Verano",
            Season::Other => "Otoño",
        }
    }
}

/// One-hot encode each row's season as four 0/1 columns in [`Season::ALL`]
/// order. All four columns are added whatever seasons occur.
pub fn encode_seasons(table: &mut FeatureTable) -> Result<()> {
    let seasons: Vec<Season> = table.keys().iter().map(|k| Season::from_date(k.date)).collect();
    for season in Season::ALL {
        let values = seasons
            .iter()
            .map(|s| if *s == season { 1.0 } else { 0.0 })
            .collect();
        table.push_float(season.column_name(), values)?;
    }
    Ok(())
}
