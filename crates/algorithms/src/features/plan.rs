//! Band-index formulas and the plan that enumerates them
//!
//! A plan is the closed, ordered list of formulas derived from a band set.
//! Column names encode the formula and its operand bands, so the same
//! formula over different bands never collides.

use std::fmt;
use std::str::FromStr;

use crate::maybe_rayon::*;
use chlorocast_core::{Error, FeatureTable, Result};

/// Which four-band ratio differences to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatioDifference {
    /// One column per split of four bands into two pairs, each pair
    /// ascending in band-set order: 3 columns per four bands
    #[default]
    Canonical,
    /// Every 4-permutation whose first band pair sorts before the second:
    /// 12 columns per four bands
    Exhaustive,
}

impl FromStr for RatioDifference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "canonical" => Ok(RatioDifference::Canonical),
            "exhaustive" => Ok(RatioDifference::Exhaustive),
            other => Err(Error::InvalidParameter {
                name: "ratio_difference",
                value: other.to_string(),
                reason: "expected canonical or exhaustive".into(),
            }),
        }
    }
}

impl fmt::Display for RatioDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatioDifference::Canonical => f.write_str("canonical"),
            RatioDifference::Exhaustive => f.write_str("exhaustive"),
        }
    }
}

/// A derived index over positions in the band set.
///
/// Operands are listed in the order they appear in the column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormula {
    /// `(a - b) / (a + b)`
    NormalizedDifference(usize, usize),
    /// `1/a - 1/b`
    InverseDifference(usize, usize),
    /// `(1/a - 1/b) * c`
    DallGitelson(usize, usize, usize),
    /// `(a - b) / (c + d)`
    NormalizedDifference4(usize, usize, usize, usize),
    /// `a/b - c/d`
    RatioDifference4(usize, usize, usize, usize),
    /// `(a + b) / (a + c)`
    SumNormalized3(usize, usize, usize),
}

impl IndexFormula {
    /// Column name prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            IndexFormula::NormalizedDifference(..) => "dif_norm",
            IndexFormula::InverseDifference(..) => "dif_inv",
            IndexFormula::DallGitelson(..) => "dall_gitelson",
            IndexFormula::NormalizedDifference4(..) => "dif_norm_4_bands",
            IndexFormula::RatioDifference4(..) => "dif_rel_4bands",
            IndexFormula::SumNormalized3(..) => "sum_norm_3bands",
        }
    }

    /// Band positions in name order
    pub fn operands(&self) -> Vec<usize> {
        match *self {
            IndexFormula::NormalizedDifference(a, b) | IndexFormula::InverseDifference(a, b) => {
                vec![a, b]
            }
            IndexFormula::DallGitelson(a, b, c) | IndexFormula::SumNormalized3(a, b, c) => {
                vec![a, b, c]
            }
            IndexFormula::NormalizedDifference4(a, b, c, d)
            | IndexFormula::RatioDifference4(a, b, c, d) => vec![a, b, c, d],
        }
    }

    /// Column name, e.g. `dif_norm_rhow_B2_rhow_B3`
    pub fn column_name<S: AsRef<str>>(&self, bands: &[S]) -> String {
        let mut name = self.prefix().to_string();
        for i in self.operands() {
            name.push('_');
            name.push_str(bands[i].as_ref());
        }
        name
    }

    /// Evaluate on one row, `v` indexed by band-set position. Unrounded.
    pub fn evaluate(&self, v: &[f64]) -> f64 {
        match *self {
            IndexFormula::NormalizedDifference(a, b) => (v[a] - v[b]) / (v[a] + v[b]),
            IndexFormula::InverseDifference(a, b) => 1.0 / v[a] - 1.0 / v[b],
            IndexFormula::DallGitelson(a, b, c) => (1.0 / v[a] - 1.0 / v[b]) * v[c],
            IndexFormula::NormalizedDifference4(a, b, c, d) => (v[a] - v[b]) / (v[c] + v[d]),
            IndexFormula::RatioDifference4(a, b, c, d) => v[a] / v[b] - v[c] / v[d],
            IndexFormula::SumNormalized3(a, b, c) => (v[a] + v[b]) / (v[a] + v[c]),
        }
    }
}

/// Round to 3 decimals, ties to even
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round_ties_even() / 1000.0
}

fn pairs(n: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..n).flat_map(move |i| (i + 1..n).map(move |j| (i, j)))
}

/// Ordered list of formulas over a band set
#[derive(Debug, Clone)]
pub struct IndexPlan {
    bands: Vec<String>,
    formulas: Vec<IndexFormula>,
}

impl IndexPlan {
    /// Enumerate the formulas for `bands`.
    ///
    /// Order: two-band pairs (normalized then inverse difference per
    /// pair), three-band Dall'Olmo-Gitelson, four-band normalized
    /// difference, four-band ratio difference, and for a four-band set
    /// the two sum-normalized indices.
    pub fn new<S: AsRef<str>>(bands: &[S], ratio: RatioDifference) -> Result<Self> {
        let bands: Vec<String> = bands.iter().map(|b| b.as_ref().to_string()).collect();
        let n = bands.len();
        if n < 2 {
            return Err(Error::InvalidParameter {
                name: "bands",
                value: n.to_string(),
                reason: "an index plan needs at least two bands".into(),
            });
        }
        for (i, b) in bands.iter().enumerate() {
            if bands[..i].contains(b) {
                return Err(Error::DuplicateColumn(b.clone()));
            }
        }

        let mut formulas = Vec::new();

        for (a, b) in pairs(n) {
            formulas.push(IndexFormula::NormalizedDifference(a, b));
            formulas.push(IndexFormula::InverseDifference(a, b));
        }

        for (a, b) in pairs(n) {
            for c in (0..n).filter(|&c| c != a && c != b) {
                formulas.push(IndexFormula::DallGitelson(a, b, c));
            }
        }

        for (a, b) in pairs(n) {
            for (c, d) in pairs(n) {
                if c != a && c != b && d != a && d != b {
                    formulas.push(IndexFormula::NormalizedDifference4(a, b, c, d));
                }
            }
        }

        match ratio {
            RatioDifference::Canonical => {
                for (a, b, c, d) in combinations4(n) {
                    formulas.push(IndexFormula::RatioDifference4(a, b, c, d));
                    formulas.push(IndexFormula::RatioDifference4(a, c, b, d));
                    formulas.push(IndexFormula::RatioDifference4(a, d, b, c));
                }
            }
            RatioDifference::Exhaustive => {
                for (a, b, c, d) in permutations4(n) {
                    if (&bands[a], &bands[b]) < (&bands[c], &bands[d]) {
                        formulas.push(IndexFormula::RatioDifference4(a, b, c, d));
                    }
                }
            }
        }

        if n == 4 {
            formulas.push(IndexFormula::SumNormalized3(0, 2, 1));
            formulas.push(IndexFormula::SumNormalized3(1, 3, 2));
        }

        Ok(Self { bands, formulas })
    }

    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    pub fn formulas(&self) -> &[IndexFormula] {
        &self.formulas
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Column names in plan order
    pub fn column_names(&self) -> Vec<String> {
        self.formulas
            .iter()
            .map(|f| f.column_name(&self.bands))
            .collect()
    }

    /// Append one rounded column per formula to `table`.
    ///
    /// Every band of the plan must be a column of the table.
    pub fn apply(&self, table: &mut FeatureTable) -> Result<()> {
        let inputs: Vec<Vec<f64>> = self
            .bands
            .iter()
            .map(|b| {
                table
                    .column(b)
                    .map(|c| c.to_float_lossy())
                    .ok_or_else(|| Error::MissingColumn(b.clone()))
            })
            .collect::<Result<_>>()?;

        let rows = table.len();
        let columns: Vec<Vec<f64>> = (0..self.formulas.len())
            .into_par_iter()
            .map(|k| {
                let formula = self.formulas[k];
                let mut row = vec![0.0; inputs.len()];
                (0..rows)
                    .map(|r| {
                        for (slot, band) in row.iter_mut().zip(&inputs) {
                            *slot = band[r];
                        }
                        round3(formula.evaluate(&row))
                    })
                    .collect::<Vec<f64>>()
            })
            .collect();

        for (name, values) in self.column_names().into_iter().zip(columns) {
            table.push_float(name, values)?;
        }
        Ok(())
    }
}

fn combinations4(n: usize) -> impl Iterator<Item = (usize, usize, usize, usize)> {
    (0..n).flat_map(move |a| {
        (a + 1..n).flat_map(move |b| {
            (b + 1..n).flat_map(move |c| (c + 1..n).map(move |d| (a, b, c, d)))
        })
    })
}

fn permutations4(n: usize) -> impl Iterator<Item = (usize, usize, usize, usize)> {
    (0..n).flat_map(move |a| {
        (0..n).filter(move |&b| b != a).flat_map(move |b| {
            (0..n).filter(move |&c| c != a && c != b).flat_map(move |c| {
                (0..n)
                    .filter(move |&d| d != a && d != b && d != c)
                    .map(move |d| (a, b, c, d))
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    const RHOW: [&str; 4] = ["rhow_B2", "rhow_B3", "rhow_B4", "rhow_B5"];

    fn count(plan: &IndexPlan, prefix: &str) -> usize {
        plan.formulas().iter().filter(|f| f.prefix() == prefix).count()
    }

    #[test]
    fn test_plan_counts_canonical() {
        let plan = IndexPlan::new(&RHOW, RatioDifference::Canonical).unwrap();
        assert_eq!(count(&plan, "dif_norm"), 6);
        assert_eq!(count(&plan, "dif_inv"), 6);
        assert_eq!(count(&plan, "dall_gitelson"), 12);
        assert_eq!(count(&plan, "dif_norm_4_bands"), 6);
        assert_eq!(count(&plan, "dif_rel_4bands"), 3);
        assert_eq!(count(&plan, "sum_norm_3bands"), 2);
        assert_eq!(plan.len(), 35);
    }

    #[test]
    fn test_plan_counts_exhaustive() {
        let plan = IndexPlan::new(&RHOW, RatioDifference::Exhaustive).unwrap();
        assert_eq!(count(&plan, "dif_rel_4bands"), 12);
    }

    #[test]
    fn test_names_unique() {
        for policy in [RatioDifference::Canonical, RatioDifference::Exhaustive] {
            let names = IndexPlan::new(&RHOW, policy).unwrap().column_names();
            let unique: HashSet<_> = names.iter().collect();
            assert_eq!(unique.len(), names.len());
        }
    }

    #[test]
    fn test_canonical_ratio_partitions() {
        let plan = IndexPlan::new(&["a", "b", "c", "d"], RatioDifference::Canonical).unwrap();
        let ratio: Vec<String> = plan
            .column_names()
            .into_iter()
            .filter(|n| n.starts_with("dif_rel_4bands"))
            .collect();
        assert_eq!(
            ratio,
            vec![
                "dif_rel_4bands_a_b_c_d",
                "dif_rel_4bands_a_c_b_d",
                "dif_rel_4bands_a_d_b_c",
            ]
        );
    }

    #[test]
    fn test_order_and_names() {
        let names = IndexPlan::new(&RHOW, RatioDifference::Canonical)
            .unwrap()
            .column_names();
        assert_eq!(names[0], "dif_norm_rhow_B2_rhow_B3");
        assert_eq!(names[1], "dif_inv_rhow_B2_rhow_B3");
        assert_eq!(names[12], "dall_gitelson_rhow_B2_rhow_B3_rhow_B4");
        assert_eq!(names[24], "dif_norm_4_bands_rhow_B2_rhow_B3_rhow_B4_rhow_B5");
        assert_eq!(names[33], "sum_norm_3bands_rhow_B2_rhow_B4_rhow_B3");
        assert_eq!(names[34], "sum_norm_3bands_rhow_B3_rhow_B5_rhow_B4");
    }

    #[test]
    fn test_evaluate() {
        let v = [0.2, 0.1, 0.4, 0.5];
        let cases = [
            (IndexFormula::NormalizedDifference(0, 1), 1.0 / 3.0),
            (IndexFormula::InverseDifference(0, 1), -5.0),
            (IndexFormula::DallGitelson(0, 1, 2), -2.0),
            (IndexFormula::NormalizedDifference4(0, 1, 2, 3), 0.1 / 0.9),
            (IndexFormula::RatioDifference4(0, 1, 2, 3), 1.2),
            (IndexFormula::SumNormalized3(0, 2, 1), 2.0),
        ];
        for (formula, expected) in cases {
            assert_relative_eq!(formula.evaluate(&v), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(0.12345), 0.123);
        assert_eq!(round3(-2.0004), -2.0);
        assert_eq!(round3(0.0625), 0.062);
        assert!(round3(f64::NAN).is_nan());
        assert_eq!(round3(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_plan_rejects_bad_band_sets() {
        assert!(IndexPlan::new(&["rhow_B2"], RatioDifference::Canonical).is_err());
        assert!(IndexPlan::new(&["a", "b", "a"], RatioDifference::Canonical).is_err());
    }
}
