//! Model runtimes
//!
//! Every artifact format is served by one [`Regressor`] implementation,
//! chosen once when the artifact is loaded:
//!
//! - gradient-boosted JSON exports are evaluated natively
//! - pipeline and categorical-boosted artifacts run in an external Python
//!   interpreter

mod capabilities;
mod python;
mod xgboost;

pub use capabilities::Capabilities;
pub use python::PythonModel;
pub use xgboost::GradientBoostedModel;

use ndarray::{Array2, ArrayView2};

use crate::error::{ModelError, Result};

/// Feature matrix with named columns, one row per sample
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureFrame {
    /// `values` has one column per name
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.ncols() != names.len() {
            return Err(ModelError::InvalidModel(format!(
                "{} column names for {} columns",
                names.len(),
                values.ncols()
            )));
        }
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }
}

/// A loaded regression model
pub trait Regressor: Send + Sync {
    /// Predict from a labeled frame.
    ///
    /// Returns [`ModelError::InputRejected`] when the model cannot take the
    /// frame as labeled input; callers may retry with
    /// [`predict_matrix`](Self::predict_matrix).
    fn predict_frame(&self, frame: &FeatureFrame) -> Result<Vec<f64>>;

    /// Predict from a raw matrix, columns matched by position
    fn predict_matrix(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>>;

    /// Input feature names recorded in the model, if any
    fn feature_names(&self) -> Option<&[String]>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_shape_checked() {
        let ok = FeatureFrame::new(vec!["a".into(), "b".into()], Array2::zeros((3, 2))).unwrap();
        assert_eq!(ok.nrows(), 3);
        assert!(FeatureFrame::new(vec!["a".into()], Array2::zeros((3, 2))).is_err());
    }
}
