use anyhow::{anyhow, Result};
use burn::tensor::{Tensor, TensorData};
use burn_ndarray::{NdArray, NdArrayDevice};

use crate::linear::LinearBudgetModel;
use crate::{BudgetModel, FeatureMatrix};

type Backend = NdArray<f32>;

/// Linear model evaluated as one `[rows, features] x [features, 1]` product.
#[derive(Debug, Clone)]
pub struct BurnLinearModel {
    inner: LinearBudgetModel,
}

impl BurnLinearModel {
    pub fn new(inner: LinearBudgetModel) -> Self {
        Self { inner }
    }
}

impl BudgetModel for BurnLinearModel {
    fn model_name(&self) -> &'static str {
        "burn-linear"
    }

    fn feature_names(&self) -> &[String] {
        self.inner.feature_names()
    }

    fn predict_batch(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        let rows = matrix.row_count();
        let cols = matrix.column_count();
        if rows == 0 || cols == 0 {
            return self.inner.predict_batch(matrix);
        }

        let device = NdArrayDevice::Cpu;
        let inputs = matrix.values().iter().map(|v| *v as f32).collect::<Vec<_>>();
        let weights = self
            .inner
            .weights()
            .iter()
            .map(|w| *w as f32)
            .collect::<Vec<_>>();

        let inputs = Tensor::<Backend, 2>::from_data(TensorData::new(inputs, [rows, cols]), &device);
        let weights =
            Tensor::<Backend, 2>::from_data(TensorData::new(weights, [cols, 1]), &device);

        let output = inputs
            .matmul(weights)
            .add_scalar(self.inner.intercept() as f32)
            .into_data()
            .to_vec::<f32>()
            .map_err(|error| anyhow!("failed reading burn output tensor: {:?}", error))?;

        Ok(output.into_iter().map(f64::from).collect())
    }
}
