//! Synthetic banking data: `customers` and `loans`.
//!
//! All randomness flows through a [`GeneratorContext`], so a seed and a fixed "today"
//! reproduce the same datasets.

mod customers;
mod loans;

pub use customers::{customers_dataset, generate_customers, Customer};
pub use loans::{generate_loans, loans_dataset, Loan};

use std::path::PathBuf;

use chrono::NaiveDate;
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::codec::ParquetCodec;
use crate::config::{GenerateConfig, LocalConfig};
use crate::core::Dataset;
use crate::error::{Result, TransferError};

/// Probability that a non-key field is replaced by null.
pub const NULL_PROBABILITY: f64 = 0.05;

/// Seeded random source plus the date treated as "today".
pub struct GeneratorContext {
    rng: StdRng,
    today: NaiveDate,
}

impl GeneratorContext {
    pub fn new(seed: u64, today: NaiveDate) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            today,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Uniform integer in `[low, high]`.
    pub(crate) fn int_between(&mut self, low: i64, high: i64) -> i64 {
        self.rng.gen_range(low..=high)
    }

    /// Uniform float in `[low, high)`.
    pub(crate) fn float_between(&mut self, low: f64, high: f64) -> f64 {
        self.rng.gen_range(low..high)
    }

    pub(crate) fn choose<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.rng.gen_range(0..items.len())]
    }

    pub(crate) fn weighted<'a, T>(&mut self, items: &'a [T], weights: &[f64]) -> Result<&'a T> {
        let index = WeightedIndex::new(weights).map_err(distribution_error)?;
        Ok(&items[self.rng.sample(index)])
    }

    /// Triangular draw. `mode` may fall outside `[low, high]`, which skews the result
    /// past `high`.
    pub(crate) fn triangular(&mut self, low: f64, high: f64, mode: f64) -> f64 {
        let (mut low, mut high) = (low, high);
        let mut u: f64 = self.rng.gen();
        let mut c = if high == low {
            0.5
        } else {
            (mode - low) / (high - low)
        };
        if u > c {
            u = 1.0 - u;
            c = 1.0 - c;
            std::mem::swap(&mut low, &mut high);
        }
        low + (high - low) * (u * c).sqrt()
    }

    /// Keep `value`, or drop it with [`NULL_PROBABILITY`].
    pub(crate) fn nullable<T>(&mut self, value: T) -> Option<T> {
        if self.rng.gen::<f64>() < NULL_PROBABILITY {
            None
        } else {
            Some(value)
        }
    }
}

pub(crate) fn distribution_error(e: impl std::fmt::Display) -> TransferError {
    TransferError::Config(format!("invalid distribution parameters: {}", e))
}

/// Days since the Unix epoch, the Arrow `Date32` representation.
pub(crate) fn date32(date: NaiveDate) -> i32 {
    // NaiveDate::default() is 1970-01-01
    date.signed_duration_since(NaiveDate::default()).num_days() as i32
}

/// Generated datasets ready to be written.
pub struct GeneratedData {
    pub customers: Dataset,
    pub loans: Dataset,
}

/// Generate both datasets. Unset row counts are drawn from [1000, 2000] customers and
/// [3000, 5000] loans.
pub fn generate(
    ctx: &mut GeneratorContext,
    customers: Option<usize>,
    loans: Option<usize>,
) -> Result<GeneratedData> {
    let customer_count = match customers {
        Some(n) => n,
        None => ctx.int_between(1000, 2000) as usize,
    };
    let customer_rows = generate_customers(ctx, customer_count)?;

    let loan_count = match loans {
        Some(n) => n,
        None => ctx.int_between(3000, 5000) as usize,
    };
    let loan_rows = generate_loans(ctx, loan_count, &customer_rows)?;

    debug!(
        "Generated {} customers and {} loans",
        customer_rows.len(),
        loan_rows.len()
    );

    Ok(GeneratedData {
        customers: customers_dataset(&customer_rows)?,
        loans: loans_dataset(&loan_rows)?,
    })
}

/// Generate both datasets and write them as `<data_dir>/<name>.parquet`.
pub async fn generate_to_dir(
    config: &GenerateConfig,
    local: &LocalConfig,
    codec: &ParquetCodec,
    today: NaiveDate,
) -> Result<Vec<(PathBuf, usize)>> {
    let mut ctx = GeneratorContext::new(config.seed, today);
    let data = generate(&mut ctx, config.customers, config.loans)?;

    let mut written = Vec::new();
    for (name, dataset) in [("customers", &data.customers), ("loans", &data.loans)] {
        let path = local.dataset_path(name);
        codec.write_file(dataset, &path).await?;
        info!("Wrote {} rows to {}", dataset.num_rows(), path.display());
        written.push((path, dataset.num_rows()));
    }
    Ok(written)
}
