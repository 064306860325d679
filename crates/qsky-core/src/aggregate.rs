//! Running averages of waiting and working durations.
//!
//! Every time a step is measured, the customer's average for that metric is
//! moved by the incremental mean
//!
//! ```text
//! new = (old * (n - 1) + sample) / n
//! ```
//!
//! where `n` counts the steps of the current chain that carry a sample for
//! the metric, including the one just measured. Durations are whole
//! milliseconds and the division truncates toward zero.

use chrono::{DateTime, Utc};
use qsky_types::Customer;

use crate::chain::StepChain;

/// Fold one sample into a running average over `samples` values.
///
/// `samples` includes the new sample; a count of zero is treated as one.
pub fn running_average(old_avg: i64, samples: usize, sample: i64) -> i64 {
    let n = i128::try_from(samples.max(1)).unwrap_or(i128::MAX);
    i128::from(old_avg)
        .checked_mul(n.saturating_sub(1))
        .and_then(|total| total.checked_add(i128::from(sample)))
        .and_then(|total| total.checked_div(n))
        .and_then(|avg| i64::try_from(avg).ok())
        .unwrap_or(sample)
}

/// Milliseconds from `from` to `to`; negative if the clock went backwards.
pub fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    to.signed_duration_since(from).num_milliseconds()
}

/// Fold a freshly measured waiting sample into the customer's average.
pub fn record_waiting(customer: &mut Customer, chain: &StepChain, sample: i64) {
    customer.waiting_avg =
        running_average(customer.waiting_avg, chain.measured_waiting(), sample);
}

/// Fold a freshly measured working sample into the customer's average.
pub fn record_working(customer: &mut Customer, chain: &StepChain, sample: i64) {
    customer.working_avg =
        running_average(customer.working_avg, chain.measured_working(), sample);
}
