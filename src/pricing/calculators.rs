//! Core rental price calculation.
//!
//! Pure functions for pricing math - no I/O, no clock access.

use rust_decimal::Decimal;

use super::models::{PriceBreakdown, PricingPolicy, RentalRequest};
use super::services::PricingError;

const SECONDS_PER_HOUR: i64 = 60 * 60;
const HOURS_PER_DAY: i64 = 24;

/// Calculate the price of a rental.
///
/// Elapsed time is rounded up to whole hours (minimum 1) and split into
/// full days plus overage hours. Overage beyond the grace period is billed
/// as one more full day; overage within it is billed per hour at the late fee.
///
/// # Errors
/// * `PricingError::InvalidInput` if the daily rate is negative or the amounts overflow
/// * `PricingError::InvalidRange` if the return instant is not after pickup
///
/// # Examples
/// ```
/// use chrono::{NaiveDate, NaiveTime};
/// use rust_decimal_macros::dec;
/// use motorent_web::pricing::{calculate, PricingPolicy, RentalRequest};
///
/// let request = RentalRequest {
///     daily_rate: dec!(100000),
///     start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
///     end_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
///     pickup_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
///     return_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
/// };
/// let breakdown = calculate(&request, &PricingPolicy::default()).unwrap();
/// assert_eq!(breakdown.total_amount, dec!(160000));
/// ```
pub fn calculate(
    request: &RentalRequest,
    policy: &PricingPolicy,
) -> Result<PriceBreakdown, PricingError> {
    if request.daily_rate < Decimal::ZERO {
        return Err(PricingError::InvalidInput {
            field: "daily_rate".to_string(),
            message: format!("daily rate must not be negative, got {}", request.daily_rate),
        });
    }

    let start = request.start_instant();
    let end = request.end_instant();
    if end <= start {
        return Err(PricingError::InvalidRange { start, end });
    }

    let elapsed_secs = (end - start).num_seconds();
    let total_hours = ceil_div(elapsed_secs, SECONDS_PER_HOUR).max(1);

    let mut full_days = total_hours / HOURS_PER_DAY;
    let mut overage_hours = total_hours % HOURS_PER_DAY;

    // Grace rule
    if overage_hours > policy.grace_hours {
        full_days += 1;
        overage_hours = 0;
    }

    let base_amount = Decimal::from(full_days)
        .checked_mul(request.daily_rate)
        .ok_or_else(|| amount_overflow("daily_rate", request.daily_rate))?;
    let penalty_amount = if overage_hours > 0 {
        Decimal::from(overage_hours)
            .checked_mul(policy.late_fee_per_hour)
            .ok_or_else(|| amount_overflow("late_fee_per_hour", policy.late_fee_per_hour))?
    } else {
        Decimal::ZERO
    };
    let total_amount = base_amount
        .checked_add(penalty_amount)
        .ok_or_else(|| amount_overflow("daily_rate", request.daily_rate))?;

    Ok(PriceBreakdown {
        total_hours,
        full_days,
        overage_hours,
        is_late: overage_hours > 0,
        base_amount,
        penalty_amount,
        total_amount,
    })
}

fn amount_overflow(field: &str, value: Decimal) -> PricingError {
    PricingError::InvalidInput {
        field: field.to_string(),
        message: format!("{} is too large to price", value),
    }
}

/// Integer division rounding toward positive infinity (for non-negative operands).
fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    (numerator + denominator - 1) / denominator
}
