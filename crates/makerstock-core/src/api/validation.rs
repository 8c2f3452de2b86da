//! Input validation applied before any request is sent.

use crate::models::Holding;

use super::ApiError;

/// Reject empty or whitespace-only values.
pub fn validate_not_empty(value: &str, field_name: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{} is required.", field_name)));
    }
    Ok(())
}

/// Accept only whole numbers >= 1 that fit in a `u32`.
///
/// Takes an `f64` so that user input such as `2.5` is rejected here rather
/// than silently truncated by a parse.
pub fn validate_positive_int(value: f64, field_name: &str) -> Result<u32, ApiError> {
    if !value.is_finite() || value.fract() != 0.0 || value < 1.0 || value > u32::MAX as f64 {
        return Err(ApiError::Validation(format!(
            "{} must be a positive integer.",
            field_name
        )));
    }
    Ok(value as u32)
}

/// Parse a quantity typed by the user.
pub fn parse_quantity(input: &str, field_name: &str) -> Result<u32, ApiError> {
    let value: f64 = input.trim().parse().map_err(|_| {
        ApiError::Validation(format!("{} must be a positive integer.", field_name))
    })?;
    validate_positive_int(value, field_name)
}

/// Check a return against what the user currently holds.
pub fn validate_return_quantity(
    holdings: &[Holding],
    component: &str,
    quantity: u32,
) -> Result<(), ApiError> {
    let holding = holdings.iter().find(|h| h.component == component).ok_or_else(|| {
        ApiError::Validation(format!("You have no {} borrowed.", component))
    })?;

    if quantity > holding.outstanding {
        return Err(ApiError::Validation(format!(
            "You only have {} borrowed.",
            holding.outstanding
        )));
    }
    Ok(())
}
