pub mod external;
pub mod stock;

use rust_decimal::Decimal;
use validator::ValidationError;

pub(crate) fn validate_not_blank(val: &str) -> Result<(), ValidationError> {
    if val.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0);
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Trimmed text, with blank treated as absent.
pub(crate) fn non_blank(val: Option<String>) -> Option<String> {
    val.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
