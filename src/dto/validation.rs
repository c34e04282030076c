//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects strings made only of whitespace.
///
/// # Examples
///
/// ```ignore
/// validate_not_blank("Alice") // Ok
/// validate_not_blank("   ")   // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must contain at least one non-whitespace character".into());
        return Err(err);
    }

    Ok(())
}
