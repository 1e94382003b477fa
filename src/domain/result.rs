//! Result type alias for fhirbridge

use super::errors::BridgeError;

/// Result type alias for fhirbridge operations
///
/// # Examples
///
/// ```
/// use fhirbridge::domain::result::Result;
/// use fhirbridge::domain::errors::BridgeError;
///
/// fn failing_function() -> Result<()> {
///     Err(BridgeError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(BridgeError::Validation("test error".to_string()));
        assert!(result.is_err());
    }
}
