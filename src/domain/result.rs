//! Result type alias for the billing aggregator

use super::errors::AggregatorError;

/// Result type alias for aggregator operations
///
/// # Examples
///
/// ```
/// use billing_aggregator::domain::result::Result;
/// use billing_aggregator::domain::errors::AggregatorError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(AggregatorError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, AggregatorError>;
