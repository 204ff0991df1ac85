//! Numeric types for stat values.
//!
//! Every value in the graph is an `f64`. Change detection compares values
//! bit for bit rather than with a tolerance, so callers that produce noisy
//! arithmetic are responsible for not thrashing their dependents.

/// The numeric type carried by every node in the graph.
pub type StatValue = f64;

/// Exact equality used to gate change notifications.
///
/// Two values are equal when their bit patterns are equal. This differs
/// from `==` in two places: `NaN` equals itself (so re-assigning `NaN` is
/// silent) and `0.0` differs from `-0.0`.
///
/// # Examples
///
/// ```rust
/// use statbind::numeric::exact_eq;
///
/// assert!(exact_eq(1.5, 1.5));
/// assert!(exact_eq(f64::NAN, f64::NAN));
/// assert!(!exact_eq(0.0, -0.0));
/// assert!(!exact_eq(0.1 + 0.2, 0.3));
/// ```
#[inline]
pub fn exact_eq(a: StatValue, b: StatValue) -> bool {
    a.to_bits() == b.to_bits()
}
