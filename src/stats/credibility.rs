//! Limited fluctuation credibility
//!
//! Z = min(1, sqrt(n / (y * (1 + cv²))))
//!
//! where n is the number of claims, y the number of claims needed for full
//! credibility and cv² the squared coefficient of variation of the weights.

/// Full credibility standard for a 90% probability of being within 5%:
/// (1.645 / 0.05)² ≈ 1082 claims
pub const DEFAULT_FULL_CREDIBILITY_STANDARD: f64 = 1082.0;

/// Squared coefficient of variation of the weights from their running totals.
///
/// Uses the sample variance. Returns 0 when fewer than two weights were seen
/// or the mean weight is zero.
pub fn weight_cv_squared(weight: f64, weight_sq: f64, weight_n: f64) -> f64 {
    if weight_n <= 1.0 || weight == 0.0 {
        return 0.0;
    }
    let ex_wt = weight / weight_n;
    let ex2_wt = weight_sq / weight_n;
    let variance = (ex2_wt - ex_wt * ex_wt) * weight_n / (weight_n - 1.0);
    let cv_sq = variance / (ex_wt * ex_wt);
    if cv_sq.is_finite() {
        cv_sq.max(0.0)
    } else {
        0.0
    }
}

/// Credibility score, clamped to [0, 1]
pub fn limited_fluctuation(n_claims: f64, standard: f64, cv_sq: f64) -> f64 {
    if n_claims <= 0.0 {
        return 0.0;
    }
    let z = (n_claims / (standard * (1.0 + cv_sq))).sqrt();
    if z.is_nan() {
        0.0
    } else {
        z.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_standard_is_90_within_5() {
        assert_relative_eq!(DEFAULT_FULL_CREDIBILITY_STANDARD, (1.645f64 / 0.05).powi(2), epsilon = 0.5);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(limited_fluctuation(0.0, 1082.0, 0.0), 0.0);
        assert_eq!(limited_fluctuation(1.0e9, 1082.0, 0.0), 1.0);
        assert_eq!(limited_fluctuation(1082.0, 1082.0, 0.0), 1.0);
        assert_relative_eq!(limited_fluctuation(270.5, 1082.0, 0.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_weight_dispersion_lowers_credibility() {
        // weights 1 and 3: mean 2, sample variance 2, cv² = 0.5
        let cv_sq = weight_cv_squared(4.0, 10.0, 2.0);
        assert_relative_eq!(cv_sq, 0.5, epsilon = 1e-12);
        assert!(limited_fluctuation(500.0, 1082.0, cv_sq) < limited_fluctuation(500.0, 1082.0, 0.0));
    }

    #[test]
    fn test_cv_guards() {
        assert_eq!(weight_cv_squared(5.0, 25.0, 1.0), 0.0);
        assert_eq!(weight_cv_squared(0.0, 0.0, 10.0), 0.0);
        // identical weights have no dispersion
        assert_relative_eq!(weight_cv_squared(6.0, 12.0, 3.0), 0.0, epsilon = 1e-12);
    }
}
