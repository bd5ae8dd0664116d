// 🏷️ Underwriting Rules - ordered threshold checks
// A fixed, deterministic rule pipeline: credit floor, hard cap, base-rate
// approval within the pre-approved limit, then the flat-markup EMI check.

use serde::{Deserialize, Serialize};

use crate::db::Customer;
use crate::kyc::{ValidationError, ValidationResult};

// ============================================================================
// LOAN REQUEST
// ============================================================================

/// One simulation's input. Ephemeral - lives only for the duration of a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRequest {
    pub customer_id: i64,
    /// Requested amount in whole rupees.
    pub amount: i64,
    pub tenure_months: u32,
}

// ============================================================================
// DECISION
// ============================================================================

/// Outcome of the rule pipeline. Derived deterministically from the customer
/// and the request; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Decision {
    Approved {
        reason: String,
        /// Percent per annum.
        interest_rate: f64,
        tenure_months: u32,
        /// Flat-markup EMI, present only when the request exceeded the
        /// pre-approved limit and the salary check ran.
        #[serde(skip_serializing_if = "Option::is_none")]
        emi: Option<f64>,
        salary_verified: bool,
    },
    Rejected {
        reason: String,
    },
}

impl Decision {
    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approved { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            Decision::Approved { reason, .. } => reason,
            Decision::Rejected { reason } => reason,
        }
    }
}

// ============================================================================
// UNDERWRITING POLICY
// ============================================================================

/// Threshold set for the rule pipeline. `Default` carries the production
/// values; tests construct variants to probe the boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderwritingPolicy {
    /// Scores below this always reject (default: 700)
    pub min_credit_score: i64,

    /// Hard cap as a multiple of the pre-approved limit (default: 2)
    pub limit_multiplier: i64,

    /// Rate for amounts within the pre-approved limit (default: 10.5% p.a.)
    pub base_interest_rate: f64,

    /// Rate for amounts between the limit and the cap (default: 12.0% p.a.)
    pub extended_interest_rate: f64,

    /// Flat repayment markup used for the EMI affordability check
    /// (default: 0.12, i.e. total repayable = 1.12x the amount)
    pub extended_flat_markup: f64,

    /// EMI must not exceed this share of monthly salary (default: 0.5)
    pub max_emi_salary_ratio: f64,

    /// Tenure applied when the request does not name one (default: 60)
    pub default_tenure_months: u32,

    /// Requests below this amount are invalid input, not a rule rejection
    /// (default: Rs 10,000)
    pub min_loan_amount: i64,
}

impl Default for UnderwritingPolicy {
    fn default() -> Self {
        UnderwritingPolicy {
            min_credit_score: 700,
            limit_multiplier: 2,
            base_interest_rate: 10.5,
            extended_interest_rate: 12.0,
            extended_flat_markup: 0.12,
            max_emi_salary_ratio: 0.5,
            default_tenure_months: 60,
            min_loan_amount: 10_000,
        }
    }
}

impl UnderwritingPolicy {
    /// Validate request fields before any rule runs. Failures here are
    /// client errors, not rejections.
    pub fn validate_request(&self, request: &LoanRequest) -> ValidationResult {
        let mut errors = Vec::new();

        if request.amount < self.min_loan_amount {
            errors.push(ValidationError {
                field: "loan_amount".to_string(),
                message: format!(
                    "Minimum loan amount is Rs {}, got Rs {}",
                    format_inr(self.min_loan_amount),
                    format_inr(request.amount)
                ),
                context: "LoanRequest".to_string(),
            });
        }

        if request.tenure_months == 0 {
            errors.push(ValidationError {
                field: "tenure_months".to_string(),
                message: "Tenure must be at least 1 month".to_string(),
                context: "LoanRequest".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Flat-markup EMI: total repayable spread evenly over the tenure.
    pub fn flat_emi(&self, amount: i64, tenure_months: u32) -> f64 {
        amount as f64 * (1.0 + self.extended_flat_markup) / tenure_months as f64
    }

    /// Run the ordered rule checks. Pure: identical inputs always yield the
    /// identical decision.
    pub fn evaluate(&self, customer: &Customer, amount: i64, tenure_months: u32) -> Decision {
        // 1. Credit score floor
        if customer.credit_score < self.min_credit_score {
            return Decision::Rejected {
                reason: format!(
                    "Credit score ({}) is below the minimum requirement of {}",
                    customer.credit_score, self.min_credit_score
                ),
            };
        }

        let limit = customer.pre_approved_limit;
        // Saturating: stored limits are only checked for positivity, so the
        // multiplied cap must stay total for values near i64::MAX
        let cap = self.limit_multiplier.saturating_mul(limit);

        // 2. Hard cap at limit_multiplier x the pre-approved limit
        if amount > cap {
            return Decision::Rejected {
                reason: format!(
                    "Requested loan amount (Rs {}) exceeds {}x the pre-approved limit (Rs {})",
                    format_inr(amount),
                    self.limit_multiplier,
                    format_inr(cap)
                ),
            };
        }

        // 3. Within the pre-approved limit: base rate, no salary check
        if amount <= limit {
            return Decision::Approved {
                reason: format!(
                    "Loan amount (Rs {}) is within pre-approved limit (Rs {})",
                    format_inr(amount),
                    format_inr(limit)
                ),
                interest_rate: self.base_interest_rate,
                tenure_months,
                emi: None,
                salary_verified: false,
            };
        }

        // 4. Between the limit and the cap: EMI must fit the salary ratio
        let emi = self.flat_emi(amount, tenure_months);
        let max_emi = customer.monthly_salary as f64 * self.max_emi_salary_ratio;
        let ratio_pct = self.max_emi_salary_ratio * 100.0;

        if emi <= max_emi {
            Decision::Approved {
                reason: format!(
                    "Salary verification passed. EMI (Rs {}) is within {:.0}% of monthly salary (Rs {})",
                    format_inr_f(emi),
                    ratio_pct,
                    format_inr(customer.monthly_salary)
                ),
                interest_rate: self.extended_interest_rate,
                tenure_months,
                emi: Some(emi),
                salary_verified: true,
            }
        } else {
            Decision::Rejected {
                reason: format!(
                    "EMI (Rs {}) exceeds {:.0}% of monthly salary (Rs {})",
                    format_inr_f(emi),
                    ratio_pct,
                    format_inr_f(max_emi)
                ),
            }
        }
    }
}

// ============================================================================
// RUPEE FORMATTING
// ============================================================================

fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}", sign, grouped)
}

/// Thousands-grouped rupee amount: 500000 -> "500,000".
pub fn format_inr(amount: i64) -> String {
    group_thousands(&amount.to_string())
}

/// Thousands-grouped amount with paise: 5600.0 -> "5,600.00".
pub fn format_inr_f(amount: f64) -> String {
    let fixed = format!("{:.2}", amount);
    match fixed.split_once('.') {
        Some((whole, frac)) => format!("{}.{}", group_thousands(whole), frac),
        None => group_thousands(&fixed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(credit_score: i64, pre_approved_limit: i64, monthly_salary: i64) -> Customer {
        Customer {
            id: 1,
            name: "Rahul Verma".to_string(),
            phone: "+91-9000000001".to_string(),
            address: "45 Lake View, Chennai - 600001".to_string(),
            credit_score,
            pre_approved_limit,
            monthly_salary,
        }
    }

    #[test]
    fn test_low_credit_score_rejects() {
        let policy = UnderwritingPolicy::default();
        let decision = policy.evaluate(&customer(699, 500_000, 80_000), 100_000, 60);

        assert!(!decision.is_approved());
        assert!(decision.reason().contains("below the minimum requirement of 700"));
    }

    #[test]
    fn test_score_at_floor_passes_credit_check() {
        let policy = UnderwritingPolicy::default();
        let decision = policy.evaluate(&customer(700, 500_000, 80_000), 100_000, 60);

        assert!(decision.is_approved());
    }

    #[test]
    fn test_within_limit_approves_at_base_rate() {
        let policy = UnderwritingPolicy::default();
        let decision = policy.evaluate(&customer(750, 500_000, 80_000), 300_000, 60);

        match decision {
            Decision::Approved {
                interest_rate,
                emi,
                salary_verified,
                tenure_months,
                ..
            } => {
                assert_eq!(interest_rate, 10.5);
                assert_eq!(tenure_months, 60);
                assert!(emi.is_none(), "within-limit approvals skip the EMI check");
                assert!(!salary_verified);
            }
            Decision::Rejected { reason } => panic!("unexpected rejection: {}", reason),
        }
    }

    #[test]
    fn test_amount_at_limit_takes_base_rate_branch() {
        let policy = UnderwritingPolicy::default();
        let decision = policy.evaluate(&customer(750, 500_000, 80_000), 500_000, 60);

        match decision {
            Decision::Approved { interest_rate, .. } => assert_eq!(interest_rate, 10.5),
            Decision::Rejected { reason } => panic!("unexpected rejection: {}", reason),
        }
    }

    #[test]
    fn test_amount_above_cap_rejects() {
        let policy = UnderwritingPolicy::default();
        // Cap is 2 x 200,000
        let decision = policy.evaluate(&customer(750, 200_000, 80_000), 400_001, 60);

        assert!(!decision.is_approved());
        assert!(decision.reason().contains("exceeds 2x the pre-approved limit"));
        assert!(decision.reason().contains("400,000"));
    }

    #[test]
    fn test_extended_branch_approves_when_emi_fits() {
        let policy = UnderwritingPolicy::default();
        // 250,000 over a 200,000 limit: EMI = 250,000 * 1.12 / 60 = 4,666.67
        let decision = policy.evaluate(&customer(720, 200_000, 10_000), 250_000, 60);

        match decision {
            Decision::Approved {
                interest_rate,
                emi,
                salary_verified,
                ..
            } => {
                assert_eq!(interest_rate, 12.0);
                assert!(salary_verified);
                let emi = emi.expect("extended approvals carry the EMI");
                assert!((emi - 4_666.67).abs() < 0.01);
            }
            Decision::Rejected { reason } => panic!("unexpected rejection: {}", reason),
        }
    }

    #[test]
    fn test_amount_at_cap_enters_emi_check() {
        let policy = UnderwritingPolicy::default();
        // Exactly 2x the limit is still inside the cap; salary decides
        let decision = policy.evaluate(&customer(720, 200_000, 20_000), 400_000, 60);

        match decision {
            Decision::Approved { emi, .. } => assert!(emi.is_some()),
            Decision::Rejected { reason } => panic!("unexpected rejection: {}", reason),
        }
    }

    #[test]
    fn test_extreme_limit_saturates_the_cap() {
        let policy = UnderwritingPolicy::default();
        // A limit past i64::MAX / 2 must not wrap the cap negative; an
        // in-range request still approves at the base rate
        let decision = policy.evaluate(&customer(750, i64::MAX, 80_000), 100_000, 60);

        match decision {
            Decision::Approved { interest_rate, emi, .. } => {
                assert_eq!(interest_rate, 10.5);
                assert!(emi.is_none());
            }
            Decision::Rejected { reason } => panic!("unexpected rejection: {}", reason),
        }
    }

    #[test]
    fn test_extended_branch_rejects_when_emi_exceeds_salary_share() {
        let policy = UnderwritingPolicy::default();
        // EMI 4,666.67 against a 9,000 salary (max 4,500)
        let decision = policy.evaluate(&customer(720, 200_000, 9_000), 250_000, 60);

        assert!(!decision.is_approved());
        assert!(decision.reason().contains("exceeds 50% of monthly salary"));
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let policy = UnderwritingPolicy::default();
        let c = customer(720, 200_000, 10_000);

        let first = policy.evaluate(&c, 250_000, 60);
        let second = policy.evaluate(&c, 250_000, 60);

        assert_eq!(first, second);
    }

    #[test]
    fn test_validate_request_minimum_amount() {
        let policy = UnderwritingPolicy::default();

        let low = LoanRequest {
            customer_id: 1,
            amount: 9_999,
            tenure_months: 60,
        };
        let errors = policy.validate_request(&low).unwrap_err();
        assert_eq!(errors[0].field, "loan_amount");

        let ok = LoanRequest {
            customer_id: 1,
            amount: 10_000,
            tenure_months: 60,
        };
        assert!(policy.validate_request(&ok).is_ok());
    }

    #[test]
    fn test_validate_request_zero_tenure() {
        let policy = UnderwritingPolicy::default();
        let request = LoanRequest {
            customer_id: 1,
            amount: 50_000,
            tenure_months: 0,
        };

        let errors = policy.validate_request(&request).unwrap_err();
        assert_eq!(errors[0].field, "tenure_months");
    }

    #[test]
    fn test_format_inr() {
        assert_eq!(format_inr(0), "0");
        assert_eq!(format_inr(999), "999");
        assert_eq!(format_inr(10_000), "10,000");
        assert_eq!(format_inr(500_000), "500,000");
        assert_eq!(format_inr(12_345_678), "12,345,678");
    }

    #[test]
    fn test_format_inr_f() {
        assert_eq!(format_inr_f(4_666.666_666), "4,666.67");
        assert_eq!(format_inr_f(5_600.0), "5,600.00");
        assert_eq!(format_inr_f(999.5), "999.50");
    }
}
