// 📋 KYC Checks - identity field validation
// Validates incoming customer records and verifies KYC presence on stored ones

use crate::db::{Customer, NewCustomer};

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl ValidationError {
    fn new(field: &str, message: String, context: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message,
            context: context.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

// ============================================================================
// NEW CUSTOMER VALIDATION
// ============================================================================

/// Validate a customer payload before it reaches the store.
///
/// Bounds match the intake form: credit scores live on the 300-900 scale,
/// limits and salaries are positive rupee amounts.
pub fn validate_new_customer(customer: &NewCustomer) -> ValidationResult {
    let mut errors = Vec::new();
    let ctx = "NewCustomer";

    if customer.name.trim().is_empty() {
        errors.push(ValidationError::new(
            "name",
            "Required field is empty".to_string(),
            ctx,
        ));
    }

    if customer.phone.trim().is_empty() {
        errors.push(ValidationError::new(
            "phone",
            "Required KYC field is empty".to_string(),
            ctx,
        ));
    }

    if customer.address.trim().is_empty() {
        errors.push(ValidationError::new(
            "address",
            "Required KYC field is empty".to_string(),
            ctx,
        ));
    }

    if !(300..=900).contains(&customer.credit_score) {
        errors.push(ValidationError::new(
            "credit_score",
            format!("Must be between 300 and 900, got {}", customer.credit_score),
            ctx,
        ));
    }

    if customer.pre_approved_limit <= 0 {
        errors.push(ValidationError::new(
            "pre_approved_limit",
            format!("Must be positive, got {}", customer.pre_approved_limit),
            ctx,
        ));
    }

    if customer.monthly_salary <= 0 {
        errors.push(ValidationError::new(
            "monthly_salary",
            format!("Must be positive, got {}", customer.monthly_salary),
            ctx,
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ============================================================================
// KYC VERIFICATION
// ============================================================================

/// Result of the KYC presence check on a stored customer.
#[derive(Debug, Clone)]
pub struct KycReport {
    pub verified: bool,
    /// Identity fields that are absent or blank.
    pub missing: Vec<&'static str>,
}

/// Check that the customer's identity fields are present.
/// Any missing field means the loan decision is a rejection.
pub fn verify_kyc(customer: &Customer) -> KycReport {
    let mut missing = Vec::new();

    if customer.phone.trim().is_empty() {
        missing.push("phone");
    }
    if customer.address.trim().is_empty() {
        missing.push("address");
    }

    KycReport {
        verified: missing.is_empty(),
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> NewCustomer {
        NewCustomer {
            name: "Rahul Verma".to_string(),
            phone: "+91-9000000001".to_string(),
            address: "45 Lake View, Chennai - 600001".to_string(),
            credit_score: 710,
            pre_approved_limit: 250_000,
            monthly_salary: 60_000,
        }
    }

    fn stored(customer: NewCustomer) -> Customer {
        Customer {
            id: 1,
            name: customer.name,
            phone: customer.phone,
            address: customer.address,
            credit_score: customer.credit_score,
            pre_approved_limit: customer.pre_approved_limit,
            monthly_salary: customer.monthly_salary,
        }
    }

    #[test]
    fn test_validate_new_customer_valid() {
        assert!(validate_new_customer(&valid_payload()).is_ok());
    }

    #[test]
    fn test_validate_new_customer_blank_name() {
        let mut payload = valid_payload();
        payload.name = "   ".to_string();

        let errors = validate_new_customer(&payload).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
    }

    #[test]
    fn test_validate_new_customer_credit_score_bounds() {
        let mut payload = valid_payload();

        payload.credit_score = 299;
        assert!(validate_new_customer(&payload).is_err());

        payload.credit_score = 300;
        assert!(validate_new_customer(&payload).is_ok());

        payload.credit_score = 900;
        assert!(validate_new_customer(&payload).is_ok());

        payload.credit_score = 901;
        assert!(validate_new_customer(&payload).is_err());
    }

    #[test]
    fn test_validate_new_customer_collects_all_errors() {
        let payload = NewCustomer {
            name: String::new(),
            phone: String::new(),
            address: String::new(),
            credit_score: 0,
            pre_approved_limit: 0,
            monthly_salary: -1,
        };

        let errors = validate_new_customer(&payload).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.iter().any(|e| e.field == "monthly_salary"));
    }

    #[test]
    fn test_verify_kyc_complete() {
        let report = verify_kyc(&stored(valid_payload()));
        assert!(report.verified);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_verify_kyc_missing_phone() {
        let mut payload = valid_payload();
        payload.phone = String::new();

        let report = verify_kyc(&stored(payload));
        assert!(!report.verified);
        assert_eq!(report.missing, vec!["phone"]);
    }

    #[test]
    fn test_verify_kyc_whitespace_address() {
        let mut payload = valid_payload();
        payload.address = "  ".to_string();

        let report = verify_kyc(&stored(payload));
        assert!(!report.verified);
        assert_eq!(report.missing, vec!["address"]);
    }
}
