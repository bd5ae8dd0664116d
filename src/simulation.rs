// 🔄 Loan Simulation - staged pipeline from request to decision
// Stages run in a fixed order: request validation, customer lookup, KYC
// verification, underwriting, then letter generation for approvals. The
// decision itself is derived on every run; only the letter file persists.

use std::fmt;
use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;

use crate::db;
use crate::kyc::{self, ValidationError};
use crate::letter::SanctionLetter;
use crate::underwriting::{format_inr, Decision, LoanRequest, UnderwritingPolicy};

// ============================================================================
// ERRORS
// ============================================================================

/// Failures that abort the pipeline. Rule rejections are not errors; they
/// come back as a normal `Decision::Rejected` outcome.
#[derive(Debug)]
pub enum SimulationError {
    /// Request fields failed validation before any rule ran
    InvalidRequest(Vec<ValidationError>),
    /// No customer row exists for the requested id
    CustomerNotFound(i64),
    /// The customer store could not be read
    Database(anyhow::Error),
    /// The sanction letter could not be rendered or written
    Letter(anyhow::Error),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::InvalidRequest(errors) => {
                let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(f, "invalid loan request: {}", details.join("; "))
            }
            SimulationError::CustomerNotFound(id) => write!(f, "customer {} not found", id),
            SimulationError::Database(err) => write!(f, "customer store error: {}", err),
            SimulationError::Letter(err) => write!(f, "sanction letter error: {}", err),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Database(err) | SimulationError::Letter(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// A completed pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutcome {
    pub customer_id: i64,
    pub decision: Decision,
    /// Set only when an approval's letter was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter_filename: Option<String>,
    /// Conversation-style transcript of the run, one line per event.
    pub log: Vec<String>,
}

impl SimulationOutcome {
    pub fn is_approved(&self) -> bool {
        self.decision.is_approved()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Run one loan simulation end to end. Identical request and customer state
/// always produce the identical decision; approvals additionally write a
/// fresh sanction letter under `letters_dir`.
pub fn run_simulation(
    conn: &Connection,
    policy: &UnderwritingPolicy,
    letters_dir: &Path,
    request: &LoanRequest,
) -> Result<SimulationOutcome, SimulationError> {
    policy
        .validate_request(request)
        .map_err(SimulationError::InvalidRequest)?;

    let mut log = Vec::new();
    log.push("🤖 Master Agent: Hello! Welcome to the Crestline Capital loan processing desk.".to_string());
    log.push(format!(
        "🤖 Master Agent: Processing loan application for Customer ID: {}",
        request.customer_id
    ));
    log.push(format!(
        "🤖 Master Agent: Requested Loan Amount: Rs {}",
        format_inr(request.amount)
    ));
    log.push("---".to_string());

    log.push("🔍 Master Agent: Initiating KYC verification...".to_string());
    let customer = db::get_customer(conn, request.customer_id)
        .map_err(SimulationError::Database)?
        .ok_or(SimulationError::CustomerNotFound(request.customer_id))?;

    // KYC gate: incomplete identity fields reject no matter what the
    // amount was
    let report = kyc::verify_kyc(&customer);
    if !report.verified {
        let reason = format!(
            "KYC verification failed. Missing fields: {}",
            report.missing.join(", ")
        );
        log.push(format!("❌ Verification Agent: {}", reason));
        log.push("🤖 Master Agent: Please complete your KYC details and reapply.".to_string());

        return Ok(SimulationOutcome {
            customer_id: customer.id,
            decision: Decision::Rejected { reason },
            letter_filename: None,
            log,
        });
    }

    log.push("✅ Verification Agent: KYC verification successful!".to_string());
    log.push(format!(
        "📋 Verification Agent: Customer Name - {}",
        customer.name
    ));
    log.push(format!("📋 Verification Agent: Phone - {}", customer.phone));
    log.push(format!(
        "📋 Verification Agent: Address - {}",
        customer.address
    ));
    log.push("---".to_string());

    log.push("📊 Master Agent: Forwarding to Underwriting Agent for credit assessment...".to_string());
    let decision = policy.evaluate(&customer, request.amount, request.tenure_months);

    log.push(format!(
        "💳 Underwriting Agent: Credit Score - {}",
        customer.credit_score
    ));
    log.push(format!(
        "💰 Underwriting Agent: Pre-approved Limit - Rs {}",
        format_inr(customer.pre_approved_limit)
    ));
    if matches!(&decision, Decision::Approved { salary_verified: true, .. }) {
        log.push(format!(
            "📄 Underwriting Agent: Salary verification required (Monthly Salary: Rs {})",
            format_inr(customer.monthly_salary)
        ));
    }
    log.push(format!("🔎 Underwriting Agent: {}", decision.reason()));
    log.push("---".to_string());

    let letter_filename = match &decision {
        Decision::Rejected { reason } => {
            log.push("❌ Master Agent: Loan application has been REJECTED.".to_string());
            log.push(format!("📌 Master Agent: Reason - {}", reason));
            log.push(
                "🤖 Master Agent: Thank you for choosing Crestline Capital. You may reapply after improving your eligibility."
                    .to_string(),
            );
            None
        }
        Decision::Approved {
            interest_rate,
            tenure_months,
            ..
        } => {
            log.push("✅ Master Agent: Loan application has been APPROVED! 🎉".to_string());
            log.push("📝 Master Agent: Generating sanction letter...".to_string());

            let letter = SanctionLetter::for_customer(
                &customer,
                request.amount,
                *interest_rate,
                *tenure_months,
            );
            let filename = letter
                .write_pdf(letters_dir)
                .map_err(SimulationError::Letter)?;

            log.push("✅ Sanction Letter Agent: PDF generated successfully!".to_string());
            log.push(format!(
                "📄 Sanction Letter Agent: Your sanction letter is ready: {}",
                filename
            ));
            log.push("---".to_string());
            log.push(
                "🤖 Master Agent: Congratulations! Your loan has been approved. Please download your sanction letter."
                    .to_string(),
            );
            Some(filename)
        }
    };

    Ok(SimulationOutcome {
        customer_id: customer.id,
        decision,
        letter_filename,
        log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_customer, setup_database, InsertOutcome, NewCustomer};
    use tempfile::TempDir;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn add_customer(
        conn: &Connection,
        name: &str,
        phone: &str,
        address: &str,
        credit_score: i64,
        pre_approved_limit: i64,
        monthly_salary: i64,
    ) -> i64 {
        let customer = NewCustomer {
            name: name.to_string(),
            phone: phone.to_string(),
            address: address.to_string(),
            credit_score,
            pre_approved_limit,
            monthly_salary,
        };
        match insert_customer(conn, &customer).unwrap() {
            InsertOutcome::Inserted(id) => id,
            InsertOutcome::Duplicate => panic!("test customer collided"),
        }
    }

    fn request(customer_id: i64, amount: i64) -> LoanRequest {
        LoanRequest {
            customer_id,
            amount,
            tenure_months: 60,
        }
    }

    #[test]
    fn test_unknown_customer_is_not_found() {
        let conn = test_conn();
        let dir = TempDir::new().unwrap();
        let policy = UnderwritingPolicy::default();

        let err = run_simulation(&conn, &policy, dir.path(), &request(999, 100_000)).unwrap_err();

        match err {
            SimulationError::CustomerNotFound(id) => assert_eq!(id, 999),
            other => panic!("expected CustomerNotFound, got {}", other),
        }
    }

    #[test]
    fn test_below_minimum_amount_is_invalid_request() {
        let conn = test_conn();
        let dir = TempDir::new().unwrap();
        let policy = UnderwritingPolicy::default();
        let id = add_customer(&conn, "Kavita Rao", "+91-9111111111", "12 Hill Road, Pune", 780, 500_000, 90_000);

        let err = run_simulation(&conn, &policy, dir.path(), &request(id, 5_000)).unwrap_err();

        match err {
            SimulationError::InvalidRequest(errors) => {
                assert_eq!(errors[0].field, "loan_amount");
            }
            other => panic!("expected InvalidRequest, got {}", other),
        }
    }

    #[test]
    fn test_missing_kyc_always_rejects() {
        let conn = test_conn();
        let dir = TempDir::new().unwrap();
        let policy = UnderwritingPolicy::default();
        // Strong financials but no phone on file
        let id = add_customer(&conn, "Ghost Applicant", "", "77 Elm Street, Shimla", 850, 1_000_000, 200_000);

        for amount in [15_000, 100_000, 1_000_000] {
            let outcome = run_simulation(&conn, &policy, dir.path(), &request(id, amount)).unwrap();

            assert!(!outcome.is_approved(), "amount {} must not approve", amount);
            assert!(outcome.decision.reason().contains("KYC verification failed"));
            assert!(outcome.decision.reason().contains("phone"));
            assert!(outcome.letter_filename.is_none());
        }
        println!("✅ Missing-KYC rejection PASSED");
    }

    #[test]
    fn test_approval_writes_retrievable_letter() {
        let conn = test_conn();
        let dir = TempDir::new().unwrap();
        let policy = UnderwritingPolicy::default();
        let id = add_customer(&conn, "Rajesh Kumar", "+91-9876543210", "123 MG Road, Bangalore", 750, 500_000, 80_000);

        let outcome = run_simulation(&conn, &policy, dir.path(), &request(id, 300_000)).unwrap();

        assert!(outcome.is_approved());
        let filename = outcome.letter_filename.expect("approval must carry a letter");
        let path = dir.path().join(&filename);
        assert!(path.exists(), "letter must be retrievable under its filename");

        let bytes = std::fs::read(path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        println!("✅ Approval letter PASSED ({})", filename);
    }

    #[test]
    fn test_rejection_produces_no_letter() {
        let conn = test_conn();
        let dir = TempDir::new().unwrap();
        let policy = UnderwritingPolicy::default();
        let id = add_customer(&conn, "Priya Sharma", "+91-9123456789", "456 Park Street, Kolkata", 650, 200_000, 50_000);

        let letters = dir.path().join("letters");
        let outcome = run_simulation(&conn, &policy, &letters, &request(id, 100_000)).unwrap();

        assert!(!outcome.is_approved());
        assert!(outcome.letter_filename.is_none());
        assert!(!letters.exists(), "rejections must not touch the letters directory");
    }

    #[test]
    fn test_decisions_are_idempotent() {
        let conn = test_conn();
        let dir = TempDir::new().unwrap();
        let policy = UnderwritingPolicy::default();
        let id = add_customer(&conn, "Amit Patel", "+91-9988776655", "789 Marine Drive, Mumbai", 720, 300_000, 120_000);

        let first = run_simulation(&conn, &policy, dir.path(), &request(id, 450_000)).unwrap();
        let second = run_simulation(&conn, &policy, dir.path(), &request(id, 450_000)).unwrap();

        assert_eq!(first.decision, second.decision);
        // Each approval still writes its own letter
        assert_ne!(first.letter_filename, second.letter_filename);
    }

    #[test]
    fn test_log_narrates_every_stage() {
        let conn = test_conn();
        let dir = TempDir::new().unwrap();
        let policy = UnderwritingPolicy::default();
        let id = add_customer(&conn, "Sunita Nair", "+91-9333333333", "5 Beach Road, Kochi", 760, 400_000, 95_000);

        let outcome = run_simulation(&conn, &policy, dir.path(), &request(id, 200_000)).unwrap();

        let log = outcome.log.join("\n");
        assert!(outcome.log[0].contains("Welcome"));
        assert!(log.contains("KYC verification successful"));
        assert!(log.contains("Credit Score - 760"));
        assert!(log.contains("APPROVED"));
        assert!(outcome.log.iter().filter(|line| *line == "---").count() >= 3);
    }
}
