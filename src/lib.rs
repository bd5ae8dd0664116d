// Loan Desk - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod db;
pub mod kyc;
pub mod underwriting;
pub mod letter;
pub mod simulation;

// Re-export commonly used types
pub use db::{
    Customer, NewCustomer, InsertOutcome, ImportSummary,
    setup_database, seed_default_customers, insert_customer,
    load_customers_csv, import_customers,
    get_customer, get_all_customers, verify_count,
    DEFAULT_DB_PATH,
};
pub use kyc::{
    validate_new_customer, verify_kyc, KycReport, ValidationError, ValidationResult,
};
pub use underwriting::{
    format_inr, format_inr_f, Decision, LoanRequest, UnderwritingPolicy,
};
pub use letter::{is_safe_filename, SanctionLetter, DEFAULT_LETTERS_DIR};
pub use simulation::{run_simulation, SimulationError, SimulationOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
