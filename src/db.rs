// 🗄️ Customer Store - SQLite + WAL
// Customers are written once at seed/insert time and read-only afterward

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::kyc::validate_new_customer;

/// Default database path (override with LOAN_DESK_DB)
pub const DEFAULT_DB_PATH: &str = "customers.db";

// ============================================================================
// CUSTOMER RECORD
// ============================================================================

/// A customer row as stored in the `customers` table.
///
/// KYC identity fields are `phone` and `address`; the remaining numeric
/// fields feed the underwriting thresholds. Amounts are whole rupees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub credit_score: i64,
    pub pre_approved_limit: i64,
    pub monthly_salary: i64,
}

/// Insert payload for a new customer (CSV rows and the add-customer API
/// deserialize straight into this).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub credit_score: i64,
    pub pre_approved_limit: i64,
    pub monthly_salary: i64,
}

impl NewCustomer {
    /// Compute the duplicate-detection hash for this customer.
    /// Two inserts with the same name (case-insensitive) and phone are
    /// considered the same person; the second insert is a no-op.
    pub fn dedup_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}",
            self.name.trim().to_lowercase(),
            self.phone.trim()
        ));
        format!("{:x}", hasher.finalize())
    }
}

/// Outcome of a single customer insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row was inserted; carries the new customer id.
    Inserted(i64),
    /// A customer with the same dedup hash already exists.
    Duplicate,
}

/// Counts reported by a CSV bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped_duplicate: usize,
    pub skipped_invalid: usize,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            address TEXT NOT NULL,
            credit_score INTEGER NOT NULL,
            pre_approved_limit INTEGER NOT NULL,
            monthly_salary INTEGER NOT NULL,
            dedup_hash TEXT UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_customers_dedup_hash ON customers(dedup_hash)",
        [],
    )?;

    Ok(())
}

/// Seed the three default customers, but only into an empty table.
/// Returns the number of rows seeded (0 when the table already has data).
pub fn seed_default_customers(conn: &Connection) -> Result<usize> {
    if verify_count(conn)? > 0 {
        return Ok(0);
    }

    let defaults = [
        // 1. High score, high limit - approves comfortably
        NewCustomer {
            name: "Rajesh Kumar".to_string(),
            phone: "+91-9876543210".to_string(),
            address: "123 MG Road, Bangalore, Karnataka - 560001".to_string(),
            credit_score: 750,
            pre_approved_limit: 500_000,
            monthly_salary: 80_000,
        },
        // 2. Score below the 700 floor - always rejects
        NewCustomer {
            name: "Priya Sharma".to_string(),
            phone: "+91-9123456789".to_string(),
            address: "456 Park Street, Kolkata, West Bengal - 700016".to_string(),
            credit_score: 650,
            pre_approved_limit: 200_000,
            monthly_salary: 50_000,
        },
        // 3. Good score, high salary - exercises the EMI check
        NewCustomer {
            name: "Amit Patel".to_string(),
            phone: "+91-9988776655".to_string(),
            address: "789 Marine Drive, Mumbai, Maharashtra - 400020".to_string(),
            credit_score: 720,
            pre_approved_limit: 300_000,
            monthly_salary: 120_000,
        },
    ];

    let mut seeded = 0;
    for customer in &defaults {
        if let InsertOutcome::Inserted(_) = insert_customer(conn, customer)? {
            seeded += 1;
        }
    }

    Ok(seeded)
}

// ============================================================================
// INSERTS
// ============================================================================

/// Insert one customer. A dedup-hash collision is reported as
/// `InsertOutcome::Duplicate`, never as an error.
pub fn insert_customer(conn: &Connection, customer: &NewCustomer) -> Result<InsertOutcome> {
    let hash = customer.dedup_hash();

    let result = conn.execute(
        "INSERT INTO customers (
            name, phone, address, credit_score, pre_approved_limit, monthly_salary, dedup_hash
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            customer.name,
            customer.phone,
            customer.address,
            customer.credit_score,
            customer.pre_approved_limit,
            customer.monthly_salary,
            hash,
        ],
    );

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted(conn.last_insert_rowid())),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(InsertOutcome::Duplicate)
        }
        Err(e) => Err(e.into()),
    }
}

/// Load customers from a CSV file with headers:
/// name, phone, address, credit_score, pre_approved_limit, monthly_salary
pub fn load_customers_csv(csv_path: &Path) -> Result<Vec<NewCustomer>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open customers CSV")?;

    let mut customers = Vec::new();
    for result in rdr.deserialize() {
        let customer: NewCustomer = result.context("Failed to deserialize customer row")?;
        customers.push(customer);
    }

    Ok(customers)
}

/// Bulk-insert customers: every row is validated first, duplicates are skipped.
pub fn import_customers(conn: &Connection, customers: &[NewCustomer]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for customer in customers {
        if let Err(errors) = validate_new_customer(customer) {
            eprintln!("✗ Skipping invalid row ({}): {}", customer.name, errors[0]);
            summary.skipped_invalid += 1;
            continue;
        }

        match insert_customer(conn, customer)? {
            InsertOutcome::Inserted(_) => summary.inserted += 1,
            InsertOutcome::Duplicate => summary.skipped_duplicate += 1,
        }
    }

    println!("✓ Inserted: {} customers", summary.inserted);
    println!("✓ Skipped duplicates: {}", summary.skipped_duplicate);
    if summary.skipped_invalid > 0 {
        println!("✗ Skipped invalid rows: {}", summary.skipped_invalid);
    }

    Ok(summary)
}

// ============================================================================
// QUERIES
// ============================================================================

fn row_to_customer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        address: row.get(3)?,
        credit_score: row.get(4)?,
        pre_approved_limit: row.get(5)?,
        monthly_salary: row.get(6)?,
    })
}

/// Fetch one customer by id. `None` when the id is unknown.
pub fn get_customer(conn: &Connection, customer_id: i64) -> Result<Option<Customer>> {
    let customer = conn
        .query_row(
            "SELECT id, name, phone, address, credit_score, pre_approved_limit, monthly_salary
             FROM customers WHERE id = ?1",
            params![customer_id],
            row_to_customer,
        )
        .optional()?;

    Ok(customer)
}

pub fn get_all_customers(conn: &Connection) -> Result<Vec<Customer>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, phone, address, credit_score, pre_approved_limit, monthly_salary
         FROM customers ORDER BY id",
    )?;

    let customers = stmt
        .query_map([], row_to_customer)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(customers)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;

    Ok(count)
}
