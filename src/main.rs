use anyhow::{Context, Result};
use rusqlite::Connection;
use std::env;
use std::path::{Path, PathBuf};

// Use library instead of local modules
use loan_desk::{
    format_inr, get_all_customers, import_customers, load_customers_csv, run_simulation,
    seed_default_customers, setup_database, verify_count, LoanRequest, UnderwritingPolicy,
    DEFAULT_DB_PATH, DEFAULT_LETTERS_DIR,
};

fn main() -> Result<()> {
    let raw: Vec<String> = env::args().collect();
    let json_output = raw.iter().any(|a| a == "--json");
    let args: Vec<String> = raw.into_iter().filter(|a| a != "--json").collect();

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(),
        Some("import") => {
            let csv = args
                .get(2)
                .context("usage: loan-desk import <customers.csv>")?;
            run_import(csv)
        }
        Some("list") => run_list(),
        Some("simulate") => {
            let customer_id: i64 = args
                .get(2)
                .context("usage: loan-desk simulate <customer_id> <amount> [tenure_months]")?
                .parse()
                .context("customer_id must be an integer")?;
            let amount: i64 = args
                .get(3)
                .context("usage: loan-desk simulate <customer_id> <amount> [tenure_months]")?
                .parse()
                .context("amount must be a whole-rupee integer")?;
            let tenure: Option<u32> = match args.get(4) {
                Some(value) => Some(value.parse().context("tenure_months must be an integer")?),
                None => None,
            };
            run_simulate(customer_id, amount, tenure, json_output)
        }
        _ => {
            print_usage();
            std::process::exit(1);
        }
    }
}

fn db_path() -> String {
    env::var("LOAN_DESK_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
}

fn letters_dir() -> PathBuf {
    env::var("LOAN_DESK_LETTERS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LETTERS_DIR))
}

fn run_init() -> Result<()> {
    println!("🗄️  Loan Desk: Initialize Customer Store");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let path = db_path();

    // 1. Setup database
    println!("\n🔧 Setting up database at {}...", path);
    let conn = Connection::open(&path)?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    // 2. Seed defaults (no-op on a populated store)
    println!("\n🌱 Seeding default customers...");
    let seeded = seed_default_customers(&conn)?;
    if seeded > 0 {
        println!("✓ Seeded {} default customers", seeded);
    } else {
        println!("✓ Store already populated, seeding skipped");
    }

    // 3. Verify count
    let count = verify_count(&conn)?;
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Customer store ready: {} customers", count);

    Ok(())
}

fn run_import(csv: &str) -> Result<()> {
    println!("📇 Loan Desk: Import Customers - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load CSV
    println!("\n📂 Loading CSV...");
    let customers = load_customers_csv(Path::new(csv))?;
    println!("✓ Loaded {} candidate customers from CSV", customers.len());

    // 2. Setup database
    println!("\n🔧 Setting up database...");
    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    // 3. Insert customers
    println!("\n💾 Inserting customers...");
    let summary = import_customers(&conn, &customers)?;

    // 4. Verify count
    println!("\n🔍 Verifying database...");
    let count = verify_count(&conn)?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "✅ Import complete: {} inserted, {} duplicates skipped, {} invalid skipped",
        summary.inserted, summary.skipped_duplicate, summary.skipped_invalid
    );
    println!("✓ Customer store now holds {} customers", count);

    Ok(())
}

fn run_list() -> Result<()> {
    println!("📇 Registered Customers");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;

    let customers = get_all_customers(&conn)?;
    if customers.is_empty() {
        println!("(none yet - run `loan-desk init` to seed defaults)");
        return Ok(());
    }

    for c in &customers {
        println!(
            "  [{}] {} | {} | score {} | limit Rs {} | salary Rs {}",
            c.id,
            c.name,
            c.phone,
            c.credit_score,
            format_inr(c.pre_approved_limit),
            format_inr(c.monthly_salary)
        );
    }
    println!("\n✓ {} customers", customers.len());

    Ok(())
}

fn run_simulate(customer_id: i64, amount: i64, tenure: Option<u32>, json_output: bool) -> Result<()> {
    let policy = UnderwritingPolicy::default();
    let request = LoanRequest {
        customer_id,
        amount,
        tenure_months: tenure.unwrap_or(policy.default_tenure_months),
    };

    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;

    let letters = letters_dir();
    let outcome = run_simulation(&conn, &policy, &letters, &request)?;

    // Machine-readable mode for scripting
    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("🏦 Loan Desk: Simulation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    for line in &outcome.log {
        println!("{}", line);
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if outcome.is_approved() {
        println!("✅ Decision: APPROVED");
        if let Some(filename) = &outcome.letter_filename {
            println!("✓ Sanction letter: {}", letters.join(filename).display());
        }
    } else {
        println!("❌ Decision: REJECTED");
        println!("✗ {}", outcome.decision.reason());
    }

    Ok(())
}

fn print_usage() {
    eprintln!("Loan Desk - deterministic loan approval workflow");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  loan-desk init                              Create the store and seed default customers");
    eprintln!("  loan-desk import <customers.csv>            Bulk-load customers, skipping duplicates");
    eprintln!("  loan-desk list                              Show all registered customers");
    eprintln!("  loan-desk simulate <id> <amount> [tenure]   Run one loan simulation (--json for raw output)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LOAN_DESK_DB           SQLite path (default: {})", DEFAULT_DB_PATH);
    eprintln!("  LOAN_DESK_LETTERS_DIR  Letters directory (default: {})", DEFAULT_LETTERS_DIR);
    eprintln!();
    eprintln!("Web UI: cargo run --bin loan-server");
}
