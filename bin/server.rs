// Loan Desk - Web Server
// REST API with Axum: customer registry, loan simulation, letter download

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use loan_desk::{
    get_all_customers, insert_customer, is_safe_filename, run_simulation, seed_default_customers,
    setup_database, validate_new_customer, Customer, InsertOutcome, LoanRequest, NewCustomer,
    SimulationError, UnderwritingPolicy, DEFAULT_DB_PATH, DEFAULT_LETTERS_DIR,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    policy: UnderwritingPolicy,
    letters_dir: PathBuf,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message.into()),
        }
    }
}

/// Customer response (registry listing)
#[derive(Serialize)]
struct CustomerResponse {
    id: i64,
    name: String,
    phone: String,
    address: String,
    credit_score: i64,
    pre_approved_limit: i64,
    monthly_salary: i64,
}

impl From<Customer> for CustomerResponse {
    fn from(c: Customer) -> Self {
        Self {
            id: c.id,
            name: c.name,
            phone: c.phone,
            address: c.address,
            credit_score: c.credit_score,
            pre_approved_limit: c.pre_approved_limit,
            monthly_salary: c.monthly_salary,
        }
    }
}

#[derive(Deserialize)]
struct AddCustomerRequest {
    name: String,
    phone: String,
    address: String,
    credit_score: i64,
    pre_approved_limit: i64,
    monthly_salary: i64,
}

#[derive(Serialize)]
struct AddCustomerResponse {
    customer_id: i64,
}

#[derive(Deserialize)]
struct SimulateRequest {
    customer_id: i64,
    /// Whole rupees
    loan_amount: i64,
    /// Falls back to the policy default when omitted
    tenure_months: Option<u32>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/customers - List the customer registry
async fn list_customers(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match get_all_customers(&conn) {
        Ok(customers) => {
            let response: Vec<CustomerResponse> =
                customers.into_iter().map(|c| c.into()).collect();

            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(e) => {
            eprintln!("Error listing customers: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err("Could not read the customer store")),
            )
                .into_response()
        }
    }
}

/// POST /api/customers - Register a new customer
async fn add_customer(
    State(state): State<AppState>,
    Json(payload): Json<AddCustomerRequest>,
) -> impl IntoResponse {
    let customer = NewCustomer {
        name: payload.name,
        phone: payload.phone,
        address: payload.address,
        credit_score: payload.credit_score,
        pre_approved_limit: payload.pre_approved_limit,
        monthly_salary: payload.monthly_salary,
    };

    if let Err(errors) = validate_new_customer(&customer) {
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err(details.join("; "))),
        )
            .into_response();
    }

    let conn = state.db.lock().unwrap();
    match insert_customer(&conn, &customer) {
        Ok(InsertOutcome::Inserted(customer_id)) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(AddCustomerResponse { customer_id })),
        )
            .into_response(),
        Ok(InsertOutcome::Duplicate) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::err(
                "A customer with this name and phone is already registered",
            )),
        )
            .into_response(),
        Err(e) => {
            eprintln!("Error inserting customer: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::err("Could not write to the customer store")),
            )
                .into_response()
        }
    }
}

/// POST /api/simulate - Run one loan simulation
async fn simulate(
    State(state): State<AppState>,
    Json(payload): Json<SimulateRequest>,
) -> impl IntoResponse {
    let request = LoanRequest {
        customer_id: payload.customer_id,
        amount: payload.loan_amount,
        tenure_months: payload
            .tenure_months
            .unwrap_or(state.policy.default_tenure_months),
    };

    let conn = state.db.lock().unwrap();
    match run_simulation(&conn, &state.policy, &state.letters_dir, &request) {
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::ok(outcome))).into_response(),
        Err(e) => simulation_error_response(e),
    }
}

fn simulation_error_response(err: SimulationError) -> axum::response::Response {
    let status = match &err {
        SimulationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SimulationError::CustomerNotFound(_) => StatusCode::NOT_FOUND,
        SimulationError::Database(_) | SimulationError::Letter(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        eprintln!("Simulation failed: {}", err);
    }

    (status, Json(ApiResponse::err(err.to_string()))).into_response()
}

/// GET /download/:filename - Serve a generated sanction letter
async fn download_letter(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> impl IntoResponse {
    // Decode URL-encoded filename
    let decoded = urlencoding::decode(&filename)
        .unwrap_or_else(|_| filename.clone().into())
        .into_owned();

    if !is_safe_filename(&decoded) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err("Invalid letter filename")),
        )
            .into_response();
    }

    let path = state.letters_dir.join(&decoded);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let disposition = format!("attachment; filename=\"{}\"", decoded);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            eprintln!("Download error for {}: {}", decoded, e);
            (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::err(format!("Letter {} not found", decoded))),
            )
                .into_response()
        }
    }
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🏦 Loan Desk - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path =
        std::env::var("LOAN_DESK_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    let letters_dir = std::env::var("LOAN_DESK_LETTERS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LETTERS_DIR));

    // Open database and make sure the schema and seed rows exist
    let conn = Connection::open(&db_path).expect("Failed to open database");
    setup_database(&conn).expect("Failed to set up schema");
    let seeded = seed_default_customers(&conn).expect("Failed to seed customers");
    println!("✓ Database opened: {}", db_path);
    if seeded > 0 {
        println!("✓ Seeded {} default customers", seeded);
    }

    std::fs::create_dir_all(&letters_dir).expect("Failed to create letters directory");
    println!("✓ Letters directory: {}", letters_dir.display());

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        policy: UnderwritingPolicy::default(),
        letters_dir,
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/customers", get(list_customers).post(add_customer))
        .route("/simulate", post(simulate));

    // Build main router
    let app = Router::new()
        .route("/", get(serve_index))
        .route("/download/:filename", get(download_letter))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = std::env::var("LOAN_DESK_ADDR").unwrap_or_else(|_| "0.0.0.0:5001".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/customers", addr);
    println!("   UI:  http://{}", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
