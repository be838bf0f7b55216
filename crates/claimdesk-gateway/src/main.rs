use std::{net::SocketAddr, str::FromStr};

use anyhow::Result as AnyResult;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;
use claimdesk_claims::ClaimService;
use claimdesk_core::{
    ApprovedReport, ApprovedTotals, Category, Claim, ClaimError, ClaimStatus, CreditAccount,
    CreditSummary, Decision, NewClaim, ReceiptUpload,
};
use claimdesk_platform::{
    ApprovedReportQuery, ApprovedTotalsQuery, ClaimView, DecideClaimRequest, DiskReceiptStorage,
    EditClaimRequest, ListClaimsQuery, ListClaimsResponse, MonthlyBreakdownQuery,
    MonthlyBreakdownResponse, OpenAccountsRequest, PgClaimStore, ServiceConfig,
    SetCreditAccountRequest, SubmitClaimResponse, connect_database, ping, run_migrations,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

type Service = ClaimService<PgClaimStore, DiskReceiptStorage>;

#[derive(Clone)]
struct AppState {
    pool: PgPool,
    service: Service,
    receipts: DiskReceiptStorage,
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "claimdesk_gateway=info,claimdesk_claims=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;
    let pool = connect_database(&config.database_url, config.max_connections).await?;
    run_migrations(&pool).await?;
    let receipts = DiskReceiptStorage::open(&config.upload_dir).await?;
    info!("storing receipts under {}", receipts.root().display());

    let service = ClaimService::new(PgClaimStore::new(pool.clone()), receipts.clone());
    let state = AppState {
        pool,
        service,
        receipts,
    };
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/claims", post(submit_claim).get(list_claims))
        .route("/claims/{claim_id}", get(get_claim).delete(delete_claim))
        .route("/claims/{claim_id}/edit", post(edit_claim))
        .route("/claims/{claim_id}/decide", post(decide_claim))
        .route("/claims/{claim_id}/revise", post(revise_decision))
        .route("/employees/{employee_id}/claims", get(list_employee_claims))
        .route(
            "/employees/{employee_id}/credit",
            get(credit_summary).post(open_credit_accounts),
        )
        .route(
            "/employees/{employee_id}/credit/{category}",
            put(set_credit_account),
        )
        .route("/reports/approved-totals", get(approved_totals))
        .route("/reports/approved", get(approved_report))
        .route("/reports/monthly-breakdown", get(monthly_breakdown))
        .route("/receipts/{file_name}", get(serve_receipt))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match ping(&state.pool).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(err) => {
            warn!("health check failed: {err:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "error": err.to_string() })),
            )
        }
    }
}

async fn submit_claim(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitClaimResponse>), (StatusCode, String)> {
    let new_claim = read_claim_form(multipart).await?;
    let image_count = new_claim.images.len();
    let claim = state
        .service
        .submit_claim(new_claim)
        .await
        .map_err(claim_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitClaimResponse {
            claim_id: claim.id,
            status: claim.status,
            request_date: claim.request_date,
            image_count,
        }),
    ))
}

async fn read_claim_form(mut multipart: Multipart) -> Result<NewClaim, (StatusCode, String)> {
    let mut employee_id = None;
    let mut category = None;
    let mut amount = None;
    let mut message = String::new();
    let mut images = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "employee_id" => {
                let text = field.text().await.map_err(bad_request)?;
                employee_id = Some(Uuid::parse_str(text.trim()).map_err(bad_request)?);
            }
            "category" => {
                let text = field.text().await.map_err(bad_request)?;
                category = Some(Category::from_str(&text).map_err(claim_error)?);
            }
            "amount" => {
                let text = field.text().await.map_err(bad_request)?;
                amount = Some(Decimal::from_str(text.trim()).map_err(bad_request)?);
            }
            "message" => {
                message = field.text().await.map_err(bad_request)?;
            }
            "images" | "images[]" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_request)?;
                images.push(ReceiptUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            other => warn!("ignoring unexpected form field '{other}'"),
        }
    }

    Ok(NewClaim {
        employee_id: employee_id.ok_or_else(|| missing_field("employee_id"))?,
        category: category.ok_or_else(|| missing_field("category"))?,
        amount: amount.ok_or_else(|| missing_field("amount"))?,
        message,
        images,
    })
}

async fn get_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<Uuid>,
) -> Result<Json<ClaimView>, (StatusCode, String)> {
    let details = state
        .service
        .claim_details(claim_id)
        .await
        .map_err(claim_error)?;

    Ok(Json(ClaimView::from(details)))
}

async fn edit_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<Uuid>,
    Json(payload): Json<EditClaimRequest>,
) -> Result<Json<Claim>, (StatusCode, String)> {
    let claim = state
        .service
        .edit_claim(claim_id, payload.amount, &payload.message)
        .await
        .map_err(claim_error)?;

    Ok(Json(claim))
}

async fn delete_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .service
        .delete_claim(claim_id)
        .await
        .map_err(claim_error)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn decide_claim(
    State(state): State<AppState>,
    Path(claim_id): Path<Uuid>,
    Json(payload): Json<DecideClaimRequest>,
) -> Result<Json<Claim>, (StatusCode, String)> {
    let decision = Decision::from_str(&payload.decision).map_err(claim_error)?;
    let claim = state
        .service
        .decide_claim(claim_id, decision, payload.admin_id, &payload.note)
        .await
        .map_err(claim_error)?;

    Ok(Json(claim))
}

async fn revise_decision(
    State(state): State<AppState>,
    Path(claim_id): Path<Uuid>,
    Json(payload): Json<DecideClaimRequest>,
) -> Result<Json<Claim>, (StatusCode, String)> {
    let decision = Decision::from_str(&payload.decision).map_err(claim_error)?;
    let claim = state
        .service
        .revise_decision(claim_id, decision, payload.admin_id, &payload.note)
        .await
        .map_err(claim_error)?;

    Ok(Json(claim))
}

async fn list_claims(
    State(state): State<AppState>,
    Query(query): Query<ListClaimsQuery>,
) -> Result<Json<ListClaimsResponse>, (StatusCode, String)> {
    let status = query
        .status
        .as_deref()
        .map(ClaimStatus::from_str)
        .transpose()
        .map_err(claim_error)?
        .unwrap_or(ClaimStatus::Pending);
    let claims = state
        .service
        .list_claims_by_status(status)
        .await
        .map_err(claim_error)?;

    Ok(Json(ListClaimsResponse { claims }))
}

async fn list_employee_claims(
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
) -> Result<Json<ListClaimsResponse>, (StatusCode, String)> {
    let claims = state
        .service
        .list_employee_claims(employee_id)
        .await
        .map_err(claim_error)?;

    Ok(Json(ListClaimsResponse { claims }))
}

async fn credit_summary(
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
) -> Result<Json<CreditSummary>, (StatusCode, String)> {
    let summary = state
        .service
        .credit_summary(employee_id)
        .await
        .map_err(claim_error)?;

    Ok(Json(summary))
}

async fn open_credit_accounts(
    State(state): State<AppState>,
    Path(employee_id): Path<Uuid>,
    Json(payload): Json<OpenAccountsRequest>,
) -> Result<(StatusCode, Json<CreditSummary>), (StatusCode, String)> {
    let summary = state
        .service
        .open_credit_accounts(employee_id, payload.fuel_limit, payload.opd_limit)
        .await
        .map_err(claim_error)?;

    Ok((StatusCode::CREATED, Json(summary)))
}

async fn set_credit_account(
    State(state): State<AppState>,
    Path((employee_id, category)): Path<(Uuid, String)>,
    Json(payload): Json<SetCreditAccountRequest>,
) -> Result<Json<CreditAccount>, (StatusCode, String)> {
    let category = Category::from_str(&category).map_err(claim_error)?;
    let account = state
        .service
        .set_credit_account(employee_id, category, payload.limit, payload.balance)
        .await
        .map_err(claim_error)?;

    Ok(Json(account))
}

async fn approved_totals(
    State(state): State<AppState>,
    Query(query): Query<ApprovedTotalsQuery>,
) -> Result<Json<ApprovedTotals>, (StatusCode, String)> {
    let as_of = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let totals = state
        .service
        .approved_totals(as_of)
        .await
        .map_err(claim_error)?;

    Ok(Json(totals))
}

async fn approved_report(
    State(state): State<AppState>,
    Query(query): Query<ApprovedReportQuery>,
) -> Result<Json<ApprovedReport>, (StatusCode, String)> {
    let report = state
        .service
        .approved_report(query.start, query.end, query.employee_id)
        .await
        .map_err(claim_error)?;

    Ok(Json(report))
}

async fn monthly_breakdown(
    State(state): State<AppState>,
    Query(query): Query<MonthlyBreakdownQuery>,
) -> Result<Json<MonthlyBreakdownResponse>, (StatusCode, String)> {
    let employees = state
        .service
        .monthly_breakdown(query.year, query.month)
        .await
        .map_err(claim_error)?;

    Ok(Json(MonthlyBreakdownResponse {
        year: query.year,
        month: query.month,
        employees,
    }))
}

async fn serve_receipt(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bytes = state
        .receipts
        .read(&file_name)
        .await
        .map_err(claim_error)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("receipt {file_name} not found")))?;

    Ok(([(header::CONTENT_TYPE, content_type(&file_name))], bytes))
}

fn content_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

fn claim_error(err: ClaimError) -> (StatusCode, String) {
    let status = match &err {
        ClaimError::InsufficientBalance { .. }
        | ClaimError::DuplicateImage { .. }
        | ClaimError::InvalidImage { .. }
        | ClaimError::Validation(_)
        | ClaimError::InvalidCategory(_) => StatusCode::BAD_REQUEST,
        ClaimError::NotFound(_) => StatusCode::NOT_FOUND,
        ClaimError::NotPending { .. } => StatusCode::CONFLICT,
        ClaimError::Storage(_) => {
            error!("{err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal storage error".to_string(),
            );
        }
    };

    (status, err.to_string())
}

fn bad_request<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn missing_field(name: &str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, format!("{name} is required"))
}
