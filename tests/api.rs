//! Route-level tests against the real route table.
//!
//! The pool is lazy and never connects, so every case here must be decided
//! before the first query: authentication, role guards and input validation.

use actix_web::{
    App,
    http::{Method, StatusCode},
    test,
    web::Data,
};
use serde_json::{Value, json};
use sqlx::mysql::MySqlPoolOptions;

use school_hr::auth::jwt::{generate_access_token, generate_refresh_token};
use school_hr::config::Config;
use school_hr::model::role::Role;
use school_hr::routes::{self, Limiters};

const SECRET: &str = "integration-secret";

fn token(role: Role, staff_id: Option<u64>) -> String {
    generate_access_token(7, "tester".into(), role.id(), staff_id, SECRET, 900).unwrap()
}

fn request(method: Method, uri: &str, bearer: Option<&str>) -> test::TestRequest {
    let mut req = test::TestRequest::default()
        .method(method)
        .uri(uri)
        .peer_addr("127.0.0.1:40000".parse().unwrap());
    if let Some(token) = bearer {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    req
}

async fn call(req: test::TestRequest) -> (StatusCode, Value) {
    let config = Config::for_tests(SECRET);
    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .connect_lazy(&config.database_url)
        .unwrap();
    let limiters = Limiters::from_config(&config).unwrap();

    let app = test::init_service(
        App::new()
            .app_data(Data::new(pool))
            .app_data(Data::new(config.clone()))
            .configure(|cfg| routes::configure(cfg, &config, &limiters)),
    )
    .await;
    let resp = test::call_service(&app, req.to_request()).await;
    let status = resp.status();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

fn assert_error(body: &Value, message: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], message, "unexpected body: {body}");
}

// =============================================================================
// Authentication
// =============================================================================

#[actix_web::test]
async fn api_requires_a_bearer_token() {
    let (status, body) = call(request(Method::GET, "/api/staff", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error(&body, "Missing Authorization header");
}

#[actix_web::test]
async fn refresh_token_cannot_call_the_api() {
    let (refresh, _) =
        generate_refresh_token(7, "tester".into(), Role::Admin.id(), None, SECRET, 900).unwrap();
    let (status, body) = call(request(Method::GET, "/api/leave", Some(&refresh))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error(&body, "Access token required");
}

#[actix_web::test]
async fn token_signed_with_another_secret_is_rejected() {
    let forged =
        generate_access_token(7, "tester".into(), Role::Admin.id(), None, "other", 900).unwrap();
    let (status, body) = call(request(Method::GET, "/api/staff", Some(&forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

// =============================================================================
// Payroll
// =============================================================================

#[actix_web::test]
async fn staff_cannot_run_payroll() {
    let staff = token(Role::Staff, Some(3));
    let req = request(Method::POST, "/api/staff", Some(&staff))
        .set_json(json!({"type": "process-payroll", "month": 8, "year": 2025}));
    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "HR/Admin only");
}

#[actix_web::test]
async fn payroll_month_is_validated() {
    let hr = token(Role::Hr, None);
    let req = request(Method::POST, "/api/staff", Some(&hr))
        .set_json(json!({"type": "process-payroll", "month": 13, "year": 2025}));
    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "month must be between 1 and 12");
}

#[actix_web::test]
async fn only_admin_marks_payroll_paid() {
    let hr = token(Role::Hr, None);
    let req = request(Method::PUT, "/api/staff?id=1&type=payroll", Some(&hr))
        .set_json(json!({"status": "paid"}));
    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "Admin only");
}

#[actix_web::test]
async fn payroll_totals_cannot_be_written_directly() {
    let admin = token(Role::Admin, None);
    let req = request(Method::PUT, "/api/staff?id=1&type=payroll", Some(&admin))
        .set_json(json!({"netSalary": 1}));
    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

// =============================================================================
// Staff
// =============================================================================

#[actix_web::test]
async fn unknown_staff_field_is_rejected() {
    let hr = token(Role::Hr, None);
    let req = request(Method::PUT, "/api/staff?id=1", Some(&hr)).set_json(json!({"salary": 5}));
    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "salary cannot be updated");
}

#[actix_web::test]
async fn hiring_needs_every_identity_field() {
    let hr = token(Role::Hr, None);
    let req = request(Method::POST, "/api/staff", Some(&hr)).set_json(json!({
        "type": "staff",
        "employeeId": "EMP020",
        "firstName": "",
        "lastName": "Owusu",
        "department": "Maths",
        "position": "Teacher",
        "basicSalary": 80000
    }));
    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "firstName is required");
}

#[actix_web::test]
async fn unknown_listing_type_is_rejected() {
    let hr = token(Role::Hr, None);
    let (status, body) = call(request(Method::GET, "/api/staff?type=bogus", Some(&hr))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "Unknown type: bogus");
}

#[actix_web::test]
async fn out_of_range_page_is_a_bad_request() {
    let hr = token(Role::Hr, None);
    let (status, body) = call(request(
        Method::GET,
        "/api/staff?page=4294967295&perPage=100",
        Some(&hr),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "page is out of range");
}

#[actix_web::test]
async fn malformed_json_uses_the_error_envelope() {
    let hr = token(Role::Hr, None);
    let req = request(Method::POST, "/api/staff", Some(&hr))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json");
    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[actix_web::test]
async fn non_numeric_staff_id_is_a_bad_request() {
    let hr = token(Role::Hr, None);
    let (status, body) = call(request(Method::GET, "/api/staff/abc", Some(&hr))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

// =============================================================================
// Leave
// =============================================================================

#[actix_web::test]
async fn leave_must_end_after_it_starts() {
    let staff = token(Role::Staff, Some(3));
    let req = request(Method::POST, "/api/leave", Some(&staff)).set_json(json!({
        "employeeId": "EMP003",
        "staffId": 3,
        "type": "annual",
        "startDate": "2025-08-14",
        "endDate": "2025-08-14",
        "reason": "Family visit"
    }));
    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "endDate must be after startDate");
}

#[actix_web::test]
async fn staff_apply_only_for_themselves() {
    let staff = token(Role::Staff, Some(3));
    let req = request(Method::POST, "/api/leave", Some(&staff)).set_json(json!({
        "staffId": 4,
        "type": "sick",
        "startDate": "2025-08-10",
        "endDate": "2025-08-12",
        "reason": "Flu"
    }));
    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "You can only access your own records");
}

#[actix_web::test]
async fn leave_reason_is_required() {
    let hr = token(Role::Hr, None);
    let req = request(Method::POST, "/api/leave", Some(&hr)).set_json(json!({
        "staffId": 4,
        "type": "study",
        "startDate": "2025-08-10",
        "endDate": "2025-08-12",
        "reason": "   "
    }));
    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "reason is required");
}

#[actix_web::test]
async fn staff_cannot_approve_leave() {
    let staff = token(Role::Staff, Some(3));
    let (status, body) = call(request(Method::PUT, "/api/leave/12/approve", Some(&staff))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "HR/Admin only");
}

#[actix_web::test]
async fn staff_cannot_read_another_balance() {
    let staff = token(Role::Staff, Some(3));
    let (status, body) = call(request(
        Method::GET,
        "/api/staff/leave-balances?year=2025&staffId=4",
        Some(&staff),
    ))
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "You can only access your own records");
}

#[actix_web::test]
async fn balance_year_is_validated() {
    let hr = token(Role::Hr, None);
    let (status, body) =
        call(request(Method::GET, "/api/staff/leave-balances?year=1800", Some(&hr))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "year must be between 1900 and 2999");
}
