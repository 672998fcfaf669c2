mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{day_at, TestApp};
use optistock_api::services::training::RetrainState;

/// Seeds a small but realistic dataset: one product with a month of daily
/// sales, one cold product with no history, and four customers spanning the
/// spend spectrum.
struct Fixture {
    app: TestApp,
    staple: i64,
    cold: i64,
    whale: i64,
    regular: i64,
    one_off: i64,
    occasional: i64,
}

async fn seeded_app() -> Fixture {
    let app = TestApp::new().await;

    let staple = app.seed_product("Espresso Beans 1kg", "groceries", "10.00", 3).await;
    let cold = app.seed_product("Ceramic Mug", "kitchenware", "8.50", 3).await;

    let whale = app.seed_customer("Ada", "ada@example.com").await;
    let regular = app.seed_customer("Grace", "grace@example.com").await;
    let one_off = app.seed_customer("Alan", "alan@example.com").await;
    let occasional = app.seed_customer("Edsger", "edsger@example.com").await;

    // A month of daily staple sales from the whale
    app.seed_daily_sales(staple, whale, 30).await;

    let side = app.seed_product("Filter Papers", "groceries", "4.00", 50).await;
    for day in 0..10 {
        app.seed_sale(side, regular, 1, "20.00", day_at(day)).await;
    }
    app.seed_sale(side, one_off, 1, "500.00", day_at(29)).await;
    app.seed_sale(side, occasional, 2, "15.00", day_at(5)).await;

    Fixture {
        app,
        staple,
        cold,
        whale,
        regular,
        one_off,
        occasional,
    }
}

#[tokio::test]
async fn forecast_for_unknown_product_is_404() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post("/api/v1/forecast/predict", json!({"product_id": 999}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn forecast_without_model_is_503_when_history_exists() {
    let f = seeded_app().await;
    let (status, _) = f
        .app
        .post("/api/v1/forecast/predict", json!({"product_id": f.staple}))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn cold_product_forecasts_zero_without_a_model() {
    let f = seeded_app().await;
    let (status, body) = f
        .app
        .post("/api/v1/forecast/predict", json!({"product_id": f.cold}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["predicted_sales"], 0);
    assert_eq!(body["data"]["confidence_score"], 0.0);
}

#[tokio::test]
async fn segmentation_without_model_is_503() {
    let f = seeded_app().await;
    let uri = format!("/api/v1/analytics/segment/{}", f.whale);
    let (status, _) = f.app.get(&uri).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn customer_without_history_is_404() {
    let f = seeded_app().await;
    let ghost = f.app.seed_customer("Ghost", "ghost@example.com").await;
    let uri = format!("/api/v1/analytics/segment/{}", ghost);
    let (status, _) = f.app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn training_pass_unlocks_forecasting() {
    let f = seeded_app().await;
    let service = f.app.training_service();
    let job_id = service.enqueue();
    let report = service.run_once(job_id).await.expect("training succeeds");
    assert!(report.training_rows > 0);
    assert_eq!(report.segmented_customers, 4);

    let job = f.app.state.retrain_jobs.get(job_id).expect("job recorded");
    assert_eq!(job.state, RetrainState::Succeeded);
    assert!(job.finished_at.is_some());

    let (status, body) = f
        .app
        .post("/api/v1/forecast/predict", json!({"product_id": f.staple}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["confidence_score"], 0.85);
    assert!(body["data"]["predicted_sales"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn cold_product_stays_zero_after_training() {
    let f = seeded_app().await;
    let service = f.app.training_service();
    let job_id = service.enqueue();
    service.run_once(job_id).await.expect("training succeeds");

    let (status, body) = f
        .app
        .post("/api/v1/forecast/predict", json!({"product_id": f.cold}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["predicted_sales"], 0);
    assert_eq!(body["data"]["confidence_score"], 0.0);
}

#[tokio::test]
async fn reorder_report_flags_at_risk_products_and_omits_healthy_ones() {
    let f = seeded_app().await;
    let service = f.app.training_service();
    let job_id = service.enqueue();
    service.run_once(job_id).await.expect("training succeeds");

    let (status, body) = f.app.get("/api/v1/analytics/reorder-report").await;
    assert_eq!(status, StatusCode::OK);
    let lines = body["data"].as_array().expect("report is an array");

    // The cold product has predicted demand 0 and stock 3, below the safety
    // buffer of 5: LOW with a recommendation of 2.
    let cold_line = lines
        .iter()
        .find(|line| line["product_id"] == f.cold)
        .expect("cold product is flagged");
    assert_eq!(cold_line["status"], "LOW");
    assert_eq!(cold_line["predicted_demand"], 0);
    assert_eq!(cold_line["current_stock"], 3);
    assert_eq!(cold_line["recommended_order"], 2);

    // Every reported line needs attention; OK products never appear.
    for line in lines {
        assert_ne!(line["status"], "OK");
        assert!(line["recommended_order"].as_i64().unwrap() > 0);
    }

    // Deterministic: a second report over unchanged data is identical.
    let (_, again) = f.app.get("/api/v1/analytics/reorder-report").await;
    assert_eq!(body["data"], again["data"]);
}

#[tokio::test]
async fn segmentation_reports_rfm_evidence_and_stable_labels() {
    let f = seeded_app().await;
    let service = f.app.training_service();
    let job_id = service.enqueue();
    service.run_once(job_id).await.expect("training succeeds");

    // Single purchase of 500: recency anchored at the purchase itself.
    let uri = format!("/api/v1/analytics/segment/{}", f.one_off);
    let (status, body) = f.app.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recency"], 0);
    assert_eq!(body["data"]["frequency"], 1);
    assert_eq!(body["data"]["monetary"], 500.0);

    // The top spender lands in the highest-value cluster.
    let uri = format!("/api/v1/analytics/segment/{}", f.whale);
    let (_, body) = f.app.get(&uri).await;
    assert_eq!(body["data"]["segment"], "VIP");

    // Sub-threshold spend outside the VIP cluster reads as Budget.
    let uri = format!("/api/v1/analytics/segment/{}", f.occasional);
    let (_, body) = f.app.get(&uri).await;
    assert_eq!(body["data"]["segment"], "Budget");

    // Mid spend above the threshold reads as Regular.
    let uri = format!("/api/v1/analytics/segment/{}", f.regular);
    let (_, body) = f.app.get(&uri).await;
    assert_eq!(body["data"]["segment"], "Regular");
}

#[tokio::test]
async fn retrain_endpoint_runs_in_background_and_is_queryable() {
    let f = seeded_app().await;

    let (status, body) = f.app.post("/api/v1/admin/retrain", json!({})).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["data"]["job_id"].as_str().expect("job id").to_string();

    // Poll until the background job settles.
    let uri = format!("/api/v1/admin/retrain/{}", job_id);
    let mut last_state = String::new();
    for _ in 0..100 {
        let (status, body) = f.app.get(&uri).await;
        assert_eq!(status, StatusCode::OK);
        last_state = body["data"]["state"].as_str().unwrap_or_default().to_string();
        if last_state == "succeeded" || last_state == "failed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    assert_eq!(last_state, "succeeded");

    // The installed model now serves forecasts.
    let (status, _) = f
        .app
        .post("/api/v1/forecast/predict", json!({"product_id": f.staple}))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_retrain_job_is_404() {
    let app = TestApp::new().await;
    let (status, _) = app
        .get("/api/v1/admin/retrain/00000000-0000-0000-0000-000000000000")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn training_on_empty_database_fails_and_leaves_no_model() {
    let app = TestApp::new().await;
    let service = app.training_service();
    let job_id = service.enqueue();
    assert!(service.run_once(job_id).await.is_err());

    let job = app.state.retrain_jobs.get(job_id).expect("job recorded");
    assert_eq!(job.state, RetrainState::Failed);
    assert!(job.error.is_some());
    assert!(app.state.registry.forecast().is_none());
    assert!(app.state.registry.segmentation().is_none());
}

#[tokio::test]
async fn stock_update_round_trips_through_the_catalog() {
    let f = seeded_app().await;

    let uri = format!("/api/v1/products/{}/stock", f.staple);
    let (status, body) = f.app.put(&uri, json!({"quantity": 42})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock"], 42);

    let uri = format!("/api/v1/products/{}", f.staple);
    let (_, body) = f.app.get(&uri).await;
    assert_eq!(body["data"]["stock"], 42);

    let uri = format!("/api/v1/products/{}/stock", f.staple);
    let (status, _) = f.app.put(&uri, json!({"quantity": -1})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn product_listing_returns_the_catalog() {
    let f = seeded_app().await;
    let (status, body) = f.app.get("/api/v1/products").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}
