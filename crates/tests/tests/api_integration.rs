use std::path::PathBuf;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use trip_api::build_app;
use trip_service::PlannerConfig;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

async fn app() -> Router {
    let config = PlannerConfig {
        dataset_path: fixture("packages.csv"),
        model_path: fixture("budget_model.json"),
        seed: Some(17),
        ..PlannerConfig::default()
    };
    build_app(&config).await.expect("app should build")
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, parsed))
}

fn family_trip() -> Value {
    json!({
        "locations": ["LOC_1", "LOC_2"],
        "package": "Moderate",
        "total_days": 4,
        "rating_range": "3-4",
        "travel_companion": "Family"
    })
}

#[tokio::test]
async fn root_reports_liveness() -> Result<()> {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Trip Budget Prediction API is up and running!");
    Ok(())
}

#[tokio::test]
async fn health_includes_catalog_and_model() -> Result<()> {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["catalog"]["packages"], 6);
    assert_eq!(body["catalog"]["locations"], 3);
    assert_eq!(body["fallback_model"], false);
    Ok(())
}

#[tokio::test]
async fn predict_returns_priced_combinations() -> Result<()> {
    let app = app().await;
    let (status, body) = send(&app, "POST", "/predict", Some(family_trip())).await?;
    assert_eq!(status, StatusCode::OK);

    let combinations = body["combinations"].as_array().expect("combinations array");
    assert_eq!(combinations.len(), 3);

    for combination in combinations {
        assert_eq!(combination["travel_companion"], "Family");
        let plan = combination["plan"].as_array().expect("plan array");
        assert!(plan.iter().any(|entry| entry["Package_ID"] == "PKG-003"));

        let mut days = 0;
        for entry in plan {
            assert_eq!(entry["Package_Type"], "Moderate");
            let location = entry["Location"].as_str().unwrap_or_default();
            assert!(location == "LOC_1" || location == "LOC_2");
            let entry_days = entry["Days"].as_u64().unwrap_or_default();
            assert_eq!(
                entry["Predicted_Budget"],
                format!("{:.2}", entry_days as f64 * 10_000.0)
            );
            days += entry_days;
        }

        assert_eq!(combination["total_days"].as_u64(), Some(days));
        assert_eq!(
            combination["total_budget"].as_f64(),
            Some(days as f64 * 10_000.0)
        );
    }
    Ok(())
}

#[tokio::test]
async fn invalid_companion_is_rejected_with_message() -> Result<()> {
    let app = app().await;
    let mut request = family_trip();
    request["travel_companion"] = json!("Colleagues");

    let (status, body) = send(&app, "POST", "/predict", Some(request)).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body,
        json!({ "error": "Invalid travel companion. Must be one of: Solo, Couple, Family, Friends." })
    );
    Ok(())
}

#[tokio::test]
async fn unknown_locations_yield_no_match() -> Result<()> {
    let app = app().await;
    let mut request = family_trip();
    request["locations"] = json!(["LOC_404", "LOC_405"]);

    let (status, body) = send(&app, "POST", "/predict", Some(request)).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "No matching packages found for given criteria.");
    Ok(())
}

#[tokio::test]
async fn malformed_requests_fail_validation() -> Result<()> {
    let app = app().await;

    let mut inverted = family_trip();
    inverted["rating_range"] = json!("5-3");
    let (status, body) = send(&app, "POST", "/predict", Some(inverted)).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failed");

    let mut no_days = family_trip();
    no_days["total_days"] = json!(0);
    let (status, body) = send(&app, "POST", "/predict", Some(no_days)).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failed");

    let mut unknown_tier = family_trip();
    unknown_tier["package"] = json!("Luxury");
    let (status, body) = send(&app, "POST", "/predict", Some(unknown_tier)).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unknown_category");
    Ok(())
}

#[tokio::test]
async fn predictions_are_logged() -> Result<()> {
    let app = app().await;
    send(&app, "POST", "/predict", Some(family_trip())).await?;

    let (status, body) = send(&app, "GET", "/predictions?limit=5", None).await?;
    assert_eq!(status, StatusCode::OK);
    let predictions = body["predictions"].as_array().expect("predictions array");
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0]["request"]["travel_companion"], "Family");
    Ok(())
}

#[tokio::test]
async fn confirmed_plans_round_trip() -> Result<()> {
    let app = app().await;
    let (_, predicted) = send(&app, "POST", "/predict", Some(family_trip())).await?;
    let chosen = predicted["combinations"][0].clone();

    let (status, confirmed) = send(
        &app,
        "POST",
        "/confirmed-plans",
        Some(json!({ "plan_number": 1, "full_plan": chosen })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(confirmed["plan_number"], 1);
    assert!(confirmed["package_ids"]
        .as_array()
        .is_some_and(|ids| ids.iter().any(|id| id == "PKG-003")));

    let (status, listed) = send(&app, "GET", "/confirmed-plans", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["confirmed_plans"].as_array().map(Vec::len), Some(1));

    let id = confirmed["id"].as_str().expect("plan id");
    let uri = format!("/confirmed-plans/{id}");
    let (status, body) = send(&app, "DELETE", &uri, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deleted": true }));

    let (status, _) = send(&app, "DELETE", &uri, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn empty_plans_cannot_be_confirmed() -> Result<()> {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/confirmed-plans",
        Some(json!({
            "plan_number": 2,
            "full_plan": {
                "plan": [],
                "total_days": 0,
                "total_budget": 0.0,
                "travel_companion": "Solo"
            }
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failed");
    Ok(())
}

#[tokio::test]
async fn bundled_assets_serve_predictions() -> Result<()> {
    let assets = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets");
    let config = PlannerConfig {
        dataset_path: assets.join("trip_dataset.csv"),
        model_path: assets.join("budget_model.json"),
        ..PlannerConfig::default()
    };
    let app = build_app(&config).await?;

    let (status, health) = send(&app, "GET", "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["model"], "tree-ensemble");

    let (status, body) = send(
        &app,
        "POST",
        "/predict",
        Some(json!({
            "locations": ["LOC_2", "LOC_3"],
            "package": "Moderate",
            "total_days": 4,
            "rating_range": "3.5-4.5",
            "travel_companion": "Family"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["combinations"].as_array().map_or(true, Vec::is_empty));
    Ok(())
}
