//! Router tests
//!
//! Drive the full router in-process; the reference image comes from a
//! local server so no test touches the network.

use std::path::PathBuf;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{build_state, create_router};
use crate::config::Config;
use crate::logic::reference_image::tests::{image_router, serve};

const TOLERANCE: f64 = 1e-9;

fn demo_model_path() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/RandomForestRegressor.json"))
}

async fn app_with_image(path: &str) -> Router {
    let base = serve(image_router()).await;
    let config = Config {
        model_path: demo_model_path(),
        reference_image_url: format!("{}{}", base, path),
        image_fetch_timeout_secs: 2,
        ..Config::default()
    };
    create_router(build_state(config).unwrap())
}

async fn app() -> Router {
    app_with_image("/missing.png").await
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

fn form_post(body: &str) -> Request<Body> {
    Request::post("/predict")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_post(body: Value) -> Request<Body> {
    Request::post("/api/v1/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_index_lists_features() {
    let response = app().await
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(html.contains("Feature input"));
    assert!(html.contains("Age (years) (18 - 42)"));
    assert!(html.contains("Weight (kg) (52 - 91)"));
    assert!(html.contains(r#"name="age" min="18" max="42" step="1" value="18""#));
    assert!(!html.contains("Predicted"));
}

#[tokio::test]
async fn test_form_predict_with_unavailable_image() {
    let response = app().await.oneshot(form_post("age=30&weight=70")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(html.contains("<strong>52.00</strong>"));
    assert!(html.contains(r#"class="force-plot""#));
    assert!(html.contains("f(x) = 52.00"));
    assert!(html.contains("Unable to load the image, please check the link."));
    assert!(html.contains("404"));
    // Controls keep the submitted values
    assert!(html.contains(r#"name="age" min="18" max="42" step="1" value="30""#));
}

#[tokio::test]
async fn test_form_predict_embeds_image() {
    let app = app_with_image("/plot.png").await;
    let html = body_string(app.oneshot(form_post("age=30&weight=70")).await.unwrap()).await;

    assert!(html.contains(r#"<img src="data:image/png;base64,"#));
    assert!(!html.contains("Unable to load the image"));
}

#[tokio::test]
async fn test_form_predict_clamps_out_of_range() {
    let html = body_string(app().await.oneshot(form_post("age=60&weight=70")).await.unwrap()).await;

    assert!(html.contains("Adjusted into the allowed range: age"));
    assert!(html.contains(r#"name="age" min="18" max="42" step="1" value="42""#));
}

#[tokio::test]
async fn test_form_predict_bad_value_shown_inline() {
    let response = app().await.oneshot(form_post("age=abc&weight=70")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let html = body_string(response).await;
    assert!(html.contains(r#"<div class="error">"#));
    assert!(html.contains("is not a number"));
    assert!(!html.contains("force-plot"));
    // Form is still usable
    assert!(html.contains(r#"name="weight" min="52" max="91" step="1" value="70""#));
}

#[tokio::test]
async fn test_api_predict_additivity() {
    let response = app().await
        .oneshot(json_post(json!({ "values": { "age": 30, "weight": "70" } })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let prediction = body["prediction"].as_f64().unwrap();
    let baseline = body["expected_value"].as_f64().unwrap();
    let contributions = body["contributions"].as_array().unwrap();

    assert_eq!(prediction, 52.0);
    assert_eq!(contributions.len(), 2);
    assert_eq!(contributions[0]["feature"], "age");
    assert_eq!(contributions[1]["feature"], "weight");

    let sum: f64 = contributions.iter().map(|c| c["contribution"].as_f64().unwrap()).sum();
    assert!((baseline + sum - prediction).abs() < TOLERANCE);
    assert!(body.get("clamped").is_none());
    assert!(body["id"].as_str().is_some());
}

#[tokio::test]
async fn test_api_predict_defaults_when_empty() {
    let response = app().await.oneshot(json_post(json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let expected = (42.0 + 44.0 + 47.0) / 3.0;
    assert!((body["prediction"].as_f64().unwrap() - expected).abs() < TOLERANCE);
}

#[tokio::test]
async fn test_api_predict_rejects_bad_input() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(json_post(json!({ "values": { "height": 160 } })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("height"));

    let response = app
        .oneshot(json_post(json!({ "values": { "age": "thirty" } })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health() {
    let response = app().await
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["model_checksum"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_schema_endpoint() {
    let body = body_json(
        app().await
            .oneshot(Request::get("/api/v1/schema").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["version"], 1);
    assert_eq!(body["layout_hash"].as_str().unwrap().len(), 8);
    assert_eq!(body["features"][0]["name"], "age");
    assert_eq!(body["features"][0]["type"], "numeric");
    assert_eq!(body["features"][1]["max"], 91.0);
}

#[tokio::test]
async fn test_model_endpoint() {
    let body = body_json(
        app().await
            .oneshot(Request::get("/api/v1/model").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(body["model_type"], "random_forest_regressor");
    assert_eq!(body["n_trees"], 3);
    assert_eq!(body["n_features"], 2);
    assert_eq!(body["feature_names"], json!(["age", "weight"]));
}

#[test]
fn test_startup_fails_on_missing_model() {
    let config = Config {
        model_path: PathBuf::from("/nonexistent/model.json"),
        ..Config::default()
    };
    let err = build_state(config).err().unwrap();
    assert!(format!("{:#}", err).contains("failed to load model"));
}

#[test]
fn test_startup_fails_on_mismatched_schema() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("schema.json");
    std::fs::write(
        &schema_path,
        r#"{"version":1,"features":[
            {"name":"weight","type":"numeric","min":52,"max":91,"default":52},
            {"name":"age","type":"numeric","min":18,"max":42,"default":18}
        ]}"#,
    )
    .unwrap();

    let config = Config {
        model_path: demo_model_path(),
        schema_path: Some(schema_path),
        ..Config::default()
    };
    let err = build_state(config).err().unwrap();
    assert!(format!("{:#}", err).contains("does not match the model"));
}

#[test]
fn test_example_schema_binds_to_demo_model() {
    let config = Config {
        model_path: demo_model_path(),
        schema_path: Some(PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/schema.example.json"))),
        ..Config::default()
    };
    let state = build_state(config).unwrap();
    assert_eq!(state.service.schema().feature_names(), vec!["age", "weight"]);
}

const CATEGORICAL_SCHEMA: &str = r#"{"version":1,"features":[
    {"name":"age","label":"Age (years)","type":"numeric","min":18,"max":42,"default":18,"step":1},
    {"name":"weight","label":"Weight band","type":"categorical",
     "options":[{"label":"light","value":60},{"label":"heavy","value":80}]}
]}"#;

async fn app_with_schema(schema_json: &str) -> Router {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("schema.json");
    std::fs::write(&schema_path, schema_json).unwrap();

    let base = serve(image_router()).await;
    let config = Config {
        model_path: demo_model_path(),
        schema_path: Some(schema_path),
        reference_image_url: format!("{}/missing.png", base),
        image_fetch_timeout_secs: 2,
        ..Config::default()
    };
    create_router(build_state(config).unwrap())
}

#[tokio::test]
async fn test_form_predict_categorical_option() {
    let expected = body_json(
        app().await
            .oneshot(json_post(json!({ "values": { "age": 30, "weight": 80 } })))
            .await
            .unwrap(),
    )
    .await["prediction"]
        .as_f64()
        .unwrap();

    let app = app_with_schema(CATEGORICAL_SCHEMA).await;
    let html = body_string(app.clone().oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap()).await;
    assert!(html.contains("Weight band (Select a value)"));
    assert!(html.contains(r#"<option value="light" selected>light</option>"#));

    let response = app.oneshot(form_post("age=30&weight=heavy")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_string(response).await;
    assert!(html.contains(&format!("<strong>{:.2}</strong>", expected)));
    assert!(html.contains(r#"<option value="heavy" selected>heavy</option>"#));
    assert!(html.contains(r#"<option value="light">light</option>"#));
}

#[tokio::test]
async fn test_form_predict_categorical_out_of_set() {
    let app = app_with_schema(CATEGORICAL_SCHEMA).await;
    let response = app.oneshot(form_post("age=30&weight=medium")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let html = body_string(response).await;
    assert!(html.contains("is not one of [light, heavy]"));
}

#[test]
fn test_startup_rejects_padded_option_label() {
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("schema.json");
    std::fs::write(&schema_path, CATEGORICAL_SCHEMA.replace(r#""heavy""#, r#"" heavy ""#)).unwrap();

    let config = Config {
        model_path: demo_model_path(),
        schema_path: Some(schema_path),
        ..Config::default()
    };
    let err = build_state(config).err().unwrap();
    assert!(format!("{:#}", err).contains("surrounding whitespace"));
}

#[tokio::test]
async fn test_api_predict_malformed_json() {
    let response = app().await
        .oneshot(
            Request::post("/api/v1/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_api_predict_wrong_shape() {
    let response = app().await
        .oneshot(json_post(json!({ "values": [30, 70] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["status"], 422);
}

#[tokio::test]
async fn test_unknown_route() {
    let response = app().await
        .oneshot(Request::get("/api/v1/nothing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Route not found");
}
