use std::{
    io::Cursor,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{
    labels::{LABELS, NUM_CLASSES},
    protocol::{ErrorMsg, Prediction},
};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use sign_server::{
    inferer::{classify_image, Inferer, Upload},
    model_store::{ArtifactSource, ModelStore, SharedModel},
    nn::{ClassProbabilities, InferModel, InputTensor},
    routes, SignError, DEFAULT_BODY_LIMIT, MODEL_PATH, MODEL_URL,
};
use tempfile::NamedTempFile;
use tower::ServiceExt;

const BOUNDARY: &str = "X-SIGN-BOUNDARY";

/// Always predicts "Stop" with 97.3% confidence.
struct StopModel;

impl InferModel for StopModel {
    fn run(&self, input: &InputTensor) -> Result<ClassProbabilities, SignError> {
        assert_eq!(input.values().count(), InputTensor::SHAPE.iter().product::<usize>());
        let mut values = [0.027 / (NUM_CLASSES - 1) as f32; NUM_CLASSES];
        values[14] = 0.973;
        Ok(ClassProbabilities::new(values))
    }
}

struct TestApp {
    app: Router,
    loads: Arc<AtomicUsize>,
    // Keeps the fake artifact alive for the duration of the test.
    _artifact: NamedTempFile,
}

fn test_app() -> TestApp {
    let artifact = NamedTempFile::new().unwrap();
    let loads = Arc::new(AtomicUsize::new(0));

    let loads_ = Arc::clone(&loads);
    let source = ArtifactSource::new("http://127.0.0.1:9/model.onnx", artifact.path());
    let store = ModelStore::with_loader(source, move |_path| {
        loads_.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StopModel) as SharedModel)
    });

    let inferer = Arc::new(Inferer::new(Arc::new(store)));
    TestApp {
        app: routes::app(inferer, DEFAULT_BODY_LIMIT),
        loads,
        _artifact: artifact,
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

fn multipart_request(uri: &str, field: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"sign.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_predict_json() {
    let test_app = test_app();

    let response = test_app
        .app
        .oneshot(multipart_request("/predict", "file", &png_bytes(32, 32)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let prediction: Prediction = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(
        prediction,
        Prediction {
            class_id: 14,
            label: "Stop".into(),
            confidence: 97.3,
        }
    );
}

#[tokio::test]
async fn test_upload_page_shows_result() {
    let test_app = test_app();

    let response = test_app
        .app
        .oneshot(multipart_request("/", "file", &png_bytes(120, 80)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("data:image/png;base64,"));
    assert!(page.contains("Predicted Sign: <strong>Stop</strong>"));
    assert!(page.contains("Confidence: <strong>97.30%</strong>"));
}

#[tokio::test]
async fn test_model_is_shared_between_requests() {
    let test_app = test_app();

    for _ in 0..2 {
        let response = test_app
            .app
            .clone()
            .oneshot(multipart_request("/predict", "file", &png_bytes(16, 16)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(test_app.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_image_is_rejected() {
    let test_app = test_app();

    let response = test_app
        .app
        .oneshot(multipart_request("/predict", "file", b"GIF89a not really"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let msg: ErrorMsg = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(msg.error.contains("unsupported image format"));
}

#[tokio::test]
async fn test_missing_file_field_renders_error_page() {
    let test_app = test_app();

    let response = test_app
        .app
        .oneshot(multipart_request("/", "other", &png_bytes(8, 8)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let page = body_text(response).await;
    assert!(page.contains("no image found in upload"));
    assert!(page.contains(r#"name="file""#));
}

#[tokio::test]
async fn test_index_and_healthcheck() {
    let test_app = test_app();

    let response = test_app
        .app
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Traffic Sign Recognition"));

    let response = test_app
        .app
        .oneshot(Request::get("/healthcheck").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "healthy, model not loaded yet");
    assert_eq!(test_app.loads.load(Ordering::SeqCst), 0);
}

/// Runs the real network, which is downloaded on first use.
#[tokio::test]
#[ignore]
async fn test_traffic_sign_model() -> Result<(), SignError> {
    let store = ModelStore::new(ArtifactSource::new(MODEL_URL, MODEL_PATH));
    let model = store.get().await?;

    let upload = Upload::new(png_bytes(32, 32))?;
    let prediction = classify_image(model.as_ref(), &upload)?;

    assert!(LABELS.contains(&prediction.label.as_str()));
    assert!((0.0..=100.0).contains(&prediction.confidence));

    Ok(())
}
