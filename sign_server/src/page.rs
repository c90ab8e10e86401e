//! HTML rendering of the upload page and its results.
//!
use base64::{engine::general_purpose::STANDARD, Engine};
use common::protocol::Prediction;

use crate::inferer::Upload;

const STYLE: &str = r#"
    body { font-family: sans-serif; max-width: 42rem; margin: 2rem auto; padding: 0 1rem; }
    img.upload { width: 100%; border-radius: 4px; }
    .alert { padding: 0.75rem 1rem; margin: 1rem 0; border-radius: 4px; }
    .success { background: #d4edda; color: #155724; }
    .info { background: #d1ecf1; color: #0c5460; }
    .error { background: #f8d7da; color: #721c24; }
"#;

const UPLOAD_FORM: &str = r#"
    <form action="/" method="post" enctype="multipart/form-data">
        <label for="file">Upload Traffic Sign Image</label>
        <input type="file" id="file" name="file" accept=".jpg,.jpeg,.png,image/jpeg,image/png" required>
        <button type="submit">Predict</button>
    </form>
"#;

/// Page with an empty upload form.
pub fn index() -> String {
    layout("")
}

/// Page echoing the uploaded image with its prediction.
pub fn result(upload: &Upload, prediction: &Prediction) -> String {
    let content = format!(
        r#"
    <figure>
        <img class="upload" src="data:{};base64,{}" alt="Uploaded Image">
        <figcaption>Uploaded Image</figcaption>
    </figure>
    <div class="alert success">Predicted Sign: <strong>{}</strong></div>
    <div class="alert info">Confidence: <strong>{}</strong></div>
"#,
        upload.mime_type(),
        STANDARD.encode(&upload.data),
        escape(&prediction.label),
        prediction.confidence_text(),
    );

    layout(&content)
}

/// Page reporting a failed upload.
pub fn error(message: &str) -> String {
    layout(&format!(
        r#"
    <div class="alert error">{}</div>
"#,
        escape(message)
    ))
}

fn layout(content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Traffic Sign Recognition</title>
    <style>{}</style>
</head>
<body>
    <h1>Traffic Sign Recognition</h1>
    <p>Upload a traffic sign image and the CNN model will predict the sign.</p>
{}{}</body>
</html>
"#,
        STYLE, UPLOAD_FORM, content
    )
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }

    escaped
}
