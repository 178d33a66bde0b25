//! Server-rendered HTML.

/// Landing page with the upload form.
pub const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Escape text for HTML element content and quoted attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// URL path an uploaded file is served from.
pub fn upload_url(file_name: &str) -> String {
    format!("/uploads/{file_name}")
}

/// Result page shown after a prediction.
pub fn result_page(message: &str, name: &str, matric: &str, image_url: &str) -> String {
    format!(
        "<!doctype html>
<html><head><meta charset='utf-8'><title>Result</title></head>
<body>
<h2>{message}</h2>
<p><strong>Name:</strong> {name} &nbsp; <strong>Matric:</strong> {matric}</p>
<img src='{image_url}' style='max-width:400px;' alt='uploaded image'/>
<p><a href='/'>Go back</a></p>
</body></html>",
        message = escape_html(message),
        name = escape_html(name),
        matric = escape_html(matric),
        image_url = escape_html(image_url),
    )
}
