use std::path::Path;

const UTF8: &str = "; charset=utf-8";

/// Extensions served as UTF-8 text even when their registered type is not
/// `text/*`, or when `mime_guess` does not know them at all.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "log", "csv", "tsv", "json", "xml", "js", "mjs", "css", "html", "htm", "svg", "yaml",
    "yml", "toml", "ini", "conf", "cfg", "sh", "py", "rs", "go", "c", "h", "cpp", "java", "sql",
];

/// Infers the `Content-Type` for a file from its extension.
///
/// Markdown gets `text/markdown`; text types carry a UTF-8 charset; anything
/// unrecognized is `application/octet-stream`.
pub fn content_type_for(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ext == "md" || ext == "markdown" {
        return format!("text/markdown{UTF8}");
    }

    let guessed = mime_guess::from_path(path).first();
    let is_text_ext = TEXT_EXTENSIONS.contains(&ext.as_str());

    match guessed {
        Some(mime) if mime.type_().as_str() == "text" || is_text_ext => {
            format!("{}{UTF8}", mime.essence_str())
        }
        Some(mime) => mime.essence_str().to_string(),
        None if is_text_ext => format!("text/plain{UTF8}"),
        None => "application/octet-stream".to_string(),
    }
}
