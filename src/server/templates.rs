//! HTML rendering for the index page.

use crate::core::artifacts::ArtifactPaths;
use std::path::Path;

/// URLs of the generated artifacts, relative to the site root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactUrls {
    pub annotated_reference: String,
    pub annotated_candidate: String,
    pub difference: String,
    pub threshold: String,
}

impl ArtifactUrls {
    /// Map artifact paths under `static_dir` to `/static/...` URLs.
    ///
    /// Returns `None` when an artifact lives outside the static root and
    /// therefore cannot be served. `version` is appended as a query string
    /// so browsers do not show a cached image from an earlier comparison.
    pub fn from_paths(paths: &ArtifactPaths, static_dir: &Path, version: i64) -> Option<Self> {
        let url = |path: &Path| -> Option<String> {
            let relative = path.strip_prefix(static_dir).ok()?;
            let segments: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Some(format!("/static/{}?v={}", segments.join("/"), version))
        };

        Some(Self {
            annotated_reference: url(paths.annotated_reference.as_path())?,
            annotated_candidate: url(paths.annotated_candidate.as_path())?,
            difference: url(paths.difference.as_path())?,
            threshold: url(paths.threshold.as_path())?,
        })
    }
}

/// Render the index page, optionally with a comparison result
pub fn render_index(prediction: Option<&str>, artifacts: Option<&ArtifactUrls>) -> String {
    let mut body = String::new();

    if let Some(prediction) = prediction {
        body.push_str(&format!(
            "    <p class=\"prediction\">{}</p>\n",
            escape(prediction)
        ));
    }

    if let Some(urls) = artifacts {
        body.push_str("    <div class=\"artifacts\">\n");
        for (label, url) in [
            ("Original", &urls.annotated_reference),
            ("Uploaded", &urls.annotated_candidate),
            ("Difference", &urls.difference),
            ("Threshold", &urls.threshold),
        ] {
            body.push_str(&format!(
                "      <figure><img src=\"{}\" alt=\"{}\"><figcaption>{}</figcaption></figure>\n",
                escape(url),
                label,
                label
            ));
        }
        body.push_str("    </div>\n");
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>Image Diff</title>
    <style>
      body {{ font-family: sans-serif; margin: 2rem; }}
      .prediction {{ font-size: 1.5rem; font-weight: bold; }}
      .artifacts {{ display: flex; gap: 1rem; flex-wrap: wrap; }}
      figure {{ margin: 0; text-align: center; }}
    </style>
  </head>
  <body>
    <h1>Image Diff</h1>
    <form method="post" action="/" enctype="multipart/form-data">
      <input type="file" name="file_upload" accept="image/*" required>
      <button type="submit">Compare</button>
    </form>
{body}  </body>
</html>
"#
    )
}

/// Render a minimal error page
pub fn render_error(message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n  <head><meta charset=\"utf-8\"><title>Image Diff</title></head>\n  <body>\n    <h1>Comparison failed</h1>\n    <p class=\"error\">{}</p>\n    <p><a href=\"/\">Try again</a></p>\n  </body>\n</html>\n",
        escape(message)
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
