//! # image-diff CLI
//!
//! Command-line interface for the image comparison service.
//!
//! ## Usage
//! ```bash
//! image-diff serve --bind 0.0.0.0:8000
//! image-diff compare reference.jpg candidate.jpg --output json
//! ```

mod cli;

use image_diff::Result;

fn main() -> Result<()> {
    cli::run()
}
