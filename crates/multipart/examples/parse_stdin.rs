//! Parses a `multipart/form-data` body read from stdin and logs every part.
//!
//! ```text
//! printf -- '--XYZ\r\nContent-Disposition: form-data; name="a"\r\n\r\nhello\r\n--XYZ--\r\n' \
//!     | cargo run --example parse_stdin -- XYZ
//! ```

use std::io;

use micro_multipart::{MultipartForm, ParseOptions};
use micro_stream::{BufferedReader, ReadSource};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let Some(boundary) = std::env::args().nth(1) else {
        error!("usage: parse_stdin <boundary>");
        return;
    };

    let reader = BufferedReader::new(ReadSource::new(io::stdin().lock()), None);
    let mut form = match MultipartForm::new(reader, boundary.as_bytes(), ParseOptions::default()) {
        Ok(form) => form,
        Err(e) => {
            error!(cause = %e, "invalid form setup");
            return;
        }
    };

    loop {
        let mut part = match form.next_part() {
            Ok(Some(part)) => part,
            Ok(None) => break,
            Err(e) => {
                error!(cause = %e, "malformed form");
                return;
            }
        };

        let name = part.name().unwrap_or_default().to_owned();
        let filename = part.filename().ok().flatten();
        let content_type = part.content_type().to_owned();
        match part.data() {
            Ok(data) => info!(name = %name, filename = ?filename, content_type = %content_type, size = data.len(), "parsed body part"),
            Err(e) => error!(name = %name, cause = %e, "failed to read body part"),
        }
    }
    info!("form parsed");
}
