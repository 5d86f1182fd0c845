use std::{fs, io, path::Path};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("reading URL list {path}: {source}")]
    Read { path: String, source: io::Error },
}

/// Parse a URL list: one URL per line, blank lines and `#` comments ignored.
/// Lines that aren't absolute http(s) URLs are logged and skipped.
pub fn parse_url_list(text: &str) -> Vec<Url> {
    text.trim_start_matches('\u{feff}')
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            match Url::parse(line) {
                Ok(u) if matches!(u.scheme(), "http" | "https") => Some(u),
                Ok(u) => {
                    warn!(line = i + 1, scheme = u.scheme(), "Skipping URL with unsupported scheme");
                    None
                }
                Err(e) => {
                    warn!(line = i + 1, err = %e, value = line, "Skipping invalid URL");
                    None
                }
            }
        })
        .collect()
}

pub fn read_url_list(path: &Path) -> Result<Vec<Url>, InputError> {
    let text = fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let urls = parse_url_list(&text);
    debug!(path = %path.display(), count = urls.len(), "Loaded URL list");
    Ok(urls)
}
