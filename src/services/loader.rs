use crate::core::{CsvImportOptions, DataSource, Dataset, Record, Value};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Failure while loading the CSV document
///
/// A failed load is terminal for the session: nothing retries it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to fetch {location}: {message}")]
    NetworkFetch { location: String, message: String },

    #[error("failed to parse CSV: {message}")]
    Parse { message: String },
}

impl LoadError {
    fn fetch(source: &DataSource, err: impl std::fmt::Display) -> Self {
        Self::NetworkFetch {
            location: source.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for LoadError {
    fn from(err: csv::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}

/// Fetch the raw body of the source
///
/// Bytes are passed through untouched so decoding problems surface as parse errors.
pub async fn fetch_bytes(source: &DataSource) -> Result<Vec<u8>, LoadError> {
    match source {
        DataSource::File(path) => tokio::fs::read(path)
            .await
            .map_err(|e| LoadError::fetch(source, e)),
        DataSource::Url(url) => {
            let response = reqwest::Client::new()
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| LoadError::fetch(source, e))?;
            let body = response
                .bytes()
                .await
                .map_err(|e| LoadError::fetch(source, e))?;
            Ok(body.to_vec())
        }
    }
}

/// Parse CSV text with a header row into a dataset, inferring cell types
pub fn parse_csv(text: &str) -> Result<Dataset, LoadError> {
    parse_csv_with(text.as_bytes(), &CsvImportOptions::default())
}

pub fn parse_csv_with(input: &[u8], options: &CsvImportOptions) -> Result<Dataset, LoadError> {
    if let Some(line) = unterminated_quote(input, options) {
        return Err(LoadError::Parse {
            message: format!("unterminated quoted field starting on line {}", line),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(options.delimiter)
        .quote(options.quote_char)
        .from_reader(input);

    let headers = unique_headers(reader.headers()?.iter());

    if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
        return Ok(Dataset::empty());
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        if row.len() > headers.len() {
            debug!(
                "Row {} has {} cells but header has {}; extra cells dropped",
                line + 1,
                row.len(),
                headers.len()
            );
        }

        let mut record = Record::with_capacity(headers.len());
        for (i, key) in headers.iter().enumerate() {
            let value = row.get(i).map(Value::infer).unwrap_or(Value::Null);
            record.insert(key.clone(), value);
        }
        records.push(record);
    }

    Ok(Dataset::new(headers, records))
}

/// Trimmed header names; a repeated name gets a `_1`, `_2`, ... suffix
fn unique_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for (i, h) in raw.enumerate() {
        let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
        let base = h.trim();
        let mut name = base.to_string();
        let mut n = 0;
        while headers.contains(&name) {
            n += 1;
            name = format!("{}_{}", base, n);
        }
        if n > 0 {
            debug!("Duplicate header '{}' renamed to '{}'", base, name);
        }
        headers.push(name);
    }
    headers
}

/// Line on which a quoted field opens and never closes
///
/// Follows the reader's quoting rules: a quote only opens a field at its
/// start and a doubled quote inside it is an escaped quote.
fn unterminated_quote(input: &[u8], options: &CsvImportOptions) -> Option<usize> {
    let quote = options.quote_char;
    let input = input.strip_prefix(b"\xef\xbb\xbf").unwrap_or(input);
    let mut bytes = input.iter().copied().peekable();
    let mut line = 1;
    let mut open_since = None;
    let mut field_start = true;

    while let Some(b) = bytes.next() {
        if open_since.is_some() {
            if b == quote {
                if bytes.peek() == Some(&quote) {
                    bytes.next();
                } else {
                    open_since = None;
                    field_start = false;
                }
            }
        } else if field_start && b == quote {
            open_since = Some(line);
            field_start = false;
        } else {
            field_start = b == options.delimiter || b == b'\n' || b == b'\r';
        }
        if b == b'\n' {
            line += 1;
        }
    }
    open_since
}

/// Fetch then parse
pub async fn load(source: &DataSource, options: &CsvImportOptions) -> Result<Dataset, LoadError> {
    let body = fetch_bytes(source).await?;
    parse_csv_with(&body, options)
}

/// Outcome of a background load
#[derive(Debug)]
pub enum LoadEvent {
    Loaded(Dataset),
    Failed(LoadError),
}

/// Handle to an in-flight background load
///
/// Dropping the handle cancels the load.
#[derive(Debug)]
pub struct LoadTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    events: UnboundedReceiver<LoadEvent>,
}

impl LoadTask {
    /// Non-blocking check for the load outcome
    pub fn try_next(&mut self) -> Option<LoadEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the load outcome
    pub async fn next_event(&mut self) -> Option<LoadEvent> {
        self.events.recv().await
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

impl Drop for LoadTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Start loading `source` on the given runtime
pub fn spawn_load(runtime: &Handle, source: DataSource, options: CsvImportOptions) -> LoadTask {
    let (tx, events) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = runtime.spawn(async move {
        info!("Loading CSV from {}", source);
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Load of {} cancelled", source);
            }
            result = load(&source, &options) => {
                let event = match result {
                    Ok(dataset) => {
                        info!(
                            "Loaded {} records with {} columns from {}",
                            dataset.len(),
                            dataset.headers().len(),
                            source
                        );
                        LoadEvent::Loaded(dataset)
                    }
                    Err(err) => {
                        error!("Error loading CSV: {}", err);
                        LoadEvent::Failed(err)
                    }
                };
                // Receiver gone means the view was torn down
                let _ = tx.send(event);
            }
        }
    });

    LoadTask {
        cancel,
        handle,
        events,
    }
}
