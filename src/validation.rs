//! Entry list loading and validation
//!
//! An entry list is a CSV file with a header row. Each data row becomes either
//! a [`FileEntry`] (format `CSV`/`XLS`) or a [`MetadataEntry`] (format `DB`).
//! Rows that fail validation are reported with their 1-based data row number
//! and never abort the load; only a header without the required columns does.

use std::collections::{HashMap, hash_map};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::ValidationConfig;
use crate::encoding::EncodingResolver;
use crate::error::{Error, Result};
use crate::types::{Entry, FileEntry, FileFormat, MetadataEntry, StatsDataId, ValidationResult};

/// Column holding the source URL
pub const URL_COLUMN: &str = "url";
/// Column holding the format token
pub const FORMAT_COLUMN: &str = "format";
/// Column holding the statistical table ID
pub const IDENTIFIER_COLUMN: &str = "identifier";
/// Accepted alternative name for [`IDENTIFIER_COLUMN`]
pub const IDENTIFIER_ALIAS: &str = "stats_data_id";
/// Optional column naming a per-entry subdirectory
pub const SURVEY_DATE_COLUMN: &str = "dataset__title__survey_date";

/// One unvalidated row, with empty cells already mapped to `None`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRow {
    /// `url` cell
    pub url: Option<String>,
    /// `format` cell
    pub format: Option<String>,
    /// `identifier` / `stats_data_id` cell
    pub stats_data_id: Option<String>,
    /// `title` cell
    pub title: Option<String>,
    /// `description` cell
    pub description: Option<String>,
    /// `dataset__title__survey_date` cell
    pub survey_date: Option<String>,
}

/// Header positions of the columns we read
#[derive(Debug)]
struct Columns {
    url: usize,
    format: usize,
    stats_data_id: usize,
    title: Option<usize>,
    description: Option<usize>,
    survey_date: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let url = position(URL_COLUMN);
        let format = position(FORMAT_COLUMN);
        let stats_data_id = position(IDENTIFIER_COLUMN).or_else(|| position(IDENTIFIER_ALIAS));

        match (url, format, stats_data_id) {
            (Some(url), Some(format), Some(stats_data_id)) => Ok(Self {
                url,
                format,
                stats_data_id,
                title: position("title"),
                description: position("description"),
                survey_date: position(SURVEY_DATE_COLUMN),
            }),
            _ => {
                let missing = [
                    (URL_COLUMN, url),
                    (FORMAT_COLUMN, format),
                    (IDENTIFIER_COLUMN, stats_data_id),
                ]
                .into_iter()
                .filter(|(_, found)| found.is_none())
                .map(|(name, _)| name.to_string())
                .collect();
                Err(Error::Schema { missing })
            }
        }
    }

    fn row(&self, record: &csv::StringRecord) -> RawRow {
        let raw = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        // Key cells only; free text is passed through as written
        let trimmed = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        RawRow {
            url: trimmed(Some(self.url)),
            format: trimmed(Some(self.format)),
            stats_data_id: trimmed(Some(self.stats_data_id)),
            title: raw(self.title),
            description: raw(self.description),
            survey_date: trimmed(self.survey_date),
        }
    }
}

/// Load an entry list from disk and validate every row
///
/// The file is read as UTF-8 (a leading BOM is allowed). Lists that are not
/// valid UTF-8, such as Shift-JIS exports from spreadsheet tools, are decoded
/// through the content-first [`EncodingResolver`].
///
/// # Errors
///
/// Returns [`Error::Schema`] when the header lacks `url`, `format` or
/// `identifier` (`stats_data_id`), and I/O, CSV or encoding errors when the
/// file cannot be read at all. Invalid rows are not errors.
pub fn load_and_validate_csv(path: &Path, config: &ValidationConfig) -> Result<ValidationResult> {
    let bytes = std::fs::read(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read entry list '{}': {}", path.display(), e),
        ))
    })?;
    let text = decode_entry_list(&bytes)?;

    let result = validate_records(text.as_bytes(), config)?;
    tracing::info!(
        path = %path.display(),
        valid = result.valid_count(),
        invalid = result.invalid_rows.len(),
        "Validated entry list"
    );
    Ok(result)
}

/// Parse CSV from `reader` and validate every data row
///
/// Data rows are numbered from 1; the header row is the implicit row 0.
pub fn validate_records<R: Read>(reader: R, config: &ValidationConfig) -> Result<ValidationResult> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let columns = Columns::from_headers(reader.headers()?)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(columns.row(&record?));
    }

    Ok(validate_rows(rows, config))
}

/// Validate already-split rows, numbering them from 1
///
/// A row whose output file (batch-relative path) was already claimed by an
/// earlier valid row is rejected, so no two entries write the same file.
pub fn validate_rows(
    rows: impl IntoIterator<Item = RawRow>,
    config: &ValidationConfig,
) -> ValidationResult {
    let mut result = ValidationResult::default();
    let mut claims = DestinationClaims::default();

    for (idx, row) in rows.into_iter().enumerate() {
        let row_number = idx + 1;
        let validated = validate_row(&row, config).and_then(|entry| {
            claims.claim(&entry, row_number).map_err(|e| vec![e])?;
            Ok(entry)
        });
        match validated {
            Ok(Entry::File(entry)) => result.file_entries.push(entry),
            Ok(Entry::Metadata(entry)) => result.metadata_entries.push(entry),
            Err(errors) => {
                let message = errors.join("; ");
                tracing::debug!(row = row_number, error = %message, "Invalid entry row");
                result.invalid_rows.push((row_number, message));
            }
        }
    }

    result
}

/// Build an [`Entry`] from one row, dispatching on its format
///
/// `DB` rows become metadata entries; every other row is treated as a file
/// entry and needs a URL. All problems with the row are reported together,
/// in the order format, url, identifier, survey date.
pub fn validate_row(
    row: &RawRow,
    config: &ValidationConfig,
) -> std::result::Result<Entry, Vec<String>> {
    let mut errors = Vec::new();

    let format = match row.format.as_deref() {
        None => {
            errors.push("format is required".to_string());
            None
        }
        Some(token) => {
            let parsed = FileFormat::parse(token);
            if parsed.is_none() {
                errors.push(format!("format must be one of CSV, XLS, DB (got '{token}')"));
            }
            parsed
        }
    };

    if format == Some(FileFormat::Db) {
        let stats_data_id = validate_identifier(row.stats_data_id.as_deref(), &mut errors);
        return match stats_data_id {
            Some(stats_data_id) if errors.is_empty() => Ok(Entry::Metadata(MetadataEntry {
                stats_data_id,
                title: row.title.clone(),
                description: row.description.clone(),
            })),
            _ => Err(errors),
        };
    }

    let url = match row.url.as_deref() {
        None => {
            let kind = row.format.as_deref().unwrap_or("file");
            errors.push(format!("url is required for {kind} entries"));
            None
        }
        Some(raw) => match validate_url(raw, &config.provider_domain) {
            Ok(url) => Some(url),
            Err(e) => {
                errors.push(e);
                None
            }
        },
    };

    let stats_data_id = validate_identifier(row.stats_data_id.as_deref(), &mut errors);

    if let Some(date) = row.survey_date.as_deref()
        && !is_single_path_segment(date)
    {
        errors.push("survey date must be a single path segment".to_string());
    }

    match (format, url, stats_data_id) {
        (Some(format), Some(url), Some(stats_data_id)) if errors.is_empty() => {
            Ok(Entry::File(FileEntry {
                url,
                format,
                stats_data_id,
                title: row.title.clone(),
                description: row.description.clone(),
                survey_date: row.survey_date.clone(),
            }))
        }
        _ => Err(errors),
    }
}

fn validate_identifier(raw: Option<&str>, errors: &mut Vec<String>) -> Option<StatsDataId> {
    match StatsDataId::parse(raw.unwrap_or_default()) {
        Ok(id) => Some(id),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

/// Parse `raw` and check that its host is `domain` or a subdomain of it
pub fn validate_url(raw: &str, domain: &str) -> std::result::Result<url::Url, String> {
    let url = url::Url::parse(raw).map_err(|e| format!("invalid URL: {e}"))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!(
            "invalid URL: scheme must be http or https (got '{}')",
            url.scheme()
        ));
    }

    let host = url
        .host_str()
        .ok_or_else(|| "invalid URL: missing host".to_string())?
        .to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();

    let in_domain = host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'));
    if !in_domain {
        return Err(format!("URL must be from {domain} domain"));
    }

    Ok(url)
}

/// Batch-relative output paths already taken, with the row that took each
#[derive(Debug, Default)]
pub(crate) struct DestinationClaims {
    claimed: HashMap<PathBuf, usize>,
}

impl DestinationClaims {
    /// Reserve `entry`'s output file for `row`, or name the row that already has it
    pub(crate) fn claim(&mut self, entry: &Entry, row: usize) -> std::result::Result<(), String> {
        match self.claimed.entry(relative_destination(entry)) {
            hash_map::Entry::Occupied(first) => Err(format!(
                "duplicate entry: same output file as row {}",
                first.get()
            )),
            hash_map::Entry::Vacant(slot) => {
                slot.insert(row);
                Ok(())
            }
        }
    }
}

/// Output path of `entry` relative to its batch directory
fn relative_destination(entry: &Entry) -> PathBuf {
    match entry {
        Entry::File(FileEntry {
            survey_date: Some(date),
            ..
        }) => Path::new(date).join(entry.filename()),
        _ => PathBuf::from(entry.filename()),
    }
}

fn is_single_path_segment(value: &str) -> bool {
    !value.contains(['/', '\\']) && value != "." && value != ".."
}

fn decode_entry_list(bytes: &[u8]) -> Result<String> {
    let without_bom = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(without_bom) {
        return Ok(text.to_string());
    }

    let decoded = EncodingResolver::content_first().decode(bytes, None)?;
    tracing::info!(
        encoding = decoded.detection.encoding.name(),
        "Entry list is not UTF-8, decoded with detected encoding"
    );
    Ok(decoded.text)
}
