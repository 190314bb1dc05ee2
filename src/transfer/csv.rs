//! CSV encoding and decoding, RFC 4180 style.
//!
//! Fields containing the delimiter, a quote or a line break are quoted,
//! with embedded quotes doubled. The delimiter is configurable (default
//! `,`). Parsing trims surrounding whitespace on unquoted fields only
//! and silently skips any data row whose column count does not match
//! the header's.

use tracing::warn;

use crate::billing::{format_amount, AggregateCost, TariffConfig};
use crate::teams::{ClientType, Team};

use super::TransferError;

/// Fixed leading columns of a team CSV, before the per-microscope
/// session columns.
const TEAM_HEADERS: [&str; 4] = ["name", "laboratory", "clientType", "projectName"];

/// Quote a field if it needs quoting under the given delimiter.
#[must_use]
pub fn escape_field(field: &str, delimiter: char) -> String {
    if field.contains(delimiter) || field.contains('"') || field.contains('\n') || field.contains('\r')
    {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render a header and data rows as CSV text.
#[must_use]
pub fn write_csv(headers: &[String], rows: &[Vec<String>], delimiter: char) -> String {
    let mut out = String::new();
    let delim = delimiter.to_string();
    let render = |fields: &[String]| {
        fields
            .iter()
            .map(|f| escape_field(f, delimiter))
            .collect::<Vec<_>>()
            .join(&delim)
    };

    out.push_str(&render(headers));
    out.push('\n');
    for row in rows {
        out.push_str(&render(row));
        out.push('\n');
    }
    out
}

/// A parsed CSV document: header plus the data rows that matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvDocument {
    /// First line of the input.
    pub header: Vec<String>,
    /// Data rows whose column count matches the header; others are
    /// dropped silently.
    pub rows: Vec<Vec<String>>,
}

/// Parse CSV text. Unquoted fields are trimmed; quoted fields keep
/// their whitespace. Quoting follows RFC 4180 with doubled-quote
/// escaping, and quoted fields may span lines.
pub fn parse_csv(text: &str, delimiter: char) -> Result<CsvDocument, TransferError> {
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_quoted = false;
    let mut chars = text.chars().peekable();
    let mut row_started = false;

    fn finish_field(field: &mut String, field_quoted: &mut bool) -> String {
        let value = if *field_quoted {
            std::mem::take(field)
        } else {
            field.trim().to_string()
        };
        field.clear();
        *field_quoted = false;
        value
    }

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                field_quoted = true;
                row_started = true;
            }
            '\r' => {}
            '\n' => {
                if row_started || !field.is_empty() || !row.is_empty() {
                    row.push(finish_field(&mut field, &mut field_quoted));
                    records.push(std::mem::take(&mut row));
                    row_started = false;
                }
            }
            c if c == delimiter => {
                row.push(finish_field(&mut field, &mut field_quoted));
                row_started = true;
            }
            c => {
                field.push(c);
                row_started = true;
            }
        }
    }
    if row_started || !field.is_empty() || !row.is_empty() {
        row.push(finish_field(&mut field, &mut field_quoted));
        records.push(row);
    }

    let mut records = records.into_iter();
    let Some(header) = records.next() else {
        return Err(TransferError::EmptyCsv);
    };
    let expected = header.len();
    let rows = records
        .filter(|row| {
            if row.len() == expected {
                true
            } else {
                warn!(
                    expected,
                    got = row.len(),
                    "skipping CSV row with mismatched column count"
                );
                false
            }
        })
        .collect();

    Ok(CsvDocument { header, rows })
}

/// Render teams as CSV: the fixed columns followed by one session column
/// per configured microscope.
#[must_use]
pub fn teams_to_csv(teams: &[Team], config: &TariffConfig, delimiter: char) -> String {
    let mut headers: Vec<String> = TEAM_HEADERS.iter().map(ToString::to_string).collect();
    headers.extend(config.microscopes.iter().cloned());

    let rows: Vec<Vec<String>> = teams
        .iter()
        .map(|team| {
            let mut row = vec![
                team.name.clone(),
                team.laboratory.clone(),
                team.client_type.as_str().to_string(),
                team.project_name.clone().unwrap_or_default(),
            ];
            for index in 0..config.microscopes.len() {
                let sessions = team.microscope_sessions.get(index).copied().unwrap_or(0);
                row.push(sessions.to_string());
            }
            row
        })
        .collect();

    write_csv(&headers, &rows, delimiter)
}

/// Parse teams from CSV produced by [`teams_to_csv`] (or hand-edited in
/// that shape). Session columns are matched to the configuration by
/// header name; rows with an unparseable client type are skipped with a
/// warning rather than failing the whole import.
pub fn teams_from_csv(
    text: &str,
    config: &TariffConfig,
    delimiter: char,
) -> Result<Vec<Team>, TransferError> {
    let document = parse_csv(text, delimiter)?;
    for (position, expected) in TEAM_HEADERS.iter().enumerate() {
        if document
            .header
            .get(position)
            .map(|h| h.eq_ignore_ascii_case(expected))
            != Some(true)
        {
            return Err(TransferError::InvalidCsv(format!(
                "column {} must be '{expected}'",
                position + 1
            )));
        }
    }

    // Map each configured microscope to its column, if present.
    let session_columns: Vec<Option<usize>> = config
        .microscopes
        .iter()
        .map(|name| document.header.iter().position(|h| h == name))
        .collect();

    let mut teams = Vec::new();
    for row in &document.rows {
        let client_type: ClientType = match row[2].parse() {
            Ok(client_type) => client_type,
            Err(error) => {
                warn!(team = %row[0], %error, "skipping CSV row");
                continue;
            }
        };
        let project_name = if row[3].is_empty() {
            None
        } else {
            Some(row[3].clone())
        };
        let microscope_sessions = session_columns
            .iter()
            .map(|column| {
                column
                    .and_then(|index| row.get(index))
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(0)
            })
            .collect();

        teams.push(Team {
            name: row[0].clone(),
            laboratory: row[1].clone(),
            client_type,
            project_name,
            microscope_sessions,
            manipulations: Vec::new(),
            date: None,
        });
    }
    Ok(teams)
}

/// Render an aggregate report as CSV, groups sorted by amount
/// descending within each category.
#[must_use]
pub fn report_to_csv(aggregate: &AggregateCost, delimiter: char) -> String {
    let headers: Vec<String> = ["category", "name", "quantity", "amount"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let mut rows: Vec<Vec<String>> = Vec::new();

    let mut push_sorted = |category: &str, mut entries: Vec<(String, u64, f64)>| {
        entries.sort_by(|a, b| b.2.total_cmp(&a.2));
        for (name, quantity, amount) in entries {
            rows.push(vec![
                category.to_string(),
                name,
                quantity.to_string(),
                format_amount(amount),
            ]);
        }
    };

    push_sorted(
        "type",
        aggregate
            .by_type
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.count as u64, v.amount))
            .collect(),
    );
    push_sorted(
        "laboratory",
        aggregate
            .by_laboratory
            .iter()
            .map(|(k, v)| (k.clone(), v.count as u64, v.amount))
            .collect(),
    );
    push_sorted(
        "microscope",
        aggregate
            .by_microscope
            .iter()
            .map(|(k, v)| (k.clone(), v.quantity, v.amount))
            .collect(),
    );
    push_sorted(
        "service",
        aggregate
            .by_service
            .iter()
            .map(|(k, v)| (k.clone(), v.quantity, v.amount))
            .collect(),
    );

    rows.push(vec![
        "total".to_string(),
        "subtotal".to_string(),
        String::new(),
        format_amount(aggregate.subtotal),
    ]);
    rows.push(vec![
        "total".to_string(),
        "vat".to_string(),
        String::new(),
        format_amount(aggregate.vat),
    ]);
    rows.push(vec![
        "total".to_string(),
        "total".to_string(),
        String::new(),
        format_amount(aggregate.total),
    ]);

    write_csv(&headers, &rows, delimiter)
}
