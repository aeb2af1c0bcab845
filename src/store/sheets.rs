//! Google Sheets v4 worksheet as a [`RecordStore`].
//!
//! Row 1 holds the headers, records start at row 2 and keep their sheet row
//! number. Headers are matched ignoring case and accents; the result and code
//! columns are created after the last header when the worksheet lacks them.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{RecordStore, StoreError};
use crate::locator::fold;
use crate::state_machine::{
    AttendeeRecord, ProcessingResult, clean_document_number, parse_price, parse_quantity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    FirstName,
    LastName,
    Document,
    DocumentType,
    Email,
    Function,
    Sector,
    Tariff,
    Price,
    Quantity,
    Result,
    Code,
}

impl Column {
    const ALL: [Column; 12] = [
        Column::FirstName,
        Column::LastName,
        Column::Document,
        Column::DocumentType,
        Column::Email,
        Column::Function,
        Column::Sector,
        Column::Tariff,
        Column::Price,
        Column::Quantity,
        Column::Result,
        Column::Code,
    ];

    /// Accepted header titles; the first one is used when the column is created.
    fn titles(self) -> &'static [&'static str] {
        match self {
            Column::FirstName => &["Nombre"],
            Column::LastName => &["Apellido"],
            Column::Document => &["DNI", "Documento"],
            Column::DocumentType => &["Tipo", "Tipo de documento"],
            Column::Email => &["Mail", "Email", "Correo"],
            Column::Function => &["Función"],
            Column::Sector => &["Sector"],
            Column::Tariff => &["Tarifa"],
            Column::Price => &["Valor", "Precio"],
            Column::Quantity => &["Cantidad"],
            Column::Result => &["Resultado"],
            Column::Code => &["Código"],
        }
    }

    fn matches(self, header: &str) -> bool {
        let header = fold(header);
        self.titles().iter().any(|t| fold(t) == header)
    }
}

/// Column positions resolved from the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Layout {
    positions: HashMap<Column, usize>,
    /// Columns appended because the header row lacked them.
    created: Vec<(Column, usize)>,
}

impl Layout {
    fn from_headers(headers: &[String]) -> Result<Self, StoreError> {
        let mut positions = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(column) = Column::ALL
                .into_iter()
                .find(|c| !positions.contains_key(c) && c.matches(header))
            {
                positions.insert(column, idx);
            }
        }
        if !positions
            .keys()
            .any(|c| !matches!(c, Column::Result | Column::Code))
        {
            return Err(StoreError::Malformed(
                "header row has none of the expected columns".into(),
            ));
        }

        let last = headers.iter().rposition(|h| !h.trim().is_empty()).unwrap_or(0);
        let mut next = last + 1;
        let mut created = Vec::new();
        for column in [Column::Result, Column::Code] {
            if !positions.contains_key(&column) {
                positions.insert(column, next);
                created.push((column, next));
                next += 1;
            }
        }
        Ok(Self { positions, created })
    }

    fn cell<'a>(&self, row: &'a [String], column: Column) -> &'a str {
        self.positions
            .get(&column)
            .and_then(|&idx| row.get(idx))
            .map(|v| v.trim())
            .unwrap_or("")
    }

    fn position(&self, column: Column) -> usize {
        self.positions.get(&column).copied().unwrap_or_default()
    }

    fn record(&self, row: u32, cells: &[String]) -> AttendeeRecord {
        let optional = |column| {
            let value = self.cell(cells, column);
            (!value.is_empty()).then(|| value.to_string())
        };
        AttendeeRecord {
            row,
            first_name: self.cell(cells, Column::FirstName).to_string(),
            last_name: self.cell(cells, Column::LastName).to_string(),
            document_type: optional(Column::DocumentType),
            document_number: clean_document_number(self.cell(cells, Column::Document)),
            email: optional(Column::Email),
            function: optional(Column::Function),
            sector: optional(Column::Sector),
            tariff: optional(Column::Tariff),
            price: parse_price(self.cell(cells, Column::Price)),
            quantity: parse_quantity(self.cell(cells, Column::Quantity)),
            existing_code: optional(Column::Code),
        }
    }
}

/// A1 column letters: 0 is `A`, 26 is `AA`.
fn column_letter(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

/// Worksheet name as written in A1 notation; names beyond `[A-Za-z0-9_]` are quoted.
fn sheet_range(worksheet: &str) -> String {
    if !worksheet.is_empty() && worksheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        worksheet.to_string()
    } else {
        format!("'{}'", worksheet.replace('\'', "''"))
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateRequest {
    value_input_option: &'static str,
    data: Vec<CellUpdate>,
}

#[derive(Debug, Serialize)]
struct CellUpdate {
    range: String,
    values: Vec<Vec<String>>,
}

pub struct SheetsStore {
    client: Client,
    api_base: String,
    spreadsheet_id: String,
    worksheet: String,
    token: String,
    layout: Option<Layout>,
    rows: BTreeSet<u32>,
}

impl SheetsStore {
    pub fn new(
        api_base: &str,
        spreadsheet_id: &str,
        worksheet: &str,
        token: &str,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            worksheet: worksheet.to_string(),
            token: token.to_string(),
            layout: None,
            rows: BTreeSet::new(),
        })
    }

    fn url(&self, tail: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| StoreError::Malformed(format!("invalid api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Malformed("api base cannot hold a path".into()))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .extend(tail);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn batch_update(&self, data: Vec<CellUpdate>) -> Result<(), StoreError> {
        let url = self.url(&["values:batchUpdate"])?;
        let body = BatchUpdateRequest {
            value_input_option: "RAW",
            data,
        };
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    fn cell_update(&self, column: usize, row: u32, value: &str) -> CellUpdate {
        CellUpdate {
            range: format!("{}!{}{}", sheet_range(&self.worksheet), column_letter(column), row),
            values: vec![vec![value.to_string()]],
        }
    }
}

impl RecordStore for SheetsStore {
    async fn read_all(&mut self) -> Result<Vec<AttendeeRecord>, StoreError> {
        let range = sheet_range(&self.worksheet);
        let url = self.url(&["values", range.as_str()])?;
        debug!(%url, "reading worksheet");
        let response = self.client.get(url).bearer_auth(&self.token).send().await?;
        let range: ValueRange = Self::check(response).await?.json().await?;

        let mut rows = range.values.into_iter();
        let headers = rows
            .next()
            .ok_or_else(|| StoreError::Malformed(format!("worksheet {} is empty", self.worksheet)))?;
        let layout = Layout::from_headers(&headers)?;

        if !layout.created.is_empty() {
            let headers = layout
                .created
                .iter()
                .map(|&(column, idx)| self.cell_update(idx, 1, column.titles()[0]))
                .collect();
            self.batch_update(headers).await?;
        }

        let mut records = Vec::new();
        self.rows.clear();
        for (offset, cells) in rows.enumerate() {
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            let row = offset as u32 + 2;
            self.rows.insert(row);
            records.push(layout.record(row, &cells));
        }
        info!(worksheet = %self.worksheet, records = records.len(), "worksheet read");
        self.layout = Some(layout);
        Ok(records)
    }

    async fn write_status(
        &mut self,
        row: u32,
        result: &ProcessingResult,
    ) -> Result<(), StoreError> {
        let Some(layout) = &self.layout else {
            return Err(StoreError::UnknownRow(row));
        };
        if !self.rows.contains(&row) {
            return Err(StoreError::UnknownRow(row));
        }

        let mut data = vec![self.cell_update(
            layout.position(Column::Result),
            row,
            &result.status_label(),
        )];
        if let Some(code) = result.code() {
            data.push(self.cell_update(layout.position(Column::Code), row, code));
        }
        debug!(row, status = %result.status_label(), "writing result");
        self.batch_update(data).await
    }
}
