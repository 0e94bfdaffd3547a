//! # Spreadsheet
//!
//! Spreadsheet-generation collaborator used by the step executor's tool-call
//! loop. The bundled implementation writes one CSV file per sheet into a
//! per-request directory under the configured output directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::gateway::ToolDefinition;

/// Tool name exposed to the model
pub const GENERATE_SPREADSHEET: &str = "generate_spreadsheet";

/// One sheet of a workbook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// Result of a generate call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetOutput {
    pub success: bool,
    pub download_url: String,
    pub filename: String,
}

#[async_trait]
pub trait SpreadsheetGenerator: Send + Sync {
    async fn generate(&self, sheets: Vec<Sheet>) -> Result<SpreadsheetOutput>;
}

/// Tool definition advertised to the gateway during the tool-call loop
pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: GENERATE_SPREADSHEET.to_string(),
        description: "Create a spreadsheet file from one or more sheets of tabular data. \
                      Returns a download URL."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "sheets": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "headers": {"type": "array", "items": {"type": "string"}},
                            "rows": {"type": "array", "items": {"type": "array"}}
                        },
                        "required": ["name", "headers", "rows"]
                    }
                }
            },
            "required": ["sheets"]
        }),
    }
}

/// Writes sheets as CSV files
pub struct CsvBundleWriter {
    output_dir: PathBuf,
    url_prefix: String,
}

impl CsvBundleWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            url_prefix: "/files".to_string(),
        }
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }
}

fn csv_cell(value: &Value) -> String {
    let raw = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}

/// Render a sheet as CSV text
pub fn render_csv(sheet: &Sheet) -> String {
    let mut out = String::new();
    if !sheet.headers.is_empty() {
        let header: Vec<String> = sheet
            .headers
            .iter()
            .map(|h| csv_cell(&Value::String(h.clone())))
            .collect();
        out.push_str(&header.join(","));
        out.push('\n');
    }
    for row in &sheet.rows {
        let cells: Vec<String> = row.iter().map(csv_cell).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if stem.trim_matches('_').is_empty() {
        "sheet".to_string()
    } else {
        stem
    }
}

#[async_trait]
impl SpreadsheetGenerator for CsvBundleWriter {
    async fn generate(&self, sheets: Vec<Sheet>) -> Result<SpreadsheetOutput> {
        if sheets.is_empty() {
            anyhow::bail!("No sheets supplied");
        }

        let bundle = format!(
            "workbook-{}",
            uuid::Uuid::new_v4().to_string().split('-').next().unwrap_or("0")
        );
        let dir = self.output_dir.join(&bundle);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        for (i, sheet) in sheets.iter().enumerate() {
            let path = dir.join(format!("{:02}-{}.csv", i + 1, file_stem(&sheet.name)));
            tokio::fs::write(&path, render_csv(sheet))
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        tracing::debug!("wrote {} sheet(s) to {}", sheets.len(), dir.display());

        Ok(SpreadsheetOutput {
            success: true,
            download_url: format!("{}/{}", self.url_prefix.trim_end_matches('/'), bundle),
            filename: bundle,
        })
    }
}
