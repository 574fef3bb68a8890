// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! File output writers: TXT, CSV and JSON-lines.
//!
//! Files open in append mode; headers are written only when the file is
//! fresh. Writers receive complete snapshots and serialize their own
//! stream; a write failure is logged and the scan continues.

use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::errors::{ScannerError, ScannerResult};
use crate::types::TargetResult;
use crate::wappalyzer::Technologies;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Txt,
    Csv,
    Json,
}

/// Pick the output format from the `--json` flag and the file extension.
pub fn detect_format(json_output: bool, output_path: &str) -> OutputFormat {
    if json_output {
        return OutputFormat::Json;
    }
    match Path::new(output_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("csv") => OutputFormat::Csv,
        Some("json") | Some("jsonl") => OutputFormat::Json,
        _ => OutputFormat::Txt,
    }
}

/// Flat, serializable view of one finished target.
#[derive(Debug, Serialize)]
pub struct ResultRecord {
    pub url: String,
    pub status_code: i64,
    pub title: String,
    pub server: String,
    pub finger_ids: Vec<String>,
    pub finger_names: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub headers: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wappalyzer: Option<Technologies>,
    pub match_result: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub remark: String,
}

impl ResultRecord {
    pub fn from_target(result: &TargetResult) -> Self {
        let finger_ids: Vec<String> = result
            .matches
            .iter()
            .map(|m| m.finger.id.clone())
            .collect();
        let finger_names: Vec<String> = result
            .matches
            .iter()
            .map(|m| m.finger.info.name.clone())
            .collect();
        let headers = result
            .last_response
            .as_ref()
            .map(|resp| resp.raw_header_str())
            .unwrap_or_default();

        Self {
            url: result.url.clone(),
            status_code: result.status_code,
            title: result.title.clone(),
            server: result.server.server_type.clone(),
            remark: format!("发现{}个指纹", finger_ids.len()),
            finger_ids,
            finger_names,
            headers,
            wappalyzer: result.wappalyzer.clone(),
            match_result: result.matched(),
        }
    }

    /// One JSON object per target per line.
    pub fn to_json_line(&self) -> ScannerResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ScannerError::Output(format!("JSON serialization failed: {}", e)))
    }
}

pub struct ResultWriter {
    format: OutputFormat,
    file: Mutex<File>,
}

const CSV_HEADER: &[&str] = &[
    "URL",
    "状态码",
    "标题",
    "服务器信息",
    "指纹ID",
    "指纹名称",
    "响应头",
    "匹配结果",
    "备注",
];

impl ResultWriter {
    /// Open (or create) the output file and write the header when fresh.
    pub fn create(path: &str, format: OutputFormat) -> ScannerResult<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ScannerError::Output(format!("create output dir: {}", e)))?;
            }
        }

        let fresh = !Path::new(path).exists();
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| ScannerError::Output(format!("open output file: {}", e)))?;

        if fresh {
            match format {
                OutputFormat::Csv => {
                    let mut csv_writer = csv::Writer::from_writer(Vec::new());
                    csv_writer
                        .write_record(CSV_HEADER)
                        .map_err(|e| ScannerError::Output(e.to_string()))?;
                    let bytes = csv_writer
                        .into_inner()
                        .map_err(|e| ScannerError::Output(e.to_string()))?;
                    file.write_all(&bytes)
                        .map_err(|e| ScannerError::Output(e.to_string()))?;
                }
                OutputFormat::Json => {}
                OutputFormat::Txt => {}
            }
        }

        Ok(Self {
            format,
            file: Mutex::new(file),
        })
    }

    pub fn write_record(&self, record: &ResultRecord) -> ScannerResult<()> {
        let payload = match self.format {
            OutputFormat::Json => {
                let mut line = record.to_json_line()?;
                line.push('\n');
                line.into_bytes()
            }
            OutputFormat::Csv => {
                let status = record.status_code.to_string();
                let ids = format!("[{}]", record.finger_ids.join("，"));
                let names = format!("[{}]", record.finger_names.join("，"));
                // embedded newlines escape so one row stays one line
                let headers = record.headers.replace('\n', "\\n");
                let matched = record.match_result.to_string();

                let mut csv_writer = csv::Writer::from_writer(Vec::new());
                csv_writer
                    .write_record([
                        record.url.as_str(),
                        status.as_str(),
                        record.title.as_str(),
                        record.server.as_str(),
                        ids.as_str(),
                        names.as_str(),
                        headers.as_str(),
                        matched.as_str(),
                        record.remark.as_str(),
                    ])
                    .map_err(|e| ScannerError::Output(e.to_string()))?;
                csv_writer
                    .into_inner()
                    .map_err(|e| ScannerError::Output(e.to_string()))?
            }
            OutputFormat::Txt => {
                let mut text = String::with_capacity(512 + record.headers.len());
                text.push_str(&format!("URL: {}\n", record.url));
                text.push_str(&format!("状态码: {}\n", record.status_code));
                text.push_str(&format!("标题: {}\n", record.title));
                text.push_str(&format!("服务器: {}\n", record.server));
                text.push_str(&format!("指纹ID: [{}]\n", record.finger_ids.join("，")));
                text.push_str(&format!("指纹名称: [{}]\n", record.finger_names.join("，")));
                text.push_str(&format!("匹配结果: {}\n", record.match_result));
                text.push_str(&format!("备注: {}\n", record.remark));
                text.push_str(&format!("响应头:\n{}\n", record.headers));
                text.push_str(&"-".repeat(100));
                text.push('\n');
                text.into_bytes()
            }
        };

        let mut file = self.file.lock();
        file.write_all(&payload)
            .map_err(|e| ScannerError::Output(e.to_string()))?;
        file.flush()
            .map_err(|e| ScannerError::Output(e.to_string()))?;
        Ok(())
    }
}
