use crate::constants::logs::{
    COMPRESSED_SUFFIXES, DEFAULT_FILENAME, DEFAULT_MAX_LINES, DEFAULT_PAGE_SIZE, MAX_TAIL_BYTES,
};
use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::utils::sandbox::{relative_to_root, resolve_inside_root};
use crate::utils::text::escape_xml;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

static ISO_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[T ](\d{2}):(\d{2}):(\d{2})").expect("valid ISO prefix regex")
});

static SYSLOG_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z][a-z]{2})\s+(\d{1,2})\s+(\d{2}):(\d{2}):(\d{2})\b")
        .expect("valid syslog prefix regex")
});

static USER_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})(?:[Tt ](\d{2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?)?(?:[Zz]|[+-]\d{2}:?\d{2})?$",
    )
    .expect("valid user timestamp regex")
});

/// One request for local log lines.
///
/// `last_seconds` wins over `start`/`end`; without it `start` is required and
/// `end` defaults to now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogWindowQuery {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub last_seconds: Option<i64>,
    pub filename: String,
    pub max_lines: i64,
    pub page: i64,
    pub page_size: i64,
    pub match_pattern: Option<String>,
}

impl Default for LogWindowQuery {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            last_seconds: None,
            filename: DEFAULT_FILENAME.to_string(),
            max_lines: DEFAULT_MAX_LINES,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            match_pattern: None,
        }
    }
}

impl LogWindowQuery {
    pub fn resolve_window(&self, now: NaiveDateTime) -> Result<(NaiveDateTime, NaiveDateTime), ToolError> {
        let (start, end) = match self.last_seconds {
            Some(seconds) if seconds <= 0 => {
                return Err(ToolError::invalid_params("last_seconds must be > 0"));
            }
            Some(seconds) => {
                let span = Duration::try_seconds(seconds)
                    .ok_or_else(|| ToolError::invalid_params("last_seconds is out of range"))?;
                let start = now
                    .checked_sub_signed(span)
                    .ok_or_else(|| ToolError::invalid_params("last_seconds is out of range"))?;
                (start, now)
            }
            None => {
                let start = self.start.ok_or_else(|| {
                    ToolError::invalid_params("provide either (start, end) or last_seconds")
                })?;
                (start, self.end.unwrap_or(now))
            }
        };
        if end < start {
            return Err(ToolError::invalid_params("end must be >= start"));
        }
        Ok((start, end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogWindow {
    pub filename: String,
    pub captured_at: i64,
    pub filesize: u64,
    pub page_text: String,
}

impl LogWindow {
    pub fn to_xml(&self) -> String {
        format!(
            "<file-content filename=\"{}\" seconds=\"{}\" filesize=\"{}\" encoding=\"text\">{}</file-content>\n",
            escape_xml(&self.filename),
            self.captured_at,
            self.filesize,
            escape_xml(&self.page_text)
        )
    }
}

/// Time-window reader over files under one base directory.
#[derive(Debug, Clone)]
pub struct LogWindowService {
    base_dir: PathBuf,
    max_tail_bytes: u64,
    logger: Logger,
}

impl LogWindowService {
    pub fn new(base_dir: PathBuf, logger: Logger) -> Self {
        Self {
            base_dir,
            max_tail_bytes: MAX_TAIL_BYTES,
            logger: logger.child("logs"),
        }
    }

    pub fn with_max_tail_bytes(mut self, max_tail_bytes: u64) -> Self {
        self.max_tail_bytes = max_tail_bytes;
        self
    }

    /// Containment first, then the compressed-suffix, existence and
    /// regular-file checks.
    pub fn resolve_path(&self, filename: &str) -> Result<PathBuf, ToolError> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(ToolError::invalid_params("filename must be non-empty"));
        }
        let path = resolve_inside_root(&self.base_dir, filename, "filename")?;
        let compressed = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .filter(|ext| COMPRESSED_SUFFIXES.contains(&ext.as_str()));
        if let Some(ext) = compressed {
            return Err(ToolError::invalid_params(format!(
                "compressed .{} logs are not supported",
                ext
            )));
        }
        if !path.exists() {
            return Err(ToolError::not_found(format!("file does not exist: {}", path.display()))
                .with_code("LOG_NOT_FOUND"));
        }
        if !path.is_file() {
            return Err(ToolError::invalid_params(format!("not a file: {}", path.display())));
        }
        Ok(path)
    }

    pub fn extract(&self, query: &LogWindowQuery) -> Result<LogWindow, ToolError> {
        self.extract_at(query, Local::now().naive_local())
    }

    pub fn extract_at(&self, query: &LogWindowQuery, now: NaiveDateTime) -> Result<LogWindow, ToolError> {
        if query.page < 0 {
            return Err(ToolError::invalid_params("page must be >= 0"));
        }
        if query.page_size <= 0 {
            return Err(ToolError::invalid_params("page_size must be > 0"));
        }
        let (start, end) = query.resolve_window(now)?;
        let path = self.resolve_path(&query.filename)?;
        let text = read_tail(&path, self.max_tail_bytes)?;

        let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
        let matched = apply_match(&lines, query.match_pattern.as_deref());
        let in_window = filter_window(&matched, start, end);
        let selected = paginate(&in_window, query.max_lines, query.page, query.page_size);

        let mut page_text = selected.join("\n");
        if text.ends_with('\n') && !page_text.is_empty() {
            page_text.push('\n');
        }
        let filesize = std::fs::metadata(&path)?.len();
        let filename = relative_to_root(&self.base_dir, &path).display().to_string();

        self.logger.info(
            "log window read",
            Some(&serde_json::json!({
                "filename": filename,
                "start": start.to_string(),
                "end": end.to_string(),
                "lines": lines.len(),
                "in_window": in_window.len(),
                "returned": selected.len(),
                "page": query.page,
            })),
        );

        Ok(LogWindow {
            filename,
            captured_at: Utc::now().timestamp(),
            filesize,
            page_text,
        })
    }
}

/// Reads at most the last `max_bytes` of `path`. When the file is larger, the
/// partial first line is dropped. Invalid UTF-8 is replaced, never rejected.
pub fn read_tail(path: &Path, max_bytes: u64) -> Result<String, ToolError> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut data = Vec::new();
    if size > max_bytes {
        file.seek(SeekFrom::Start(size - max_bytes))?;
        let mut reader = BufReader::new(file.take(max_bytes));
        let mut partial = Vec::new();
        reader.read_until(b'\n', &mut partial)?;
        reader.read_to_end(&mut data)?;
    } else {
        file.read_to_end(&mut data)?;
    }
    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn month_number(abbrev: &str) -> Option<u32> {
    let month = match abbrev {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn number(caps: &regex::Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

/// Timestamp at the start of a log line: ISO (`2026-02-05T01:09:00`) or
/// syslog (`Feb  5 01:09:00`, year taken from `default_year`).
pub fn parse_timestamp(line: &str, default_year: i32) -> Option<NaiveDateTime> {
    if let Some(caps) = ISO_PREFIX.captures(line) {
        let year = caps.get(1)?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(year, number(&caps, 2)?, number(&caps, 3)?)?
            .and_hms_opt(number(&caps, 4)?, number(&caps, 5)?, number(&caps, 6)?);
    }
    let caps = SYSLOG_PREFIX.captures(line)?;
    let month = month_number(caps.get(1)?.as_str())?;
    NaiveDate::from_ymd_opt(default_year, month, number(&caps, 2)?)?.and_hms_opt(
        number(&caps, 3)?,
        number(&caps, 4)?,
        number(&caps, 5)?,
    )
}

/// Caller-supplied bound. Any `Z` or `±HH:MM` suffix is accepted and then
/// dropped: bounds are compared as local wall-clock time.
pub fn parse_user_timestamp(raw: &str, label: &str) -> Result<NaiveDateTime, ToolError> {
    let invalid = || {
        ToolError::invalid_params(format!("{} is not a valid ISO-8601 datetime: '{}'", label, raw))
            .with_hint("Use e.g. 2026-02-05T01:09:00Z or 2026-02-05 01:09.")
    };
    let trimmed = raw.trim();
    let caps = USER_TIMESTAMP.captures(trimmed).ok_or_else(invalid)?;
    let field = |index: usize| -> Result<u32, ToolError> {
        match caps.get(index) {
            Some(m) => m.as_str().parse().map_err(|_| invalid()),
            None => Ok(0),
        }
    };
    let year: i32 = caps[1].parse().map_err(|_| invalid())?;
    let nanos = match caps.get(7) {
        Some(frac) => {
            let digits = frac.as_str();
            let scaled = format!("{:0<9}", digits);
            scaled.parse::<u32>().map_err(|_| invalid())?
        }
        None => 0,
    };
    let (month, day) = (field(2)?, field(3)?);
    let (hour, minute, second) = (field(4)?, field(5)?, field(6)?);
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_nano_opt(hour, minute, second, nanos))
        .ok_or_else(invalid)
}

/// Lines whose timestamp falls within `[start, end]`; undated lines are dropped.
pub fn filter_window<'a>(lines: &[&'a str], start: NaiveDateTime, end: NaiveDateTime) -> Vec<&'a str> {
    let default_year = start.year();
    lines
        .iter()
        .copied()
        .filter(|line| {
            parse_timestamp(line, default_year)
                .map(|ts| start <= ts && ts <= end)
                .unwrap_or(false)
        })
        .collect()
}

/// Regex search when `pattern` compiles, plain substring match otherwise.
pub fn apply_match<'a>(lines: &[&'a str], pattern: Option<&str>) -> Vec<&'a str> {
    let Some(pattern) = pattern.map(str::trim).filter(|p| !p.is_empty()) else {
        return lines.to_vec();
    };
    match Regex::new(pattern) {
        Ok(regex) => lines.iter().copied().filter(|line| regex.is_match(line)).collect(),
        Err(_) => lines
            .iter()
            .copied()
            .filter(|line| line.contains(pattern))
            .collect(),
    }
}

/// Keeps the newest `max_lines` (all when `max_lines <= 0`), then counts
/// pages back from the end. Past the oldest line the page is empty.
pub fn paginate<'s, T>(lines: &'s [T], max_lines: i64, page: i64, page_size: i64) -> &'s [T] {
    let capped = match usize::try_from(max_lines) {
        Ok(cap) if cap > 0 && lines.len() > cap => &lines[lines.len() - cap..],
        _ => lines,
    };
    let (Ok(page), Ok(page_size)) = (usize::try_from(page), usize::try_from(page_size)) else {
        return &[];
    };
    let Some(end) = page
        .checked_mul(page_size)
        .and_then(|skip| capped.len().checked_sub(skip))
        .filter(|end| *end > 0)
    else {
        return &[];
    };
    &capped[end.saturating_sub(page_size)..end]
}
