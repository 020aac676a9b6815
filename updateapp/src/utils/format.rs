//! Text formatting helpers for the pages

use log::error;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const DECIMAL_POINT: i32 = 2;

const ONE_KB: i64 = 1024;
const MAX_BYTES: i64 = ONE_KB * ONE_KB * ONE_KB;
const SIZES: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human readable size with at most `decimal_point` decimals, trailing zeros
/// dropped. Sizes past a GB stay in GB.
pub fn format_file_size(bytes: i64, decimal_point: i32) -> String {
    if bytes <= 0 {
        return "0 Bytes".to_owned();
    }

    let point = decimal_point.clamp(0, 5) as usize;
    let mut data = bytes.min(MAX_BYTES);
    let mut index = 0;
    while data >= ONE_KB && index < SIZES.len() - 1 {
        data /= ONE_KB;
        index += 1;
    }

    let value = bytes as f64 / (ONE_KB as f64).powi(index as i32);
    let rounded: f64 = format!("{value:.point$}").parse().unwrap_or(value);
    format!("{rounded} {}", SIZES[index])
}

/// Replaces `%s`, `%d` and `%N$s` placeholders with `args`, in order of
/// appearance. Missing or empty arguments leave the placeholder empty.
pub fn format_str(message: &str, args: &[&str]) -> String {
    if message.is_empty() {
        return String::new();
    }

    let placeholder = match Regex::new(r"%s|%d|%[0-9]\$s") {
        Ok(placeholder) => placeholder,
        Err(e) => {
            error!("bad placeholder pattern: {e}");
            return message.to_owned();
        }
    };

    let mut formatted = String::with_capacity(message.len());
    let mut segments = placeholder.split(message).enumerate().peekable();
    while let Some((i, segment)) = segments.next() {
        formatted.push_str(segment);
        if segments.peek().is_some() {
            formatted.push_str(args.get(i).copied().unwrap_or_default());
        }
    }

    formatted
}

pub fn to_upper_case(text: &str) -> String {
    text.to_uppercase()
}

/// `ratio` as a whole percentage, `0.5` is `50%`
pub fn get_number_format(ratio: f64) -> String {
    format!("{}%", (ratio * 100.0).round() as i64)
}

/// Serializes `value` to json, empty when that fails
pub fn stringify<T: Serialize>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            error!("JSON.stringify failed: {e}");
            String::new()
        }
    }
}

pub fn parse_json<T: DeserializeOwned>(content: &str) -> Option<T> {
    if content.is_empty() {
        return None;
    }

    match serde_json::from_str(content) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("parseJson failed: {e}");
            None
        }
    }
}
