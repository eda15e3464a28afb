//! 数据模型模块
//! 用户、会话与健身资源（目标、身体指标、训练）

pub mod auth;
pub mod goal;
pub mod metric;
pub mod user;
pub mod workout;

use chrono::NaiveDate;
use validator::ValidationError;

use crate::error::AppError;

/// Calendar dates travel as `YYYY-MM-DD`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Rejects strings that are empty after trimming.
pub(crate) fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// Rejects strings that do not parse as a decimal number.
pub(crate) fn numeric(value: &str) -> Result<(), ValidationError> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(()),
        _ => Err(ValidationError::new("numeric")),
    }
}

/// Parse a `YYYY-MM-DD` field; `label` names the field in the error.
pub(crate) fn parse_date(value: &str, label: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| AppError::Validation(format!("{} must be in YYYY-MM-DD format", label)))
}

/// Same as [`parse_date`] but treats a missing or blank value as absent.
pub(crate) fn parse_optional_date(
    value: Option<&str>,
    label: &str,
) -> Result<Option<NaiveDate>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_date(v, label).map(Some),
    }
}

/// Blank optional strings are stored as absent.
pub(crate) fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
