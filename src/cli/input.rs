//! Parsing of turn input given on the command line

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::path::Path;

use crate::agent::PendingItem;
use crate::error::{ErrorCode, FitpalError, Result};

/// Contents of a `--file` turn input
#[derive(Debug, Clone, Deserialize)]
pub struct TurnInput {
    pub items: Vec<PendingItem>,
    #[serde(default)]
    pub consumed_at: Option<DateTime<Utc>>,
    /// Applies to every item that names no meal of its own
    #[serde(default)]
    pub meal_type: Option<String>,
}

impl TurnInput {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            FitpalError::validation_with_code(
                ErrorCode::VALIDATION_INVALID_INPUT,
                format!("{} is not a valid turn input: {}", path.display(), e),
                Some("file".to_string()),
            )
        })
    }

    pub fn into_items(self) -> Vec<PendingItem> {
        let meal_type = self.meal_type;
        self.items
            .into_iter()
            .map(|mut item| {
                if item.meal_type.is_none() {
                    item.meal_type = meal_type.clone();
                }
                item
            })
            .collect()
    }
}

fn invalid_item(spec: &str, reason: &str) -> FitpalError {
    FitpalError::validation_with_code(
        ErrorCode::VALIDATION_INVALID_INPUT,
        format!("invalid item '{}': {}", spec, reason),
        Some("item".to_string()),
    )
}

/// Parse `name:quantity[:unit]`. The name itself may contain colons.
pub fn parse_item_spec(spec: &str) -> Result<PendingItem> {
    let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
    if parts.len() < 2 {
        return Err(invalid_item(spec, "expected name:quantity[:unit]"));
    }

    let last = parts[parts.len() - 1];
    let (name_parts, quantity, unit) = match last.parse::<f64>() {
        Ok(quantity) => (&parts[..parts.len() - 1], quantity, "g"),
        Err(_) if parts.len() >= 3 => {
            let quantity = parts[parts.len() - 2]
                .parse::<f64>()
                .map_err(|_| invalid_item(spec, "quantity is not a number"))?;
            (&parts[..parts.len() - 2], quantity, last)
        }
        Err(_) => return Err(invalid_item(spec, "quantity is not a number")),
    };

    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(invalid_item(spec, "quantity must be a positive number"));
    }

    let name = name_parts.join(":");
    if name.is_empty() {
        return Err(invalid_item(spec, "name is empty"));
    }
    if unit.is_empty() {
        return Err(invalid_item(spec, "unit is empty"));
    }

    Ok(PendingItem::new(name.clone(), quantity)
        .with_unit(unit)
        .with_raw_text(format!("{} {} {}", quantity, unit, name)))
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        FitpalError::validation_with_code(
            ErrorCode::VALIDATION_INVALID_INPUT,
            format!("'{}' is not a YYYY-MM-DD date: {}", value, e),
            Some("date".to_string()),
        )
    })
}

/// RFC 3339 timestamp, or a bare date meaning noon UTC of that day
pub fn parse_consumed_at(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value.trim()) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    let date = parse_date(value)?;
    Ok(date.and_time(NaiveTime::MIN + chrono::Duration::hours(12)).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_parse_item_spec() {
        let item = parse_item_spec("chicken breast:200").unwrap();
        assert_eq!(item.name, "chicken breast");
        assert_eq!(item.quantity, 200.0);
        assert_eq!(item.unit, "g");

        let item = parse_item_spec("milk:250:ml").unwrap();
        assert_eq!(item.unit, "ml");
        assert_eq!(item.raw_text, "250 ml milk");

        let item = parse_item_spec("tea: earl grey:300:ml").unwrap();
        assert_eq!(item.name, "tea:earl grey");
    }

    #[test]
    fn test_parse_item_spec_errors() {
        assert!(parse_item_spec("chicken").is_err());
        assert!(parse_item_spec(":200").is_err());
        assert!(parse_item_spec("rice:lots:g").is_err());
        let err = parse_item_spec("rice:lots").unwrap_err();
        assert_eq!(err.code(), ErrorCode::VALIDATION_INVALID_INPUT);
    }

    #[test]
    fn test_parse_item_spec_rejects_non_positive_quantities() {
        for spec in ["rice:nan", "rice:NaN:g", "rice:inf", "rice:-infinity", "rice:0", "rice:-20"] {
            let err = parse_item_spec(spec).unwrap_err();
            assert_eq!(err.code(), ErrorCode::VALIDATION_INVALID_INPUT, "{}", spec);
        }
        assert!(parse_item_spec("rice:0.5").is_ok());
    }

    #[test]
    fn test_parse_consumed_at() {
        assert_eq!(
            parse_consumed_at("2024-03-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            parse_consumed_at("2024-03-01T08:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap()
        );
        assert!(parse_consumed_at("yesterday").is_err());
    }

    #[test]
    fn test_turn_input_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("turn.json");
        std::fs::write(
            &path,
            r#"{"items": [{"name": "apple", "quantity": 150, "raw_text": "an apple"}],
                "consumed_at": "2024-03-01T12:00:00Z"}"#,
        )
        .unwrap();

        let input = TurnInput::from_path(&path).unwrap();
        assert_eq!(input.items.len(), 1);
        assert_eq!(input.items[0].unit, "g");
        assert!(input.consumed_at.is_some());
    }

    #[test]
    fn test_turn_meal_type_fills_items_without_one() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("turn.json");
        std::fs::write(
            &path,
            r#"{"meal_type": "lunch",
                "items": [{"name": "apple", "quantity": 150},
                          {"name": "tea", "quantity": 300, "unit": "ml", "meal_type": "snack"}]}"#,
        )
        .unwrap();

        let items = TurnInput::from_path(&path).unwrap().into_items();
        assert_eq!(items[0].meal_type.as_deref(), Some("lunch"));
        assert_eq!(items[1].meal_type.as_deref(), Some("snack"));
    }
}
