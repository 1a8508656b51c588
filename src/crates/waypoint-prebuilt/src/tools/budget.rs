//! Travel budget estimate from a static per-day cost table

use async_trait::async_trait;
use serde_json::Value;
use waypoint_core::{Tool, ToolArgs, ToolError};

/// Per-day cost when the destination is not in [`COST_PER_DAY`]
pub const DEFAULT_COST_PER_DAY: i64 = 150;

/// Accommodation + food + local transport, per day
pub const COST_PER_DAY: &[(&str, i64)] = &[
    ("paris", 200),
    ("tokyo", 180),
    ("bali", 80),
    ("new york", 250),
    ("london", 220),
];

/// `get_travel_budget(destination, days)`
#[derive(Debug, Clone, Copy, Default)]
pub struct TravelBudgetTool;

pub fn cost_per_day(destination: &str) -> i64 {
    let key = destination.trim().to_lowercase();
    COST_PER_DAY
        .iter()
        .find(|(city, _)| *city == key)
        .map(|(_, cost)| *cost)
        .unwrap_or(DEFAULT_COST_PER_DAY)
}

fn invalid(reason: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments {
        tool: "get_travel_budget".to_string(),
        reason: reason.into(),
    }
}

/// `days` may arrive as a number or a numeric string
fn parse_days(value: &Value) -> Result<i64, ToolError> {
    let days = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match days {
        Some(days) if days >= 0 => Ok(days),
        _ => Err(invalid(format!("days must be a whole number, got {}", value))),
    }
}

#[async_trait]
impl Tool for TravelBudgetTool {
    fn name(&self) -> &str {
        "get_travel_budget"
    }

    fn description(&self) -> &str {
        "Calculate travel budget, e.g. {\"destination\": \"Paris\", \"days\": 5}"
    }

    fn arg_names(&self) -> &[&'static str] {
        &["destination", "days"]
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let destination = args
            .get("destination")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("destination must be a string"))?;
        let days = parse_days(args.get("days").unwrap_or(&Value::Null))?;

        let per_day = cost_per_day(destination);
        let total = per_day * days;
        Ok(format!(
            "Estimated budget for {} for {} days: ${} (${}/day for accommodation + food + local transport)",
            destination, days, total, per_day
        ))
    }
}
