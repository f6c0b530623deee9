// medallion-core/src/domain/aggregation/forecast.rs
//
// Forecast producer output. The model is external; rows are stored verbatim
// once they pass null and range sanity checks.

use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

use crate::domain::record::coercion::coerce_date;
use crate::domain::record::{RawBatch, RawRecord};
use crate::domain::run::RunContext;
use crate::domain::validation::{Classifier, RejectedRow, Rejection};

pub const FORECAST_TABLE: &str = "forecasts";
pub const GRANULARITIES: [&str; 2] = ["daily", "weekly"];

const FIELDS: [&str; 8] = [
    "date",
    "entity_id",
    "level",
    "predicted_value",
    "lower_bound",
    "upper_bound",
    "model_name",
    "granularity",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub date: String,
    pub entity_id: String,
    pub level: String,
    pub predicted_value: String,
    pub lower_bound: String,
    pub upper_bound: String,
    pub model_name: String,
    pub granularity: String,
}

fn number(raw: &RawRecord, field: &'static str) -> Result<Decimal, Rejection> {
    let text = raw.get(field).as_str().unwrap_or_default();
    Decimal::from_str(text.trim()).map_err(|_| {
        Rejection::new(
            "forecast_missing_value",
            Some(field),
            format!("'{}' is not a number", text),
        )
    })
}

fn sanity_check(raw: &RawRecord) -> Result<ForecastRow, Rejection> {
    if let Some(field) = FIELDS.into_iter().find(|f| raw.get(f).as_str().is_none()) {
        return Err(Rejection::new(
            "forecast_missing_value",
            Some(field),
            format!("{} is null", field),
        ));
    }

    let granularity = raw.get("granularity").as_str().unwrap_or_default();
    if !GRANULARITIES.contains(&granularity.trim().to_lowercase().as_str()) {
        return Err(Rejection::new(
            "forecast_unknown_granularity",
            Some("granularity"),
            format!("'{}' is not one of {:?}", granularity, GRANULARITIES),
        ));
    }

    let date = raw.get("date").as_str().unwrap_or_default();
    if coerce_date(date).is_none() {
        return Err(Rejection::new(
            "forecast_missing_value",
            Some("date"),
            format!("'{}' is not a date", date),
        ));
    }

    let predicted = number(raw, "predicted_value")?;
    let lower = number(raw, "lower_bound")?;
    let upper = number(raw, "upper_bound")?;
    if lower > upper || predicted < lower || predicted > upper {
        return Err(Rejection::new(
            "forecast_bounds_inverted",
            Some("predicted_value"),
            format!("expected {} <= {} <= {}", lower, predicted, upper),
        ));
    }

    let verbatim = |field: &str| raw.get(field).as_str().unwrap_or_default().to_string();
    Ok(ForecastRow {
        date: verbatim("date"),
        entity_id: verbatim("entity_id"),
        level: verbatim("level"),
        predicted_value: verbatim("predicted_value"),
        lower_bound: verbatim("lower_bound"),
        upper_bound: verbatim("upper_bound"),
        model_name: verbatim("model_name"),
        granularity: verbatim("granularity"),
    })
}

pub fn ingest(
    ctx: &RunContext,
    batch: &RawBatch,
    classifier: &Classifier,
) -> (Vec<ForecastRow>, Vec<RejectedRow>) {
    let mut rows = Vec::new();
    let mut rejected = Vec::new();
    for raw in &batch.rows {
        match sanity_check(raw) {
            Ok(row) => rows.push(row),
            Err(rejection) => rejected.push(RejectedRow::from_raw(
                ctx.run_id,
                FORECAST_TABLE,
                &batch.batch_id,
                raw,
                rejection,
                classifier,
            )),
        }
    }
    (rows, rejected)
}
