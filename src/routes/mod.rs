use axum::Router;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::AppState;
use crate::scheduling::{resolve_window, CalendarWindow, Granularity};

pub mod appointment_routes;
pub mod auth_routes;
pub mod dialysis_routes;
pub mod machine_routes;
pub mod patient_routes;
pub mod room_routes;
pub mod stats_routes;
pub mod user_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1/users", user_routes::router())
        .nest("/api/v1", patient_routes::router())
        .nest("/api/v1", room_routes::router())
        .nest("/api/v1", machine_routes::router())
        .nest("/api/v1", appointment_routes::router())
        .nest("/api/v1", dialysis_routes::router())
        .nest("/api/v1", stats_routes::router())
        .with_state(state)
}

/// `?view=day|week|month|year|all&date=YYYY-MM-DD`
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub view: Option<String>,
    pub date: Option<String>,
}

impl WindowQuery {
    /// Defaults: `view=week`, `date=` today.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<(Granularity, CalendarWindow), ApiError> {
        let granularity = match self.view.as_deref() {
            None | Some("") => Granularity::Week,
            Some(v) => v
                .parse::<Granularity>()
                .map_err(|e| ApiError::validation(e.to_string()))?,
        };

        let reference = match self.date.as_deref().map(str::trim) {
            None | Some("") => now,
            Some(d) => parse_date(d)?.and_time(NaiveTime::MIN).and_utc(),
        };

        Ok((granularity, resolve_window(reference, granularity)))
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation("date must be YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_query_defaults_to_current_week() {
        let now = Utc.with_ymd_and_hms(2024, 6, 5, 10, 0, 0).single().unwrap();
        let (g, w) = WindowQuery::default().resolve(now).unwrap();
        assert_eq!(g, Granularity::Week);
        assert_eq!(
            w.bounded().unwrap().from(),
            Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).single().unwrap()
        );
    }

    #[test]
    fn test_window_query_rejects_bad_input() {
        let now = Utc::now();
        let bad_view = WindowQuery {
            view: Some("decade".into()),
            date: None,
        };
        assert_eq!(bad_view.resolve(now).unwrap_err().code(), "VALIDATION_ERROR");

        let bad_date = WindowQuery {
            view: Some("day".into()),
            date: Some("05/06/2024".into()),
        };
        assert_eq!(bad_date.resolve(now).unwrap_err().code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_window_query_all_is_unbounded() {
        let q = WindowQuery {
            view: Some("all".into()),
            date: Some("2024-06-05".into()),
        };
        let (_, w) = q.resolve(Utc::now()).unwrap();
        assert_eq!(w, CalendarWindow::Unbounded);
    }
}
