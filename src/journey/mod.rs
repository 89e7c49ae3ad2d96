//! Itinerary summary extraction
//!
//! The itinerary is an unstructured text file maintained by hand; this
//! module distills it into a structured summary with line-pattern
//! heuristics. The file is the canonical source and is re-parsed on every
//! request - nothing here is stored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Structured itinerary summary for client display
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneySummary {
    pub dates: Vec<String>,
    pub hotel: String,
    pub flights: FlightInfo,
    pub daily_plans: Vec<DailyPlan>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightInfo {
    pub departure: String,
    #[serde(rename = "return")]
    pub return_flight: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPlan {
    pub day: String,
    pub activities: Vec<String>,
}

// Day headers look like `9/12(五)`.
static DAY_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+/\d+\([一二三四五六日]\)").expect("day header regex"));

// Return flights are written `回程航班（IT201）...`; any airline code matches.
static RETURN_FLIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"航班（[A-Z]{2,3}\d+）").expect("return flight regex"));

static TIME_OF_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+:\d+").expect("time regex"));

static ATTRACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "淺草寺|上野|東京鐵塔|築地|銀座|六本木|明治神宮|富士山|秋葉原|竹下通|表參道|南青山|阿美横町",
    )
    .expect("attraction regex")
});

static TRANSPORT: Lazy<Regex> = Lazy::new(|| Regex::new("搭|走|分鐘|站").expect("transport regex"));

// Leading bracket tags like `[必去]` are trimmed off activity lines.
static LEADING_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[.*?\]").expect("tag regex"));

const HOTEL_KEYWORDS: [&str; 2] = ["豪景酒店", "淺草豪景"];
const HOTEL_NAME: &str = "淺草豪景酒店";
const DEPARTURE_MARKER: &str = "班機時間：";
const META_MARKERS: [&str; 3] = ["交通:", "食:", "購物:"];

/// Parse the raw itinerary text into a summary.
pub fn parse_journey(content: &str) -> JourneySummary {
    let mut summary = JourneySummary::default();

    let mut current_day = String::new();
    let mut current_activities: Vec<String> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();

        if DAY_HEADER.is_match(trimmed) {
            // Close out the previous day before starting a new one
            if !current_day.is_empty() && !current_activities.is_empty() {
                summary.daily_plans.push(DailyPlan {
                    day: current_day.clone(),
                    activities: std::mem::take(&mut current_activities),
                });
            }
            current_day = trimmed.to_string();
            current_activities.clear();
            summary.dates.push(trimmed.to_string());
        }

        if HOTEL_KEYWORDS.iter().any(|kw| trimmed.contains(kw)) {
            summary.hotel = HOTEL_NAME.to_string();
        }

        if trimmed.contains(DEPARTURE_MARKER) {
            summary.flights.departure = trimmed.to_string();
        }
        if RETURN_FLIGHT.is_match(trimmed) {
            summary.flights.return_flight = trimmed.to_string();
        }

        if !current_day.is_empty() {
            if let Some(activity) = extract_activity(trimmed) {
                current_activities.push(activity);
            }
        }
    }

    if !current_day.is_empty() && !current_activities.is_empty() {
        summary.daily_plans.push(DailyPlan {
            day: current_day,
            activities: current_activities,
        });
    }

    summary
}

/// Decide whether a line under a day header describes an activity, and clean
/// it up if so. A line qualifies when it mentions an attraction, a clock
/// time, or a transport move, is not a meta line, and is long enough to be a
/// real entry.
fn extract_activity(line: &str) -> Option<String> {
    let has_attraction = ATTRACTION.is_match(line);
    let has_time = TIME_OF_DAY.is_match(line);
    let has_transport = TRANSPORT.is_match(line);
    let is_meta = META_MARKERS.iter().any(|m| line.contains(m));

    if !(has_attraction || has_time || has_transport) || is_meta || line.chars().count() <= 10 {
        return None;
    }

    let cleaned = LEADING_TAG.replace(line, "").trim().to_string();
    if cleaned.chars().count() > 5 {
        Some(cleaned)
    } else {
        None
    }
}
