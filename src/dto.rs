//! Wire request/response types for both scheduling modes.
//!
//! Field names follow the frontend contract: camelCase JSON, ISO dates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// Duty bands. Weekday: A (day), B (evening), C (night).
/// Weekend: D (day), E (evening), F (night).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DutyType {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl DutyType {
    /// C and F are night duties.
    pub fn is_night(self) -> bool {
        matches!(self, DutyType::C | DutyType::F)
    }

    /// A and D start in the morning; a night duty must not precede them.
    pub fn is_morning(self) -> bool {
        matches!(self, DutyType::A | DutyType::D)
    }

    /// D, E and F are weekend duties.
    pub fn is_weekend(self) -> bool {
        matches!(self, DutyType::D | DutyType::E | DutyType::F)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayType {
    Weekday,
    Weekend,
}

/// Sub-role on A-shift seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatRole {
    Desk,
    Operator,
}

/// Half-segments of an A-shift (senior mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Segment {
    Morning,
    Evening,
}

// ============================================================================
// Request models (duty mode)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// All-time per-duty counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotTypeCounts {
    #[serde(rename = "A", default)]
    pub a: i64,
    #[serde(rename = "B", default)]
    pub b: i64,
    #[serde(rename = "C", default)]
    pub c: i64,
    #[serde(rename = "D", default)]
    pub d: i64,
    #[serde(rename = "E", default)]
    pub e: i64,
    #[serde(rename = "F", default)]
    pub f: i64,
}

/// Historical record of a duty-mode user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHistory {
    #[serde(default)]
    pub weekday_count: i64,
    #[serde(default)]
    pub weekend_count: i64,
    /// What the user should have accumulated by now; zero or absent marks
    /// a newcomer.
    #[serde(default)]
    pub expected_total: Option<i64>,
    #[serde(default)]
    pub slot_type_counts: SlotTypeCounts,
}

impl UserHistory {
    pub fn total_all_time(&self) -> i64 {
        self.weekday_count + self.weekend_count
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub likes_night: bool,
    #[serde(default)]
    pub dislikes_weekend: bool,
    #[serde(default)]
    pub history: UserHistory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: String,
    /// Preassigned DESK/OPERATOR on A-shifts; null elsewhere.
    #[serde(default)]
    pub role: Option<SeatRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    pub date: NaiveDate,
    pub duty_type: DutyType,
    pub day_type: DayType,
    pub seats: Vec<Seat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unavailability {
    pub user_id: String,
    pub slot_id: String,
}

/// Duty-mode request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub period: Period,
    pub users: Vec<User>,
    pub slots: Vec<Slot>,
    #[serde(default)]
    pub unavailability: Vec<Unavailability>,
}

// ============================================================================
// Request models (senior mode)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeniorUserHistory {
    #[serde(default)]
    pub total_all_time: i64,
    #[serde(default)]
    pub count_a_all_time: i64,
    #[serde(default)]
    pub count_morning_all_time: i64,
    #[serde(default)]
    pub count_evening_all_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeniorUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub likes_morning: bool,
    #[serde(default)]
    pub likes_evening: bool,
    #[serde(default)]
    pub history: SeniorUserHistory,
}

/// A half-segment of an A-shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeniorSlot {
    pub id: String,
    pub date: NaiveDate,
    #[serde(default = "default_duty_a")]
    pub duty_type: DutyType,
    pub segment: Segment,
    pub seats: Vec<Seat>,
}

fn default_duty_a() -> DutyType {
    DutyType::A
}

/// Senior-mode request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeniorScheduleRequest {
    pub period: Period,
    pub users: Vec<SeniorUser>,
    pub slots: Vec<SeniorSlot>,
    #[serde(default)]
    pub unavailability: Vec<Unavailability>,
}

// ============================================================================
// Response models (shared by both modes)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub slot_id: String,
    pub seat_id: String,
    pub user_id: String,
    #[serde(default)]
    pub seat_role: Option<SeatRole>,
    /// True on every assignment of a user whose period total exceeds
    /// base + 1.
    #[serde(default)]
    pub is_extra: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMeta {
    pub base: i64,
    pub max_shifts: i64,
    pub min_shifts: i64,
    pub total_slots: i64,
    pub total_assignments: i64,
    pub users_at_base_plus_2: i64,
    pub unavailability_violations: i64,
    pub warnings: Vec<String>,
    pub solver_status: String,
    pub solve_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub assignments: Vec<Assignment>,
    pub meta: ScheduleMeta,
}

// ============================================================================
// Service endpoints
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub solver_engine: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_frontend_contract() {
        let raw = r#"{
            "period": {
                "id": "period-1",
                "name": "8 December - 4 January",
                "startDate": "2025-12-08",
                "endDate": "2026-01-04"
            },
            "users": [{
                "id": "user-1",
                "name": "A. Example",
                "email": "a@example.org",
                "likesNight": false,
                "dislikesWeekend": true,
                "history": {
                    "weekdayCount": 12,
                    "weekendCount": 4,
                    "expectedTotal": 14,
                    "slotTypeCounts": {"A": 3, "B": 5, "C": 2, "D": 4, "E": 1, "F": 1}
                }
            }],
            "slots": [{
                "id": "slot-101",
                "date": "2025-12-08",
                "dutyType": "A",
                "dayType": "WEEKDAY",
                "seats": [
                    {"id": "seat-1", "role": "DESK"},
                    {"id": "seat-2", "role": "OPERATOR"},
                    {"id": "seat-3", "role": null}
                ]
            }],
            "unavailability": [{"userId": "user-1", "slotId": "slot-101"}]
        }"#;

        let request: ScheduleRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.users[0].history.total_all_time(), 16);
        assert_eq!(request.users[0].history.slot_type_counts.c, 2);
        assert_eq!(request.slots[0].seats.len(), 3);
        assert_eq!(request.slots[0].seats[0].role, Some(SeatRole::Desk));
        assert_eq!(request.slots[0].seats[2].role, None);
        assert_eq!(request.unavailability.len(), 1);
    }

    #[test]
    fn test_senior_slot_duty_defaults_to_a() {
        let raw = r#"{
            "id": "senior-slot-1",
            "date": "2025-12-16",
            "segment": "MORNING",
            "seats": [{"id": "seat-s1", "role": null}]
        }"#;
        let slot: SeniorSlot = serde_json::from_str(raw).unwrap();
        assert_eq!(slot.duty_type, DutyType::A);
        assert_eq!(slot.segment, Segment::Morning);
    }

    #[test]
    fn test_duty_type_predicates() {
        assert!(DutyType::C.is_night());
        assert!(DutyType::F.is_night());
        assert!(!DutyType::A.is_night());
        assert!(DutyType::A.is_morning());
        assert!(DutyType::D.is_morning());
        assert!(DutyType::F.is_weekend());
        assert!(!DutyType::B.is_weekend());
    }

    #[test]
    fn test_meta_serializes_camel_case() {
        let meta = ScheduleMeta {
            base: 8,
            max_shifts: 10,
            min_shifts: 7,
            total_slots: 50,
            total_assignments: 200,
            users_at_base_plus_2: 2,
            unavailability_violations: 1,
            warnings: vec![],
            solver_status: "OPTIMAL".to_string(),
            solve_time_ms: 1234.5,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("usersAtBasePlus2").is_some());
        assert!(json.get("unavailabilityViolations").is_some());
        assert!(json.get("solveTimeMs").is_some());
    }
}
