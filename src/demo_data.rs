//! Demo request generators for both scheduling modes.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dto::{
    DayType, DutyType, Period, ScheduleRequest, Seat, SeatRole, Segment, SeniorScheduleRequest,
    SeniorSlot, SeniorUser, SeniorUserHistory, Slot, SlotTypeCounts, Unavailability, User,
    UserHistory,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Small,
    Large,
    Senior,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SMALL" => Ok(DemoData::Small),
            "LARGE" => Ok(DemoData::Large),
            "SENIOR" => Ok(DemoData::Senior),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Small => "SMALL",
            DemoData::Large => "LARGE",
            DemoData::Senior => "SENIOR",
        }
    }
}

/// A generated request of either mode.
pub enum DemoRequest {
    Duty(ScheduleRequest),
    Senior(SeniorScheduleRequest),
}

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    vec!["SMALL", "LARGE", "SENIOR"]
}

/// Generates a demo request for the given size.
pub fn generate(demo: DemoData) -> DemoRequest {
    match demo {
        DemoData::Small => DemoRequest::Duty(generate_duty(14, 8)),
        DemoData::Large => DemoRequest::Duty(generate_duty(28, 26)),
        DemoData::Senior => DemoRequest::Senior(generate_senior(28, 6)),
    }
}

/// Duty-mode demo: every weekday gets A/B/C slots, every weekend day
/// D/E/F, with an A-shift pair of preassigned DESK/OPERATOR seats.
pub fn generate_duty(days: i64, user_count: usize) -> ScheduleRequest {
    let mut rng = StdRng::seed_from_u64(0);
    let start_date = find_next_monday(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
    let end_date = start_date + Duration::days(days - 1);

    let names = generate_name_permutations(&mut rng);
    let users: Vec<User> = (0..user_count)
        .map(|i| {
            let weekday_count = rng.gen_range(0..30);
            let weekend_count = rng.gen_range(0..12);
            User {
                id: format!("user-{}", i + 1),
                name: names[i % names.len()].clone(),
                email: None,
                likes_night: rng.gen_bool(0.2),
                dislikes_weekend: rng.gen_bool(0.3),
                history: UserHistory {
                    weekday_count,
                    weekend_count,
                    expected_total: if rng.gen_bool(0.2) {
                        // Newcomer: no accumulated expectation yet.
                        None
                    } else {
                        Some(weekday_count + weekend_count + rng.gen_range(-2..3))
                    },
                    slot_type_counts: SlotTypeCounts {
                        a: rng.gen_range(0..10),
                        b: rng.gen_range(0..10),
                        c: rng.gen_range(0..6),
                        d: rng.gen_range(0..6),
                        e: rng.gen_range(0..6),
                        f: rng.gen_range(0..4),
                    },
                },
            }
        })
        .collect();

    let mut slots = Vec::new();
    for day in 0..days {
        let date = start_date + Duration::days(day);
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        let (day_type, duties) = if weekend {
            (DayType::Weekend, [DutyType::D, DutyType::E, DutyType::F])
        } else {
            (DayType::Weekday, [DutyType::A, DutyType::B, DutyType::C])
        };
        for duty in duties {
            let slot_id = format!("slot-{}-{:?}", date, duty);
            let seat_count = if duty == DutyType::A { 2 } else { 1 };
            let seats = (0..seat_count)
                .map(|i| Seat {
                    id: format!("{slot_id}-seat-{i}"),
                    role: match (duty, i) {
                        (DutyType::A, 0) => Some(SeatRole::Desk),
                        (DutyType::A, 1) => Some(SeatRole::Operator),
                        _ => None,
                    },
                })
                .collect();
            slots.push(Slot {
                id: slot_id,
                date,
                duty_type: duty,
                day_type,
                seats,
            });
        }
    }

    let unavailability = random_unavailability(
        &mut rng,
        users.iter().map(|u| u.id.clone()).collect(),
        slots.iter().map(|s| s.id.clone()).collect(),
        user_count * 2,
    );

    ScheduleRequest {
        period: Period {
            id: "demo-period".to_string(),
            name: format!("{start_date} - {end_date}"),
            start_date,
            end_date,
        },
        users,
        slots,
        unavailability,
    }
}

/// Senior-mode demo: MORNING and EVENING half-segments on every weekday.
pub fn generate_senior(days: i64, user_count: usize) -> SeniorScheduleRequest {
    let mut rng = StdRng::seed_from_u64(0);
    let start_date = find_next_monday(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
    let end_date = start_date + Duration::days(days - 1);

    let names = generate_name_permutations(&mut rng);
    let users: Vec<SeniorUser> = (0..user_count)
        .map(|i| {
            let morning = rng.gen_range(0..25);
            let evening = rng.gen_range(0..25);
            SeniorUser {
                id: format!("senior-{}", i + 1),
                name: names[i % names.len()].clone(),
                email: None,
                likes_morning: rng.gen_bool(0.3),
                likes_evening: rng.gen_bool(0.3),
                history: SeniorUserHistory {
                    total_all_time: morning + evening,
                    count_a_all_time: morning + evening,
                    count_morning_all_time: morning,
                    count_evening_all_time: evening,
                },
            }
        })
        .collect();

    let mut slots = Vec::new();
    for day in 0..days {
        let date = start_date + Duration::days(day);
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }
        for segment in [Segment::Morning, Segment::Evening] {
            let slot_id = format!("senior-slot-{}-{:?}", date, segment);
            slots.push(SeniorSlot {
                id: slot_id.clone(),
                date,
                duty_type: DutyType::A,
                segment,
                seats: vec![Seat {
                    id: format!("{slot_id}-seat-0"),
                    role: None,
                }],
            });
        }
    }

    let unavailability = random_unavailability(
        &mut rng,
        users.iter().map(|u| u.id.clone()).collect(),
        slots.iter().map(|s| s.id.clone()).collect(),
        user_count,
    );

    SeniorScheduleRequest {
        period: Period {
            id: "demo-senior-period".to_string(),
            name: format!("{start_date} - {end_date}"),
            start_date,
            end_date,
        },
        users,
        slots,
        unavailability,
    }
}

fn random_unavailability(
    rng: &mut StdRng,
    user_ids: Vec<String>,
    slot_ids: Vec<String>,
    count: usize,
) -> Vec<Unavailability> {
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let (Some(user_id), Some(slot_id)) = (user_ids.choose(rng), slot_ids.choose(rng)) else {
            break;
        };
        entries.push(Unavailability {
            user_id: user_id.clone(),
            slot_id: slot_id.clone(),
        });
    }
    entries
}

fn find_next_monday(date: NaiveDate) -> NaiveDate {
    let days_until_monday = match date.weekday() {
        Weekday::Mon => 0,
        Weekday::Tue => 6,
        Weekday::Wed => 5,
        Weekday::Thu => 4,
        Weekday::Fri => 3,
        Weekday::Sat => 2,
        Weekday::Sun => 1,
    };
    date + Duration::days(days_until_monday)
}

const FIRST_NAMES: &[&str] = &[
    "Amy", "Beth", "Carl", "Dan", "Elsa", "Flo", "Gus", "Hugo", "Ivy", "Jay",
];
const LAST_NAMES: &[&str] = &[
    "Cole", "Fox", "Green", "Jones", "King", "Li", "Poe", "Rye", "Smith", "Watt",
];

fn generate_name_permutations(rng: &mut StdRng) -> Vec<String> {
    let mut names = Vec::with_capacity(FIRST_NAMES.len() * LAST_NAMES.len());
    for first in FIRST_NAMES {
        for last in LAST_NAMES {
            names.push(format!("{} {}", first, last));
        }
    }
    names.shuffle(rng);
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DutyContext, SegmentContext};

    #[test]
    fn test_generate_small() {
        let DemoRequest::Duty(request) = generate(DemoData::Small) else {
            panic!("SMALL should be a duty request");
        };

        assert_eq!(request.users.len(), 8);
        // 14 days x 3 duties per day.
        assert_eq!(request.slots.len(), 42);
        // Contexts must accept generated data as-is.
        let ctx = DutyContext::from_request(&request).unwrap();
        assert!(ctx.base >= 1);
    }

    #[test]
    fn test_generate_large() {
        let DemoRequest::Duty(request) = generate(DemoData::Large) else {
            panic!("LARGE should be a duty request");
        };

        assert_eq!(request.users.len(), 26);
        assert_eq!(request.slots.len(), 84);
    }

    #[test]
    fn test_generate_senior() {
        let DemoRequest::Senior(request) = generate(DemoData::Senior) else {
            panic!("SENIOR should be a senior request");
        };

        assert_eq!(request.users.len(), 6);
        // 28 days: 20 weekdays x 2 segments.
        assert_eq!(request.slots.len(), 40);
        let ctx = SegmentContext::from_request(&request).unwrap();
        assert_eq!(ctx.total_seats, 40);
    }

    #[test]
    fn test_a_shifts_carry_preassigned_roles() {
        let DemoRequest::Duty(request) = generate(DemoData::Small) else {
            panic!("SMALL should be a duty request");
        };
        for slot in request.slots.iter().filter(|s| s.duty_type == DutyType::A) {
            assert_eq!(slot.seats[0].role, Some(SeatRole::Desk));
            assert_eq!(slot.seats[1].role, Some(SeatRole::Operator));
        }
    }

    #[test]
    fn test_demo_data_from_str() {
        assert_eq!("SMALL".parse::<DemoData>(), Ok(DemoData::Small));
        assert_eq!("small".parse::<DemoData>(), Ok(DemoData::Small));
        assert_eq!("SENIOR".parse::<DemoData>(), Ok(DemoData::Senior));
        assert!("invalid".parse::<DemoData>().is_err());
    }
}
