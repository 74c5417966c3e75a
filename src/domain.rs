//! Request-scoped internal models for the solvers.
//!
//! Wire requests are converted into indexed contexts once per request:
//! stable person/slot/seat ordering, id lookups, date grouping and the
//! derived quantities (`base`, per-person `ideal`, blocked counts) the
//! builders need. Everything here is discarded when the response is
//! produced; there is no cross-request state.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;

use crate::dto::{
    DayType, DutyType, ScheduleRequest, SeatRole, Segment, SeniorScheduleRequest,
};

/// Validation failure; reported synchronously, no solve attempted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidRequestError {
    #[error("period start {start} is after period end {end}")]
    InvertedPeriod { start: NaiveDate, end: NaiveDate },
    #[error("request contains no users")]
    NoUsers,
    #[error("request contains no slots")]
    NoSlots,
    #[error("slot {0} has no seats")]
    EmptySeats(String),
    #[error("duplicate user id {0}")]
    DuplicateUserId(String),
    #[error("duplicate slot id {0}")]
    DuplicateSlotId(String),
    #[error("duplicate seat id {0}")]
    DuplicateSeatId(String),
    #[error("senior slot {0} must have duty type A")]
    NonSeniorDuty(String),
}

/// Unavailability fairness categories: A, B, C, and D/E/F combined.
pub const BLOCK_CATEGORIES: usize = 4;

pub fn block_category(duty: DutyType) -> usize {
    match duty {
        DutyType::A => 0,
        DutyType::B => 1,
        DutyType::C => 2,
        DutyType::D | DutyType::E | DutyType::F => 3,
    }
}

#[derive(Debug, Clone)]
pub struct DutyPerson {
    pub id: String,
    pub name: String,
    pub index: usize,
    pub total_all_time: i64,
    pub expected_total: i64,
    pub likes_night: bool,
    pub dislikes_weekend: bool,
}

#[derive(Debug, Clone)]
pub struct SeatCtx {
    pub id: String,
    pub index: usize,
    pub role: Option<SeatRole>,
}

#[derive(Debug, Clone)]
pub struct DutySlot {
    pub id: String,
    pub index: usize,
    pub date: NaiveDate,
    pub duty: DutyType,
    pub day_type: DayType,
    pub seats: Vec<SeatCtx>,
}

/// Indexed duty-mode solve context.
#[derive(Debug)]
pub struct DutyContext {
    pub persons: Vec<DutyPerson>,
    pub slots: Vec<DutySlot>,
    pub person_index: HashMap<String, usize>,
    pub slot_index: HashMap<String, usize>,
    /// Blocked `(person, slot)` pairs.
    pub unavailable: BTreeSet<(usize, usize)>,
    /// Slot indices grouped by calendar day, chronological.
    pub slots_by_day: BTreeMap<NaiveDate, Vec<usize>>,
    pub total_seats: usize,
    pub base: i64,
    /// Per-person target count, adjusted by historical debt/credit.
    pub ideals: Vec<i64>,
    /// Person indices sorted ascending by `(totalAllTime, id)`; the
    /// solver branches candidates in this order so ties resolve toward
    /// persons with the lighter history.
    pub rank_order: Vec<usize>,
    /// Per person, per category: how many slots they asked to block.
    pub blocked_by_category: Vec<[i64; BLOCK_CATEGORIES]>,
    pub max_blocked_by_category: [i64; BLOCK_CATEGORIES],
}

impl DutyContext {
    pub fn from_request(request: &ScheduleRequest) -> Result<Self, InvalidRequestError> {
        check_period(request.period.start_date, request.period.end_date)?;
        if request.users.is_empty() {
            return Err(InvalidRequestError::NoUsers);
        }
        if request.slots.is_empty() {
            return Err(InvalidRequestError::NoSlots);
        }

        let mut persons = Vec::with_capacity(request.users.len());
        let mut person_index = HashMap::new();
        for (index, user) in request.users.iter().enumerate() {
            if person_index.insert(user.id.clone(), index).is_some() {
                return Err(InvalidRequestError::DuplicateUserId(user.id.clone()));
            }
            persons.push(DutyPerson {
                id: user.id.clone(),
                name: user.name.clone(),
                index,
                total_all_time: user.history.total_all_time(),
                expected_total: user.history.expected_total.unwrap_or(0),
                likes_night: user.likes_night,
                dislikes_weekend: user.dislikes_weekend,
            });
        }

        let mut slots = Vec::with_capacity(request.slots.len());
        let mut slot_index = HashMap::new();
        let mut slots_by_day: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        let mut seat_ids = HashSet::new();
        let mut total_seats = 0usize;
        for (index, slot) in request.slots.iter().enumerate() {
            if slot.seats.is_empty() {
                return Err(InvalidRequestError::EmptySeats(slot.id.clone()));
            }
            if slot_index.insert(slot.id.clone(), index).is_some() {
                return Err(InvalidRequestError::DuplicateSlotId(slot.id.clone()));
            }
            let mut seats = Vec::with_capacity(slot.seats.len());
            for (seat_index, seat) in slot.seats.iter().enumerate() {
                if !seat_ids.insert(seat.id.clone()) {
                    return Err(InvalidRequestError::DuplicateSeatId(seat.id.clone()));
                }
                seats.push(SeatCtx {
                    id: seat.id.clone(),
                    index: seat_index,
                    role: seat.role,
                });
            }
            total_seats += seats.len();
            slots_by_day.entry(slot.date).or_default().push(index);
            slots.push(DutySlot {
                id: slot.id.clone(),
                index,
                date: slot.date,
                duty: slot.duty_type,
                day_type: slot.day_type,
                seats,
            });
        }

        // Entries with unknown ids are ignored rather than rejected.
        let mut unavailable = BTreeSet::new();
        let mut blocked_by_category = vec![[0i64; BLOCK_CATEGORIES]; persons.len()];
        for entry in &request.unavailability {
            let (Some(&p), Some(&s)) = (
                person_index.get(&entry.user_id),
                slot_index.get(&entry.slot_id),
            ) else {
                continue;
            };
            if unavailable.insert((p, s)) {
                blocked_by_category[p][block_category(slots[s].duty)] += 1;
            }
        }
        let mut max_blocked_by_category = [0i64; BLOCK_CATEGORIES];
        for counts in &blocked_by_category {
            for (cat, &count) in counts.iter().enumerate() {
                max_blocked_by_category[cat] = max_blocked_by_category[cat].max(count);
            }
        }

        let base = (total_seats / persons.len()) as i64;
        let ideals = persons.iter().map(|p| ideal_count(p, base)).collect();
        let rank_order = rank_by_history(persons.iter().map(|p| (p.total_all_time, p.id.as_str())));

        Ok(Self {
            persons,
            slots,
            person_index,
            slot_index,
            unavailable,
            slots_by_day,
            total_seats,
            base,
            ideals,
            rank_order,
            blocked_by_category,
            max_blocked_by_category,
        })
    }

    pub fn person_count(&self) -> usize {
        self.persons.len()
    }
}

/// `ideal = clamp(base - fark, 0, base + 2)` with `fark = totalAllTime -
/// expectedTotal`; newcomers (zero expected) keep the plain base share.
pub fn ideal_count(person: &DutyPerson, base: i64) -> i64 {
    let fark = if person.expected_total == 0 {
        0
    } else {
        person.total_all_time - person.expected_total
    };
    (base - fark).clamp(0, base + 2)
}

#[derive(Debug, Clone)]
pub struct SegmentPerson {
    pub id: String,
    pub name: String,
    pub index: usize,
    pub total_all_time: i64,
    pub count_a_all_time: i64,
    pub likes_morning: bool,
    pub likes_evening: bool,
}

#[derive(Debug, Clone)]
pub struct SegmentSlot {
    pub id: String,
    pub index: usize,
    pub date: NaiveDate,
    pub segment: Segment,
    pub seats: Vec<SeatCtx>,
}

/// Indexed senior-mode solve context (A-shift half segments only).
#[derive(Debug)]
pub struct SegmentContext {
    pub persons: Vec<SegmentPerson>,
    pub slots: Vec<SegmentSlot>,
    pub person_index: HashMap<String, usize>,
    pub slot_index: HashMap<String, usize>,
    pub unavailable: BTreeSet<(usize, usize)>,
    pub slots_by_day: BTreeMap<NaiveDate, Vec<usize>>,
    pub total_seats: usize,
    pub base: i64,
    pub rank_order: Vec<usize>,
}

impl SegmentContext {
    pub fn from_request(request: &SeniorScheduleRequest) -> Result<Self, InvalidRequestError> {
        check_period(request.period.start_date, request.period.end_date)?;
        if request.users.is_empty() {
            return Err(InvalidRequestError::NoUsers);
        }
        if request.slots.is_empty() {
            return Err(InvalidRequestError::NoSlots);
        }

        let mut persons = Vec::with_capacity(request.users.len());
        let mut person_index = HashMap::new();
        for (index, user) in request.users.iter().enumerate() {
            if person_index.insert(user.id.clone(), index).is_some() {
                return Err(InvalidRequestError::DuplicateUserId(user.id.clone()));
            }
            persons.push(SegmentPerson {
                id: user.id.clone(),
                name: user.name.clone(),
                index,
                total_all_time: user.history.total_all_time,
                count_a_all_time: user.history.count_a_all_time,
                likes_morning: user.likes_morning,
                likes_evening: user.likes_evening,
            });
        }

        let mut slots = Vec::with_capacity(request.slots.len());
        let mut slot_index = HashMap::new();
        let mut slots_by_day: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        let mut seat_ids = HashSet::new();
        let mut total_seats = 0usize;
        for (index, slot) in request.slots.iter().enumerate() {
            if slot.duty_type != DutyType::A {
                return Err(InvalidRequestError::NonSeniorDuty(slot.id.clone()));
            }
            if slot.seats.is_empty() {
                return Err(InvalidRequestError::EmptySeats(slot.id.clone()));
            }
            if slot_index.insert(slot.id.clone(), index).is_some() {
                return Err(InvalidRequestError::DuplicateSlotId(slot.id.clone()));
            }
            let mut seats = Vec::with_capacity(slot.seats.len());
            for (seat_index, seat) in slot.seats.iter().enumerate() {
                if !seat_ids.insert(seat.id.clone()) {
                    return Err(InvalidRequestError::DuplicateSeatId(seat.id.clone()));
                }
                seats.push(SeatCtx {
                    id: seat.id.clone(),
                    index: seat_index,
                    role: seat.role,
                });
            }
            total_seats += seats.len();
            slots_by_day.entry(slot.date).or_default().push(index);
            slots.push(SegmentSlot {
                id: slot.id.clone(),
                index,
                date: slot.date,
                segment: slot.segment,
                seats,
            });
        }

        let mut unavailable = BTreeSet::new();
        for entry in &request.unavailability {
            let (Some(&p), Some(&s)) = (
                person_index.get(&entry.user_id),
                slot_index.get(&entry.slot_id),
            ) else {
                continue;
            };
            unavailable.insert((p, s));
        }

        let base = (total_seats / persons.len()) as i64;
        let rank_order = rank_by_history(persons.iter().map(|p| (p.total_all_time, p.id.as_str())));

        Ok(Self {
            persons,
            slots,
            person_index,
            slot_index,
            unavailable,
            slots_by_day,
            total_seats,
            base,
            rank_order,
        })
    }

    pub fn person_count(&self) -> usize {
        self.persons.len()
    }
}

fn check_period(start: NaiveDate, end: NaiveDate) -> Result<(), InvalidRequestError> {
    if start > end {
        return Err(InvalidRequestError::InvertedPeriod { start, end });
    }
    Ok(())
}

fn rank_by_history<'a>(keys: impl Iterator<Item = (i64, &'a str)>) -> Vec<usize> {
    let mut order: Vec<(i64, String, usize)> = keys
        .enumerate()
        .map(|(index, (total, id))| (total, id.to_string(), index))
        .collect();
    order.sort();
    order.into_iter().map(|(_, _, index)| index).collect()
}
