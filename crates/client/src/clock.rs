//! Simulated world clock.
//!
//! World time is never pushed by the server. It is derived from four numbers
//! on the [`World`] (creation instant, start year, acceleration, offset) plus
//! the local clock:
//!
//! ```text
//! world_time = created (moved to start_year)
//!            + elapsed_real_seconds * time_acceleration
//!            + time_offset
//! ```
//!
//! All arithmetic is done on UTC calendar values, so the result reads the
//! same regardless of the host's timezone.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use bunker_shared::World;

/// World time at real instant `now`.
pub fn world_time_at(world: &World, now: DateTime<Utc>) -> NaiveDateTime {
    let elapsed = (now - world.created).num_seconds();
    let simulated = elapsed
        .saturating_mul(i64::from(world.time_acceleration))
        .saturating_add(i64::from(world.time_offset));
    advance(shift_year(world.created.naive_utc(), world.start_year), simulated)
}

/// Project a real timestamp into world time, scaling its distance from `now`
/// by the world's acceleration.
pub fn to_world_time(world: &World, instant: DateTime<Utc>, now: DateTime<Utc>) -> NaiveDateTime {
    let acceleration = if world.time_acceleration == 0 {
        1
    } else {
        i64::from(world.time_acceleration)
    };
    let seconds = (instant - now).num_seconds().saturating_mul(acceleration);
    advance(world_time_at(world, now), seconds)
}

/// `hh:mm AM` when `instant` falls on the current world day, `MM/DD/YYYY`
/// otherwise.
pub fn format_world_timestamp(world: &World, instant: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let current = world_time_at(world, now);
    let in_world = to_world_time(world, instant, now);
    if in_world.date() == current.date() {
        in_world.format("%I:%M %p").to_string()
    } else {
        in_world.format("%m/%d/%Y").to_string()
    }
}

/// Whole years between `date_of_birth` and `at`.
pub fn age_at(date_of_birth: NaiveDate, at: NaiveDateTime) -> i32 {
    let today = at.date();
    let mut years = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    years
}

/// Move `instant` to `year`. Feb 29 rolls over to Mar 1 in non-leap years.
fn shift_year(instant: NaiveDateTime, year: i32) -> NaiveDateTime {
    instant
        .with_year(year)
        .or_else(|| {
            instant
                .with_day(28)
                .and_then(|d| d.with_year(year))
                .and_then(|d| d.checked_add_signed(TimeDelta::days(1)))
        })
        .unwrap_or(instant)
}

fn advance(from: NaiveDateTime, seconds: i64) -> NaiveDateTime {
    TimeDelta::try_seconds(seconds)
        .and_then(|delta| from.checked_add_signed(delta))
        .unwrap_or(if seconds >= 0 {
            NaiveDateTime::MAX
        } else {
            NaiveDateTime::MIN
        })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn world(created: DateTime<Utc>, start_year: i32, acceleration: i32, offset: i32) -> World {
        World {
            id: 1,
            name: "Test".to_string(),
            players: 1,
            open: true,
            joined: true,
            created,
            start_year,
            time_acceleration: acceleration,
            time_offset: offset,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn real_time_world_tracks_wall_clock() {
        let w = world(t0(), 2022, 1, 0);
        for secs in [0, 1, 59, 3_600, 86_400 * 40] {
            let now = t0() + TimeDelta::seconds(secs);
            assert_eq!(world_time_at(&w, now), now.naive_utc());
        }
        let a = world_time_at(&w, t0() + TimeDelta::seconds(100));
        let b = world_time_at(&w, t0() + TimeDelta::seconds(101));
        assert_eq!(b - a, TimeDelta::seconds(1));
    }

    #[test]
    fn acceleration_scales_elapsed_time() {
        let w = world(t0(), 2022, 7, 0);
        let a = world_time_at(&w, t0() + TimeDelta::seconds(30));
        let b = world_time_at(&w, t0() + TimeDelta::seconds(31));
        assert_eq!(b - a, TimeDelta::seconds(7));
    }

    #[test]
    fn ten_seconds_at_sixty_times_in_2070() {
        let w = world(t0(), 2070, 60, 0);
        let expected = Utc
            .with_ymd_and_hms(2070, 5, 1, 12, 10, 0)
            .unwrap()
            .naive_utc();
        assert_eq!(world_time_at(&w, t0() + TimeDelta::seconds(10)), expected);
    }

    #[test]
    fn offset_is_added_once() {
        let w = world(t0(), 2070, 60, -3_600);
        let expected = Utc.with_ymd_and_hms(2070, 5, 1, 11, 0, 0).unwrap().naive_utc();
        assert_eq!(world_time_at(&w, t0()), expected);
    }

    #[test]
    fn leap_day_creation_rolls_over() {
        let created = Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap();
        let w = world(created, 2071, 1, 0);
        let expected = Utc.with_ymd_and_hms(2071, 3, 1, 8, 0, 0).unwrap().naive_utc();
        assert_eq!(world_time_at(&w, created), expected);
    }

    #[test]
    fn projects_real_timestamps() {
        let w = world(t0(), 2070, 60, 0);
        let now = t0() + TimeDelta::seconds(10);
        // One real minute ago is one world hour before the current world time.
        let projected = to_world_time(&w, now - TimeDelta::seconds(60), now);
        assert_eq!(projected, world_time_at(&w, now) - TimeDelta::hours(1));
    }

    #[test]
    fn formats_same_day_as_clock_time() {
        let w = world(t0(), 2070, 60, 0);
        let now = t0() + TimeDelta::seconds(10);
        assert_eq!(format_world_timestamp(&w, now - TimeDelta::seconds(60), now), "11:10 AM");
        // A real day ago is sixty world days ago.
        assert_eq!(
            format_world_timestamp(&w, now - TimeDelta::days(1), now),
            "03/02/2070"
        );
    }

    #[test]
    fn age_counts_whole_years() {
        let dob = NaiveDate::from_ymd_opt(2040, 6, 15).unwrap();
        let before = NaiveDate::from_ymd_opt(2070, 6, 14).unwrap().and_hms_opt(23, 0, 0).unwrap();
        let on = NaiveDate::from_ymd_opt(2070, 6, 15).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(age_at(dob, before), 29);
        assert_eq!(age_at(dob, on), 30);
    }
}
