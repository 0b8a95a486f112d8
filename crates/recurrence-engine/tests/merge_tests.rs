//! Tests for merging RDATE entries into the rule stream and EXDATE removal.

use chrono::{Datelike, Timelike};
use recurrence_engine::{expand, Occurrence, Params};

fn every_other_day() -> Params {
    Params::new()
        .set("dtstart", "20240101T090000")
        .set("duration", "PT1H")
        .set("rrule", "FREQ=DAILY;INTERVAL=2;COUNT=3")
}

fn summary(occurrences: &[Occurrence]) -> Vec<(u32, u32, String)> {
    occurrences
        .iter()
        .map(|o| (o.start_at.day(), o.start_at.hour(), o.end.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// RDATE
// ---------------------------------------------------------------------------

#[test]
fn rdates_interleave_in_start_order() {
    let params = every_other_day().set("rdate", "20240104T120000,20240102T120000");
    let result = expand(&params).unwrap();

    let days: Vec<(u32, u32)> = result
        .iter()
        .map(|o| (o.start_at.day(), o.start_at.hour()))
        .collect();
    assert_eq!(days, vec![(1, 9), (2, 12), (3, 9), (4, 12), (5, 9)]);
}

#[test]
fn rdates_do_not_consume_count() {
    let params = every_other_day().set("rdate", "20240110T090000");
    let result = expand(&params).unwrap();
    assert_eq!(result.len(), 4);
    assert_eq!(result[3].start, "2024-01-10T09:00:00+00:00");
}

#[test]
fn rdate_wins_a_tie_with_the_rule() {
    let params = every_other_day().set("rdate", "20240103T090000/PT30M");
    let result = expand(&params).unwrap();

    assert_eq!(
        summary(&result),
        vec![
            (1, 9, "2024-01-01T10:00:00+00:00".to_string()),
            (3, 9, "2024-01-03T09:30:00+00:00".to_string()),
            (5, 9, "2024-01-05T10:00:00+00:00".to_string()),
        ]
    );
}

#[test]
fn rdate_end_forms() {
    let params = every_other_day().set(
        "rdate",
        "20240110T090000/20240110T120000,20240111T090000/P1D,20240112T090000",
    );
    let result = expand(&params).unwrap();
    let ends: Vec<&str> = result[3..].iter().map(|o| o.end.as_str()).collect();
    assert_eq!(
        ends,
        vec![
            "2024-01-10T12:00:00+00:00",
            "2024-01-12T09:00:00+00:00",
            // No period: the rule's own span.
            "2024-01-12T10:00:00+00:00",
        ]
    );
}

#[test]
fn rdate_own_end_beats_rule_duration() {
    // The rule has DURATION=PT1H; entries with their own end or period keep it.
    let params = every_other_day().set(
        "rdate",
        "20240110T090000/20240110T093000,20240111T090000/PT15M,20240112T090000",
    );
    let result = expand(&params).unwrap();
    let ends: Vec<&str> = result[3..].iter().map(|o| o.end.as_str()).collect();
    assert_eq!(
        ends,
        vec![
            "2024-01-10T09:30:00+00:00",
            "2024-01-11T09:15:00+00:00",
            "2024-01-12T10:00:00+00:00",
        ]
    );
}

#[test]
fn duplicate_rdates_collapse() {
    let params = every_other_day().set("rdate", "20240102T120000,20240102T120000");
    assert_eq!(expand(&params).unwrap().len(), 4);
}

#[test]
fn rdates_before_dtstart_are_dropped() {
    let params = every_other_day().set("rdate", "20231231T090000");
    let result = expand(&params).unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result[0].start, "2024-01-01T09:00:00+00:00");
}

#[test]
fn rdates_past_until_are_kept_within_before() {
    let params = Params::new()
        .set("dtstart", "20240101T090000")
        .set("rrule", "FREQ=DAILY;UNTIL=20240103T000000Z")
        .set("rdate", "20240201T090000,20240401T090000")
        .set("before", "20240301T000000");
    let result = expand(&params).unwrap();
    let days: Vec<(u32, u32)> = result
        .iter()
        .map(|o| (o.start_at.month(), o.start_at.day()))
        .collect();
    assert_eq!(days, vec![(1, 1), (1, 2), (2, 1)]);
}

#[test]
fn rdates_respect_the_after_bound() {
    let params = every_other_day()
        .set("rdate", "20240102T120000,20240104T120000")
        .set("after", "20240103T093000");
    let result = expand(&params).unwrap();
    let days: Vec<u32> = result.iter().map(|o| o.start_at.day()).collect();
    // The Jan 3 instance runs until 10:00, past `after`.
    assert_eq!(days, vec![3, 4, 5]);
}

#[test]
fn rdates_only_after_rule_ends() {
    let params = Params::new()
        .set("dtstart", "20240101T090000")
        .set("rrule", "FREQ=YEARLY;COUNT=1")
        .set("rdate", "20240301T090000,20240201T090000");
    let result = expand(&params).unwrap();
    let months: Vec<u32> = result.iter().map(|o| o.start_at.month()).collect();
    assert_eq!(months, vec![1, 2, 3]);
}

// ---------------------------------------------------------------------------
// EXDATE
// ---------------------------------------------------------------------------

#[test]
fn exdate_removes_dtstart() {
    let params = Params::new()
        .set("dtstart", "20240101T090000")
        .set("rrule", "FREQ=DAILY;COUNT=2")
        .set("exdate", "20240101T090000");
    let result = expand(&params).unwrap();
    let days: Vec<u32> = result.iter().map(|o| o.start_at.day()).collect();
    assert_eq!(days, vec![2, 3]);
}

#[test]
fn exdate_removes_matching_rdate() {
    let params = every_other_day()
        .set("rdate", "20240102T120000")
        .set("exdate", "20240102T120000");
    assert_eq!(expand(&params).unwrap().len(), 3);
}

#[test]
fn exdate_in_utc_matches_zoned_instance() {
    let params = Params::new()
        .set("dtstart", "20240101T090000")
        .set("tzid", "America/New_York")
        .set("rrule", "FREQ=DAILY;COUNT=3")
        .set("exdate", "20240102T140000Z");
    let result = expand(&params).unwrap();
    let days: Vec<u32> = result.iter().map(|o| o.start_at.day()).collect();
    assert_eq!(days, vec![1, 3, 4]);
}

#[test]
fn date_only_exdate_removes_the_whole_day() {
    let params = Params::new()
        .set("dtstart", "20240101T090000")
        .set("rrule", "FREQ=DAILY;BYHOUR=9,15;COUNT=4")
        .set("exdate", "20240102");
    let result = expand(&params).unwrap();
    let slots: Vec<(u32, u32)> = result
        .iter()
        .map(|o| (o.start_at.day(), o.start_at.hour()))
        .collect();
    assert_eq!(slots, vec![(1, 9), (1, 15), (3, 9), (3, 15)]);
}

#[test]
fn exdate_applies_after_setpos() {
    // Last weekday of each month. Excluding February's does not promote the
    // one before it.
    let params = Params::new()
        .set("dtstart", "20240131T170000")
        .set("rrule", "FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1;COUNT=3")
        .set("exdate", "20240229T170000");
    let result = expand(&params).unwrap();
    let dates: Vec<(u32, u32)> = result
        .iter()
        .map(|o| (o.start_at.month(), o.start_at.day()))
        .collect();
    assert_eq!(dates, vec![(1, 31), (3, 29), (4, 30)]);
}
