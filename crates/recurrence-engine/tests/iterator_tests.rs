//! Tests for the lazy occurrence iterator.

use chrono::{Datelike, Timelike};
use recurrence_engine::{expand, Occurrence, Params, Phase, Recurrence, Rule, RuleError};

fn starts(occurrences: &[Occurrence]) -> Vec<String> {
    occurrences.iter().map(|o| o.start.clone()).collect()
}

fn dates(occurrences: &[Occurrence]) -> Vec<(i32, u32, u32)> {
    occurrences
        .iter()
        .map(|o| (o.start_at.year(), o.start_at.month(), o.start_at.day()))
        .collect()
}

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

#[test]
fn daily_count_five() {
    let params = Params::new()
        .set("dtstart", "2024-01-01T09:00:00")
        .set("rrule", "FREQ=DAILY;COUNT=5");
    let result = expand(&params).expect("valid rule");

    assert_eq!(
        starts(&result),
        vec![
            "2024-01-01T09:00:00+00:00",
            "2024-01-02T09:00:00+00:00",
            "2024-01-03T09:00:00+00:00",
            "2024-01-04T09:00:00+00:00",
            "2024-01-05T09:00:00+00:00",
        ]
    );
    assert_eq!(result[0].recurrence_id, "20240101T090000Z");
    assert!(result.iter().all(|o| o.sequence.is_none()));
}

#[test]
fn weekly_until_is_exclusive() {
    let params = Params::new()
        .set("dtstart", "2024-01-01T00:00:00")
        .set("rrule", "FREQ=WEEKLY;BYDAY=MO,WE,FR;UNTIL=2024-01-15T00:00:00Z");
    let result = expand(&params).expect("valid rule");

    assert_eq!(
        dates(&result),
        vec![
            (2024, 1, 1),
            (2024, 1, 3),
            (2024, 1, 5),
            (2024, 1, 8),
            (2024, 1, 10),
            (2024, 1, 12),
        ]
    );
}

#[test]
fn yearly_leap_day_skips_common_years() {
    // DTSTART is itself the first instance, so COUNT=3 covers 2020, 2024, 2028.
    let params = Params::new()
        .set("dtstart", "20200229")
        .set("rrule", "FREQ=YEARLY;BYMONTH=2;BYMONTHDAY=29;COUNT=3");
    let result = expand(&params).expect("valid rule");

    assert_eq!(
        dates(&result),
        vec![(2020, 2, 29), (2024, 2, 29), (2028, 2, 29)]
    );

    // With COUNT=2 the second slot is 2024; DTSTART takes the first.
    let params = params.set("count", "2");
    let result = expand(&params).expect("valid rule");
    assert_eq!(dates(&result), vec![(2020, 2, 29), (2024, 2, 29)]);
}

#[test]
fn yearly_leap_day_without_by_parts() {
    let params = Params::new()
        .set("dtstart", "2020-02-29T12:00:00")
        .set("rrule", "FREQ=YEARLY;COUNT=3");
    let result = expand(&params).expect("valid rule");
    assert_eq!(
        dates(&result),
        vec![(2020, 2, 29), (2024, 2, 29), (2028, 2, 29)]
    );
}

#[test]
fn monthly_31st_never_clamps() {
    let params = Params::new()
        .set("dtstart", "2024-01-31T10:00:00")
        .set("rrule", "FREQ=MONTHLY;BYMONTHDAY=31;COUNT=7");
    let result = expand(&params).expect("valid rule");

    let months: Vec<u32> = result.iter().map(|o| o.start_at.month()).collect();
    assert_eq!(months, vec![1, 3, 5, 7, 8, 10, 12]);
    assert!(result.iter().all(|o| o.start_at.day() == 31));
}

#[test]
fn monthly_anchor_day_skips_short_months() {
    let params = Params::new()
        .set("dtstart", "2024-01-31T10:00:00")
        .set("rrule", "FREQ=MONTHLY;COUNT=4");
    let result = expand(&params).expect("valid rule");
    assert_eq!(
        dates(&result),
        vec![(2024, 1, 31), (2024, 3, 31), (2024, 5, 31), (2024, 7, 31)]
    );
}

#[test]
fn exdate_slot_is_backfilled() {
    let params = Params::new()
        .set("dtstart", "2024-01-01T09:00:00")
        .set("rrule", "FREQ=DAILY;COUNT=3")
        .set("exdate", "20240102T090000");
    let result = expand(&params).expect("valid rule");

    assert_eq!(dates(&result), vec![(2024, 1, 1), (2024, 1, 3), (2024, 1, 4)]);
}

// ---------------------------------------------------------------------------
// Session states
// ---------------------------------------------------------------------------

#[test]
fn phases_follow_the_session() {
    let rule = Rule::from_params(
        &Params::new()
            .set("dtstart", "20240101T090000")
            .set("rrule", "FREQ=DAILY;COUNT=2"),
    )
    .expect("valid rule");
    let mut iter = rule.occurrences();
    assert_eq!(iter.phase(), Phase::Ready);
    assert!(iter.next().is_some());
    assert_eq!(iter.phase(), Phase::Producing);
    assert!(iter.next().is_some());
    assert!(iter.next().is_none());
    assert_eq!(iter.phase(), Phase::Exhausted);
    assert!(iter.next().is_none());
}

#[test]
fn invalid_rule_yields_nothing() {
    let recurrence = Recurrence::new(&Params::new().set("dtstart", "20240101").set("freq", "HOURLY").set("byweekno", "1"));
    assert!(recurrence.is_error());
    assert!(matches!(
        recurrence.error(),
        Some(RuleError::IncompatiblePart { part: "BYWEEKNO", .. })
    ));
    assert!(recurrence.rule().is_none());

    let mut iter = recurrence.occurrences();
    assert_eq!(iter.phase(), Phase::Errored);
    assert!(iter.next().is_none());
    assert_eq!(iter.phase(), Phase::Errored);
}

#[test]
fn valid_recurrence_wrapper() {
    let params = Params::new()
        .set("dtstart", "20240101T090000")
        .set("rrule", "FREQ=DAILY;COUNT=4");
    let recurrence = Recurrence::from(&params);
    assert!(!recurrence.is_error());
    assert_eq!(recurrence.occurrences().count(), 4);
    // Each session starts over.
    assert_eq!(recurrence.occurrences().count(), 4);
}

#[test]
fn expand_requires_a_bound() {
    let params = Params::new()
        .set("dtstart", "20240101T090000")
        .set("freq", "DAILY");
    assert!(matches!(expand(&params), Err(RuleError::InvalidParams(_))));

    let bounded = params.set("before", "20240104T000000");
    assert_eq!(expand(&bounded).expect("bounded").len(), 3);
}

#[test]
fn open_ended_rule_is_lazy() {
    let rule = Rule::from_params(
        &Params::new()
            .set("dtstart", "20240101T090000")
            .set("freq", "MINUTELY")
            .set("interval", "90"),
    )
    .expect("valid rule");
    let result: Vec<Occurrence> = rule.occurrences().take(3).collect();
    assert_eq!(
        starts(&result),
        vec![
            "2024-01-01T09:00:00+00:00",
            "2024-01-01T10:30:00+00:00",
            "2024-01-01T12:00:00+00:00",
        ]
    );
}

#[test]
fn iteration_guard_ends_rule_stream() {
    // February never has a 30th: only DTSTART is produced.
    let rule = Rule::from_params(
        &Params::new()
            .set("dtstart", "20240201T090000")
            .set("rrule", "FREQ=YEARLY;BYMONTH=2;BYMONTHDAY=30")
            .set("max", "25"),
    )
    .expect("valid rule");
    let result: Vec<Occurrence> = rule.occurrences().collect();
    assert_eq!(dates(&result), vec![(2024, 2, 1)]);
}

#[test]
fn iteration_guard_still_drains_rdates() {
    let rule = Rule::from_params(
        &Params::new()
            .set("dtstart", "20240201T090000")
            .set("rrule", "FREQ=YEARLY;BYMONTH=2;BYMONTHDAY=30")
            .set("rdate", "20300101T090000")
            .set("max", "10"),
    )
    .expect("valid rule");
    let result: Vec<Occurrence> = rule.occurrences().collect();
    assert_eq!(dates(&result), vec![(2024, 2, 1), (2030, 1, 1)]);
}

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

#[test]
fn window_keeps_occurrences_still_running_at_after() {
    let params = Params::new()
        .set("dtstart", "20240101T090000")
        .set("duration", "PT2H")
        .set("freq", "DAILY")
        .set("after", "20240103T100000")
        .set("before", "20240105T000000");
    let result = expand(&params).expect("valid rule");

    assert_eq!(dates(&result), vec![(2024, 1, 3), (2024, 1, 4)]);
    assert_eq!(result[0].end, "2024-01-03T11:00:00+00:00");
}

#[test]
fn window_far_from_dtstart_is_reached() {
    let params = Params::new()
        .set("dtstart", "2000-01-01T09:00:00")
        .set("freq", "DAILY")
        .set("after", "2024-06-01T00:00:00")
        .set("before", "2024-06-04T00:00:00");
    let result = expand(&params).expect("valid rule");
    assert_eq!(
        starts(&result),
        vec![
            "2024-06-01T09:00:00+00:00",
            "2024-06-02T09:00:00+00:00",
            "2024-06-03T09:00:00+00:00",
        ]
    );
}

#[test]
fn window_far_from_dtstart_with_expansion() {
    let params = Params::new()
        .set("dtstart", "2001-01-01T08:00:00")
        .set("tzid", "Europe/Berlin")
        .set("rrule", "FREQ=WEEKLY;INTERVAL=2;BYDAY=TU,TH")
        .set("after", "2024-06-01T00:00:00")
        .set("before", "2024-06-30T00:00:00");
    let result = expand(&params).expect("valid rule");

    // 2001-01-01 is a Monday; every other week from there.
    for o in &result {
        let weeks = (o.start_at.date_naive()
            - chrono::NaiveDate::from_ymd_opt(2001, 1, 1).unwrap())
        .num_days()
            / 7;
        assert_eq!(weeks % 2, 0, "{} is in an off week", o.start);
        assert_eq!(o.start_at.hour(), 8);
    }
    assert_eq!(result.len(), 4);
}

#[test]
fn window_before_dtstart_is_empty() {
    let params = Params::new()
        .set("dtstart", "20240101T090000")
        .set("freq", "DAILY")
        .set("before", "20231231T000000");
    assert!(expand(&params).expect("valid rule").is_empty());
}

#[test]
fn window_with_count_counts_skipped_instances() {
    let params = Params::new()
        .set("dtstart", "20240101T090000")
        .set("rrule", "FREQ=DAILY;COUNT=6")
        .set("after", "20240104T000000")
        .set("sequence", "true");
    let result = expand(&params).expect("valid rule");

    assert_eq!(dates(&result), vec![(2024, 1, 4), (2024, 1, 5), (2024, 1, 6)]);
    let sequences: Vec<Option<u32>> = result.iter().map(|o| o.sequence).collect();
    assert_eq!(sequences, vec![Some(4), Some(5), Some(6)]);
}

#[test]
fn sequence_numbers_skip_the_first_instance() {
    let params = Params::new()
        .set("dtstart", "20240101T090000")
        .set("rrule", "FREQ=WEEKLY;COUNT=3")
        .set("sequence", "yes");
    let result = expand(&params).expect("valid rule");
    let sequences: Vec<Option<u32>> = result.iter().map(|o| o.sequence).collect();
    assert_eq!(sequences, vec![None, Some(2), Some(3)]);

    let json = serde_json::to_value(&result[1]).expect("serializable");
    assert_eq!(json["sequence"], 2);
    let first = serde_json::to_value(&result[0]).expect("serializable");
    assert!(first.get("sequence").is_none());
    assert!(first.get("start_at").is_none());
}

// ---------------------------------------------------------------------------
// Output formats
// ---------------------------------------------------------------------------

#[test]
fn output_formats() {
    let base = Params::new()
        .set("dtstart", "20240101T090000")
        .set("duration", "PT30M")
        .set("rrule", "FREQ=DAILY;COUNT=1");

    let ical = expand(&base.clone().set("format", "ical")).unwrap();
    assert_eq!(ical[0].start, "20240101T090000Z");
    assert_eq!(ical[0].end, "20240101T093000Z");

    let epoch = expand(&base.clone().set("format", "timestamp")).unwrap();
    assert_eq!(epoch[0].start, "1704099600");

    let pattern = expand(&base.clone().set("format", "%d/%m/%Y %H:%M")).unwrap();
    assert_eq!(pattern[0].start, "01/01/2024 09:00");

    let zoned = expand(&base.set("tzid", "Asia/Tokyo").set("format", "ical")).unwrap();
    assert_eq!(zoned[0].start, "20240101T090000");
    assert_eq!(zoned[0].recurrence_id, "20240101T000000Z");
}

#[test]
fn epoch_input() {
    let params = Params::new()
        .set("dtstart", "@1704099600")
        .set("rrule", "FREQ=HOURLY;COUNT=2");
    let result = expand(&params).unwrap();
    assert_eq!(
        starts(&result),
        vec!["2024-01-01T09:00:00+00:00", "2024-01-01T10:00:00+00:00"]
    );
}

#[test]
fn output_is_strictly_increasing() {
    let params = Params::new()
        .set("dtstart", "20240101T000000")
        .set("tzid", "America/New_York")
        .set("rrule", "FREQ=MONTHLY;BYDAY=MO,FR;BYHOUR=8,17;BYMINUTE=0,30;COUNT=200");
    let result = expand(&params).unwrap();
    assert_eq!(result.len(), 200);
    assert!(result.windows(2).all(|w| w[0].start_at < w[1].start_at));
}
