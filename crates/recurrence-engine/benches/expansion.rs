//! Expansion throughput, with and without far-future query windows.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use recurrence_engine::{expand, Params};

fn weekly_meeting() -> Params {
    Params::new()
        .set("dtstart", "20200106T090000")
        .set("tzid", "America/New_York")
        .set("duration", "PT1H")
        .set("rrule", "FREQ=WEEKLY;BYDAY=MO,WE,FR")
}

fn bench_count(c: &mut Criterion) {
    let params = weekly_meeting().set("count", "500");
    c.bench_function("weekly_count_500", |b| {
        b.iter(|| expand(black_box(&params)).unwrap())
    });

    let params = Params::new()
        .set("dtstart", "20200131T170000")
        .set("tzid", "Europe/Berlin")
        .set("rrule", "FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1;COUNT=240");
    c.bench_function("monthly_setpos_count_240", |b| {
        b.iter(|| expand(black_box(&params)).unwrap())
    });
}

fn bench_far_window(c: &mut Criterion) {
    let params = weekly_meeting()
        .set("after", "20800101T000000")
        .set("before", "20800201T000000");
    c.bench_function("weekly_window_60_years_out", |b| {
        b.iter(|| expand(black_box(&params)).unwrap())
    });

    let params = Params::new()
        .set("dtstart", "20200101T000000")
        .set("rrule", "FREQ=MINUTELY;INTERVAL=15")
        .set("after", "20300101T000000")
        .set("before", "20300102T000000");
    c.bench_function("minutely_window_10_years_out", |b| {
        b.iter(|| expand(black_box(&params)).unwrap())
    });
}

criterion_group!(benches, bench_count, bench_far_window);
criterion_main!(benches);
