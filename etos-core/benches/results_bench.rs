//! Benchmarks for verdict evaluation and event verification
//!
//! Measures how evaluation and signature checks scale with suite count.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use etos_core::events::{Event, TestSuiteOutcome};
use etos_core::integrity::{verify_events, Signer};
use etos_core::{Events, TestResults};

fn create_run(suites: usize, signer: Option<&Signer>) -> Events {
    let mut events = Events::new();
    let tercc = Event::tercc("bench");
    let triggered = Event::activity_triggered("bench run", tercc.id());

    let mut started = Vec::with_capacity(suites);
    for i in 0..suites {
        started.push(Event::test_suite_started(format!("suite-{}", i), triggered.id()));
    }
    events.tercc = Some(tercc);
    events.activity.triggered = Some(triggered);
    events.merge_main_suites(started);

    for (i, suite) in events.main_suites.iter_mut().enumerate() {
        let conclusion = if i % 10 == 9 { "FAILED" } else { "SUCCESSFUL" };
        suite.finished = Some(Event::test_suite_finished(
            suite.started.id(),
            TestSuiteOutcome {
                verdict: None,
                conclusion: Some(conclusion.to_string()),
                description: Some(format!("suite {} done", i)),
            },
        ));
    }

    if let Some(signer) = signer {
        if let Some(e) = events.tercc.as_mut() {
            let _ = signer.sign(e);
        }
        if let Some(e) = events.activity.triggered.as_mut() {
            let _ = signer.sign(e);
        }
        for suite in events.main_suites.iter_mut() {
            let _ = signer.sign(&mut suite.started);
            if let Some(e) = suite.finished.as_mut() {
                let _ = signer.sign(e);
            }
        }
    }
    events
}

fn bench_get_results(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_results");

    for suites in [1, 10, 100, 1000] {
        let events = create_run(suites, None);
        group.bench_with_input(BenchmarkId::from_parameter(suites), &events, |b, events| {
            b.iter(|| black_box(TestResults::new(events).get_results()))
        });
    }

    group.finish();
}

fn bench_verify_events(c: &mut Criterion) {
    let signer = Signer::from_pem(include_str!("../tests/fixtures/signing-key.pem")).unwrap();
    let key = signer.verifying_key();
    let mut group = c.benchmark_group("verify_events");

    for suites in [1, 10, 100] {
        let events = create_run(suites, Some(&signer));
        group.bench_with_input(BenchmarkId::from_parameter(suites), &events, |b, events| {
            b.iter(|| black_box(verify_events(events, &key)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_get_results, bench_verify_events);
criterion_main!(benches);
