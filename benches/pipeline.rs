use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use aclrel::{
    classify_entries, group_rules, parse_line, ClassifyOptions, DeviceRole, GroupingOptions,
    LiveAddressSet, LivenessChecker, LivenessOptions, Rule, RuleId,
};

/// Core and access rules for two sites, `n` per role, mirrored between
/// the sites so the cross-site passes have work to do.
fn build_entries(n: u32) -> Vec<(RuleId, Rule)> {
    let mut entries = Vec::new();
    for i in 0..n {
        let (a, b) = (i / 256, i % 256);
        let port = 8000 + i % 50;
        let lines = [
            ("east", DeviceRole::Core, format!("permit tcp 10.1.0.0/16 10.2.{a}.0/24")),
            ("east", DeviceRole::Access, format!("permit tcp 10.1.{b}.0/24 10.2.{a}.0/24 eq {port}")),
            ("west", DeviceRole::Core, format!("permit tcp 10.2.{a}.0/24 10.1.0.0/16")),
            ("west", DeviceRole::Access, format!("permit tcp 10.2.{a}.0/24 eq {port} 10.1.{b}.0/24")),
        ];
        for (column, (site, role, line)) in (1..).zip(lines) {
            entries.push((RuleId::new(site, role, column, i + 1), parse_line(&line).unwrap()));
        }
    }
    entries
}

fn options() -> ClassifyOptions {
    ClassifyOptions {
        sites: BTreeMap::from([
            ("east".to_owned(), vec!["10.1.0.0/16".parse().unwrap()]),
            ("west".to_owned(), vec!["10.2.0.0/16".parse().unwrap()]),
        ]),
        special: vec!["172.16.0.0/12".parse().unwrap()],
        ..ClassifyOptions::default()
    }
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let options = options();

    for &n in &[10, 50, 200] {
        let entries = build_entries(n);
        group.bench_function(&format!("{n}_rules_per_role"), |b| {
            b.iter(|| classify_entries(black_box(&entries), &options));
        });
    }

    group.finish();
}

fn bench_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("group");

    for &n in &[20, 100, 400] {
        let rules: Vec<(u32, Rule)> = (0..n)
            .map(|i: u32| {
                let prefix = 16 + i % 9;
                let line = format!("permit tcp 10.{}.0.0/{prefix} any eq 443", i % 4);
                (i + 1, parse_line(&line).unwrap())
            })
            .collect();
        group.bench_function(&format!("{n}_rules"), |b| {
            b.iter(|| group_rules(black_box(&rules), &GroupingOptions::default()));
        });
    }

    group.finish();
}

fn bench_liveness_throughput(c: &mut Criterion) {
    let thread_counts = [1, 2, 4, 8];
    let live: LiveAddressSet = (0..4096_u32)
        .map(|i| Ipv4Addr::from(0x0A14_0000 + i * 3))
        .collect();
    let checker = Arc::new(LivenessChecker::new(live, LivenessOptions::default()));
    let entries = Arc::new(build_entries(50));

    let mut group = c.benchmark_group("liveness_throughput");
    group.measurement_time(Duration::from_secs(5));

    for &threads in &thread_counts {
        group.bench_function(&format!("{threads}_threads"), |b| {
            b.iter_custom(|iters| {
                let per_thread = iters / threads as u64;
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let checker = Arc::clone(&checker);
                        let entries = Arc::clone(&entries);
                        thread::spawn(move || {
                            let start = Instant::now();
                            for _ in 0..per_thread {
                                black_box(checker.check_entries(&entries));
                            }
                            start.elapsed()
                        })
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|h| h.join().unwrap())
                    .max()
                    .unwrap_or(Duration::ZERO)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_grouping, bench_liveness_throughput);
criterion_main!(benches);
