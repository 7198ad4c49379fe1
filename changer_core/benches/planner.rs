use changer_core::planner::plan;
use changer_core::{Available, CoinType};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

fn tubes(spec: &[(u8, u32, u32)]) -> Vec<Available> {
    spec.iter()
        .map(|&(t, value, dispensable)| Available {
            coin_type: CoinType(t),
            value,
            dispensable,
        })
        .collect()
}

pub fn bench_plan(c: &mut Criterion) {
    let mut g = c.benchmark_group("plan");
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p changer_core --bench planner
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    // greedy settles these on the first pass
    let euro = tubes(&[(1, 5, 40), (2, 10, 40), (3, 20, 40), (4, 50, 20), (5, 100, 10)]);
    // greedy dead ends that need the backtracking search
    let awkward = tubes(&[(1, 25, 3), (2, 20, 6), (3, 7, 9)]);

    for &amount in &[35u32, 185, 1995] {
        g.bench_function(format!("greedy_{amount}"), |b| {
            b.iter_batched(
                || euro.clone(),
                |t| black_box(plan(black_box(amount), &t)),
                BatchSize::SmallInput,
            )
        });
    }
    for &amount in &[40u32, 103, 181] {
        g.bench_function(format!("backtrack_{amount}"), |b| {
            b.iter_batched(
                || awkward.clone(),
                |t| black_box(plan(black_box(amount), &t)),
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(planner, bench_plan);
criterion_main!(planner);
