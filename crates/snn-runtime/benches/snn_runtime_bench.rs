use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use snn_runtime::{ConnectionId, GroupBuilder, Network, NetworkBuilder, NetworkConfig, Simulation, SynapseSpec};

fn build_chain_network(neurons: u32) -> Network {
    let mut cfg = NetworkConfig::default();
    cfg.max_delay = 1;
    let (mut builder, _) = NetworkBuilder::new(cfg).add_group(GroupBuilder::regular(neurons));
    for i in 0..(neurons.saturating_sub(1)) {
        builder = builder.connect(SynapseSpec {
            pre: i,
            post: i + 1,
            weight: 2.0,
            max_syn_wt: 10.0,
            delay: 1,
            conn_id: ConnectionId::new(0),
        });
    }
    let mut net = builder.build().expect("bench network build");
    net.neurons.ext_current[0] = 15.0;
    net
}

fn build_fully_connected_network(neurons: u32) -> Network {
    let cfg = NetworkConfig::default();
    let (mut builder, _) = NetworkBuilder::new(cfg).add_group(GroupBuilder::regular(neurons));
    for pre in 0..neurons {
        for post in 0..neurons {
            if pre == post {
                continue;
            }
            builder = builder.connect(SynapseSpec {
                pre,
                post,
                weight: 0.1,
                max_syn_wt: 5.0,
                delay: 1,
                conn_id: ConnectionId::new(0),
            });
        }
    }
    let mut net = builder.build().expect("bench network build");
    for n in 0..neurons as usize {
        net.neurons.ext_current[n] = 12.0;
    }
    net
}

fn bench_tick_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("snn_runtime_tick");
    let ticks = 1_000u32;

    for &n in &[8u32, 64u32, 256u32] {
        group.throughput(Throughput::Elements(n as u64 * ticks as u64));
        group.bench_with_input(BenchmarkId::new("chain", n), &n, |b, &n| {
            b.iter_batched(
                || Simulation::new(build_chain_network(n), Some(42)).unwrap(),
                |mut sim| {
                    let _ = sim.run_ticks(ticks).unwrap();
                },
                BatchSize::SmallInput,
            );
        });

        if n <= 64 {
            group.bench_with_input(BenchmarkId::new("fully_connected", n), &n, |b, &n| {
                b.iter_batched(
                    || Simulation::new(build_fully_connected_network(n), Some(42)).unwrap(),
                    |mut sim| {
                        let _ = sim.run_ticks(ticks).unwrap();
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_tick_throughput);
criterion_main!(benches);
