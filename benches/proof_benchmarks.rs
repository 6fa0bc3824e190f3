use std::hint::black_box;

use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use utreexo::accumulator::forest::Forest;
use utreexo::accumulator::node_hash::BitcoinNodeHash;
use utreexo::accumulator::proof::BatchProof;
use utreexo::accumulator::types::Leaf;

fn generate_test_hashes(count: usize, seed: u64) -> Vec<BitcoinNodeHash> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut bytes = [0u8; 32];
            rng.fill(&mut bytes);
            BitcoinNodeHash::new(bytes)
        })
        .collect()
}

fn setup(accumulator_size: usize) -> (Forest, Vec<BitcoinNodeHash>) {
    let hashes = generate_test_hashes(accumulator_size, 42);
    let leaves: Vec<Leaf> = hashes.iter().copied().map(Leaf::forgettable).collect();
    let mut forest = Forest::new();
    forest.modify(&leaves, &[]).unwrap();
    (forest, hashes)
}

fn proof_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("proof_verification");

    let accumulator_size = 1_000;
    let (forest, hashes) = setup(accumulator_size);
    let tops = forest.get_tops();

    for target_count in [1, 10, 100].iter() {
        // Every 7th leaf, so paths only partially overlap
        let targets: Vec<BitcoinNodeHash> =
            hashes.iter().step_by(7).take(*target_count).copied().collect();
        let proof = forest.prove_block(&targets).unwrap();

        group.throughput(Throughput::Elements(*target_count as u64));
        group.bench_with_input(
            BenchmarkId::new("verify", target_count),
            target_count,
            |b, _| {
                b.iter(|| {
                    let result = proof.verify(black_box(forest.num_leaves()), black_box(&tops));
                    black_box(result.unwrap())
                });
            },
        );
    }
    group.finish();
}

fn proof_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("proof_serialization");

    let (forest, hashes) = setup(1_000);

    for target_count in [1, 10, 100].iter() {
        let proof = forest.prove_block(&hashes[..*target_count]).unwrap();
        let bytes = proof.to_bytes();

        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("to_bytes", target_count),
            target_count,
            |b, _| {
                b.iter(|| black_box(proof.to_bytes()));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("from_bytes", target_count),
            target_count,
            |b, _| {
                b.iter(|| {
                    let proof = BatchProof::<BitcoinNodeHash>::from_bytes(black_box(&bytes));
                    black_box(proof.unwrap())
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, proof_verification, proof_serialization,);
criterion_main!(benches);
