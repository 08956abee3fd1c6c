use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use statediff::collector::{Collector, TextClassifier};
use statediff::config::ScanConfig;
use statediff::scanner::{ExclusionMatcher, PathEnumerator};
use statediff::utils::hash::hash_file;
use std::fs;
use std::hint::black_box;
use std::path::Path;
use tempfile::tempdir;

fn create_tree(dir: &Path, dirs: usize, files_per_dir: usize) {
    for d in 0..dirs {
        let sub = dir.join(format!("dir_{d}"));
        fs::create_dir_all(&sub).unwrap();
        for f in 0..files_per_dir {
            let content = format!("config value {d}.{f}\n").repeat(32);
            fs::write(sub.join(format!("file_{f}.conf")), content).unwrap();
        }
    }
}

fn benchmark_hashing(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let small_file = dir.path().join("small.bin");
    let large_file = dir.path().join("large.bin");
    fs::write(&small_file, vec![b'a'; 1024]).unwrap(); // 1KB
    fs::write(&large_file, vec![b'c'; 1024 * 1024 * 10]).unwrap(); // 10MB

    let mut group = c.benchmark_group("file_hashing");

    group.bench_function("hash_1kb", |b| {
        b.iter(|| hash_file(black_box(&small_file)));
    });
    group.bench_function("hash_10mb", |b| {
        b.iter(|| hash_file(black_box(&large_file)));
    });

    group.finish();
}

fn benchmark_enumeration(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    create_tree(dir.path(), 20, 50);

    let excluded = format!("{}/dir_1*", dir.path().display());
    let matcher = ExclusionMatcher::new(&[excluded]).unwrap();
    let enumerator = PathEnumerator::new(vec![dir.path().to_path_buf()], matcher, false);

    c.bench_function("walk_1000_files", |b| {
        b.iter(|| black_box(enumerator.walk().count()));
    });
}

fn benchmark_collect(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    create_tree(dir.path(), 10, 100);

    let mut group = c.benchmark_group("collect");
    group.sample_size(20);

    for workers in &[1usize, 4, 8] {
        let config = ScanConfig {
            max_workers: *workers,
            min_parallel_size: 0,
            ..ScanConfig::default()
        };
        let enumerator = PathEnumerator::new(
            vec![dir.path().to_path_buf()],
            ExclusionMatcher::default(),
            false,
        );
        let collector = Collector::new(&config, TextClassifier::default());

        group.bench_with_input(BenchmarkId::new("workers", workers), workers, |b, _| {
            b.iter(|| collector.collect(enumerator.walk()).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_hashing,
    benchmark_enumeration,
    benchmark_collect
);
criterion_main!(benches);
