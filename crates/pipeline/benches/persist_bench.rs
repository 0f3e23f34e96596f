//! Persist stage write throughput: save_chunks for a file's worth of chunks.
//!
//! Run with: cargo bench -p pipeline --bench persist_bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use db::Storage;
use sift_core::{Chunk, ChunkType};
use std::hint::black_box;
use tempfile::TempDir;

const VECTOR_DIM: usize = 768;

fn make_chunk(file_path: &str, idx: usize) -> Chunk {
  let content = format!("pub fn function_{idx}(arg: i32) -> i32 {{ arg * 2 }}");
  let mut chunk = Chunk::new(file_path, idx, content, ChunkType::Code);
  chunk.start_line = idx as u32 * 10 + 1;
  chunk.end_line = chunk.start_line + 8;
  chunk.embedding = Some((0..VECTOR_DIM).map(|i| ((i + idx) as f32 * 0.001).sin()).collect());
  chunk
}

fn bench_persist_one_file(c: &mut Criterion) {
  let rt = tokio::runtime::Runtime::new().unwrap();
  let mut group = c.benchmark_group("persist_save_chunks");

  for count in [10, 50, 100, 300].iter() {
    group.throughput(Throughput::Elements(*count as u64));
    let chunks: Vec<Chunk> = (0..*count).map(|i| make_chunk("src/module.rs", i)).collect();

    group.bench_with_input(BenchmarkId::from_parameter(count), &chunks, |b, chunks| {
      b.iter(|| {
        rt.block_on(async {
          let dir = TempDir::new().unwrap();
          let storage = Storage::open(dir.path().join("test.lance"), VECTOR_DIM).await.unwrap();
          storage.save_chunks("src/module.rs", black_box(chunks)).await.unwrap();
        });
      });
    });
  }

  group.finish();
}

fn bench_delete_then_reinsert(c: &mut Criterion) {
  let rt = tokio::runtime::Runtime::new().unwrap();
  let mut group = c.benchmark_group("persist_delete_then_reinsert");
  group.sample_size(20);

  let chunks: Vec<Chunk> = (0..50).map(|i| make_chunk("src/module.rs", i)).collect();

  group.bench_function("update_existing_file", |b| {
    b.iter(|| {
      rt.block_on(async {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("test.lance"), VECTOR_DIM).await.unwrap();
        storage.save_chunks("src/module.rs", &chunks).await.unwrap();
        storage.save_chunks("src/module.rs", black_box(&chunks)).await.unwrap();
      });
    });
  });

  group.finish();
}

criterion_group!(benches, bench_persist_one_file, bench_delete_then_reinsert);
criterion_main!(benches);
