//! Embed stage batching throughput.
//!
//! Run with: cargo bench -p pipeline --bench embed_bench

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use embedding::{EmbeddingError, EmbeddingProvider};
use sift_core::{Chunk, ChunkType, EventType, PipelineFileContext};
use std::hint::black_box;

const VECTOR_DIM: usize = 768;

struct StubEmbedder;

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
  fn name(&self) -> &str {
    "stub"
  }
  fn model_id(&self) -> &str {
    "stub"
  }
  fn dimensions(&self) -> usize {
    VECTOR_DIM
  }
  async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
    Ok(vec![0.0; VECTOR_DIM])
  }
  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    Ok(texts.iter().map(|_| vec![0.0; VECTOR_DIM]).collect())
  }
  async fn is_available(&self) -> bool {
    true
  }
}

fn make_context(chunk_count: usize) -> PipelineFileContext {
  let mut ctx = PipelineFileContext::new(
    format!("src/module_{chunk_count}.rs"),
    std::path::PathBuf::from(format!("/tmp/module_{chunk_count}.rs")),
    EventType::Scan,
  );
  ctx.chunks = (0..chunk_count)
    .map(|i| Chunk::new(ctx.file_path.clone(), i, format!("pub fn function_{i}(arg: i32) -> i32 {{ arg * 2 }}"), ChunkType::Code))
    .collect();
  ctx
}

fn bench_embed_batch_sizes(c: &mut Criterion) {
  let rt = tokio::runtime::Runtime::new().unwrap();
  let provider = StubEmbedder;
  let mut group = c.benchmark_group("embed_chunks_per_file");

  for count in [5, 20, 50, 100].iter() {
    group.throughput(Throughput::Elements(*count as u64));
    group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
      b.iter(|| {
        rt.block_on(async {
          let ctx = black_box(make_context(count));
          let refs: Vec<&str> = ctx.chunks.iter().map(|c| c.content.as_str()).collect();
          for batch in refs.chunks(10) {
            provider.embed_batch(batch).await.unwrap();
          }
        });
      });
    });
  }

  group.finish();
}

criterion_group!(benches, bench_embed_batch_sizes);
criterion_main!(benches);
