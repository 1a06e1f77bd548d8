pub mod local;
pub mod supabase;

use crate::error::{PipelineError, Result};
use crate::types::{ExportRecord, RawInteraction, UploadStats};

pub use local::JsonFileSource;
pub use supabase::SupabaseStore;

pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Full-table read of interaction rows.
pub trait InteractionSource {
    fn fetch_interactions(&self) -> Result<Vec<RawInteraction>>;

    /// Short human-readable origin for progress messages.
    fn describe(&self) -> String;
}

/// Upsert of item vectors keyed by item identifier.
pub trait VectorSink {
    fn upsert_embeddings(&self, records: &[ExportRecord]) -> Result<()>;
}

/// Upload `records` in sequential chunks. The first failing chunk aborts the
/// rest; the error names the record offset to resume from.
pub fn upload_chunked(
    sink: &dyn VectorSink,
    records: &[ExportRecord],
    chunk_size: usize,
    on_chunk: Option<&dyn Fn(usize, usize)>,
) -> Result<UploadStats> {
    let chunk_size = chunk_size.max(1);
    let total_chunks = records.len().div_ceil(chunk_size);
    let mut stats = UploadStats::default();

    for (i, chunk) in records.chunks(chunk_size).enumerate() {
        sink.upsert_embeddings(chunk).map_err(|e| {
            let offset = i * chunk_size;
            tracing::error!(chunk = i + 1, total_chunks, offset, error = %e, "upload aborted");
            PipelineError::store(
                format!("upload of chunk {}/{total_chunks} (records from offset {offset})", i + 1),
                e,
            )
        })?;
        stats.chunks += 1;
        stats.records += chunk.len();
        if let Some(progress) = on_chunk {
            progress(i + 1, total_chunks);
        }
    }

    Ok(stats)
}
