use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};

use travelrag_core::role::MetadataFilter;
use travelrag_core::traits::VectorStore;
use travelrag_core::types::{Checkpoint, DocumentMetadata, IndexedDocument, RetrievedDocument, SourceKind};

use crate::schema::build_documents_schema;
use crate::table::{ensure_table, get_meta, open_db, set_meta};

const PERSISTED_VERSION_KEY: &str = "persisted_version";

/// LanceDB-backed [`VectorStore`]. Similarity is cosine; `score = 1 - distance`.
pub struct LanceVectorStore { db: Connection, table_name: String, meta_table: String, dim: usize }

impl LanceVectorStore {
	pub async fn open(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
		ensure!(dim > 0, "embedding dimension must be positive");
		let dim_i32 = i32::try_from(dim).map_err(|_| anyhow!("embedding dimension {} is too large", dim))?;
		let db = open_db(db_path.to_string_lossy().as_ref()).await?;
		ensure_table(&db, table_name, build_documents_schema(dim_i32)).await?;
		tracing::info!(path = %db_path.display(), table = table_name, dim, "vector store opened");
		Ok(Self { db, table_name: table_name.to_string(), meta_table: format!("{table_name}_meta"), dim })
	}

	pub fn dim(&self) -> usize { self.dim }

	async fn table(&self) -> Result<Table> {
		Ok(self.db.open_table(&self.table_name).execute().await?)
	}

	fn docs_to_record_batch(&self, docs: &[&IndexedDocument], embeddings: &[&Vec<f32>]) -> Result<RecordBatch> {
		let dim = i32::try_from(self.dim)?;
		let schema = build_documents_schema(dim);
		let mut ids = Vec::new(); let mut texts = Vec::new(); let mut sources = Vec::new(); let mut db_ids = Vec::new(); let mut hotel_ids = Vec::new(); let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
		for (doc, v) in docs.iter().zip(embeddings.iter()) {
			ids.push(doc.stable_id.clone()); texts.push(doc.text.clone()); sources.push(doc.metadata.source.as_str().to_string()); db_ids.push(doc.metadata.db_id); hotel_ids.push(doc.metadata.hotel_id);
			vectors.push(Some(v.iter().map(|&x| Some(x)).collect()));
		}
		let record_batch = RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(texts)),
			Arc::new(StringArray::from(sources)),
			Arc::new(Int64Array::from(db_ids)),
			Arc::new(Int64Array::from(hotel_ids)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
		])?;
		Ok(record_batch)
	}
}

/// SQL predicate for an exact-match metadata filter, `None` when unfiltered.
pub fn filter_predicate(filter: &MetadataFilter) -> Option<String> {
	let mut clauses = Vec::new();
	if let Some(source) = filter.source { clauses.push(format!("source = '{}'", source.as_str())); }
	if let Some(hotel_id) = filter.hotel_id { clauses.push(format!("hotel_id = {hotel_id}")); }
	if clauses.is_empty() { None } else { Some(clauses.join(" AND ")) }
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("{} column missing", name))
}

fn int_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Int64Array>()).ok_or_else(|| anyhow!("{} column missing", name))
}

fn batch_to_documents(batch: &RecordBatch) -> Result<Vec<RetrievedDocument>> {
	let ids = string_col(batch, "id")?;
	let texts = string_col(batch, "text")?;
	let sources = string_col(batch, "source")?;
	let db_ids = int_col(batch, "db_id")?;
	let hotel_ids = int_col(batch, "hotel_id")?;
	let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>()).ok_or_else(|| anyhow!("_distance column missing"))?;
	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let source: SourceKind = sources.value(i).parse()?;
		let hotel_id = if hotel_ids.is_null(i) { None } else { Some(hotel_ids.value(i)) };
		out.push(RetrievedDocument {
			id: ids.value(i).to_string(),
			text: texts.value(i).to_string(),
			metadata: DocumentMetadata { source, db_id: db_ids.value(i), hotel_id },
			score: 1.0 - distances.value(i),
		});
	}
	Ok(out)
}

#[async_trait]
impl VectorStore for LanceVectorStore {
	async fn upsert(&self, documents: &[IndexedDocument], embeddings: &[Vec<f32>]) -> Result<()> {
		ensure!(documents.len() == embeddings.len(), "documents ({}) and embeddings ({}) length must match", documents.len(), embeddings.len());
		if documents.is_empty() { return Ok(()); }
		for v in embeddings { ensure!(v.len() == self.dim, "dim mismatch: got {} expected {}", v.len(), self.dim); }
		// merge_insert rejects a batch that names the same key twice; last one wins
		let mut last_by_id: HashMap<&str, usize> = HashMap::new();
		for (i, d) in documents.iter().enumerate() { last_by_id.insert(d.stable_id.as_str(), i); }
		let mut keep: Vec<usize> = last_by_id.into_values().collect();
		keep.sort_unstable();
		let docs: Vec<&IndexedDocument> = keep.iter().map(|&i| &documents[i]).collect();
		let vecs: Vec<&Vec<f32>> = keep.iter().map(|&i| &embeddings[i]).collect();

		let record_batch = self.docs_to_record_batch(&docs, &vecs)?; let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		let table = self.table().await?;
		let mut mi = table.merge_insert(&["id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		let _ = mi.execute(reader).await?;
		tracing::debug!(table = %self.table_name, rows = docs.len(), "upserted");
		Ok(())
	}

	async fn persist(&self) -> Result<()> {
		let version = self.table().await?.version().await?;
		set_meta(&self.db, &self.meta_table, PERSISTED_VERSION_KEY, &version.to_string()).await?;
		tracing::debug!(table = %self.table_name, version, "persisted");
		Ok(())
	}

	async fn retrieve(&self, query_vector: &[f32], k: usize, score_threshold: f32, filter: &MetadataFilter) -> Result<Vec<RetrievedDocument>> {
		ensure!(query_vector.len() == self.dim, "query dim mismatch: got {} expected {}", query_vector.len(), self.dim);
		if k == 0 { return Ok(Vec::new()); }
		let table = self.table().await?;
		if table.count_rows(None).await? == 0 { return Ok(Vec::new()); }
		let mut query = table.vector_search(query_vector.to_vec())?.distance_type(DistanceType::Cosine).limit(k);
		if let Some(predicate) = filter_predicate(filter) { query = query.only_if(predicate); }
		let mut stream = query.execute().await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? { hits.extend(batch_to_documents(&batch)?); }
		hits.retain(|h| h.score >= score_threshold);
		hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
		hits.truncate(k);
		Ok(hits)
	}

	async fn count(&self) -> Result<usize> {
		Ok(self.table().await?.count_rows(None).await?)
	}

	async fn last_persisted(&self) -> Result<Option<Checkpoint>> {
		let Some(entry) = get_meta(&self.db, &self.meta_table, PERSISTED_VERSION_KEY).await? else { return Ok(None) };
		let version = entry.value.parse::<u64>().map_err(|e| anyhow!("bad persisted version '{}': {}", entry.value, e))?;
		Ok(Some(Checkpoint { version, at_millis: entry.updated_at }))
	}
}
