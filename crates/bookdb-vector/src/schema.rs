use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const ID: &str = "id";
pub const RECORD_ID: &str = "record_id";
pub const CHUNK: &str = "chunk";
pub const TITLE: &str = "title";
pub const YEAR: &str = "year";
pub const PAGES: &str = "pages";
pub const DISTANCE: &str = "_distance";

pub fn vector_type(dim: usize) -> DataType {
	DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32)
}

/// Chunk table: text, denormalized parent fields and the embedding column.
pub fn build_chunk_schema(embedding_field: &str, dim: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(ID, DataType::Utf8, false),
		Field::new(RECORD_ID, DataType::Utf8, false),
		Field::new(CHUNK, DataType::Utf8, false),
		Field::new(TITLE, DataType::Utf8, false),
		Field::new(YEAR, DataType::Int64, false),
		Field::new(PAGES, DataType::Int64, false),
		Field::new(embedding_field, vector_type(dim), true),
	]))
}

pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
	]))
}
