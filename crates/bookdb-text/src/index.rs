use std::path::Path;
use tantivy::{Index, TantivyDocument};
use tracing::info;

use bookdb_core::{Record, Result};

use crate::search::{backend, TantivyBookIndex};
use crate::tantivy_utils::{build_schema, register_tokenizer, ID, PAGES, SOURCE, SYNOPSIS, TITLE, YEAR};

impl TantivyBookIndex {
	/// Rebuild the record collection at `index_dir` from scratch.
	pub fn create(index_dir: &Path, records: &[Record]) -> Result<Self> {
		let schema = build_schema();
		if index_dir.exists() {
			std::fs::remove_dir_all(index_dir).map_err(backend)?;
		}
		std::fs::create_dir_all(index_dir).map_err(backend)?;
		let index = Index::create_in_dir(index_dir, schema.clone()).map_err(backend)?;
		register_tokenizer(&index);

		let id_field = schema.get_field(ID).map_err(backend)?;
		let title_field = schema.get_field(TITLE).map_err(backend)?;
		let synopsis_field = schema.get_field(SYNOPSIS).map_err(backend)?;
		let year_field = schema.get_field(YEAR).map_err(backend)?;
		let pages_field = schema.get_field(PAGES).map_err(backend)?;
		let source_field = schema.get_field(SOURCE).map_err(backend)?;

		let mut index_writer = index.writer::<TantivyDocument>(50_000_000).map_err(backend)?;
		for record in records {
			let source = serde_json::to_string(&record.to_document()?).map_err(backend)?;
			let mut doc = TantivyDocument::default();
			doc.add_text(id_field, &record.id);
			doc.add_text(title_field, &record.title);
			if let Some(synopsis) = &record.synopsis {
				doc.add_text(synopsis_field, synopsis);
			}
			doc.add_i64(year_field, record.year);
			doc.add_i64(pages_field, record.pages);
			doc.add_text(source_field, &source);
			index_writer.add_document(doc).map_err(backend)?;
		}
		index_writer.commit().map_err(backend)?;
		info!("Text index at {} holds {} records", index_dir.display(), records.len());

		Self::open(index_dir)
	}
}
