use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::fmt::Display;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{Index, IndexReader, ReloadPolicy, Searcher, TantivyDocument, Term};
use tracing::debug;

use bookdb_core::traits::TextIndex;
use bookdb_core::{BookHit, Error, Result};

use crate::tantivy_utils::{register_tokenizer, ID, PAGES, SOURCE, SYNOPSIS, TITLE, YEAR};

pub(crate) fn backend<E: Display>(e: E) -> Error {
	Error::Backend(format!("text index: {e}"))
}

/// Record collection plus its lexical index. Cheap to clone.
#[derive(Clone)]
pub struct TantivyBookIndex {
	index: Index,
	reader: IndexReader,
	id_field: Field,
	title_field: Field,
	synopsis_field: Field,
	year_field: Field,
	pages_field: Field,
	source_field: Field,
}

impl TantivyBookIndex {
	pub fn open(index_dir: &Path) -> Result<Self> {
		if !index_dir.join("meta.json").exists() {
			return Err(Error::IndexNotFound(format!("text index at {}", index_dir.display())));
		}
		let index = Index::open_in_dir(index_dir).map_err(backend)?;
		register_tokenizer(&index);
		let reader = index
			.reader_builder()
			.reload_policy(ReloadPolicy::OnCommitWithDelay)
			.try_into()
			.map_err(backend)?;
		let schema = index.schema();
		Ok(Self {
			id_field: schema.get_field(ID).map_err(backend)?,
			title_field: schema.get_field(TITLE).map_err(backend)?,
			synopsis_field: schema.get_field(SYNOPSIS).map_err(backend)?,
			year_field: schema.get_field(YEAR).map_err(backend)?,
			pages_field: schema.get_field(PAGES).map_err(backend)?,
			source_field: schema.get_field(SOURCE).map_err(backend)?,
			index,
			reader,
		})
	}

	pub fn len(&self) -> usize {
		self.reader.searcher().num_docs() as usize
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// BM25 over title and synopsis. Query syntax the parser cannot handle is
	/// dropped rather than reported, so user input never fails a search.
	pub fn search(&self, query_text: &str, limit: usize) -> Result<Vec<BookHit>> {
		if limit == 0 {
			return Ok(Vec::new());
		}
		let query_parser = QueryParser::for_index(&self.index, vec![self.title_field, self.synopsis_field]);
		let (query, errors) = query_parser.parse_query_lenient(query_text);
		if !errors.is_empty() {
			debug!("lenient parse of {:?} ignored {} errors", query_text, errors.len());
		}
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(limit)).map_err(backend)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, doc_address) in top_docs {
			let doc: TantivyDocument = searcher.doc(doc_address).map_err(backend)?;
			hits.push(self.project(&doc, score));
		}
		debug!("text query {:?} -> {} hits", query_text, hits.len());
		Ok(hits)
	}

	/// Exact `_id` lookup returning the raw stored document.
	pub fn record(&self, id: &str) -> Result<Map<String, JsonValue>> {
		let searcher = self.reader.searcher();
		let doc = self
			.find_by_id(&searcher, id)?
			.ok_or_else(|| Error::RecordNotFound(id.to_string()))?;
		let source = doc
			.get_first(self.source_field)
			.and_then(|v| v.as_str())
			.ok_or_else(|| backend(format!("record {id} has no stored source")))?;
		match serde_json::from_str(source).map_err(backend)? {
			JsonValue::Object(map) => Ok(map),
			_ => Err(backend(format!("record {id} source is not an object"))),
		}
	}

	fn find_by_id(&self, searcher: &Searcher, id: &str) -> Result<Option<TantivyDocument>> {
		let term = Term::from_field_text(self.id_field, id);
		let query = TermQuery::new(term, IndexRecordOption::Basic);
		let top = searcher.search(&query, &TopDocs::with_limit(1)).map_err(backend)?;
		match top.first() {
			Some((_, addr)) => Ok(Some(searcher.doc(*addr).map_err(backend)?)),
			None => Ok(None),
		}
	}

	fn project(&self, doc: &TantivyDocument, score: f32) -> BookHit {
		let text = |f: Field| doc.get_first(f).and_then(|v| v.as_str()).unwrap_or_default().to_string();
		let int = |f: Field| doc.get_first(f).and_then(|v| v.as_i64()).unwrap_or_default();
		BookHit {
			id: text(self.id_field),
			score,
			title: text(self.title_field),
			year: int(self.year_field),
			pages: int(self.pages_field),
		}
	}
}

#[async_trait]
impl TextIndex for TantivyBookIndex {
	async fn text_query(&self, query: &str, limit: usize) -> Result<Vec<BookHit>> {
		let this = self.clone();
		let query = query.to_string();
		tokio::task::spawn_blocking(move || this.search(&query, limit))
			.await
			.map_err(backend)?
	}

	async fn get_record(&self, id: &str) -> Result<Map<String, JsonValue>> {
		let this = self.clone();
		let id = id.to_string();
		tokio::task::spawn_blocking(move || this.record(&id)).await.map_err(backend)?
	}
}
