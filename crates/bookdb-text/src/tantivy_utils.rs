use tantivy::schema::{IndexRecordOption, NumericOptions, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer};
use tantivy::Index;

pub const BOOK_TOKENIZER: &str = "book_text";

pub const ID: &str = "id";
pub const TITLE: &str = "title";
pub const SYNOPSIS: &str = "synopsis";
pub const YEAR: &str = "year";
pub const PAGES: &str = "pages";
pub const SOURCE: &str = "source";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field(ID, STRING | STORED);
	let indexing = TextFieldIndexing::default()
		.set_tokenizer(BOOK_TOKENIZER)
		.set_index_option(IndexRecordOption::WithFreqsAndPositions);
	schema_builder.add_text_field(TITLE, TextOptions::default().set_indexing_options(indexing.clone()).set_stored());
	schema_builder.add_text_field(SYNOPSIS, TextOptions::default().set_indexing_options(indexing));
	schema_builder.add_i64_field(YEAR, NumericOptions::default().set_stored().set_indexed());
	schema_builder.add_i64_field(PAGES, NumericOptions::default().set_stored().set_indexed());
	schema_builder.add_text_field(SOURCE, STORED);
	schema_builder.build()
}

/// Lowercased simple tokens, no stop words: every word of a title counts.
pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default()).filter(LowerCaser).build();
	index.tokenizers().register(BOOK_TOKENIZER, tokenizer);
}
