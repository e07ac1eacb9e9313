//! Tantivy index schema for farm listing search.
//!
//! Five fields cover the text a visitor might type: the farm name and
//! description carry most queries, county and postcode catch "farms near
//! LE14" style searches. The id is stored verbatim so hits can be joined
//! back to the spatial store.

use tantivy::Index;
use tantivy::schema::{
    self, Field, STORED, STRING, Schema, TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer};

/// Names of all fields in the farm search schema.
pub struct FieldNames;

impl FieldNames {
    /// Stable farm listing id, exact match and stored.
    pub const ID: &'static str = "id";
    /// Farm display name.
    pub const NAME: &'static str = "name";
    /// Free-text description.
    pub const DESCRIPTION: &'static str = "description";
    /// County name.
    pub const COUNTY: &'static str = "county";
    /// Canonical postcode, tokenized so the outward code matches alone.
    pub const POSTCODE: &'static str = "postcode";
}

/// Resolved field handles for document construction and queries.
#[derive(Debug, Clone)]
pub struct FarmFields {
    /// Stable listing id.
    pub id: Field,
    /// Farm display name.
    pub name: Field,
    /// Free-text description.
    pub description: Field,
    /// County name.
    pub county: Field,
    /// Canonical postcode.
    pub postcode: Field,
}

impl FarmFields {
    /// Resolves field handles from a schema.
    ///
    /// # Panics
    ///
    /// Panics if the schema does not contain the expected fields (should
    /// only happen if the schema was not built by [`build_schema`]).
    #[must_use]
    pub fn from_schema(schema: &Schema) -> Self {
        Self {
            id: schema
                .get_field(FieldNames::ID)
                .expect("schema missing id field"),
            name: schema
                .get_field(FieldNames::NAME)
                .expect("schema missing name field"),
            description: schema
                .get_field(FieldNames::DESCRIPTION)
                .expect("schema missing description field"),
            county: schema
                .get_field(FieldNames::COUNTY)
                .expect("schema missing county field"),
            postcode: schema
                .get_field(FieldNames::POSTCODE)
                .expect("schema missing postcode field"),
        }
    }
}

/// Builds the Tantivy schema for the farm search index.
///
/// Fields:
/// - `id` — STRING (exact match + stored): stable listing id
/// - `name` — TEXT (tokenized + stored): farm display name
/// - `description` — TEXT (tokenized): owner-provided description
/// - `county` — TEXT (tokenized): county name
/// - `postcode` — TEXT (tokenized): canonical postcode
#[must_use]
pub fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    let text_field_indexing = TextFieldIndexing::default()
        .set_tokenizer("default")
        .set_index_option(schema::IndexRecordOption::WithFreqsAndPositions);

    let text_stored = TextOptions::default()
        .set_indexing_options(text_field_indexing.clone())
        .set_stored();

    let text_indexed_only = TextOptions::default().set_indexing_options(text_field_indexing);

    builder.add_text_field(FieldNames::ID, STRING | STORED);
    builder.add_text_field(FieldNames::NAME, text_stored);
    builder.add_text_field(FieldNames::DESCRIPTION, text_indexed_only.clone());
    builder.add_text_field(FieldNames::COUNTY, text_indexed_only.clone());
    builder.add_text_field(FieldNames::POSTCODE, text_indexed_only);

    builder.build()
}

/// Registers tokenizers on the given index.
///
/// The default analyzer splits on non-alphanumeric characters and
/// lowercases, which matches the query-side normalization in
/// [`crate::normalize`]. Postcodes tokenize into outward and inward codes
/// so a partial postcode query still matches.
pub fn register_tokenizers(index: &Index) {
    index.tokenizers().register(
        "default",
        TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .build(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_has_expected_fields() {
        let schema = build_schema();
        assert!(schema.get_field(FieldNames::ID).is_ok());
        assert!(schema.get_field(FieldNames::NAME).is_ok());
        assert!(schema.get_field(FieldNames::DESCRIPTION).is_ok());
        assert!(schema.get_field(FieldNames::COUNTY).is_ok());
        assert!(schema.get_field(FieldNames::POSTCODE).is_ok());
    }

    #[test]
    fn fields_resolve_from_schema() {
        let schema = build_schema();
        let fields = FarmFields::from_schema(&schema);
        assert_ne!(fields.id, fields.name);
        assert_ne!(fields.description, fields.county);
    }
}
