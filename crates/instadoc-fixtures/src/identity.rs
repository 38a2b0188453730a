/// Deterministic `_id` for the document at `index` in a fixture collection.
///
/// The first 24 hex digits of `blake3("{fixture}/{collection}/{index}")`.
/// Loading the same fixture twice yields the same ids, which is what lets an
/// unload find exactly the documents a previous load inserted.
pub fn fixture_document_id(fixture: &str, collection: &str, index: usize) -> String {
    let hash = blake3::hash(format!("{fixture}/{collection}/{index}").as_bytes()).to_hex();
    hash.as_str()[..24].to_owned()
}
