//! Shared fixtures for the Folio workspace integration tests

use folio_document::{Document, Section};
use folio_reorder::{Axis, StaticGeometry};

/// Height of one section handle in [`stacked_geometry`]
pub const ROW_HEIGHT: f64 = 40.0;

/// A small résumé with four sections: summary, experience, education, skills
pub fn sample_resume() -> Document {
    let mut document = Document::with_sections(vec![
        Section::with_id("summary", "summary").with_field("text", "Backend engineer"),
        Section::with_id("experience", "experience")
            .with_field("company", "Acme")
            .with_field("role", "Engineer"),
        Section::with_id("education", "education").with_field("school", "State University"),
        Section::with_id("skills", "skills").with_field("items", vec!["Rust", "SQL"]),
    ]);
    document.metadata.title = "Jane Doe".to_string();
    document
}

/// Handles for every section of `document`, stacked top to bottom
pub fn stacked_geometry(document: &Document) -> StaticGeometry {
    StaticGeometry::stacked(document.section_ids(), Axis::Vertical, ROW_HEIGHT)
}

/// Vertical pointer coordinate in the top (`before`) or bottom half of row `index`
pub fn row_y(index: usize, before: bool) -> f64 {
    let offset = if before { 5.0 } else { ROW_HEIGHT - 5.0 };
    index as f64 * ROW_HEIGHT + offset
}
