//! Composite text generation for catalog embeddings.
//!
//! The composite text is what the model sees for a book, and its SHA-256 is
//! stored beside the vector so edits to the book can be detected later.

use sha2::{Digest, Sha256};

use crate::models::CatalogItem;

/// Build the text embedded for a book.
///
/// Joins title, subtitle, collection, age rating, authors and description
/// with `". "`, skipping empty parts. Authors are sorted by name and rendered
/// as `"Authors: a, b"`.
pub fn book_composite(book: &CatalogItem) -> String {
    let authors = book.authors();
    let author_line = (!authors.is_empty()).then(|| format!("Authors: {}", authors.join(", ")));

    let parts = [
        Some(book.title.clone()),
        book.subtitle.clone(),
        book.collection_name.clone(),
        book.age_rating.clone(),
        author_line,
        book.description.clone(),
    ];

    parts
        .into_iter()
        .flatten()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(". ")
}

/// Hex SHA-256 of a composite text.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Contributor;

    #[test]
    fn test_composite_full_record() {
        let mut book = CatalogItem::new(1, "The Hobbit");
        book.subtitle = Some("There and Back Again".into());
        book.collection_name = Some("Middle-earth".into());
        book.age_rating = Some("9+".into());
        book.description = Some("A hobbit goes on an adventure.".into());
        book.contributors = vec![
            Contributor::author("Tolkien"),
            Contributor::author("Anderson"),
            Contributor {
                name: "Lee".into(),
                role: "illustrator".into(),
            },
        ];

        assert_eq!(
            book_composite(&book),
            "The Hobbit. There and Back Again. Middle-earth. 9+. Authors: Anderson, Tolkien. \
             A hobbit goes on an adventure."
        );
    }

    #[test]
    fn test_composite_skips_empty_parts() {
        let mut book = CatalogItem::new(2, "Dune");
        book.subtitle = Some("   ".into());
        assert_eq!(book_composite(&book), "Dune");
    }

    #[test]
    fn test_content_hash_is_hex_sha256() {
        let hash = content_hash("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}
