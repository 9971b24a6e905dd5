//! Shared helpers for integration tests
#![allow(dead_code)]

use codehem::{CodeHem, ElementTree};

pub fn python() -> CodeHem {
    CodeHem::new("python").expect("python service is built in")
}

pub fn typescript() -> CodeHem {
    CodeHem::new("typescript").expect("typescript service is built in")
}

pub fn extract_python(source: &str) -> ElementTree {
    python().extract(source).expect("extraction succeeds")
}

pub fn extract_typescript(source: &str) -> ElementTree {
    typescript().extract(source).expect("extraction succeeds")
}

/// Assert the byte-exact content invariant over every element of a tree.
/// The synthetic imports element is exempt: its content is the concatenation
/// of the import statements, which only equals the slice when they are
/// adjacent in source.
pub fn assert_content_invariant(source: &str, tree: &ElementTree) {
    tree.walk(&mut |element| {
        if element.kind == codehem::ElementKind::Import {
            return;
        }
        if let Some((start, end)) = element.range.to_byte_span(source) {
            assert_eq!(
                &source[start..end],
                element.content,
                "content mismatch for {} '{}'",
                element.kind,
                element.name
            );
        } else {
            panic!(
                "range of {} '{}' does not map into the buffer",
                element.kind, element.name
            );
        }
    });
}
