//! Post-processing: folds raw extraction records into the typed element tree
//!
//! Responsibilities:
//! - attach decorators to the element whose first line follows the block
//! - classify Python `@property` / `@x.setter` methods as accessor kinds
//! - fold all import records into one synthetic imports element
//! - nest members under their containers in declaration order
//! - normalize `parent_name` on every nested element

use serde_json::Value;

use crate::extractor::{RawElement, RawParameter};
use crate::schema::{
    range_to_value, Element, ElementKind, ElementRange, ElementTree,
};

/// Fold raw records into the per-file element tree
pub fn build_tree(records: Vec<RawElement>) -> ElementTree {
    let mut decorators: Vec<RawElement> = Vec::new();
    let mut imports: Vec<RawElement> = Vec::new();
    let mut rest: Vec<RawElement> = Vec::new();

    for record in records {
        match record.kind {
            ElementKind::Decorator => decorators.push(record),
            ElementKind::Import => imports.push(record),
            _ => rest.push(record),
        }
    }

    let mut elements: Vec<(usize, usize, Element)> = rest
        .into_iter()
        .map(|raw| {
            let span = raw.byte_span;
            (span.0, span.1, to_element(raw, &mut decorators))
        })
        .collect();

    if let Some(imports_element) = fold_imports(&imports) {
        let first_byte = imports.first().map(|i| i.byte_span.0).unwrap_or(0);
        elements.push((first_byte, first_byte, imports_element));
    }

    elements.sort_by_key(|(start, _, _)| *start);

    ElementTree {
        elements: nest(elements),
    }
}

/// Convert one raw record, attaching its decorator block and synthesizing
/// parameter / return_value children.
fn to_element(raw: RawElement, decorators: &mut Vec<RawElement>) -> Element {
    let mut element = Element::new(raw.kind, raw.name, raw.content, raw.range);
    element.parent_name = raw.parent_name;
    element.value_type = raw.value_type;
    element.additional_data = raw.additional;

    if let Some(body) = raw.body_range {
        element
            .additional_data
            .insert("body_range".to_string(), range_to_value(body));
    }
    if let Some(value) = raw.value_range {
        element
            .additional_data
            .insert("value_range".to_string(), range_to_value(value));
    }

    attach_decorators(&mut element, decorators);
    classify_accessor(&mut element);

    for param in &raw.parameters {
        element.children.push(parameter_element(param, &element.name));
    }
    if let Some((content, range)) = raw.return_node {
        let mut ret = Element::new(ElementKind::ReturnValue, "", content, range);
        ret.parent_name = Some(element.name.clone());
        ret.value_type = raw.return_type.clone();
        element.children.push(ret);
    }

    element
}

fn parameter_element(param: &RawParameter, owner: &str) -> Element {
    let mut element = Element::new(
        ElementKind::Parameter,
        param.name.clone(),
        param.content.clone(),
        param.range,
    );
    element.parent_name = Some(owner.to_string());
    element.value_type = param.value_type.clone();
    if let Some(default) = &param.default_value {
        element
            .additional_data
            .insert("default".to_string(), Value::String(default.clone()));
    }
    element
        .additional_data
        .insert("index".to_string(), Value::from(param.index));
    element
}

/// Pull the contiguous decorator block that ends on the line directly above
/// the element out of the pool and attach it, outermost first.
fn attach_decorators(element: &mut Element, decorators: &mut Vec<RawElement>) {
    let mut boundary = element.range.start_line;
    let mut attached: Vec<Element> = Vec::new();

    loop {
        // A decorator belongs to this element when it ends on the line above
        // the current boundary, or on the boundary line itself for one-line
        // `@dec element` layouts; it must start before the element.
        let position = decorators.iter().position(|d| {
            (d.range.end_line + 1 == boundary || d.range.end_line == boundary)
                && (d.range.start_line, d.range.start_col)
                    < (element.range.start_line, element.range.start_col)
        });
        let Some(position) = position else { break };
        let raw = decorators.remove(position);
        boundary = raw.range.start_line;
        let decorator = Element::new(ElementKind::Decorator, raw.name, raw.content, raw.range);
        attached.push(decorator);
    }

    attached.sort_by_key(|d| d.range.start_line);
    element.decorators = attached;
}

/// Python `@property` / `@name.setter` methods become accessor elements
fn classify_accessor(element: &mut Element) {
    if element.kind != ElementKind::Method {
        return;
    }
    let setter_tag = format!("{}.setter", element.name);
    for decorator in &element.decorators {
        if decorator.name == "property" {
            element.kind = ElementKind::PropertyGetter;
            return;
        }
        if decorator.name == setter_tag {
            element.kind = ElementKind::PropertySetter;
            return;
        }
    }
}

/// Concatenate all import records into the synthetic imports element
fn fold_imports(imports: &[RawElement]) -> Option<Element> {
    let first = imports.first()?;
    let last = imports.last()?;

    let content = imports
        .iter()
        .map(|i| i.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let range = ElementRange::new(
        first.range.start_line,
        first.range.start_col,
        last.range.end_line,
        last.range.end_col,
    );

    Some(Element::new(ElementKind::Import, "", content, range))
}

/// Nest elements by byte-span containment, preserving declaration order
fn nest(sorted: Vec<(usize, usize, Element)>) -> Vec<Element> {
    let mut top_level: Vec<Element> = Vec::new();
    // Open containers: (end_byte, element)
    let mut stack: Vec<(usize, Element)> = Vec::new();

    let mut close_until = |stack: &mut Vec<(usize, Element)>,
                           top_level: &mut Vec<Element>,
                           start: usize| {
        while let Some((end, _)) = stack.last() {
            if start >= *end {
                let (_, done) = stack.pop().expect("stack checked non-empty");
                match stack.last_mut() {
                    Some((_, parent)) => parent.children.push(done),
                    None => top_level.push(done),
                }
            } else {
                break;
            }
        }
    };

    for (start, end, mut element) in sorted {
        close_until(&mut stack, &mut top_level, start);

        if let Some((_, parent)) = stack.last() {
            if element.parent_name.is_none() {
                element.parent_name = Some(parent.name.clone());
            }
        }

        if element.kind.is_container() {
            stack.push((end, element));
        } else {
            match stack.last_mut() {
                Some((_, parent)) => parent.children.push(element),
                None => top_level.push(element),
            }
        }
    }

    close_until(&mut stack, &mut top_level, usize::MAX);
    top_level
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract_raw;
    use crate::lang::Lang;
    use crate::parser::ParserFacade;

    fn tree_for(lang: Lang, source: &str) -> ElementTree {
        let parsed = ParserFacade::new().parse(lang, source).unwrap();
        build_tree(extract_raw(lang, &parsed, source).unwrap())
    }

    #[test]
    fn test_python_getter_setter_pairing() {
        let source = "class C:\n    @property\n    def v(self):\n        return self._v\n\n    @v.setter\n    def v(self, value):\n        self._v = value\n";
        let tree = tree_for(Lang::Python, source);

        let class = &tree.elements[0];
        assert_eq!(class.kind, ElementKind::Class);

        let accessors: Vec<_> = class
            .children
            .iter()
            .filter(|c| c.name == "v")
            .collect();
        assert_eq!(accessors.len(), 2);
        assert_eq!(accessors[0].kind, ElementKind::PropertyGetter);
        assert_eq!(accessors[1].kind, ElementKind::PropertySetter);
        // Siblings, not nested
        assert!(accessors[0].children.iter().all(|c| c.kind == ElementKind::Parameter));
    }

    #[test]
    fn test_decorators_attached_not_siblings() {
        let source = "@app.route('/x')\ndef handler():\n    return 1\n";
        let tree = tree_for(Lang::Python, source);

        let handler = tree
            .elements
            .iter()
            .find(|e| e.name == "handler")
            .unwrap();
        assert_eq!(handler.decorators.len(), 1);
        assert_eq!(handler.decorators[0].name, "app.route");
        // Element range excludes the decorator line by default
        assert_eq!(handler.range.start_line, 2);
        assert_eq!(handler.range_with_decorators().start_line, 1);
        // No top-level decorator elements remain
        assert!(tree
            .elements
            .iter()
            .all(|e| e.kind != ElementKind::Decorator));
    }

    #[test]
    fn test_stacked_decorators() {
        let source = "@first\n@second\ndef f():\n    pass\n";
        let tree = tree_for(Lang::Python, source);
        let f = tree.elements.iter().find(|e| e.name == "f").unwrap();
        assert_eq!(f.decorators.len(), 2);
        assert_eq!(f.decorators[0].name, "first");
        assert_eq!(f.decorators[1].name, "second");
        assert_eq!(f.range_with_decorators().start_line, 1);
    }

    #[test]
    fn test_imports_folded() {
        let source = "import os\nimport sys\nfrom typing import List\n\ndef f():\n    pass\n";
        let tree = tree_for(Lang::Python, source);

        let imports = tree.imports().unwrap();
        assert_eq!(imports.name, "");
        assert_eq!(imports.range.start_line, 1);
        assert_eq!(imports.range.end_line, 3);
        assert_eq!(
            imports.content,
            "import os\nimport sys\nfrom typing import List"
        );

        // Exactly one synthetic element for all three statements
        let count = tree
            .elements
            .iter()
            .filter(|e| e.kind == ElementKind::Import)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_nested_class_parent_names() {
        let source = "class Outer:\n    class Inner:\n        def m(self):\n            pass\n";
        let tree = tree_for(Lang::Python, source);

        let outer = &tree.elements[0];
        assert_eq!(outer.name, "Outer");
        assert!(outer.parent_name.is_none());

        let inner = &outer.children[0];
        assert_eq!(inner.name, "Inner");
        assert_eq!(inner.parent_name.as_deref(), Some("Outer"));

        let m = &inner.children[0];
        assert_eq!(m.kind, ElementKind::Method);
        assert_eq!(m.parent_name.as_deref(), Some("Inner"));
    }

    #[test]
    fn test_declaration_order_preserved() {
        let source = "class C {\n    b(): void {}\n    a(): void {}\n}\n";
        let tree = tree_for(Lang::TypeScript, source);

        let class = &tree.elements[0];
        let methods: Vec<&str> = class
            .children
            .iter()
            .filter(|c| c.kind == ElementKind::Method)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(methods, vec!["b", "a"]);
    }

    #[test]
    fn test_callable_children() {
        let source = "def f(a: int, b: str = 'x') -> bool:\n    return True\n";
        let tree = tree_for(Lang::Python, source);

        let f = &tree.elements[0];
        let params: Vec<_> = f
            .children
            .iter()
            .filter(|c| c.kind == ElementKind::Parameter)
            .collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "a");
        assert_eq!(params[1].additional_data["default"], Value::from("'x'"));

        let ret = f
            .children
            .iter()
            .find(|c| c.kind == ElementKind::ReturnValue)
            .unwrap();
        assert_eq!(ret.value_type.as_deref(), Some("bool"));
    }
}
