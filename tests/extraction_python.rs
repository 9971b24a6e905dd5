//! Python extraction: element tree shape, ranges, accessors, imports

mod common;

use codehem::ElementKind;
use common::{assert_content_invariant, extract_python, python};

const FIXTURE: &str = r#"import os
from typing import Optional

CONFIG_PATH = "/etc/app.conf"


class Account:
    currency: str = "EUR"

    def __init__(self, owner: str, balance: float = 0.0):
        self.owner = owner
        self._balance = balance

    @property
    def balance(self) -> float:
        return self._balance

    @balance.setter
    def balance(self, value: float):
        if value < 0:
            raise ValueError("negative balance")
        self._balance = value

    def deposit(self, amount: float) -> None:
        self.balance = self._balance + amount


def open_account(owner: str) -> Account:
    return Account(owner)
"#;

#[test]
fn content_matches_source_slice_for_every_element() {
    let tree = extract_python(FIXTURE);
    assert_content_invariant(FIXTURE, &tree);
}

#[test]
fn tree_shape_matches_declarations() {
    let tree = extract_python(FIXTURE);

    let account = tree
        .elements
        .iter()
        .find(|e| e.name == "Account")
        .expect("class extracted");
    assert_eq!(account.kind, ElementKind::Class);
    assert!(account.parent_name.is_none());

    let child_names: Vec<&str> = account.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        child_names,
        vec!["currency", "__init__", "balance", "balance", "deposit"]
    );

    let function = tree
        .elements
        .iter()
        .find(|e| e.name == "open_account")
        .expect("function extracted");
    assert_eq!(function.kind, ElementKind::Function);
    assert!(function.parent_name.is_none());
}

#[test]
fn getter_and_setter_are_siblings_sharing_a_name() {
    let tree = extract_python(FIXTURE);
    let account = tree.elements.iter().find(|e| e.name == "Account").unwrap();

    let accessors: Vec<_> = account
        .children
        .iter()
        .filter(|c| c.name == "balance")
        .collect();
    assert_eq!(accessors.len(), 2);
    assert_eq!(accessors[0].kind, ElementKind::PropertyGetter);
    assert_eq!(accessors[1].kind, ElementKind::PropertySetter);
    assert_eq!(accessors[0].parent_name.as_deref(), Some("Account"));
    assert_eq!(accessors[1].parent_name.as_deref(), Some("Account"));
}

#[test]
fn methods_carry_parent_and_parameters() {
    let tree = extract_python(FIXTURE);
    let account = tree.elements.iter().find(|e| e.name == "Account").unwrap();

    let init = account
        .children
        .iter()
        .find(|c| c.name == "__init__")
        .unwrap();
    assert_eq!(init.kind, ElementKind::Method);
    assert_eq!(init.parent_name.as_deref(), Some("Account"));

    let params: Vec<_> = init
        .children
        .iter()
        .filter(|c| c.kind == ElementKind::Parameter)
        .collect();
    assert_eq!(params.len(), 3);
    assert_eq!(params[0].name, "self");
    assert_eq!(params[1].name, "owner");
    assert_eq!(params[1].value_type.as_deref(), Some("str"));
    assert_eq!(
        params[2].additional_data.get("default").and_then(|v| v.as_str()),
        Some("0.0")
    );

    let deposit = account
        .children
        .iter()
        .find(|c| c.name == "deposit")
        .unwrap();
    let ret = deposit
        .children
        .iter()
        .find(|c| c.kind == ElementKind::ReturnValue)
        .unwrap();
    assert_eq!(ret.value_type.as_deref(), Some("None"));
}

#[test]
fn class_attribute_is_static_property_with_type() {
    let tree = extract_python(FIXTURE);
    let account = tree.elements.iter().find(|e| e.name == "Account").unwrap();

    let currency = account
        .children
        .iter()
        .find(|c| c.name == "currency")
        .unwrap();
    assert_eq!(currency.kind, ElementKind::StaticProperty);
    assert_eq!(currency.value_type.as_deref(), Some("str"));
}

#[test]
fn imports_fold_into_single_synthetic_element() {
    let tree = extract_python(FIXTURE);

    let imports = tree.imports().expect("imports element");
    assert_eq!(imports.name, "");
    assert_eq!(imports.range.start_line, 1);
    assert_eq!(imports.range.end_line, 2);
    assert_eq!(
        imports.content,
        "import os\nfrom typing import Optional"
    );
}

#[test]
fn decorators_attach_to_their_element() {
    let tree = extract_python(FIXTURE);
    let account = tree.elements.iter().find(|e| e.name == "Account").unwrap();

    let getter = account
        .children
        .iter()
        .find(|c| c.kind == ElementKind::PropertyGetter)
        .unwrap();
    assert_eq!(getter.decorators.len(), 1);
    assert_eq!(getter.decorators[0].name, "property");

    // Default range excludes the decorator line
    assert!(getter.content.starts_with("def balance"));
    assert_eq!(
        getter.range_with_decorators().start_line,
        getter.range.start_line - 1
    );
}

#[test]
fn sibling_ranges_are_disjoint_and_parents_contain_children() {
    let tree = extract_python(FIXTURE);
    let account = tree.elements.iter().find(|e| e.name == "Account").unwrap();

    for (i, a) in account.children.iter().enumerate() {
        assert!(
            account.range.contains(&a.range),
            "class must contain {}",
            a.name
        );
        for b in account.children.iter().skip(i + 1) {
            assert!(
                !a.range.overlaps(&b.range),
                "siblings {} and {} overlap",
                a.name,
                b.name
            );
        }
    }
}

#[test]
fn repeated_extraction_yields_identical_hashes() {
    let engine = python();
    let first = engine.get_element_hash(FIXTURE, "Account.deposit").unwrap();
    let second = engine.get_element_hash(FIXTURE, "Account.deposit").unwrap();
    assert_eq!(first, second);
    assert!(first.is_some());
}
