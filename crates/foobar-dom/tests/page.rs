//! Page-level tests - markup, queries, observers and transition logs together

use foobar_dom::{
    Document, IntersectionObserver, IntersectionObserverOptions, MutationObserver,
    MutationObserverInit, Rect, ResizeObserver, TransitionSpec,
};

fn bar_markup(doc: &mut Document, id: &str, items: usize) -> foobar_dom::NodeId {
    let bar = doc.create_element("div");
    doc.set_id(bar, id);
    doc.add_class(bar, "foobar fbr-top");
    doc.append_child(doc.body(), bar);

    let list = doc.create_element("ul");
    doc.add_class(list, "fbr-items");
    doc.append_child(bar, list);
    for i in 0..items {
        let item = doc.create_element("li");
        doc.add_class(item, "fbr-item");
        doc.set_attribute(item, "data-index", &i.to_string());
        doc.append_child(list, item);
    }
    bar
}

#[test]
fn test_items_in_document_order() {
    let mut doc = Document::new();
    let bar = bar_markup(&mut doc, "bar-1", 3);
    let items = doc.query_selector_all(bar, ".fbr-items > .fbr-item").unwrap();
    let indexes: Vec<_> = items
        .iter()
        .map(|&n| doc.get_attribute(n, "data-index").unwrap())
        .collect();
    assert_eq!(indexes, vec!["0", "1", "2"]);
}

#[test]
fn test_observers_follow_document_changes() {
    let mut doc = Document::new();
    let bar = bar_markup(&mut doc, "bar-1", 1);
    doc.set_rect(bar, Rect::new(0.0, 0.0, 1280.0, 50.0));
    doc.take_mutations();

    let mut resize = ResizeObserver::new();
    resize.observe(bar);
    assert_eq!(resize.check(&doc).len(), 1);

    let mut mutations = MutationObserver::new();
    mutations.observe(bar, MutationObserverInit::class_attribute());

    doc.add_class(bar, "fbr-open");
    doc.set_style(bar, "height", "80px");
    for record in doc.take_mutations() {
        mutations.record(&doc, &record);
    }
    assert_eq!(mutations.take_records().len(), 1);
    assert_eq!(resize.check(&doc)[0].height, 80.0);
}

#[test]
fn test_visibility_and_transitions() {
    let mut doc = Document::new();
    doc.window_mut().document_height = 3000.0;
    let footer = doc.create_element("footer");
    doc.append_child(doc.body(), footer);
    doc.set_rect(footer, Rect::new(0.0, 2800.0, 1280.0, 200.0));

    let mut visibility = IntersectionObserver::new(IntersectionObserverOptions { threshold: vec![0.5] });
    visibility.observe(footer);
    assert!(!visibility.check(&doc)[0].is_intersecting);

    doc.window_mut().scroll_y = 2200.0;
    let entry = &visibility.check(&doc)[0];
    assert!(entry.is_intersecting);
    assert_eq!(doc.window().distance_to_bottom(), 0.0);

    doc.set_transition(footer, Some(TransitionSpec::new("opacity", 250)));
    doc.add_class(footer, "fbr-visible");
    let runs = doc.take_transitions();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].property, "opacity");
    assert_eq!(runs[0].duration_ms, 250);
}
