//! Component tree tests - registries, lifecycle and child bookkeeping together

use foobar_core::{
    Component, ComponentBase, ComponentInit, ComponentRegistry, CreateContext, Error, Event,
    ParentComponent, Result, Runtime, destroy, init,
};
use foobar_dom::{Document, NodeId};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

// ============================================================================
// FIXTURES
// ============================================================================

struct Tile {
    base: ComponentBase,
    delay: u64,
}

impl Component for Tile {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn setup(self: Rc<Self>) -> LocalBoxFuture<'static, Result<()>> {
        async move {
            self.base.runtime().sleep(self.delay).await;
            let broken = self.base.config().option("broken").and_then(Value::as_bool).unwrap_or(false);
            if broken {
                return Err(Error::Setup {
                    name: self.base.name().to_string(),
                    phase: "setup",
                    reason: "broken cell".into(),
                });
            }
            Ok(())
        }
        .boxed_local()
    }
}

fn tile_registry() -> Rc<ComponentRegistry<Tile, ()>> {
    let registry = ComponentRegistry::new();
    registry.register(
        "cell",
        Rc::new(|init: ComponentInit<()>| {
            let delay = init.config.option("delay").and_then(Value::as_u64).unwrap_or(0);
            Rc::new_cyclic(|this: &Weak<Tile>| Tile { base: ComponentBase::new(this.clone(), &init), delay })
        }),
        Some(".cell"),
        json!({"options": {"delay": 10}}),
        0,
    );
    Rc::new(registry)
}

fn grid(cells: &[&[(&str, &str)]]) -> (Rc<Runtime>, NodeId) {
    let mut doc = Document::new();
    let grid = doc.create_element("div");
    doc.append_child(doc.body(), grid);
    for attrs in cells {
        let cell = doc.create_element("div");
        doc.add_class(cell, "cell");
        for (name, value) in attrs.iter() {
            doc.set_attribute(cell, name, value);
        }
        doc.append_child(grid, cell);
    }
    (Runtime::new(doc), grid)
}

// ============================================================================
// CHILD CREATION
// ============================================================================

#[test]
fn test_children_follow_dom_order() {
    let (rt, grid) = grid(&[&[("data-delay", "30")], &[], &[("data-delay", "5")]]);
    let parent = Rc::new(ParentComponent::new(tile_registry()));

    let task = parent.clone();
    let runtime = rt.clone();
    let created = rt.block_on(async move {
        task.create_children(&runtime, grid, &CreateContext::new(())).await
    });

    assert_eq!(created.map(|c| c.len()), Some(3));
    let delays: Vec<u64> = parent.children().iter().map(|c| c.delay).collect();
    assert_eq!(delays, vec![30, 10, 5]);
    assert_eq!(rt.now(), 30);
}

#[test]
fn test_failed_child_is_isolated() {
    let (rt, grid) = grid(&[&[], &[("data-broken", "true")], &[]]);
    let parent = Rc::new(ParentComponent::new(tile_registry()));

    let task = parent.clone();
    let runtime = rt.clone();
    let created = rt.block_on(async move {
        task.create_children(&runtime, grid, &CreateContext::new(())).await
    });

    let created = created.unwrap_or_default();
    assert_eq!(created.len(), 2);
    assert_eq!(parent.len(), 2);
    assert!(created.iter().all(|c| c.base().is_initialized()));
    assert_eq!(parent.index_of(&created[1]), Some(1));
}

#[test]
fn test_destroyed_children_leave_the_list() {
    let (rt, grid) = grid(&[&[], &[]]);
    let parent = Rc::new(ParentComponent::new(tile_registry()));
    let task = parent.clone();
    let runtime = rt.clone();
    rt.block_on(async move { task.create_children(&runtime, grid, &CreateContext::new(())).await });

    let first = parent.get(0);
    if let Some(first) = &first {
        destroy(&**first);
    }
    assert_eq!(parent.len(), 1);
    parent.destroy_children();
    assert!(parent.is_empty());
}

// ============================================================================
// LIFECYCLE EVENTS
// ============================================================================

#[test]
fn test_shared_init_and_events() {
    let (rt, grid) = grid(&[&[]]);
    let registry = tile_registry();
    let node = rt.document().element_children(grid)[0];
    let cell = registry.create(&rt, "cell", node, &CreateContext::new(()));
    let Some(cell) = cell else { panic!("cell not created") };

    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    cell.base().events().on_any(Rc::new(move |event: &Event, _: &[Value]| {
        sink.borrow_mut().push(event.event_type.clone());
    }));

    let a = init(&cell);
    let b = init(&cell);
    assert_eq!(rt.block_on(async move { futures::join!(a, b) }), Some((Ok(()), Ok(()))));
    destroy(&*cell);
    assert_eq!(*log.borrow(), vec!["initializing", "initialized", "destroying", "destroyed"]);
}
