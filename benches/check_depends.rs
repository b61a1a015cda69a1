//! Renders a form whose options form a long dependency chain, so every
//! dependency check runs up to the pass limit.

#![allow(missing_docs)]

use std::rc::Rc;

use cbi::{Map, MemoryStore, OptionKind, RecordStore, Value};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use futures::executor::block_on;

const RECORDS: usize = 20;
const CHAIN: usize = 10;

/// Builds a form over `RECORDS` interfaces, each with `CHAIN` options where
/// option `n` is shown only while option `n - 1` is set to `on`.
fn chained_form() -> Map {
    let store = Rc::new(MemoryStore::new());
    for i in 0..RECORDS {
        let name = store.add("network", "interface", Some(&format!("if{i}")));
        store.set("network", &name, "o0", Some(Value::from("off")));
    }

    let mut map = Map::new(store, "network", "Interfaces").with_pass_limit(CHAIN);
    let id = map.typed_section("interface", "Interfaces");
    // Declared last to first so each pass hides one more option.
    for n in (0..=CHAIN).rev() {
        let option = map[id].option(OptionKind::Value, format!("o{n}"), format!("Option {n}"));
        option.default_value("on");
        if n > 0 {
            option.depends(&format!("o{}", n - 1), "on");
        }
    }

    block_on(map.load()).unwrap();
    map
}

fn check_depends(c: &mut Criterion) {
    c.bench_function("render chained form", |b| {
        b.iter_batched(
            chained_form,
            |mut map| map.render(),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, check_depends);
criterion_main!(benches);
