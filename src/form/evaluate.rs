use tracing::{debug, instrument, trace, warn};

use crate::{
    form::{
        Map, SectionId,
        depends::{self, DependencyGroup},
        graph::{DependencyGraph, OptionRef},
        option::FormOption,
        widget::WidgetKey,
    },
    storage::Value,
};

/// The outcome of a dependency check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReport {
    /// The number of passes run.
    pub passes: usize,
    /// `false` if the pass limit was reached while flags were still
    /// changing.
    pub stabilized: bool,
    /// Options that depend on each other in a loop.
    pub cycles: Vec<Vec<OptionRef>>,
}

impl Map {
    /// Recomputes which fields are active until nothing changes.
    ///
    /// Each pass visits every option of every governed record in
    /// declaration order and shows or hides its field according to its
    /// dependencies. Active options also pick up their conditional default.
    /// Passes repeat while a field changed, up to the pass limit after the
    /// first pass.
    #[instrument(skip(self), fields(config = %self.config()))]
    pub fn check_depends(&mut self) -> DependencyReport {
        let cycles = DependencyGraph::new(self).cycles();
        for cycle in &cycles {
            let options: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            warn!(options = %options.join(", "), "dependency cycle");
        }

        let mut passes = 0;
        loop {
            let changed = self.dependency_pass(passes == 0);
            passes += 1;
            trace!(passes, changed, "dependency pass");

            if !changed {
                debug!(passes, "dependencies settled");
                return DependencyReport {
                    passes,
                    stabilized: true,
                    cycles,
                };
            }

            if passes > self.pass_limit() {
                warn!(passes, "dependencies did not settle within the pass limit");
                return DependencyReport {
                    passes,
                    stabilized: false,
                    cycles,
                };
            }
        }
    }

    fn dependency_pass(&mut self, first: bool) -> bool {
        let mut changed = false;

        for id in self.section_ids() {
            let records = self.cfgsections(id);
            for record in &records {
                for index in 0..self[id].options().len() {
                    let key = WidgetKey::new(id, self[id].options()[index].name(), record.as_str());
                    let mut active = self.widgets.is_active(&key);

                    let satisfied = self.is_satisfied(id, index, record, |option| option.dependencies());
                    if satisfied {
                        self.update_default_value(id, index, record, &key);
                    }

                    if active != satisfied && self.widgets.set_active(&key, satisfied) {
                        active = satisfied;
                        changed = true;
                    }

                    if first && active {
                        if let Some(widget) = self.widgets.get_mut(&key) {
                            widget.trigger_validation();
                        }
                    }
                }
            }
        }

        changed
    }

    /// Evaluates groups selected from an option against the live values of
    /// the fields they refer to.
    ///
    /// Local paths name fields of the governed record, even when the option
    /// itself reads another record.
    fn is_satisfied(
        &self,
        id: SectionId,
        index: usize,
        record: &str,
        groups: impl FnOnce(&FormOption) -> &[DependencyGroup],
    ) -> bool {
        let section = &self[id];
        let option = &section.options()[index];
        let config = option
            .config_override()
            .unwrap_or_else(|| self.section_config(id));

        depends::is_satisfied(groups(option), |path| {
            self.resolve_path(path, record, config)
                .and_then(|key| self.widgets.live_value(&key))
        })
    }

    /// Picks the conditional default of an active option.
    ///
    /// The field takes the chosen default when nothing is stored and the
    /// user has not edited it.
    fn update_default_value(&mut self, id: SectionId, index: usize, record: &str, key: &WidgetKey) {
        let entries = self[id].options()[index].conditional_defaults().len();
        if entries == 0 {
            return;
        }

        let mut fallback: Option<Value> = None;
        let mut chosen: Option<Value> = None;
        for entry in 0..entries {
            let (value, groups) = &self[id].options()[index].conditional_defaults()[entry];
            if groups.is_empty() {
                fallback = Some(value.clone());
            } else if self.is_satisfied(id, index, record, |option| {
                option.conditional_defaults()[entry].1.as_slice()
            }) {
                chosen = Some(value.clone());
                break;
            }
        }
        let chosen = chosen.or(fallback);

        let unset = self[id].options()[index].stored_value(record).is_none();
        if let (true, Some(value)) = (unset, &chosen) {
            if let Some(widget) = self.widgets.get_mut(key) {
                if !widget.is_changed() && widget.value().as_ref() != Some(value) {
                    debug!(option = %key.option, record, value = %value, "applying conditional default");
                    widget.set_default(Some(value.clone()));
                }
            }
        }

        self[id].options_mut()[index].set_effective_default(record, chosen);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use futures::executor::block_on;

    use super::*;
    use crate::{
        form::{OptionKind, depends::Expected},
        storage::{MemoryStore, RecordStore},
    };

    fn chain_map(hops: usize, limit: usize) -> (Map, SectionId) {
        let store = Rc::new(MemoryStore::new());
        store.add("chain", "node", Some("n"));

        let mut map = Map::new(store, "chain", "").with_pass_limit(limit);
        let id = map.typed_section("node", "");
        // Declared last-to-first so each pass settles exactly one hop.
        for hop in (1..=hops).rev() {
            map[id]
                .option(OptionKind::Value, format!("o{hop}"), "")
                .default_value("x")
                .depends(&format!("o{}", hop - 1), "x");
        }
        map[id]
            .option(OptionKind::Value, "o0", "")
            .default_value("x");
        block_on(map.load()).unwrap();
        (map, id)
    }

    #[test]
    fn ten_hop_chain_settles() {
        let (mut map, id) = chain_map(10, 10);
        map.render();

        map.widget_mut(&WidgetKey::new(id, "o0", "n"))
            .unwrap()
            .set_value(Some(Value::from("y")));
        let report = map.check_depends();

        assert!(report.stabilized);
        assert_eq!(report.passes, 11);
        assert!(!map.is_active(&WidgetKey::new(id, "o10", "n")));
    }

    #[test]
    fn longer_chain_stops_at_the_limit() {
        let (mut map, id) = chain_map(12, 10);
        map.render();

        map.widget_mut(&WidgetKey::new(id, "o0", "n"))
            .unwrap()
            .set_value(Some(Value::from("y")));
        let report = map.check_depends();

        assert!(!report.stabilized);
        assert_eq!(report.passes, 11);
        assert!(!map.is_active(&WidgetKey::new(id, "o11", "n")));
        assert!(map.is_active(&WidgetKey::new(id, "o12", "n")));
    }

    #[test]
    fn cycles_are_reported() {
        let store = Rc::new(MemoryStore::new());
        store.add("system", "system", Some("main"));
        let mut map = Map::new(store, "system", "");
        let id = map.typed_section("system", "");
        map[id].option(OptionKind::Value, "a", "").depends("b", Expected::Absent);
        map[id].option(OptionKind::Value, "b", "").depends("a", Expected::Absent);
        block_on(map.load()).unwrap();

        let report = map.render();

        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].len(), 2);
    }

    #[test]
    fn unrendered_references_count_as_absent() {
        let store = Rc::new(MemoryStore::new());
        store.add("network", "interface", Some("wan"));
        let mut map = Map::new(store, "network", "");
        let id = map.typed_section("interface", "");
        map[id]
            .option(OptionKind::Value, "peerdns", "")
            .depends("network.wan.missing", Expected::Absent);
        block_on(map.load()).unwrap();
        map.render();

        assert!(map.is_active(&WidgetKey::new(id, "peerdns", "wan")));
    }

    #[test]
    fn conditional_defaults_follow_dependencies() {
        let store = Rc::new(MemoryStore::new());
        store.add("network", "interface", Some("wan"));
        store.set("network", "wan", "proto", Some(Value::from("pppoe")));
        let mut map = Map::new(store, "network", "");
        let id = map.typed_section("interface", "");
        map[id].option(OptionKind::Value, "proto", "");
        map[id]
            .option(OptionKind::Value, "mtu", "")
            .default_when("1492", vec![DependencyGroup::new().when("proto", "pppoe")])
            .default_when("1500", vec![]);
        block_on(map.load()).unwrap();
        map.render();

        let mtu = WidgetKey::new(id, "mtu", "wan");
        assert_eq!(map.widget(&mtu).unwrap().value(), Some(Value::from("1492")));
        assert_eq!(
            map[id].option_named("mtu").unwrap().default_for("wan"),
            Some(Value::from("1492"))
        );

        map.widget_mut(&WidgetKey::new(id, "proto", "wan"))
            .unwrap()
            .set_value(Some(Value::from("dhcp")));
        map.check_depends();
        assert_eq!(map.widget(&mtu).unwrap().value(), Some(Value::from("1500")));

        map.widget_mut(&mtu)
            .unwrap()
            .set_value(Some(Value::from("9000")));
        map.widget_mut(&WidgetKey::new(id, "proto", "wan"))
            .unwrap()
            .set_value(Some(Value::from("pppoe")));
        map.check_depends();
        assert_eq!(map.widget(&mtu).unwrap().value(), Some(Value::from("9000")));
    }

    #[test]
    fn record_overrides_keep_local_dependencies_on_the_governed_record() {
        let store = Rc::new(MemoryStore::new());
        store.add("network", "interface", Some("wan"));
        store.add("network", "globals", Some("globals"));
        store.set("network", "wan", "proto", Some(Value::from("static")));
        store.set("network", "globals", "ula_prefix", Some(Value::from("fd00::/48")));

        let mut map = Map::new(Rc::clone(&store) as Rc<dyn RecordStore>, "network", "");
        let id = map.typed_section("interface", "");
        map[id].option(OptionKind::Value, "proto", "");
        map[id]
            .option(OptionKind::Value, "ula_prefix", "")
            .record("globals")
            .depends("proto", "static")
            .default_when("fd00::/64", vec![DependencyGroup::new().when("proto", "static")]);
        block_on(map.load()).unwrap();
        map.render();

        assert!(map.is_active(&WidgetKey::new(id, "ula_prefix", "wan")));
        assert_eq!(
            map[id].option_named("ula_prefix").unwrap().default_for("wan"),
            Some(Value::from("fd00::/64"))
        );

        block_on(map.save(None, false)).unwrap();
        assert_eq!(
            store.get("network", "globals", "ula_prefix"),
            Some(Value::from("fd00::/48"))
        );
    }
}
