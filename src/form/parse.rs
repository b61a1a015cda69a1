use tracing::{debug, trace};

use crate::{
    form::{FormError, Map, SectionId, option::OptionKind, widget::WidgetKey},
    storage::Value,
};

impl Map {
    /// Parses every option of every governed record.
    ///
    /// All options are parsed even after a failure, so values that passed
    /// are written. Does not check dependencies or save the store; see
    /// [`Map::save`] for the whole transaction.
    ///
    /// # Errors
    ///
    /// Returns the first [`FormError`] in declaration order.
    pub fn parse(&self) -> Result<(), FormError> {
        let mut first_error = None;

        for id in self.section_ids() {
            for record in self.cfgsections(id) {
                for index in 0..self[id].options().len() {
                    if let Err(e) = self.parse_option(id, index, &record) {
                        debug!(section = %id, record = %record, error = %e, "option rejected");
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn parse_option(&self, id: SectionId, index: usize, record: &str) -> Result<(), FormError> {
        let option = &self[id].options()[index];
        let key = WidgetKey::new(id, option.name(), record);

        if !self.widgets.is_active(&key) {
            if !option.retains() {
                self.remove_value(id, index, record);
            }
            return Ok(());
        }

        let live = self.widgets.live_value(&key);
        let invalid = |reason: String| FormError::Invalid {
            title: option.title().to_string(),
            reason,
        };

        if let Some(widget) = self.widgets.get(&key) {
            if !widget.is_valid() {
                return Err(invalid(widget.validation_error().unwrap_or_default()));
            }
        }
        option.check(record, live.as_ref()).map_err(invalid)?;

        if let OptionKind::Flag { disabled, .. } = option.kind() {
            let live = live
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| Value::Text(disabled.clone()));
            if Some(&live) == option.default_for(record).as_ref() && option.may_be_empty() {
                self.remove_value(id, index, record);
            } else {
                self.write_value(id, index, record, live);
            }
            return Ok(());
        }

        match live {
            Some(live) if !live.is_empty() => {
                if option.forces_write() || option.stored_value(record) != Some(&live) {
                    self.write_value(id, index, record, live);
                }
                Ok(())
            }
            _ if option.may_be_empty() => {
                self.remove_value(id, index, record);
                Ok(())
            }
            _ => Err(FormError::Required {
                title: option.title().to_string(),
            }),
        }
    }

    fn write_value(&self, id: SectionId, index: usize, record: &str, value: Value) {
        let option = &self[id].options()[index];
        if *option.kind() == OptionKind::Dummy {
            return;
        }

        let target = option.target(self.section_config(id), record);
        trace!(%target, %value, "write");
        self.store()
            .set(&target.config, &target.record, &target.attribute, Some(value));
    }

    /// Deletes the option's attribute unless another active option of the
    /// same section is bound to it.
    fn remove_value(&self, id: SectionId, index: usize, record: &str) {
        let section = &self[id];
        let option = &section.options()[index];
        if *option.kind() == OptionKind::Dummy {
            return;
        }

        let config = self.section_config(id);
        let target = option.target(config, record);

        let aliased = section
            .options()
            .iter()
            .enumerate()
            .filter(|&(sibling, _)| sibling != index)
            .find(|(_, sibling)| {
                sibling.target(config, record) == target
                    && self
                        .widgets
                        .is_active(&WidgetKey::new(id, sibling.name(), record))
            });

        if let Some((_, sibling)) = aliased {
            debug!(%target, sibling = sibling.name(), "kept value bound to an active sibling");
            return;
        }

        trace!(%target, "remove");
        self.store()
            .unset(&target.config, &target.record, &target.attribute);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use futures::executor::block_on;
    use test_case::test_case;

    use super::*;
    use crate::storage::{MemoryStore, RecordStore};

    fn store() -> Rc<MemoryStore> {
        let store = Rc::new(MemoryStore::new());
        store.add("network", "interface", Some("wan"));
        store.set("network", "wan", "proto", Some(Value::from("static")));
        store.set("network", "wan", "ipaddr", Some(Value::from("10.0.0.2")));
        store
    }

    fn loaded(map: &mut Map) {
        block_on(map.load()).unwrap();
        map.render();
    }

    fn set(map: &mut Map, id: SectionId, option: &str, value: Option<Value>) {
        map.widget_mut(&WidgetKey::new(id, option, "wan"))
            .unwrap()
            .set_value(value);
    }

    #[test]
    fn aliased_value_survives_while_a_sibling_is_active() {
        let store = store();
        let mut map = Map::new(Rc::clone(&store) as Rc<dyn RecordStore>, "network", "");
        let id = map.typed_section("interface", "");
        map[id].option(OptionKind::Value, "proto", "");
        map[id]
            .option(OptionKind::Value, "static_ip", "")
            .attribute("ipaddr")
            .depends("proto", "static");
        map[id]
            .option(OptionKind::Value, "dhcp_ip", "")
            .attribute("ipaddr")
            .depends("proto", "dhcp");
        loaded(&mut map);

        block_on(map.save(None, false)).unwrap();
        assert_eq!(
            store.get("network", "wan", "ipaddr"),
            Some(Value::from("10.0.0.2"))
        );

        set(&mut map, id, "proto", Some(Value::from("none")));
        block_on(map.save(None, false)).unwrap();
        assert_eq!(store.get("network", "wan", "ipaddr"), None);
    }

    #[test]
    fn emptied_alias_is_removed_beside_an_inactive_sibling() {
        let store = store();
        let mut map = Map::new(Rc::clone(&store) as Rc<dyn RecordStore>, "network", "");
        let id = map.typed_section("interface", "");
        map[id].option(OptionKind::Value, "proto", "");
        map[id]
            .option(OptionKind::Value, "static_ip", "")
            .attribute("ipaddr")
            .depends("proto", "static");
        map[id]
            .option(OptionKind::Value, "dhcp_ip", "")
            .attribute("ipaddr")
            .depends("proto", "dhcp")
            .retain(true);
        loaded(&mut map);

        assert!(map.is_active(&WidgetKey::new(id, "static_ip", "wan")));
        assert!(!map.is_active(&WidgetKey::new(id, "dhcp_ip", "wan")));

        set(&mut map, id, "static_ip", None);
        block_on(map.save(None, false)).unwrap();

        assert_eq!(store.get("network", "wan", "ipaddr"), None);
    }

    #[test]
    fn retained_values_survive_deactivation() {
        let store = store();
        let mut map = Map::new(Rc::clone(&store) as Rc<dyn RecordStore>, "network", "");
        let id = map.typed_section("interface", "");
        map[id].option(OptionKind::Value, "proto", "");
        map[id]
            .option(OptionKind::Value, "ipaddr", "")
            .depends("proto", "static")
            .retain(true);
        loaded(&mut map);

        set(&mut map, id, "proto", Some(Value::from("dhcp")));
        block_on(map.save(None, false)).unwrap();

        assert_eq!(
            store.get("network", "wan", "ipaddr"),
            Some(Value::from("10.0.0.2"))
        );
    }

    #[test_case(None, true, None; "unchecked default is removed")]
    #[test_case(Some("1"), true, Some("1"); "checked is written")]
    #[test_case(None, false, Some("0"); "unchecked is written when required")]
    fn flags(live: Option<&str>, rmempty: bool, stored: Option<&str>) {
        let store = store();
        store.set("network", "wan", "auto", Some(Value::from("0")));
        let mut map = Map::new(Rc::clone(&store) as Rc<dyn RecordStore>, "network", "");
        let id = map.typed_section("interface", "");
        map[id]
            .option(OptionKind::flag(), "auto", "Bring up on boot")
            .rmempty(rmempty);
        loaded(&mut map);

        set(&mut map, id, "auto", live.map(Value::from));
        block_on(map.save(None, false)).unwrap();

        assert_eq!(store.get("network", "wan", "auto"), stored.map(Value::from));
    }

    #[test]
    fn dummy_options_never_touch_the_store() {
        let store = store();
        let mut map = Map::new(Rc::clone(&store) as Rc<dyn RecordStore>, "network", "");
        let id = map.typed_section("interface", "");
        map[id].option(OptionKind::Dummy, "proto", "");
        loaded(&mut map);

        set(&mut map, id, "proto", Some(Value::from("dhcp")));
        block_on(map.save(None, false)).unwrap();
        assert_eq!(store.get("network", "wan", "proto"), Some(Value::from("static")));

        set(&mut map, id, "proto", None);
        block_on(map.save(None, false)).unwrap();
        assert_eq!(store.get("network", "wan", "proto"), Some(Value::from("static")));
    }

    #[test]
    fn forcewrite_writes_unchanged_values() {
        #[derive(Debug, Default)]
        struct Counting {
            inner: MemoryStore,
            writes: std::cell::Cell<usize>,
        }

        #[async_trait::async_trait(?Send)]
        impl RecordStore for Counting {
            async fn load(&self, _: &str) -> Result<(), crate::storage::StoreError> {
                Ok(())
            }
            async fn save(&self) -> Result<(), crate::storage::StoreError> {
                Ok(())
            }
            fn record(&self, config: &str, name: &str) -> Option<crate::storage::Record> {
                self.inner.record(config, name)
            }
            fn get(&self, config: &str, record: &str, attribute: &str) -> Option<Value> {
                self.inner.get(config, record, attribute)
            }
            fn set(&self, config: &str, record: &str, attribute: &str, value: Option<Value>) {
                self.writes.set(self.writes.get() + 1);
                self.inner.set(config, record, attribute, value);
            }
            fn sections(&self, config: &str, kind: Option<&str>) -> Vec<crate::storage::Record> {
                self.inner.sections(config, kind)
            }
            fn add(&self, config: &str, kind: &str, name: Option<&str>) -> String {
                self.inner.add(config, kind, name)
            }
            fn remove(&self, config: &str, record: &str) {
                self.inner.remove(config, record);
            }
            fn move_record(&self, config: &str, record: &str, anchor: Option<&str>, after: bool) -> bool {
                self.inner.move_record(config, record, anchor, after)
            }
            fn resolve_record(&self, config: &str, id: &str) -> Option<String> {
                self.inner.resolve_record(config, id)
            }
        }

        let store = Rc::new(Counting::default());
        store.inner.add("network", "interface", Some("wan"));
        store.inner.set("network", "wan", "proto", Some(Value::from("dhcp")));

        let mut map = Map::new(Rc::clone(&store) as Rc<dyn RecordStore>, "network", "");
        let id = map.typed_section("interface", "");
        map[id].option(OptionKind::Value, "proto", "");
        loaded(&mut map);

        block_on(map.save(None, false)).unwrap();
        assert_eq!(store.writes.get(), 0);

        map[id].option_named_mut("proto").unwrap().forcewrite(true);
        block_on(map.save(None, false)).unwrap();
        assert_eq!(store.writes.get(), 1);
    }

    #[test]
    fn custom_validation_reports_the_title() {
        let mut map = Map::new(store(), "network", "");
        let id = map.typed_section("interface", "");
        map[id]
            .option(OptionKind::Value, "ipaddr", "IPv4 address")
            .validate(Box::new(|_, value| match value {
                Some(Value::Text(text)) if text.split('.').count() == 4 => Ok(()),
                _ => Err("Expecting a valid IPv4 address".to_string()),
            }));
        loaded(&mut map);

        set(&mut map, id, "ipaddr", Some(Value::from("10.0.2")));
        let error = block_on(map.save(None, true)).unwrap_err();

        assert_eq!(
            error.to_string(),
            "Option \"IPv4 address\" contains an invalid input value. Expecting a valid IPv4 address"
        );
    }

    #[test]
    fn writes_before_a_failure_are_kept() {
        let store = store();
        let mut map = Map::new(Rc::clone(&store) as Rc<dyn RecordStore>, "network", "");
        let id = map.typed_section("interface", "");
        map[id].option(OptionKind::Value, "ipaddr", "");
        map[id].option(OptionKind::Value, "proto", "").rmempty(false);
        loaded(&mut map);

        set(&mut map, id, "ipaddr", Some(Value::from("10.0.0.3")));
        set(&mut map, id, "proto", None);
        assert!(matches!(
            block_on(map.save(None, true)),
            Err(FormError::Required { .. })
        ));

        assert_eq!(
            store.get("network", "wan", "ipaddr"),
            Some(Value::from("10.0.0.3"))
        );
    }
}
