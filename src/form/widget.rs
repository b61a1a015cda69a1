//! The contract between the engine and the widget layer.
//!
//! The engine never inspects widgets beyond [`Widget`]. Widgets are created
//! by a [`WidgetFactory`] when a [`Map`](crate::form::Map) renders and are
//! kept in a [`WidgetRegistry`] keyed by section, option name and record.

use std::{collections::HashMap, fmt};

use crate::{
    form::{SectionId, option::FormOption},
    storage::Value,
};

/// One rendered form field.
pub trait Widget: fmt::Debug {
    /// The value currently held by the field.
    fn value(&self) -> Option<Value>;

    /// Replaces the field's value.
    fn set_value(&mut self, value: Option<Value>);

    /// Applies a default chosen by the engine.
    ///
    /// Unlike [`set_value`](Self::set_value) this does not count as a user
    /// edit.
    fn set_default(&mut self, value: Option<Value>) {
        self.set_value(value);
    }

    /// Whether the field passes its own structural validation.
    fn is_valid(&self) -> bool;

    /// The reason the field is invalid, if it is.
    fn validation_error(&self) -> Option<String>;

    /// Re-runs validation, returning the new validity.
    fn trigger_validation(&mut self) -> bool;

    /// Whether the user edited the field since it was rendered.
    fn is_changed(&self) -> bool {
        false
    }
}

/// What a factory knows about the field it renders.
#[derive(Debug)]
pub struct FieldContext<'a> {
    /// The section the field belongs to.
    pub section: SectionId,
    /// The option bound by the field.
    pub option: &'a FormOption,
    /// The record the field edits.
    pub record: &'a str,
    /// The stored value, or the option default when nothing is stored.
    pub initial: Option<Value>,
    /// Whether the field must not accept edits.
    pub readonly: bool,
}

/// Creates widgets for rendered fields.
pub trait WidgetFactory {
    /// Creates the widget for one field.
    fn create(&self, field: &FieldContext<'_>) -> Box<dyn Widget>;
}

/// A structural validator attached to a [`MemoryWidget`].
pub type Check = Box<dyn Fn(Option<&Value>) -> Result<(), String>>;

/// A widget that simply holds a value.
///
/// Used by the command line tool and wherever no real UI is attached.
pub struct MemoryWidget {
    initial: Option<Value>,
    value: Option<Value>,
    readonly: bool,
    check: Option<Check>,
    error: Option<String>,
}

impl fmt::Debug for MemoryWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWidget")
            .field("initial", &self.initial)
            .field("value", &self.value)
            .field("readonly", &self.readonly)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl MemoryWidget {
    /// Creates a widget holding `value`.
    #[must_use]
    pub fn new(value: Option<Value>) -> Self {
        Self {
            initial: value.clone(),
            value,
            readonly: false,
            check: None,
            error: None,
        }
    }

    /// Rejects edits through [`Widget::set_value`].
    #[must_use]
    pub const fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Attaches a structural validator.
    #[must_use]
    pub fn with_check(mut self, check: Check) -> Self {
        self.check = Some(check);
        self.validate();
        self
    }

    fn validate(&mut self) -> bool {
        self.error = self
            .check
            .as_ref()
            .and_then(|check| check(self.value.as_ref()).err());
        self.error.is_none()
    }
}

impl Widget for MemoryWidget {
    fn value(&self) -> Option<Value> {
        self.value.clone()
    }

    fn set_value(&mut self, value: Option<Value>) {
        if self.readonly {
            return;
        }
        self.value = value;
        self.validate();
    }

    fn set_default(&mut self, value: Option<Value>) {
        self.initial.clone_from(&value);
        self.value = value;
        self.validate();
    }

    fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    fn validation_error(&self) -> Option<String> {
        self.error.clone()
    }

    fn trigger_validation(&mut self) -> bool {
        self.validate()
    }

    fn is_changed(&self) -> bool {
        self.value != self.initial
    }
}

/// Builds [`MemoryWidget`]s.
///
/// Options with choices get a validator that rejects values outside them
/// when the option kind requires it.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryWidgetFactory;

impl WidgetFactory for MemoryWidgetFactory {
    fn create(&self, field: &FieldContext<'_>) -> Box<dyn Widget> {
        let widget = MemoryWidget::new(field.initial.clone()).readonly(field.readonly);

        match field.option.allowed_choices() {
            Some(choices) => {
                Box::new(widget.with_check(Box::new(move |value| match value {
                    None => Ok(()),
                    Some(value) => value
                        .to_list()
                        .iter()
                        .find(|item| !item.is_empty() && !choices.contains(item))
                        .map_or(Ok(()), |item| Err(format!("'{item}' is not a valid choice"))),
                })))
            }
            None => Box::new(widget),
        }
    }
}

/// Identifies one rendered field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WidgetKey {
    /// The section owning the option.
    pub section: SectionId,
    /// The option name.
    pub option: String,
    /// The record being edited.
    pub record: String,
}

impl WidgetKey {
    /// Creates a key.
    #[must_use]
    pub fn new(section: SectionId, option: impl Into<String>, record: impl Into<String>) -> Self {
        Self {
            section,
            option: option.into(),
            record: record.into(),
        }
    }
}

#[derive(Debug)]
struct Binding {
    widget: Box<dyn Widget>,
    active: bool,
}

/// The rendered fields of a form.
///
/// A field that is not bound counts as inactive and has no live value.
#[derive(Debug, Default)]
pub struct WidgetRegistry {
    bindings: HashMap<WidgetKey, Binding>,
}

impl WidgetRegistry {
    /// Binds a widget, initially active.
    pub fn insert(&mut self, key: WidgetKey, widget: Box<dyn Widget>) {
        self.bindings.insert(
            key,
            Binding {
                widget,
                active: true,
            },
        );
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// The number of bound fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether a field is bound.
    #[must_use]
    pub fn contains(&self, key: &WidgetKey) -> bool {
        self.bindings.contains_key(key)
    }

    /// Returns a bound widget.
    #[must_use]
    pub fn get(&self, key: &WidgetKey) -> Option<&dyn Widget> {
        self.bindings.get(key).map(|binding| binding.widget.as_ref())
    }

    /// Returns a bound widget mutably.
    pub fn get_mut(&mut self, key: &WidgetKey) -> Option<&mut (dyn Widget + 'static)> {
        self.bindings
            .get_mut(key)
            .map(|binding| binding.widget.as_mut())
    }

    /// Whether a field is bound and currently active.
    #[must_use]
    pub fn is_active(&self, key: &WidgetKey) -> bool {
        self.bindings.get(key).is_some_and(|binding| binding.active)
    }

    /// Shows or hides a field.
    ///
    /// Returns `true` if the flag changed; unbound fields never change.
    pub fn set_active(&mut self, key: &WidgetKey, active: bool) -> bool {
        match self.bindings.get_mut(key) {
            Some(binding) if binding.active != active => {
                binding.active = active;
                true
            }
            _ => false,
        }
    }

    /// The live value of a field: its widget value while active, else `None`.
    #[must_use]
    pub fn live_value(&self, key: &WidgetKey) -> Option<Value> {
        self.bindings
            .get(key)
            .filter(|binding| binding.active)
            .and_then(|binding| binding.widget.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_widget_tracks_edits() {
        let mut widget = MemoryWidget::new(Some(Value::from("dhcp")));
        assert!(!widget.is_changed());

        widget.set_value(Some(Value::from("static")));
        assert!(widget.is_changed());

        widget.set_default(Some(Value::from("none")));
        assert!(!widget.is_changed());
    }

    #[test]
    fn readonly_widget_ignores_edits() {
        let mut widget = MemoryWidget::new(Some(Value::from("dhcp"))).readonly(true);
        widget.set_value(Some(Value::from("static")));
        assert_eq!(widget.value(), Some(Value::from("dhcp")));
    }

    #[test]
    fn checks_run_on_edit() {
        let mut widget = MemoryWidget::new(None).with_check(Box::new(|value| match value {
            Some(Value::Text(text)) if text.parse::<u16>().is_err() => {
                Err("expecting a port number".to_string())
            }
            _ => Ok(()),
        }));
        assert!(widget.is_valid());

        widget.set_value(Some(Value::from("http")));
        assert!(!widget.is_valid());
        assert_eq!(
            widget.validation_error().as_deref(),
            Some("expecting a port number")
        );

        widget.set_value(Some(Value::from("8080")));
        assert!(widget.trigger_validation());
    }

    #[test]
    fn inactive_fields_have_no_live_value() {
        let mut registry = WidgetRegistry::default();
        let key = WidgetKey::new(SectionId(0), "proto", "wan");
        registry.insert(key.clone(), Box::new(MemoryWidget::new(Some(Value::from("dhcp")))));

        assert_eq!(registry.live_value(&key), Some(Value::from("dhcp")));

        assert!(registry.set_active(&key, false));
        assert!(!registry.set_active(&key, false));
        assert_eq!(registry.live_value(&key), None);

        let unbound = WidgetKey::new(SectionId(0), "ipaddr", "wan");
        assert!(!registry.is_active(&unbound));
        assert!(!registry.set_active(&unbound, true));
    }
}
