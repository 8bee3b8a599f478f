//! Component identity and the database-component change-tracking protocol.
//!
//! Every persisted object carries a CRUD state that transitions as the
//! object moves through its lifecycle:
//!
//! - constructed new           -> `Inserted`
//! - loaded from XML           -> `Unchanged`
//! - mutated through a setter  -> `Unchanged` becomes `Updated`
//! - removed from its set      -> `Deleted` (an `Inserted` member is simply
//!   dropped; it never reached the back end)
//!
//! A flush walks the set, emits one `<Action>` element per non-`Unchanged`
//! member into an `<ActionSet>` batch for the server-side persistence
//! layer, then resets survivors to `Unchanged`.
//!
//! State lives outside the data records, in [`Tracked`] wrappers owned by a
//! [`TrackedSet`], so component equality stays a plain field comparison.

use serde::{Deserialize, Serialize};

use crate::error::{ObjectStoreError, Result};
use crate::xml::{ToXml, XmlElement};

/// Numeric object-store id assigned by the persistence layer.
///
/// `0` means unassigned: the component was built locally and has not been
/// flushed yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ComponentId(u32);

impl ComponentId {
    /// The id of a component that has never been persisted.
    pub const UNASSIGNED: ComponentId = ComponentId(0);

    /// Wraps a raw id value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw id value.
    pub fn value(self) -> u32 {
        self.0
    }

    /// Whether the persistence layer has assigned this id.
    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ComponentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(ComponentId)
    }
}

/// CRUD state recorded per tracked component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    /// Matches the persisted form; flush skips it
    Unchanged,
    /// Created locally, not yet persisted
    Inserted,
    /// Persisted form exists but local fields differ
    Updated,
    /// Marked for removal on the next flush
    Deleted,
}

impl ComponentState {
    /// The action a flush emits for a component in this state.
    pub fn action(self) -> Option<ActionType> {
        match self {
            ComponentState::Unchanged => None,
            ComponentState::Inserted => Some(ActionType::Insert),
            ComponentState::Updated => Some(ActionType::Update),
            ComponentState::Deleted => Some(ActionType::Delete),
        }
    }
}

/// Persistence action emitted in a flush batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Insert,
    Update,
    Delete,
}

impl ActionType {
    /// Wire representation used in the `type` attribute of `<Action>`.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Insert => "insert",
            ActionType::Update => "update",
            ActionType::Delete => "delete",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A data record that participates in the change-tracking protocol.
///
/// The key is the component's natural identity within its set (an alias or
/// name); equality over data fields decides whether a diff emits an update.
pub trait DbComponent: ToXml + Clone + PartialEq {
    /// Set name used in action batches, errors, and logs.
    fn component_type() -> &'static str;

    /// Natural key within the owning set.
    fn key(&self) -> &str;
}

/// A component paired with its CRUD state.
#[derive(Debug, Clone)]
pub struct Tracked<T> {
    value: T,
    state: ComponentState,
}

impl<T: DbComponent> Tracked<T> {
    /// Wraps a locally constructed component (`Inserted`).
    pub fn new_inserted(value: T) -> Self {
        Self {
            value,
            state: ComponentState::Inserted,
        }
    }

    /// Wraps a component loaded from its persisted form (`Unchanged`).
    pub fn new_unchanged(value: T) -> Self {
        Self {
            value,
            state: ComponentState::Unchanged,
        }
    }

    /// The wrapped component.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Current CRUD state.
    pub fn state(&self) -> ComponentState {
        self.state
    }

    /// Applies a mutation and promotes the state.
    ///
    /// The closure's own `Result` lets setter validation propagate; a
    /// failed edit leaves the state untouched.
    ///
    /// # Errors
    /// `ComponentDeleted` if the member is already marked for deletion.
    pub fn modify<R>(&mut self, edit: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        if self.state == ComponentState::Deleted {
            return Err(ObjectStoreError::ComponentDeleted {
                key: self.value.key().to_string(),
            });
        }
        let result = edit(&mut self.value)?;
        if self.state == ComponentState::Unchanged {
            self.state = ComponentState::Updated;
        }
        Ok(result)
    }
}

/// Ordered set of tracked components keyed by their natural key.
///
/// Deleted members stay in the set, invisible to lookups, until the next
/// flush emits their delete action.
#[derive(Debug, Clone, Default)]
pub struct TrackedSet<T> {
    members: Vec<Tracked<T>>,
}

impl<T: DbComponent> TrackedSet<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Builds a set from components loaded via `from_xml` (`Unchanged`).
    ///
    /// # Errors
    /// `DuplicateKey` if two components share a key.
    pub fn from_loaded(components: impl IntoIterator<Item = T>) -> Result<Self> {
        let mut set = Self::new();
        for component in components {
            set.check_duplicate(component.key())?;
            set.members.push(Tracked::new_unchanged(component));
        }
        Ok(set)
    }

    /// Adds a locally constructed component (`Inserted`).
    ///
    /// # Errors
    /// `DuplicateKey` if a live member already uses the key.
    pub fn insert(&mut self, component: T) -> Result<()> {
        self.check_duplicate(component.key())?;
        self.members.push(Tracked::new_inserted(component));
        Ok(())
    }

    /// Looks up a live member by key.
    pub fn get(&self, key: &str) -> Option<&T> {
        self.live().find(|t| t.value.key() == key).map(|t| &t.value)
    }

    /// CRUD state of a member, deleted members included.
    pub fn state(&self, key: &str) -> Option<ComponentState> {
        self.members
            .iter()
            .find(|t| t.value.key() == key)
            .map(Tracked::state)
    }

    /// Applies a validated mutation to a live member, promoting its state.
    ///
    /// # Errors
    /// `UnknownComponent` if no live member uses the key; the edit
    /// closure's own error if the new value is rejected.
    pub fn modify<R>(&mut self, key: &str, edit: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let member = self
            .members
            .iter_mut()
            .find(|t| t.state != ComponentState::Deleted && t.value.key() == key)
            .ok_or_else(|| ObjectStoreError::UnknownComponent {
                set: T::component_type(),
                key: key.to_string(),
            })?;
        member.modify(edit)
    }

    /// Marks a member for deletion.
    ///
    /// An `Inserted` member is dropped outright: it never reached the back
    /// end, so no action is owed.
    ///
    /// # Errors
    /// `UnknownComponent` if no live member uses the key.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        let position = self
            .members
            .iter()
            .position(|t| t.state != ComponentState::Deleted && t.value.key() == key)
            .ok_or_else(|| ObjectStoreError::UnknownComponent {
                set: T::component_type(),
                key: key.to_string(),
            })?;

        if self.members[position].state == ComponentState::Inserted {
            self.members.remove(position);
        } else {
            self.members[position].state = ComponentState::Deleted;
        }
        Ok(())
    }

    /// Iterates over live members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.live().map(|t| &t.value)
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.live().count()
    }

    /// Whether the set has no live members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a flush would emit any actions.
    pub fn has_changes(&self) -> bool {
        self.members
            .iter()
            .any(|t| t.state != ComponentState::Unchanged)
    }

    /// Flushes pending changes as an `<ActionSet>` batch.
    ///
    /// Survivors reset to `Unchanged` and deleted members are dropped.
    /// Returns `None` when nothing changed.
    pub fn flush(&mut self) -> Option<XmlElement> {
        let actions: Vec<(ActionType, XmlElement)> = self
            .members
            .iter()
            .filter_map(|t| t.state.action().map(|a| (a, t.value.to_xml())))
            .collect();

        self.members.retain(|t| t.state != ComponentState::Deleted);
        for member in &mut self.members {
            member.state = ComponentState::Unchanged;
        }

        if actions.is_empty() {
            return None;
        }

        tracing::debug!(
            component = T::component_type(),
            actions = actions.len(),
            "flushing change batch"
        );
        Some(build_action_set(actions))
    }

    fn live(&self) -> impl Iterator<Item = &Tracked<T>> {
        self.members
            .iter()
            .filter(|t| t.state != ComponentState::Deleted)
    }

    fn check_duplicate(&self, key: &str) -> Result<()> {
        if self.get(key).is_some() {
            return Err(ObjectStoreError::DuplicateKey {
                set: T::component_type(),
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

impl<'a, T: DbComponent> IntoIterator for &'a TrackedSet<T> {
    type Item = &'a T;
    type IntoIter = Box<dyn Iterator<Item = &'a T> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Computes the action batch separating a baseline set from an edited set.
///
/// Components are matched by key: new keys insert, missing keys delete,
/// matching keys with unequal fields update. Insert/update order follows
/// the edited set, deletes follow the baseline.
pub fn diff<T: DbComponent>(baseline: &[T], edited: &[T]) -> Vec<(ActionType, T)> {
    let mut actions = Vec::new();

    for component in edited {
        match baseline.iter().find(|b| b.key() == component.key()) {
            None => actions.push((ActionType::Insert, component.clone())),
            Some(before) if before != component => {
                actions.push((ActionType::Update, component.clone()));
            }
            Some(_) => {}
        }
    }

    for before in baseline {
        if !edited.iter().any(|e| e.key() == before.key()) {
            actions.push((ActionType::Delete, before.clone()));
        }
    }

    actions
}

/// Wraps a list of actions in an `<ActionSet>` batch element.
///
/// Returns `None` for an empty action list: the persistence layer never
/// sees empty batches.
pub fn action_set<T: DbComponent>(actions: &[(ActionType, T)]) -> Option<XmlElement> {
    if actions.is_empty() {
        return None;
    }
    Some(build_action_set(
        actions.iter().map(|(a, c)| (*a, c.to_xml())).collect(),
    ))
}

/// Wraps pre-rendered component elements in an `<ActionSet>` batch.
///
/// Used when one batch spans several component families and the typed
/// [`action_set`] signature cannot hold them all.
pub fn action_set_elements(actions: Vec<(ActionType, XmlElement)>) -> Option<XmlElement> {
    if actions.is_empty() {
        return None;
    }
    Some(build_action_set(actions))
}

fn build_action_set(actions: Vec<(ActionType, XmlElement)>) -> XmlElement {
    let mut set = XmlElement::new("ActionSet")
        .with_attribute("batchId", uuid::Uuid::new_v4().to_string());
    for (action, component) in actions {
        set.add_child(
            XmlElement::new("Action")
                .with_attribute("type", action.as_str())
                .with_child(component),
        );
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        name: String,
        size: u32,
    }

    impl ToXml for Widget {
        fn to_xml(&self) -> XmlElement {
            XmlElement::new("Widget")
                .with_attribute("name", self.name.clone())
                .with_attribute("size", self.size.to_string())
        }
    }

    impl DbComponent for Widget {
        fn component_type() -> &'static str {
            "Widget"
        }

        fn key(&self) -> &str {
            &self.name
        }
    }

    fn widget(name: &str, size: u32) -> Widget {
        Widget {
            name: name.to_string(),
            size,
        }
    }

    #[test]
    fn test_loaded_members_start_unchanged() {
        let set = TrackedSet::from_loaded([widget("a", 1), widget("b", 2)]).unwrap();
        assert_eq!(set.state("a"), Some(ComponentState::Unchanged));
        assert!(!set.has_changes());
    }

    #[test]
    fn test_insert_starts_inserted() {
        let mut set = TrackedSet::new();
        set.insert(widget("a", 1)).unwrap();
        assert_eq!(set.state("a"), Some(ComponentState::Inserted));
        assert!(set.has_changes());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut set = TrackedSet::from_loaded([widget("a", 1)]).unwrap();
        let err = set.insert(widget("a", 9)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ObjectStoreError::DuplicateKey { .. }
        ));
    }

    #[test]
    fn test_modify_promotes_unchanged_to_updated() {
        let mut set = TrackedSet::from_loaded([widget("a", 1)]).unwrap();
        set.modify("a", |w| {
            w.size = 5;
            Ok(())
        })
        .unwrap();
        assert_eq!(set.state("a"), Some(ComponentState::Updated));
        assert_eq!(set.get("a").unwrap().size, 5);
    }

    #[test]
    fn test_modify_keeps_inserted_state() {
        let mut set = TrackedSet::new();
        set.insert(widget("a", 1)).unwrap();
        set.modify("a", |w| {
            w.size = 5;
            Ok(())
        })
        .unwrap();
        assert_eq!(set.state("a"), Some(ComponentState::Inserted));
    }

    #[test]
    fn test_failed_edit_leaves_state_untouched() {
        let mut set = TrackedSet::from_loaded([widget("a", 1)]).unwrap();
        let result: crate::error::Result<()> = set.modify("a", |_| {
            Err(crate::error::ObjectStoreError::invalid_value(
                "Widget.size",
                "too big",
            ))
        });
        assert!(result.is_err());
        assert_eq!(set.state("a"), Some(ComponentState::Unchanged));
    }

    #[test]
    fn test_remove_inserted_drops_without_action() {
        let mut set = TrackedSet::new();
        set.insert(widget("a", 1)).unwrap();
        set.remove("a").unwrap();
        assert!(set.is_empty());
        assert!(!set.has_changes());
        assert!(set.flush().is_none());
    }

    #[test]
    fn test_remove_persisted_marks_deleted() {
        let mut set = TrackedSet::from_loaded([widget("a", 1)]).unwrap();
        set.remove("a").unwrap();
        assert_eq!(set.state("a"), Some(ComponentState::Deleted));
        assert!(set.get("a").is_none());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_modify_deleted_is_rejected() {
        let mut set = TrackedSet::from_loaded([widget("a", 1)]).unwrap();
        set.remove("a").unwrap();
        let err = set
            .modify("a", |w| {
                w.size = 9;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ObjectStoreError::UnknownComponent { .. }
        ));
    }

    #[test]
    fn test_flush_emits_actions_and_resets() {
        let mut set = TrackedSet::from_loaded([widget("a", 1), widget("b", 2)]).unwrap();
        set.insert(widget("c", 3)).unwrap();
        set.modify("a", |w| {
            w.size = 10;
            Ok(())
        })
        .unwrap();
        set.remove("b").unwrap();

        let batch = set.flush().expect("changes should flush");
        assert_eq!(batch.name(), "ActionSet");
        assert!(batch.attribute("batchId").is_some());

        let types: Vec<&str> = batch
            .children_named("Action")
            .filter_map(|a| a.attribute("type"))
            .collect();
        assert_eq!(types, vec!["update", "delete", "insert"]);

        // After flush: survivors unchanged, deleted member gone
        assert!(!set.has_changes());
        assert_eq!(set.len(), 2);
        assert_eq!(set.state("b"), None);
        assert!(set.flush().is_none());
    }

    #[test]
    fn test_diff_detects_all_action_kinds() {
        let baseline = [widget("keep", 1), widget("change", 2), widget("drop", 3)];
        let edited = [widget("keep", 1), widget("change", 20), widget("add", 4)];

        let actions = diff(&baseline, &edited);
        assert_eq!(actions.len(), 3);
        assert!(matches!(
            &actions[0],
            (ActionType::Update, w) if w.name == "change"
        ));
        assert!(matches!(
            &actions[1],
            (ActionType::Insert, w) if w.name == "add"
        ));
        assert!(matches!(
            &actions[2],
            (ActionType::Delete, w) if w.name == "drop"
        ));
    }

    #[test]
    fn test_action_set_empty_is_none() {
        let actions: Vec<(ActionType, Widget)> = Vec::new();
        assert!(action_set(&actions).is_none());
    }

    #[test]
    fn test_component_id() {
        assert!(!ComponentId::UNASSIGNED.is_assigned());
        assert!(ComponentId::new(7).is_assigned());
        assert_eq!("42".parse::<ComponentId>().unwrap(), ComponentId::new(42));
    }
}
