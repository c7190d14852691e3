//! Polymorphic entity kinds sharing one lifecycle.
//!
//! Experiments, Items, experiment Templates and ItemsTypes (resource
//! categories) live in four tables with an identical column set. The kind
//! decides the table name, which registry provides its status, and where
//! its category points to.

use serde::{Deserialize, Serialize};

/// The kind of entity a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Experiment,
    Item,
    Template,
    ItemType,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Experiment,
        EntityType::Item,
        EntityType::Template,
        EntityType::ItemType,
    ];

    /// String label for SQL storage in child tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Experiment => "experiments",
            EntityType::Item => "items",
            EntityType::Template => "experiments_templates",
            EntityType::ItemType => "items_types",
        }
    }

    /// Parse from SQL string.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "experiments" => Some(EntityType::Experiment),
            "items" => Some(EntityType::Item),
            "experiments_templates" => Some(EntityType::Template),
            "items_types" => Some(EntityType::ItemType),
            _ => None,
        }
    }

    /// Owning table. Labels and table names coincide.
    pub fn table(&self) -> &'static str {
        self.as_str()
    }

    /// Registry providing the default status of this kind.
    pub fn status_registry(&self) -> Registry {
        match self {
            EntityType::Experiment | EntityType::Template => Registry::ExperimentsStatus,
            EntityType::Item | EntityType::ItemType => Registry::ItemsStatus,
        }
    }
}

/// Per-team enumerations with an ordering and an explicit default flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Registry {
    ExperimentsStatus,
    ItemsStatus,
    ExperimentsCategories,
}

impl Registry {
    pub fn table(&self) -> &'static str {
        match self {
            Registry::ExperimentsStatus => "experiments_status",
            Registry::ItemsStatus => "items_status",
            Registry::ExperimentsCategories => "experiments_categories",
        }
    }
}

/// Lifecycle state. Rows are never physically removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Normal = 1,
    Archived = 2,
    Deleted = 3,
}

impl State {
    pub fn as_i64(&self) -> i64 {
        *self as i64
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            2 => State::Archived,
            3 => State::Deleted,
            _ => State::Normal,
        }
    }

    /// Forward transitions are one-directional; only `restore` goes back.
    pub fn can_transition_to(&self, next: State) -> bool {
        matches!(
            (self, next),
            (State::Normal, State::Archived)
                | (State::Normal, State::Deleted)
                | (State::Archived, State::Deleted)
        )
    }
}

/// Body flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Html = 1,
    Markdown = 2,
}

impl ContentType {
    pub fn as_i64(&self) -> i64 {
        *self as i64
    }

    pub fn from_i64(value: i64) -> Self {
        if value == 2 {
            ContentType::Markdown
        } else {
            ContentType::Html
        }
    }

    pub fn preferred(use_markdown: bool) -> Self {
        if use_markdown {
            ContentType::Markdown
        } else {
            ContentType::Html
        }
    }
}

/// Target class of an entity link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Items,
    Experiments,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Items => "items",
            LinkKind::Experiments => "experiments",
        }
    }

    /// Entity kind the link points to.
    pub fn target_type(&self) -> EntityType {
        match self {
            LinkKind::Items => EntityType::Item,
            LinkKind::Experiments => EntityType::Experiment,
        }
    }
}

/// Template selector used by `create`.
///
/// Integer convention kept from the HTTP layer: positive ids select a real
/// template, `0` the team's common template, negatives a blank entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateRef {
    Blank,
    Common,
    Id(i64),
}

impl From<i64> for TemplateRef {
    fn from(value: i64) -> Self {
        match value {
            v if v > 0 => TemplateRef::Id(v),
            0 => TemplateRef::Common,
            _ => TemplateRef::Blank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_roundtrips_labels() {
        for kind in EntityType::ALL {
            assert_eq!(EntityType::from_str_opt(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityType::from_str_opt("users"), None);
    }

    #[test]
    fn test_template_ref_from_integer_convention() {
        assert_eq!(TemplateRef::from(12), TemplateRef::Id(12));
        assert_eq!(TemplateRef::from(0), TemplateRef::Common);
        assert_eq!(TemplateRef::from(-1), TemplateRef::Blank);
    }

    #[test]
    fn test_state_transitions_are_forward_only() {
        assert!(State::Normal.can_transition_to(State::Deleted));
        assert!(State::Archived.can_transition_to(State::Deleted));
        assert!(!State::Deleted.can_transition_to(State::Normal));
        assert!(!State::Deleted.can_transition_to(State::Archived));
        assert!(!State::Archived.can_transition_to(State::Normal));
    }

    #[test]
    fn test_status_registry_per_kind() {
        assert_eq!(EntityType::Experiment.status_registry(), Registry::ExperimentsStatus);
        assert_eq!(EntityType::Template.status_registry(), Registry::ExperimentsStatus);
        assert_eq!(EntityType::Item.status_registry(), Registry::ItemsStatus);
    }
}
