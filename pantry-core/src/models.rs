use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// A tracked pantry entry as the item store hands it out.
///
/// `expiry_date` is kept as the raw ISO-8601 string the store holds. Parsing
/// happens during classification so a corrupt record degrades to an unknown
/// expiry instead of failing the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub category: String,
    pub expiry_date: String,
    pub image_uri: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub user_id: String,
    pub name: String,
    pub category: String,
    pub expiry_date: String,
    pub image_uri: Option<String>,
}

/// Full replacement of the editable fields of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemChanges {
    pub name: String,
    pub category: String,
    pub expiry_date: String,
    pub image_uri: Option<String>,
}

impl Item {
    pub fn apply(&mut self, changes: ItemChanges) {
        self.name = changes.name;
        self.category = changes.category;
        self.expiry_date = changes.expiry_date;
        self.image_uri = changes.image_uri;
    }

    /// The known category of this item, if its free-text category is one.
    pub fn known_category(&self) -> Option<Category> {
        self.category.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Food,
    Medicine,
    Dairy,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Food,
        Category::Medicine,
        Category::Dairy,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Medicine => "Medicine",
            Category::Dairy => "Dairy",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category: {}", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Category selector used by the inventory views. `All` keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Exact(String),
}

impl CategoryFilter {
    pub const ALL_LABEL: &'static str = "All";

    pub fn parse(raw: &str) -> Self {
        if raw == Self::ALL_LABEL {
            CategoryFilter::All
        } else {
            CategoryFilter::Exact(raw.to_string())
        }
    }

    pub fn matches(&self, category: &str) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Exact(wanted) => wanted == category,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CategoryFilter::All => Self::ALL_LABEL,
            CategoryFilter::Exact(category) => category,
        }
    }
}

/// Selection of a user's items, optionally narrowed to one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub user_id: String,
    pub category: Option<String>,
}

impl ItemQuery {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, filter: &CategoryFilter) -> Self {
        self.category = match filter {
            CategoryFilter::All => None,
            CategoryFilter::Exact(category) => Some(category.clone()),
        };
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        item.user_id == self.user_id
            && self
                .category
                .as_deref()
                .map_or(true, |category| item.category == category)
    }
}
