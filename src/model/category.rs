use async_graphql::{ComplexObject, SimpleObject, ID};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user-defined spending category, e.g. "Food" or "Dogs".
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, FromRow, SimpleObject)]
#[graphql(complex)]
pub struct Category {
    #[graphql(skip)]
    pub(crate) id: i64,
    #[graphql(skip)]
    pub(crate) user_id: i64,
    pub name: String,
    /// Free-form display color, e.g. `red` or `#ff0000`.
    pub color: Option<String>,
}

#[ComplexObject]
impl Category {
    async fn id(&self) -> ID {
        ID(self.id.to_string())
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct NewCategory {
    pub name: String,
    pub color: Option<String>,
}

/// Partial update of a `Category`. For `color`, `Some(None)` clears the color.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CategoryUpdates {
    pub name: Option<String>,
    pub color: Option<Option<String>>,
}

impl CategoryUpdates {
    pub(crate) fn apply(self, category: &mut Category) {
        if let Some(name) = self.name {
            category.name = name;
        }
        if let Some(color) = self.color {
            category.color = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_updates_can_clear_color() {
        let mut category = Category {
            id: 300,
            user_id: 100,
            name: "Dogs".to_string(),
            color: Some("red".to_string()),
        };
        CategoryUpdates {
            name: None,
            color: Some(None),
        }
        .apply(&mut category);
        assert_eq!(category.name, "Dogs");
        assert_eq!(category.color, None);
    }
}
