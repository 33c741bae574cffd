use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::model::category::{Category, Priority};
use crate::ops::task_ops::{ValidationError, validate_color, validate_name};
use crate::ops::views::{NO_PRIORITY, UNCATEGORIZED};

/// A user's categories and priorities, for name lookups and display
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub categories: Vec<Category>,
    pub priorities: Vec<Priority>,
}

impl Catalog {
    pub fn category(&self, id: Option<i64>) -> Option<&Category> {
        id.and_then(|id| self.categories.iter().find(|c| c.id == id))
    }

    pub fn priority(&self, id: Option<i64>) -> Option<&Priority> {
        id.and_then(|id| self.priorities.iter().find(|p| p.id == id))
    }

    /// Display name; missing and dangling references read as `Uncategorized`
    pub fn category_name(&self, id: Option<i64>) -> &str {
        self.category(id).map_or(UNCATEGORIZED, |c| c.name.as_str())
    }

    pub fn priority_name(&self, id: Option<i64>) -> &str {
        self.priority(id).map_or(NO_PRIORITY, |p| p.name.as_str())
    }
}

/// Find a category by numeric id or case-insensitive name
pub fn resolve_category<'a>(categories: &'a [Category], key: &str) -> Option<&'a Category> {
    let key = key.trim();
    if let Ok(id) = key.parse::<i64>() {
        if let Some(c) = categories.iter().find(|c| c.id == id) {
            return Some(c);
        }
    }
    categories.iter().find(|c| c.name.eq_ignore_ascii_case(key))
}

/// Find a priority by numeric id or case-insensitive name
pub fn resolve_priority<'a>(priorities: &'a [Priority], key: &str) -> Option<&'a Priority> {
    let key = key.trim();
    if let Ok(id) = key.parse::<i64>() {
        if let Some(p) = priorities.iter().find(|p| p.id == id) {
            return Some(p);
        }
    }
    priorities.iter().find(|p| p.name.eq_ignore_ascii_case(key))
}

/// Category names are unique per user, ignoring case. `except` is the
/// category being renamed.
pub fn ensure_unique_category(
    categories: &[Category],
    name: &str,
    except: Option<i64>,
) -> Result<(), ValidationError> {
    let taken = categories
        .iter()
        .any(|c| Some(c.id) != except && c.name.to_lowercase() == name.to_lowercase());
    if taken {
        return Err(ValidationError::DuplicateName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    pub name: String,
    pub color: String,
}

impl NewCategory {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(NewCategory {
            name: validate_name("category", &self.name)?,
            color: validate_color(&self.color)?,
        })
    }

    pub fn build(self, id: i64, user_id: &str, now: DateTime<Utc>) -> Category {
        Category {
            id,
            name: self.name,
            color: self.color,
            user_id: user_id.to_string(),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl CategoryPatch {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(CategoryPatch {
            name: self
                .name
                .map(|n| validate_name("category", &n))
                .transpose()?,
            color: self.color.map(|c| validate_color(&c)).transpose()?,
        })
    }

    pub fn apply(&self, category: &mut Category) {
        if let Some(name) = &self.name {
            category.name = name.clone();
        }
        if let Some(color) = &self.color {
            category.color = color.clone();
        }
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut body = Map::new();
        if let Some(name) = &self.name {
            body.insert("name".into(), json!(name));
        }
        if let Some(color) = &self.color {
            body.insert("color".into(), json!(color));
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPriority {
    pub name: String,
    pub level: i32,
    pub color: String,
}

impl NewPriority {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(NewPriority {
            name: validate_name("priority", &self.name)?,
            level: self.level,
            color: validate_color(&self.color)?,
        })
    }

    pub fn build(self, id: i64, user_id: &str, now: DateTime<Utc>) -> Priority {
        Priority {
            id,
            name: self.name,
            level: self.level,
            color: self.color,
            user_id: user_id.to_string(),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorityPatch {
    pub name: Option<String>,
    pub level: Option<i32>,
    pub color: Option<String>,
}

impl PriorityPatch {
    pub fn validated(self) -> Result<Self, ValidationError> {
        Ok(PriorityPatch {
            name: self
                .name
                .map(|n| validate_name("priority", &n))
                .transpose()?,
            level: self.level,
            color: self.color.map(|c| validate_color(&c)).transpose()?,
        })
    }

    pub fn apply(&self, priority: &mut Priority) {
        if let Some(name) = &self.name {
            priority.name = name.clone();
        }
        if let Some(level) = self.level {
            priority.level = level;
        }
        if let Some(color) = &self.color {
            priority.color = color.clone();
        }
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut body = Map::new();
        if let Some(name) = &self.name {
            body.insert("name".into(), json!(name));
        }
        if let Some(level) = self.level {
            body.insert("level".into(), json!(level));
        }
        if let Some(color) = &self.color {
            body.insert("color".into(), json!(color));
        }
        body
    }
}

/// Priorities by ascending level, then name
pub fn sort_priorities(priorities: &mut [Priority]) {
    priorities.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn category(id: i64, name: &str) -> Category {
        Category {
            id,
            name: name.into(),
            color: "#3b82f6".into(),
            user_id: "u1".into(),
            created_at: Utc::now(),
        }
    }

    fn priority(id: i64, name: &str, level: i32) -> Priority {
        Priority {
            id,
            name: name.into(),
            level,
            color: "#f59e0b".into(),
            user_id: "u1".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_by_id_or_name() {
        let cats = vec![category(1, "Work"), category(2, "Home")];
        assert_eq!(resolve_category(&cats, "2").map(|c| c.id), Some(2));
        assert_eq!(resolve_category(&cats, "work").map(|c| c.id), Some(1));
        assert!(resolve_category(&cats, "Garden").is_none());

        let prios = vec![priority(5, "High", 1)];
        assert_eq!(resolve_priority(&prios, " HIGH ").map(|p| p.id), Some(5));
    }

    #[test]
    fn test_numeric_name_falls_back_to_name_match() {
        let cats = vec![category(1, "2025")];
        assert_eq!(resolve_category(&cats, "2025").map(|c| c.id), Some(1));
    }

    #[test]
    fn test_catalog_fallback_names() {
        let catalog = Catalog {
            categories: vec![category(1, "Work")],
            priorities: vec![],
        };
        assert_eq!(catalog.category_name(Some(1)), "Work");
        assert_eq!(catalog.category_name(Some(9)), "Uncategorized");
        assert_eq!(catalog.category_name(None), "Uncategorized");
        assert_eq!(catalog.priority_name(Some(1)), "No Priority");
    }

    #[test]
    fn test_unique_category_name() {
        let cats = vec![category(1, "Work"), category(2, "Home")];
        assert_eq!(
            ensure_unique_category(&cats, "WORK", None),
            Err(ValidationError::DuplicateName("WORK".into()))
        );
        assert!(ensure_unique_category(&cats, "work", Some(1)).is_ok());
        assert!(ensure_unique_category(&cats, "Garden", None).is_ok());
    }

    #[test]
    fn test_new_category_validated() {
        let c = NewCategory {
            name: "  Errands ".into(),
            color: "#ABCDEF".into(),
        }
        .validated()
        .unwrap();
        assert_eq!(c.name, "Errands");
        assert_eq!(c.color, "#abcdef");

        assert!(
            NewCategory {
                name: "".into(),
                color: "#abcdef".into()
            }
            .validated()
            .is_err()
        );
    }

    #[test]
    fn test_priority_patch() {
        let mut p = priority(1, "High", 1);
        let patch = PriorityPatch {
            level: Some(0),
            ..Default::default()
        }
        .validated()
        .unwrap();
        patch.apply(&mut p);
        assert_eq!(p.level, 0);
        assert_eq!(p.name, "High");
        assert_eq!(patch.to_json().len(), 1);
    }

    #[test]
    fn test_sort_priorities() {
        let mut prios = vec![priority(1, "Low", 3), priority(2, "High", 1), priority(3, "Mid", 2)];
        sort_priorities(&mut prios);
        let names: Vec<&str> = prios.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["High", "Mid", "Low"]);
    }
}
