//! Content tables that embed media URLs by value.
//!
//! Every place a content row may hold a copy of a media URL is listed in
//! [`UrlField::registry`]. Table and column identifiers used in SQL come only
//! from this registry.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTable {
    Pages,
    BlogPosts,
    RoomTypes,
    Packages,
    Activities,
    SpaServices,
    Meals,
}

impl ContentTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentTable::Pages => "pages",
            ContentTable::BlogPosts => "blog_posts",
            ContentTable::RoomTypes => "room_types",
            ContentTable::Packages => "packages",
            ContentTable::Activities => "activities",
            ContentTable::SpaServices => "spa_services",
            ContentTable::Meals => "meals",
        }
    }
}

impl fmt::Display for ContentTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a column stores media URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldShape {
    /// Single nullable text column
    Scalar,
    /// `text[]` of URLs
    UrlArray,
    /// JSONB array of objects, each carrying its URL under `url_key`
    ItemArray { url_key: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UrlField {
    pub table: ContentTable,
    pub column: &'static str,
    pub shape: FieldShape,
}

const fn scalar(table: ContentTable, column: &'static str) -> UrlField {
    UrlField {
        table,
        column,
        shape: FieldShape::Scalar,
    }
}

const fn urls(table: ContentTable, column: &'static str) -> UrlField {
    UrlField {
        table,
        column,
        shape: FieldShape::UrlArray,
    }
}

const fn items(table: ContentTable, column: &'static str) -> UrlField {
    UrlField {
        table,
        column,
        shape: FieldShape::ItemArray { url_key: "url" },
    }
}

static REGISTRY: [UrlField; 13] = [
    scalar(ContentTable::Pages, "hero_image"),
    urls(ContentTable::Pages, "gallery"),
    scalar(ContentTable::BlogPosts, "featured_image"),
    scalar(ContentTable::RoomTypes, "hero_image"),
    urls(ContentTable::RoomTypes, "gallery"),
    scalar(ContentTable::Packages, "featured_image"),
    scalar(ContentTable::Packages, "banner_image"),
    urls(ContentTable::Packages, "gallery_images"),
    scalar(ContentTable::Activities, "image_url"),
    items(ContentTable::Activities, "media"),
    scalar(ContentTable::SpaServices, "image_url"),
    items(ContentTable::SpaServices, "media"),
    scalar(ContentTable::Meals, "featured_media"),
];

impl UrlField {
    /// Every known (table, column) holding media URLs, in rewrite order.
    pub fn registry() -> &'static [UrlField] {
        &REGISTRY
    }

    pub fn find(table: ContentTable, column: &str) -> Option<&'static UrlField> {
        REGISTRY
            .iter()
            .find(|f| f.table == table && f.column == column)
    }
}

impl fmt::Display for UrlField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Current value of a URL-bearing column on one row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Option<String>),
    Urls(Vec<String>),
    Items {
        url_key: &'static str,
        items: Vec<JsonValue>,
    },
}

impl FieldValue {
    /// Number of occurrences of `url` in this value.
    pub fn references(&self, url: &str) -> usize {
        match self {
            FieldValue::Scalar(value) => usize::from(value.as_deref() == Some(url)),
            FieldValue::Urls(values) => values.iter().filter(|v| v.as_str() == url).count(),
            FieldValue::Items { url_key, items } => items
                .iter()
                .filter(|item| item_url(item, url_key) == Some(url))
                .count(),
        }
    }

    /// All URLs held by this value, in order.
    pub fn urls(&self) -> Vec<&str> {
        match self {
            FieldValue::Scalar(value) => value.as_deref().into_iter().collect(),
            FieldValue::Urls(values) => values.iter().map(String::as_str).collect(),
            FieldValue::Items { url_key, items } => items
                .iter()
                .filter_map(|item| item_url(item, url_key))
                .collect(),
        }
    }

    /// Copy of this value with every occurrence of `from` replaced by `to`.
    ///
    /// Returns `None` when `from` does not occur. Element order and every other
    /// property of structured items are preserved.
    pub fn replace_url(&self, from: &str, to: &str) -> Option<FieldValue> {
        if self.references(from) == 0 {
            return None;
        }
        let replaced = match self {
            FieldValue::Scalar(_) => FieldValue::Scalar(Some(to.to_string())),
            FieldValue::Urls(values) => FieldValue::Urls(
                values
                    .iter()
                    .map(|v| if v == from { to.to_string() } else { v.clone() })
                    .collect(),
            ),
            FieldValue::Items { url_key, items } => FieldValue::Items {
                url_key: *url_key,
                items: items
                    .iter()
                    .map(|item| {
                        let mut item = item.clone();
                        if item_url(&item, url_key) == Some(from) {
                            if let Some(obj) = item.as_object_mut() {
                                obj.insert(url_key.to_string(), JsonValue::String(to.to_string()));
                            }
                        }
                        item
                    })
                    .collect(),
            },
        };
        Some(replaced)
    }
}

fn item_url<'a>(item: &'a JsonValue, url_key: &str) -> Option<&'a str> {
    item.get(url_key).and_then(JsonValue::as_str)
}

/// One content row's value for a given field.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRow {
    pub row_id: Uuid,
    pub value: FieldValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_covers_every_table() {
        let tables: std::collections::BTreeSet<_> =
            UrlField::registry().iter().map(|f| f.table).collect();
        assert_eq!(tables.len(), 7);
        let unique: std::collections::HashSet<_> = UrlField::registry()
            .iter()
            .map(|f| (f.table, f.column))
            .collect();
        assert_eq!(unique.len(), UrlField::registry().len());
    }

    #[test]
    fn scalar_replace_only_on_match() {
        let value = FieldValue::Scalar(Some("/b.jpg".to_string()));
        assert_eq!(value.replace_url("/x.jpg", "/a.jpg"), None);
        assert_eq!(
            value.replace_url("/b.jpg", "/a.jpg"),
            Some(FieldValue::Scalar(Some("/a.jpg".to_string())))
        );
        assert_eq!(FieldValue::Scalar(None).replace_url("/b.jpg", "/a.jpg"), None);
    }

    #[test]
    fn url_array_replace_preserves_order() {
        let value = FieldValue::Urls(vec![
            "/c.jpg".to_string(),
            "/z.jpg".to_string(),
            "/c.jpg".to_string(),
        ]);
        assert_eq!(value.references("/c.jpg"), 2);
        let replaced = value.replace_url("/c.jpg", "/a.jpg").unwrap();
        assert_eq!(
            replaced,
            FieldValue::Urls(vec![
                "/a.jpg".to_string(),
                "/z.jpg".to_string(),
                "/a.jpg".to_string()
            ])
        );
    }

    #[test]
    fn item_array_replace_keeps_other_properties() {
        let value = FieldValue::Items {
            url_key: "url",
            items: vec![
                json!({"url": "/b.jpg", "alt": "Pool", "type": "image"}),
                json!({"url": "/y.mp4", "type": "video", "poster": "/b.jpg"}),
                json!({"caption": "no url"}),
            ],
        };
        let replaced = value.replace_url("/b.jpg", "/a.jpg").unwrap();
        let FieldValue::Items { items, .. } = replaced else {
            panic!("shape changed");
        };
        assert_eq!(items[0], json!({"url": "/a.jpg", "alt": "Pool", "type": "image"}));
        // only the url-bearing property is rewritten
        assert_eq!(items[1], json!({"url": "/y.mp4", "type": "video", "poster": "/b.jpg"}));
        assert_eq!(items[2], json!({"caption": "no url"}));
    }

    #[test]
    fn urls_lists_every_shape() {
        let items = FieldValue::Items {
            url_key: "url",
            items: vec![json!({"url": "/a.jpg"}), json!({"other": 1})],
        };
        assert_eq!(items.urls(), vec!["/a.jpg"]);
        assert!(FieldValue::Scalar(None).urls().is_empty());
    }
}
