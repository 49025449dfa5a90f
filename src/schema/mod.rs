//! Entity schema descriptors.
//!
//! Every generic view in the portal works off an [`EntitySchema`]
//! resolved once per entity per run: which fields exist, what kind of
//! value each holds and which editing widget it gets. Descriptors are
//! built from the column listing the backend exposes through the
//! `table_columns` function and cached in a [`SchemaCache`].

mod display;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub use display::{field_label, format_field, stringify_cell};

/// The entities the portal manages
pub const ENTITIES: &[&str] = &[
    "students",
    "employees",
    "educators",
    "centers",
    "programs",
    "payroll",
    "announcements",
    "attachments",
];

/// Name of the backend function returning column listings
pub const COLUMNS_FUNCTION: &str = "table_columns";

/// Primary key column for an entity.
///
/// Staff tables key on the employee id so the educator projection can
/// share identity with the employee row; everything else uses `id`.
pub fn primary_key(entity: &str) -> &'static str {
    match entity {
        "employees" | "educators" => "employee_id",
        _ => "id",
    }
}

/// The entity a reference column points at, if it is a known one
pub fn lookup_entity(column: &str) -> Option<&'static str> {
    match column {
        "center_id" => Some("centers"),
        "program_id" => Some("programs"),
        "student_id" => Some("students"),
        "employee_id" => Some("employees"),
        "educator_id" => Some("educators"),
        _ => None,
    }
}

/// The column used as the human-readable label for an entity
pub fn label_column(entity: &str) -> &'static str {
    match entity {
        "announcements" => "title",
        _ => "name",
    }
}

/// One choice of a lookup widget: a referenced row's key and its
/// display label. Fetched through [`crate::Portal::lookup_options`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupOption {
    /// Primary key value of the referenced row
    pub key: Value,

    /// Label from the entity's label column
    pub label: String,
}

/// Value kind of a column, mapped from the backend data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    Uuid,
    Json,
}

impl SemanticType {
    /// Map a backend data type name to a semantic type
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type.trim().to_lowercase().as_str() {
            "smallint" | "integer" | "bigint" | "int2" | "int4" | "int8" => SemanticType::Integer,
            "numeric" | "decimal" | "real" | "double precision" | "float4" | "float8" => {
                SemanticType::Float
            }
            "boolean" | "bool" => SemanticType::Boolean,
            "date" => SemanticType::Date,
            s if s.starts_with("timestamp") => SemanticType::Timestamp,
            "uuid" => SemanticType::Uuid,
            "json" | "jsonb" => SemanticType::Json,
            _ => SemanticType::Text,
        }
    }

    /// Stable lowercase name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Text => "text",
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::Boolean => "boolean",
            SemanticType::Date => "date",
            SemanticType::Timestamp => "timestamp",
            SemanticType::Uuid => "uuid",
            SemanticType::Json => "json",
        }
    }
}

/// Editing widget a field gets in a generated form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WidgetKind {
    /// Single-line text input
    Text,

    /// Multi-line text area
    Multiline,

    /// Numeric input
    Number,

    /// Checkbox
    Toggle,

    /// Calendar picker
    DatePicker,

    /// Fixed list of choices
    Dropdown { options: Vec<String> },

    /// Reference to another entity, rendered as a searchable select
    Lookup { entity: String },

    /// File picker uploading into a storage bucket
    FileUpload,

    /// Shown but never edited
    ReadOnly,
}

fn dropdown(options: &[&str]) -> WidgetKind {
    WidgetKind::Dropdown {
        options: options.iter().map(|s| s.to_string()).collect(),
    }
}

/// Widget for a column, decided by name convention first and value
/// kind second. This is a lookup table, not an inference step; new
/// conventions get a new row here.
pub fn widget_for(entity: &str, column: &str, semantic: SemanticType) -> WidgetKind {
    if column == primary_key(entity) || column == "created_at" || column == "updated_at" {
        return WidgetKind::ReadOnly;
    }

    if let Some(target) = lookup_entity(column) {
        // A staff table's own key is identity, not a reference
        if !(column == "employee_id" && (entity == "employees" || entity == "educators")) {
            return WidgetKind::Lookup {
                entity: target.to_string(),
            };
        }
    }

    match column {
        "gender" => return dropdown(&["Male", "Female", "Other"]),
        "role" => return dropdown(&["admin", "hr", "educator"]),
        "status" => return dropdown(&["active", "inactive"]),
        "blood_group" => {
            return dropdown(&["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"])
        }
        _ => {}
    }

    if column == "dob"
        || column == "date_of_birth"
        || column.ends_with("_date")
        || column == "date_of_joining"
        || semantic == SemanticType::Date
    {
        return WidgetKind::DatePicker;
    }

    // "lor" is the letter-of-recommendation scan on employee records
    if column.contains("photo")
        || column.contains("document")
        || column.ends_with("_file")
        || column == "lor"
    {
        return WidgetKind::FileUpload;
    }

    match semantic {
        SemanticType::Boolean => WidgetKind::Toggle,
        SemanticType::Integer | SemanticType::Float => WidgetKind::Number,
        SemanticType::Timestamp => WidgetKind::DatePicker,
        _ => match column {
            "notes" | "remarks" | "diagnosis" | "address" | "description" => WidgetKind::Multiline,
            _ => WidgetKind::Text,
        },
    }
}

/// One column of the backend column listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// The column name
    pub column_name: String,

    /// The backend data type name
    pub data_type: String,

    /// `YES` or `NO`, information schema style
    pub is_nullable: String,
}

/// Descriptor for one field of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// The column name
    pub name: String,

    /// Value kind
    pub semantic: SemanticType,

    /// Whether the field must be present on writes
    pub required: bool,

    /// Editing widget
    pub widget: WidgetKind,
}

/// Descriptor for an entity: its name and field list, in column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// The entity (table) name
    pub entity: String,

    /// Field descriptors in column order
    pub fields: Vec<FieldDescriptor>,
}

impl EntitySchema {
    /// Build a schema from a backend column listing
    pub fn from_columns(entity: &str, columns: Vec<ColumnInfo>) -> Self {
        let pk = primary_key(entity);
        let fields = columns
            .into_iter()
            .map(|column| {
                let semantic = SemanticType::from_data_type(&column.data_type);
                let generated = column.column_name == pk || column.column_name == "created_at";
                FieldDescriptor {
                    widget: widget_for(entity, &column.column_name, semantic),
                    required: column.is_nullable.eq_ignore_ascii_case("NO") && !generated,
                    name: column.column_name,
                    semantic,
                }
            })
            .collect();

        Self {
            entity: entity.to_string(),
            fields,
        }
    }

    /// The primary key column of this entity
    pub fn primary_key(&self) -> &'static str {
        primary_key(&self.entity)
    }

    /// Find a field descriptor by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the fields a form should offer, editable ones only
    pub fn editable_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.widget != WidgetKind::ReadOnly)
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// Cache of resolved entity schemas, shared across views.
///
/// Resolution happens once per entity per run; afterwards every view
/// reads the same descriptor.
#[derive(Clone, Default)]
pub struct SchemaCache {
    inner: Arc<RwLock<HashMap<String, Arc<EntitySchema>>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached schema
    pub fn get(&self, entity: &str) -> Option<Arc<EntitySchema>> {
        let cache = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.get(entity).cloned()
    }

    /// Store a resolved schema and return the shared handle
    pub fn insert(&self, schema: EntitySchema) -> Arc<EntitySchema> {
        let shared = Arc::new(schema);
        let mut cache = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.insert(shared.entity.clone(), shared.clone());
        shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str, nullable: &str) -> ColumnInfo {
        ColumnInfo {
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: nullable.to_string(),
        }
    }

    #[test]
    fn data_types_map_to_semantics() {
        assert_eq!(SemanticType::from_data_type("bigint"), SemanticType::Integer);
        assert_eq!(SemanticType::from_data_type("numeric"), SemanticType::Float);
        assert_eq!(
            SemanticType::from_data_type("timestamp with time zone"),
            SemanticType::Timestamp
        );
        assert_eq!(
            SemanticType::from_data_type("character varying"),
            SemanticType::Text
        );
        assert_eq!(SemanticType::from_data_type("date"), SemanticType::Date);
    }

    #[test]
    fn widgets_follow_column_name_conventions() {
        assert_eq!(
            widget_for("students", "id", SemanticType::Integer),
            WidgetKind::ReadOnly
        );
        assert_eq!(
            widget_for("students", "center_id", SemanticType::Integer),
            WidgetKind::Lookup {
                entity: "centers".to_string()
            }
        );
        assert_eq!(
            widget_for("students", "dob", SemanticType::Date),
            WidgetKind::DatePicker
        );
        assert_eq!(
            widget_for("students", "photo_url", SemanticType::Text),
            WidgetKind::FileUpload
        );
        assert_eq!(
            widget_for("employees", "lor", SemanticType::Text),
            WidgetKind::FileUpload
        );
        assert_eq!(
            widget_for("students", "diagnosis", SemanticType::Text),
            WidgetKind::Multiline
        );
        assert_eq!(
            widget_for("students", "guardian_name", SemanticType::Text),
            WidgetKind::Text
        );
        match widget_for("students", "gender", SemanticType::Text) {
            WidgetKind::Dropdown { options } => {
                assert_eq!(options, vec!["Male", "Female", "Other"])
            }
            other => panic!("expected dropdown, got {:?}", other),
        }
    }

    #[test]
    fn staff_key_is_identity_not_reference() {
        assert_eq!(
            widget_for("employees", "employee_id", SemanticType::Integer),
            WidgetKind::ReadOnly
        );
        assert_eq!(
            widget_for("educators", "employee_id", SemanticType::Integer),
            WidgetKind::ReadOnly
        );
        // but on payroll rows it references the employee
        assert_eq!(
            widget_for("payroll", "employee_id", SemanticType::Integer),
            WidgetKind::Lookup {
                entity: "employees".to_string()
            }
        );
    }

    #[test]
    fn schemas_mark_generated_columns_optional() {
        let schema = EntitySchema::from_columns(
            "students",
            vec![
                column("id", "bigint", "NO"),
                column("name", "text", "NO"),
                column("dob", "date", "YES"),
                column("created_at", "timestamp with time zone", "NO"),
            ],
        );

        assert_eq!(schema.primary_key(), "id");
        assert!(!schema.field("id").unwrap().required);
        assert!(schema.field("name").unwrap().required);
        assert!(!schema.field("dob").unwrap().required);
        assert!(!schema.field("created_at").unwrap().required);
        assert_eq!(schema.editable_fields(), vec!["name", "dob"]);
    }

    #[test]
    fn cache_hands_out_shared_descriptors() {
        let cache = SchemaCache::new();
        assert!(cache.get("students").is_none());

        let schema =
            EntitySchema::from_columns("students", vec![column("id", "bigint", "NO")]);
        let stored = cache.insert(schema);
        let fetched = cache.get("students").unwrap();
        assert!(Arc::ptr_eq(&stored, &fetched));
    }
}
