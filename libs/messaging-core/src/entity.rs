//! Per-entity metadata: logical name, event-key field, and the four derived
//! CRUD/notify shape validators (§3, §4.B).
//!
//! The source mutated pydantic classes at registration time to grow four
//! sibling model types. Rust has no runtime class surgery, so a descriptor
//! built once at startup stands in for the four generated types; the shapes
//! are validated against a `serde_json::Value` object instead of being
//! materialized as four distinct Rust structs, since the entities
//! themselves are arbitrary host-application payloads.

use crate::error::ModelError;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Update,
    Delete,
    Read,
    Notify,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
            EventKind::Read => "read",
            EventKind::Notify => "notify",
        }
    }

    pub const ALL: [EventKind; 5] = [
        EventKind::Create,
        EventKind::Update,
        EventKind::Delete,
        EventKind::Read,
        EventKind::Notify,
    ];
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub event_key: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), event_key: false }
    }

    pub fn event_key(name: impl Into<String>) -> Self {
        Self { name: name.into(), event_key: true }
    }
}

/// Per-entity registration: logical name plus the field set, with exactly
/// one field marked as the event key.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub logical_name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    pub fn new(logical_name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Result<Self, ModelError> {
        let key_count = fields.iter().filter(|f| f.event_key).count();
        if key_count != 1 {
            return Err(ModelError::KeyFieldCount(key_count));
        }
        Ok(Self { logical_name: logical_name.into(), fields })
    }

    pub fn event_key_field(&self) -> &str {
        &self
            .fields
            .iter()
            .find(|f| f.event_key)
            .expect("constructor enforces exactly one event-key field")
            .name
    }

    fn non_key_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.event_key)
    }

    fn require_object(payload: &Value) -> Result<&serde_json::Map<String, Value>, ModelError> {
        payload.as_object().ok_or(ModelError::NotAnObject)
    }

    /// Create: all non-key fields required, key optional.
    pub fn validate_create(&self, payload: &Value) -> Result<(), ModelError> {
        let obj = Self::require_object(payload)?;
        for field in self.non_key_fields() {
            if !obj.contains_key(&field.name) {
                return Err(ModelError::MissingField(field.name.clone()));
            }
        }
        Ok(())
    }

    /// Update: key required, all other fields optional (absent/null means no change).
    pub fn validate_update(&self, payload: &Value) -> Result<(), ModelError> {
        let obj = Self::require_object(payload)?;
        let key = self.event_key_field();
        if !obj.contains_key(key) {
            return Err(ModelError::MissingField(key.to_string()));
        }
        Ok(())
    }

    /// Delete shares Update's shape.
    pub fn validate_delete(&self, payload: &Value) -> Result<(), ModelError> {
        self.validate_update(payload)
    }

    /// Read: same shape as the base entity — every field required.
    pub fn validate_read(&self, payload: &Value) -> Result<(), ModelError> {
        let obj = Self::require_object(payload)?;
        for field in &self.fields {
            if !obj.contains_key(&field.name) {
                return Err(ModelError::MissingField(field.name.clone()));
            }
        }
        Ok(())
    }

    pub fn validate(&self, kind: EventKind, payload: &Value) -> Result<(), ModelError> {
        match kind {
            EventKind::Create => self.validate_create(payload),
            EventKind::Update => self.validate_update(payload),
            EventKind::Delete => self.validate_delete(payload),
            EventKind::Read => self.validate_read(payload),
            // notify payloads are opaque user results, not CRUD shapes.
            EventKind::Notify => Ok(()),
        }
    }
}

/// Implements the snake_case rule from `get_event_name_wrapper`: insert `_`
/// before an uppercase letter that follows a lowercase letter or digit, then
/// lowercase the whole string.
pub fn logical_name_from_type_name(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len() + 4);
    let chars: Vec<char> = type_name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            if prev.is_lowercase() || prev.is_ascii_digit() {
                out.push('_');
            }
        }
        out.push(c);
    }
    out.to_lowercase()
}

/// Resolves an entity's logical name: the override if given, else the
/// snake_case of its (unqualified) Rust type name.
pub fn logical_name<T>(override_name: Option<&str>) -> String {
    if let Some(name) = override_name {
        return name.to_string();
    }
    let full = std::any::type_name::<T>();
    let short = full.rsplit("::").next().unwrap_or(full);
    logical_name_from_type_name(short)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct UserAccount;

    #[test]
    fn snake_case_naming_scenario_1() {
        assert_eq!(logical_name::<UserAccount>(None), "user_account");
        assert_eq!(logical_name::<UserAccount>(Some("custom")), "custom");
    }

    #[test]
    fn logical_name_handles_digits() {
        assert_eq!(logical_name_from_type_name("Oauth2Token"), "oauth2_token");
    }

    #[test]
    fn descriptor_requires_exactly_one_key_field() {
        let no_key = EntityDescriptor::new("user", vec![FieldDescriptor::new("username")]);
        assert!(matches!(no_key, Err(ModelError::KeyFieldCount(0))));

        let two_keys = EntityDescriptor::new(
            "user",
            vec![FieldDescriptor::event_key("id"), FieldDescriptor::event_key("alt_id")],
        );
        assert!(matches!(two_keys, Err(ModelError::KeyFieldCount(2))));

        let ok = EntityDescriptor::new(
            "user",
            vec![FieldDescriptor::event_key("user_id"), FieldDescriptor::new("username")],
        );
        assert!(ok.is_ok());
    }

    fn user_descriptor() -> EntityDescriptor {
        EntityDescriptor::new(
            "user",
            vec![
                FieldDescriptor::event_key("user_id"),
                FieldDescriptor::new("username"),
                FieldDescriptor::new("email"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn create_requires_all_non_key_fields_key_optional() {
        let desc = user_descriptor();
        assert!(desc.validate_create(&json!({"username": "a", "email": "a@b.c"})).is_ok());
        assert!(desc.validate_create(&json!({"username": "a"})).is_err());
    }

    #[test]
    fn update_requires_only_key() {
        let desc = user_descriptor();
        assert!(desc.validate_update(&json!({"user_id": 7})).is_ok());
        assert!(desc.validate_update(&json!({"username": "a"})).is_err());
    }

    #[test]
    fn delete_shares_update_shape() {
        let desc = user_descriptor();
        assert!(desc.validate_delete(&json!({"user_id": 7})).is_ok());
    }

    #[test]
    fn read_requires_every_field() {
        let desc = user_descriptor();
        assert!(desc.validate_read(&json!({"user_id": 7, "username": "a", "email": "a@b.c"})).is_ok());
        assert!(desc.validate_read(&json!({"user_id": 7})).is_err());
    }

    #[test]
    fn non_object_payload_is_a_model_error() {
        let desc = user_descriptor();
        assert!(matches!(desc.validate_create(&json!([1, 2, 3])), Err(ModelError::NotAnObject)));
    }
}
