//! Mapping between [`KeyRecord`] and its table row
//!
//! | Property     | Encoding              |
//! |--------------|-----------------------|
//! | `WrappedKey` | standard base64       |
//! | `WrappedIv`  | standard base64       |
//! | `CreatedAt`  | RFC 3339, UTC         |
//! | `Scope`      | hyphenated UUID, or absent for the global scope |

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use keystore_domain::constants::{PROP_CREATED_AT, PROP_SCOPE, PROP_WRAPPED_IV, PROP_WRAPPED_KEY};
use keystore_domain::KeyRecord;
use uuid::Uuid;

use super::ports::{TableEntity, TableError};

impl From<&KeyRecord> for TableEntity {
    fn from(record: &KeyRecord) -> Self {
        let mut entity = TableEntity::new(&record.partition_key, &record.row_key)
            .with_property(PROP_WRAPPED_KEY, BASE64.encode(&record.wrapped_key))
            .with_property(PROP_WRAPPED_IV, BASE64.encode(&record.wrapped_iv))
            .with_property(
                PROP_CREATED_AT,
                record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            );

        if let Some(id) = record.scope {
            entity = entity.with_property(PROP_SCOPE, id.hyphenated().to_string());
        }
        entity.etag.clone_from(&record.etag);
        entity
    }
}

impl TryFrom<TableEntity> for KeyRecord {
    type Error = TableError;

    fn try_from(entity: TableEntity) -> Result<Self, Self::Error> {
        let wrapped_key = decode_binary(&entity, PROP_WRAPPED_KEY)?;
        let wrapped_iv = decode_binary(&entity, PROP_WRAPPED_IV)?;

        let created_at = required(&entity, PROP_CREATED_AT)?;
        let created_at = DateTime::parse_from_rfc3339(created_at)
            .map_err(|e| TableError::Serialization(format!("{PROP_CREATED_AT}: {e}")))?
            .with_timezone(&Utc);

        let scope = entity
            .string_property(PROP_SCOPE)
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| TableError::Serialization(format!("{PROP_SCOPE}: {e}")))?;

        Ok(Self {
            partition_key: entity.partition_key,
            row_key: entity.row_key,
            scope,
            wrapped_key,
            wrapped_iv,
            created_at,
            etag: entity.etag,
        })
    }
}

fn required<'a>(entity: &'a TableEntity, name: &str) -> Result<&'a str, TableError> {
    entity
        .string_property(name)
        .ok_or_else(|| TableError::Serialization(format!("missing string property {name}")))
}

fn decode_binary(entity: &TableEntity, name: &str) -> Result<Vec<u8>, TableError> {
    BASE64
        .decode(required(entity, name)?)
        .map_err(|e| TableError::Serialization(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::entity.
    use keystore_domain::Scope;
    use serde_json::json;

    use super::*;

    fn sample(scope: Scope) -> KeyRecord {
        let created_at = DateTime::parse_from_rfc3339("2024-05-01T12:30:00.123456Z").unwrap().with_timezone(&Utc);
        KeyRecord::new(scope, vec![1, 2, 3], vec![4, 5], created_at)
    }

    #[test]
    fn test_entity_layout_for_principal() {
        let id = Uuid::parse_str("6f1c2b4a-8d3e-4f5a-9b7c-0d1e2f3a4b5c").unwrap();
        let entity = TableEntity::from(&sample(Scope::principal(id)));

        assert_eq!(entity.partition_key, "SymmetricKey");
        assert_eq!(entity.row_key, "6f1c2b4a8d3e4f5a9b7c0d1e2f3a4b5c");
        assert_eq!(entity.properties["WrappedKey"], json!("AQID"));
        assert_eq!(entity.properties["WrappedIv"], json!("BAU="));
        assert_eq!(entity.properties["CreatedAt"], json!("2024-05-01T12:30:00.123456Z"));
        assert_eq!(entity.properties["Scope"], json!("6f1c2b4a-8d3e-4f5a-9b7c-0d1e2f3a4b5c"));
    }

    #[test]
    fn test_global_entity_has_no_scope_property() {
        let entity = TableEntity::from(&sample(Scope::Global));
        assert!(!entity.properties.contains_key("Scope"));
        assert_eq!(entity.row_key, "0".repeat(32));
    }

    /// Validates that store-assigned etags survive decoding.
    #[test]
    fn test_decode_keeps_etag() {
        let record = sample(Scope::principal(Uuid::new_v4()));
        let mut entity = TableEntity::from(&record);
        entity.etag = Some("W/\"3\"".into());

        let decoded = KeyRecord::try_from(entity).unwrap();
        assert_eq!(decoded.etag.as_deref(), Some("W/\"3\""));
        assert_eq!(decoded.scope, record.scope);
        assert_eq!(decoded.wrapped_key, record.wrapped_key);
        assert_eq!(decoded.created_at, record.created_at);
    }

    #[test]
    fn test_decode_rejects_corrupt_rows() {
        let base = TableEntity::from(&sample(Scope::Global));

        let mut missing = base.clone();
        missing.properties.remove("WrappedIv");
        assert!(matches!(KeyRecord::try_from(missing), Err(TableError::Serialization(_))));

        let bad_b64 = base.clone().with_property("WrappedKey", "not base64!");
        assert!(matches!(KeyRecord::try_from(bad_b64), Err(TableError::Serialization(_))));

        let bad_date = base.clone().with_property("CreatedAt", "yesterday");
        assert!(matches!(KeyRecord::try_from(bad_date), Err(TableError::Serialization(_))));

        let bad_scope = base.with_property("Scope", "not-a-uuid");
        assert!(matches!(KeyRecord::try_from(bad_scope), Err(TableError::Serialization(_))));
    }
}
