//! Company settings normalization.
//!
//! The `companies` relation has drifted: several facts live under two column
//! names (an English canonical column and its older Spanish counterpart) and
//! sometimes a third copy inside the free-form `settings` map. Historical
//! readers still look at all three places, so the read path reconciles them
//! into one canonical [`Company`] and the write path echoes every canonical
//! value back into all three locations.
//!
//! The triple-write is a compatibility shim, isolated here on purpose: when
//! the legacy readers are gone, dropping two of the three write targets
//! touches only this module.
//!
//! Both functions are pure and total - no I/O, no failure. Missing facts
//! become empty strings.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use aduana_core::CompanyId;

use crate::models::{Company, CompanyPatch};

/// One canonical company field and where its historical copies live.
struct FieldSpec {
    /// Canonical top-level column.
    canonical: &'static str,
    /// Legacy top-level column.
    legacy: &'static str,
    /// Entry inside the nested `settings` map.
    settings_key: &'static str,
}

/// Field table, in canonical order. Precedence on read is
/// canonical column, then legacy column, then `settings` entry.
const FIELDS: [FieldSpec; 7] = [
    FieldSpec {
        canonical: "display_name",
        legacy: "nombre",
        settings_key: "display_name",
    },
    FieldSpec {
        canonical: "tax_id",
        legacy: "rfc",
        settings_key: "tax_id",
    },
    FieldSpec {
        canonical: "country",
        legacy: "pais",
        settings_key: "country",
    },
    FieldSpec {
        canonical: "address",
        legacy: "direccion",
        settings_key: "address",
    },
    FieldSpec {
        canonical: "phone",
        legacy: "telefono",
        settings_key: "phone",
    },
    FieldSpec {
        canonical: "website",
        legacy: "sitio_web",
        settings_key: "website",
    },
    FieldSpec {
        canonical: "logo_url",
        legacy: "logo",
        settings_key: "logo_url",
    },
];

/// Reduce a raw `companies` row to its canonical shape.
///
/// Total: any shape of input produces a `Company`, with empty strings and
/// an empty settings map where the row holds nothing usable.
#[must_use]
pub fn normalize(raw: &Value) -> Company {
    let settings = raw
        .get("settings")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let field = |spec: &FieldSpec| -> String {
        text_at(raw, spec.canonical)
            .or_else(|| text_at(raw, spec.legacy))
            .or_else(|| {
                settings
                    .get(spec.settings_key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or_default()
            .to_owned()
    };

    let [f_display_name, f_tax_id, f_country, f_address, f_phone, f_website, f_logo_url] =
        &FIELDS;

    Company {
        id: CompanyId::new(text_at(raw, "id").unwrap_or_default()),
        display_name: field(f_display_name),
        tax_id: field(f_tax_id),
        country: field(f_country),
        address: field(f_address),
        phone: field(f_phone),
        website: field(f_website),
        logo_url: field(f_logo_url),
        settings,
        created_at: timestamp_at(raw, "created_at"),
        updated_at: timestamp_at(raw, "updated_at"),
    }
}

/// Merge `patch` over `current` and produce the write record.
///
/// Every canonical field is asserted - patched or carried over - and
/// mirrored into the legacy column and the nested `settings` entry, so all
/// three historical read paths observe the update.
#[must_use]
pub fn prepare_write(current: &Company, patch: &CompanyPatch) -> Value {
    let merged = [
        patch.display_name.as_ref().unwrap_or(&current.display_name),
        patch.tax_id.as_ref().unwrap_or(&current.tax_id),
        patch.country.as_ref().unwrap_or(&current.country),
        patch.address.as_ref().unwrap_or(&current.address),
        patch.phone.as_ref().unwrap_or(&current.phone),
        patch.website.as_ref().unwrap_or(&current.website),
        patch.logo_url.as_ref().unwrap_or(&current.logo_url),
    ];

    let mut record = Map::new();
    let mut settings = current.settings.clone();

    for (spec, value) in FIELDS.iter().zip(merged) {
        record.insert(spec.canonical.to_owned(), json!(value));
        record.insert(spec.legacy.to_owned(), json!(value));
        settings.insert(spec.settings_key.to_owned(), json!(value));
    }

    record.insert("settings".to_owned(), Value::Object(settings));
    Value::Object(record)
}

/// Non-empty string at a top-level key.
fn text_at<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn timestamp_at(raw: &Value, key: &str) -> Option<DateTime<Utc>> {
    raw.get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_column_wins() {
        let raw = json!({
            "id": "co-1",
            "display_name": "Despachos del Norte",
            "nombre": "Nombre Viejo",
            "settings": { "display_name": "Nested Name" },
        });

        let company = normalize(&raw);
        assert_eq!(company.display_name, "Despachos del Norte");
    }

    #[test]
    fn test_legacy_column_fills_missing_canonical() {
        let raw = json!({
            "id": "co-1",
            "nombre": "Agencia Aduanal MX",
            "rfc": "AAM910101AAA",
            "pais": "MX",
        });

        let company = normalize(&raw);
        assert_eq!(company.display_name, "Agencia Aduanal MX");
        assert_eq!(company.tax_id, "AAM910101AAA");
        assert_eq!(company.country, "MX");
    }

    #[test]
    fn test_empty_canonical_falls_through_to_legacy() {
        let raw = json!({ "id": "co-1", "phone": "", "telefono": "+52 555 000 1111" });
        assert_eq!(normalize(&raw).phone, "+52 555 000 1111");
    }

    #[test]
    fn test_settings_entry_is_last_resort() {
        let raw = json!({
            "id": "co-1",
            "settings": { "website": "https://aduanal.example" },
        });
        assert_eq!(normalize(&raw).website, "https://aduanal.example");
    }

    #[test]
    fn test_total_on_garbage_input() {
        let company = normalize(&json!("not even an object"));
        assert_eq!(company.display_name, "");
        assert_eq!(company.settings.len(), 0);
        assert_eq!(company.created_at, None);

        let company = normalize(&json!({ "nombre": 42, "settings": [1, 2] }));
        assert_eq!(company.display_name, "");
        assert_eq!(company.settings.len(), 0);
    }

    #[test]
    fn test_timestamps_parsed_when_well_formed() {
        let raw = json!({
            "id": "co-1",
            "created_at": "2024-03-01T12:00:00Z",
            "updated_at": "definitely not a date",
        });

        let company = normalize(&raw);
        assert!(company.created_at.is_some());
        assert_eq!(company.updated_at, None);
    }

    #[test]
    fn test_prepare_write_mirrors_all_three_targets() {
        let current = normalize(&json!({ "id": "co-1", "nombre": "Old Name" }));
        assert_eq!(current.display_name, "Old Name");

        let patch = CompanyPatch {
            display_name: Some("New Name".into()),
            ..CompanyPatch::default()
        };
        let record = prepare_write(&current, &patch);

        assert_eq!(record["display_name"], "New Name");
        assert_eq!(record["nombre"], "New Name");
        assert_eq!(record["settings"]["display_name"], "New Name");
    }

    #[test]
    fn test_prepare_write_carries_unpatched_fields() {
        let current = normalize(&json!({
            "id": "co-1",
            "display_name": "Despachos del Norte",
            "rfc": "DDN850505BBB",
        }));

        let record = prepare_write(&current, &CompanyPatch::default());

        assert_eq!(record["display_name"], "Despachos del Norte");
        assert_eq!(record["nombre"], "Despachos del Norte");
        assert_eq!(record["tax_id"], "DDN850505BBB");
        assert_eq!(record["rfc"], "DDN850505BBB");
        assert_eq!(record["settings"]["tax_id"], "DDN850505BBB");
    }

    #[test]
    fn test_prepare_write_preserves_unrelated_settings() {
        let current = normalize(&json!({
            "id": "co-1",
            "settings": { "theme": "dark", "display_name": "X" },
        }));

        let record = prepare_write(&current, &CompanyPatch::default());
        assert_eq!(record["settings"]["theme"], "dark");
    }

    #[test]
    fn test_legacy_only_roundtrip() {
        // A record populating only the legacy name normalizes to the
        // canonical field, and a patch of that field lands in all three
        // write targets with the new value.
        let current = normalize(&json!({ "id": "co-1", "nombre": "Agencia Vieja" }));
        assert_eq!(current.display_name, "Agencia Vieja");

        let patch = CompanyPatch {
            display_name: Some("Agencia Nueva".into()),
            ..CompanyPatch::default()
        };
        let record = prepare_write(&current, &patch);

        assert_eq!(record["display_name"], record["nombre"]);
        assert_eq!(record["display_name"], record["settings"]["display_name"]);
        assert_eq!(record["display_name"], "Agencia Nueva");
    }
}
