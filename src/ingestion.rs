use crate::schema::Record;
use log::warn;
use serde_json::Value;
use std::collections::HashSet;

pub const SURVEY_ASSET_TYPE: &str = "survey";

fn string_field(asset: &Value, key: &str) -> Option<String> {
    asset.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Kobo stores countries as a list of `{label, value}` options. Older assets
/// carry a single object instead of a list.
fn country_label(settings: Option<&Value>) -> Option<String> {
    let country = settings?.get("country")?;
    match country {
        Value::Array(options) => Some(
            options
                .iter()
                .filter_map(|option| option.get("value").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => country
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(label) => Some(label.clone()),
        _ => None,
    }
}

fn sector_label(settings: Option<&Value>) -> Option<String> {
    let sector = settings?.get("sector")?;
    match sector {
        Value::Object(_) => sector
            .get("label")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::String(label) => Some(label.clone()),
        _ => None,
    }
}

/// Flattens one asset of the project-view listing into a [`Record`].
///
/// Never fails: missing or mistyped fields become `None`, and a submission
/// count that is negative or fractional is treated as absent.
pub fn record_from_asset(asset: &Value) -> Record {
    let settings = asset.get("settings");

    Record {
        id: string_field(asset, "uid").unwrap_or_default(),
        name: string_field(asset, "name"),
        owner: string_field(asset, "owner__username"),
        deployment_timestamp: string_field(asset, "date_deployed"),
        submission_count: asset
            .get("deployment__submission_count")
            .and_then(Value::as_u64),
        country: country_label(settings),
        sector: sector_label(settings),
    }
}

pub fn is_survey(asset: &Value) -> bool {
    asset.get("asset_type").and_then(Value::as_str) == Some(SURVEY_ASSET_TYPE)
}

/// Converts the survey assets of a list, skipping templates, blocks and questions.
pub fn records_from_assets(assets: &[Value]) -> Vec<Record> {
    assets
        .iter()
        .filter(|asset| is_survey(asset))
        .map(record_from_asset)
        .collect()
}

/// Converts the `results` of one page of the paginated listing.
pub fn records_from_page(page: &Value) -> Vec<Record> {
    page.get("results")
        .and_then(Value::as_array)
        .map(|assets| records_from_assets(assets))
        .unwrap_or_default()
}

/// URL of the following page, if any.
pub fn next_page_url(page: &Value) -> Option<String> {
    page.get("next")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

/// Like [`next_page_url`], but returns `None` once the server points back at
/// a page already fetched. `visited` must hold every URL requested so far.
pub fn unvisited_next_page(page: &Value, visited: &HashSet<String>) -> Option<String> {
    let next = next_page_url(page)?;
    if visited.contains(&next) {
        warn!("Pagination loops back to {}, stopping", next);
        return None;
    }
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_asset_is_flattened() {
        let asset = json!({
            "uid": "aBc123",
            "name": "Household survey",
            "asset_type": "survey",
            "date_deployed": "2025-04-15T10:20:30.123456Z",
            "owner__username": "alice",
            "deployment__submission_count": 42,
            "settings": {
                "country": [
                    {"label": "Kenya", "value": "KEN"},
                    {"label": "Uganda", "value": "UGA"}
                ],
                "sector": {"label": "Health", "value": "health"}
            }
        });

        let record = record_from_asset(&asset);
        assert_eq!(record.id, "aBc123");
        assert_eq!(record.owner.as_deref(), Some("alice"));
        assert_eq!(record.submission_count, Some(42));
        assert_eq!(record.country.as_deref(), Some("KEN, UGA"));
        assert_eq!(record.sector.as_deref(), Some("Health"));
        assert_eq!(
            record.deployment_timestamp.as_deref(),
            Some("2025-04-15T10:20:30.123456Z")
        );
    }

    #[test]
    fn test_missing_fields_become_none() {
        let asset = json!({
            "uid": "x",
            "asset_type": "survey",
            "date_deployed": null,
            "deployment__submission_count": null,
            "settings": {"country": []}
        });

        let record = record_from_asset(&asset);
        assert_eq!(record.deployment_timestamp, None);
        assert_eq!(record.submission_count, None);
        assert_eq!(record.owner, None);
        assert_eq!(record.country.as_deref(), Some(""));
    }

    #[test]
    fn test_odd_submission_counts_are_absent() {
        let negative = record_from_asset(&json!({"uid": "n", "deployment__submission_count": -3}));
        let fractional = record_from_asset(&json!({"uid": "f", "deployment__submission_count": 2.5}));
        let text = record_from_asset(&json!({"uid": "t", "deployment__submission_count": "7"}));
        assert_eq!(negative.submission_count, None);
        assert_eq!(fractional.submission_count, None);
        assert_eq!(text.submission_count, None);
    }

    #[test]
    fn test_legacy_country_object() {
        let asset = json!({
            "uid": "old",
            "settings": {"country": {"label": "Kenya", "value": "KEN"}}
        });
        assert_eq!(record_from_asset(&asset).country.as_deref(), Some("KEN"));
        assert_eq!(record_from_asset(&json!({"uid": "bare"})).country, None);
    }

    #[test]
    fn test_page_keeps_only_surveys() {
        let page = json!({
            "next": "https://kf.example.org/api/v2/project-views/pv1/assets/?page=2",
            "results": [
                {"uid": "s1", "asset_type": "survey"},
                {"uid": "t1", "asset_type": "template"},
                {"uid": "b1", "asset_type": "block"},
                {"uid": "s2", "asset_type": "survey"}
            ]
        });

        let ids: Vec<String> = records_from_page(&page).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert!(next_page_url(&page).is_some());
        assert_eq!(next_page_url(&json!({"next": null})), None);
    }

    #[test]
    fn test_repeated_next_link_ends_pagination() {
        let first = "https://kf.example.org/api/v2/assets/?page=1";
        let second = "https://kf.example.org/api/v2/assets/?page=2";
        let mut visited = HashSet::from([first.to_string()]);

        let page = json!({"next": second, "results": []});
        assert_eq!(
            unvisited_next_page(&page, &visited).as_deref(),
            Some(second)
        );
        visited.insert(second.to_string());

        assert_eq!(unvisited_next_page(&page, &visited), None);
        let back = json!({"next": first, "results": []});
        assert_eq!(unvisited_next_page(&back, &visited), None);
    }
}
