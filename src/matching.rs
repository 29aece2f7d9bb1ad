use serde_json::Value;

use crate::filters::Condition;

/// String form of a scalar JSON value. Containers and `null` contribute no
/// token of their own.
fn scalar_token(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.to_lowercase()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Normalize a scalar or a list of scalars into lower-cased string tokens,
/// preserving element order. A bare scalar becomes a one-element list.
pub fn normalize_terms(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_token).collect(),
        other => scalar_token(other).into_iter().collect(),
    }
}

/// Collect every scalar leaf beneath `value`, descending through arrays and
/// object members. Inputs are tree-shaped JSON, so plain recursion is
/// bounded by input depth.
fn collect_leaf_terms(value: &Value, terms: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_leaf_terms(item, terms);
            }
        }
        Value::Object(members) => {
            for member in members.values() {
                collect_leaf_terms(member, terms);
            }
        }
        other => terms.extend(scalar_token(other)),
    }
}

fn leaf_terms(value: &Value) -> Vec<String> {
    let mut terms = Vec::new();
    collect_leaf_terms(value, &mut terms);
    terms
}

/// Match an arbitrary data value (scalar, list, or nested record) against a
/// filter value. The data value is flattened to its scalar leaves first;
/// containers never take part through their own string form.
///
/// With `required = false` the match passes when any filter token appears
/// inside any leaf token (case-insensitive substring). With
/// `required = true` every filter token must exactly equal some leaf token.
pub fn match_value(filter_value: &Value, data_value: &Value, required: bool) -> bool {
    let filter_terms = normalize_terms(filter_value);
    let data_terms = leaf_terms(data_value);

    if required {
        filter_terms
            .iter()
            .all(|wanted| data_terms.iter().any(|have| have == wanted))
    } else {
        filter_terms
            .iter()
            .any(|wanted| data_terms.iter().any(|have| have.contains(wanted.as_str())))
    }
}

/// Evaluate a condition against a data value. Plain conditions use
/// substring semantics; rule conditions AND together their present members:
/// `require` exact, `include` substring, `exclude` negated substring.
pub fn match_condition(condition: &Condition, data_value: &Value) -> bool {
    match condition {
        Condition::Plain(value) => match_value(value, data_value, false),
        Condition::Rule(rule) => {
            if let Some(require) = &rule.require
                && !match_value(require, data_value, true)
            {
                return false;
            }
            if let Some(include) = &rule.include
                && !match_value(include, data_value, false)
            {
                return false;
            }
            if let Some(exclude) = &rule.exclude
                && match_value(exclude, data_value, false)
            {
                return false;
            }
            true
        }
    }
}

/// Evaluate a condition against a keyword record list (each record exposing
/// a `name`). Only the names take part in matching. An empty list has
/// nothing to find, so plain, `require` and `include` conditions fail while
/// an `exclude` passes vacuously.
pub fn match_keywords(keywords: &Value, condition: &Condition) -> bool {
    let names: Vec<Value> = keywords
        .as_array()
        .map(|records| {
            records
                .iter()
                .filter_map(|record| record.get("name").cloned())
                .collect()
        })
        .unwrap_or_default();

    match_condition(condition, &Value::Array(names))
}

/// Evaluate a condition against a `{results: [{rating}]}` container. A
/// missing container or an empty result list never matches, `exclude`
/// conditions included.
pub fn match_content_ratings(ratings: Option<&Value>, condition: &Condition) -> bool {
    let Some(results) = ratings
        .and_then(|container| container.get("results"))
        .and_then(Value::as_array)
    else {
        return false;
    };

    if results.is_empty() {
        return false;
    }

    let extracted: Vec<Value> = results
        .iter()
        .filter_map(|record| record.get("rating").cloned())
        .collect();

    match_condition(condition, &Value::Array(extracted))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn condition(value: Value) -> Condition {
        serde_json::from_value(value).expect("condition should deserialise")
    }

    #[test]
    fn substring_mode_matches_inside_leaf_token() {
        assert!(match_value(&json!("act"), &json!("Action"), false));
        assert!(!match_value(&json!("act"), &json!("Action"), true));
    }

    #[test]
    fn exact_mode_requires_every_filter_token() {
        let data = json!(["Action", "Adventure"]);
        assert!(match_value(&json!(["action", "adventure"]), &data, true));
        assert!(!match_value(&json!(["action", "horror"]), &data, true));
    }

    #[test]
    fn matching_descends_into_nested_records() {
        let data = json!([
            { "id": 18, "name": "Drama" },
            { "id": 80, "name": "Crime" },
        ]);
        assert!(match_value(&json!("crime"), &data, false));
        assert!(match_value(&json!("drama"), &data, true));
        assert!(!match_value(&json!("thriller"), &data, false));
    }

    #[test]
    fn containers_contribute_only_their_descendants() {
        let data = json!({ "outer": { "inner": ["Leaf"] } });
        assert_eq!(leaf_terms(&data), vec!["leaf"]);
    }

    #[test]
    fn numbers_and_booleans_match_by_string_form() {
        assert!(match_value(&json!(2024), &json!([2024, 2025]), true));
        assert!(match_value(&json!(true), &json!({ "adult": true }), false));
    }

    #[test]
    fn normalization_is_idempotent() {
        let raw = json!(["Action", "Sci-Fi", 42, true]);
        let once = normalize_terms(&raw);
        let wrapped = Value::Array(once.iter().cloned().map(Value::String).collect());
        assert_eq!(normalize_terms(&wrapped), once);
    }

    #[test]
    fn exact_match_implies_substring_match() {
        let pairs = [
            (json!("drama"), json!(["Drama"])),
            (json!(["crime", "drama"]), json!(["Crime", "Drama", "Thriller"])),
            (json!(7), json!([7, 8])),
        ];
        for (filter, data) in pairs {
            if match_value(&filter, &data, true) {
                assert!(
                    match_value(&filter, &data, false),
                    "exact match without substring match for {filter}"
                );
            }
        }
    }

    #[test]
    fn rule_members_combine_with_and() {
        let data = json!(["drama", "crime"]);
        assert!(match_condition(
            &condition(json!({ "require": "drama", "exclude": "war" })),
            &data
        ));
        assert!(!match_condition(
            &condition(json!({ "require": "drama", "exclude": "crime" })),
            &data
        ));
        assert!(!match_condition(
            &condition(json!({ "require": "war", "exclude": "romance" })),
            &data
        ));
    }

    #[test]
    fn keyword_require_include_and_exclude() {
        let keywords = json!([{ "name": "epic" }, { "name": "gladiator" }]);
        assert!(!match_keywords(
            &keywords,
            &condition(json!({ "require": ["epic", "horror"] }))
        ));
        assert!(match_keywords(
            &keywords,
            &condition(json!({ "require": ["epic", "gladiator"] }))
        ));
        assert!(!match_keywords(&keywords, &condition(json!({ "exclude": "epic" }))));
        assert!(match_keywords(&keywords, &condition(json!({ "exclude": "horror" }))));
        assert!(match_keywords(&keywords, &condition(json!("glad"))));
    }

    #[test]
    fn keyword_matching_ignores_record_ids() {
        let keywords = json!([{ "id": 4344, "name": "musical" }]);
        assert!(!match_keywords(&keywords, &condition(json!("4344"))));
        assert!(match_keywords(&keywords, &condition(json!("musical"))));
    }

    #[test]
    fn empty_keyword_list_only_passes_exclude() {
        let keywords = json!([]);
        assert!(!match_keywords(&keywords, &condition(json!("epic"))));
        assert!(!match_keywords(&keywords, &condition(json!({ "require": "epic" }))));
        assert!(!match_keywords(&keywords, &condition(json!({ "include": "epic" }))));
        assert!(match_keywords(&keywords, &condition(json!({ "exclude": "epic" }))));
    }

    #[test]
    fn exclude_negates_include_on_populated_lists() {
        let keywords = json!([{ "name": "space opera" }]);
        for needle in ["space", "opera", "heist"] {
            let included = match_keywords(&keywords, &condition(json!({ "include": needle })));
            let excluded = match_keywords(&keywords, &condition(json!({ "exclude": needle })));
            assert_ne!(included, excluded, "include/exclude should disagree for {needle}");
        }
    }

    #[test]
    fn rating_container_matches_case_insensitively() {
        let ratings = json!({ "results": [{ "iso_3166_1": "US", "rating": "TV-14" }] });
        assert!(match_content_ratings(Some(&ratings), &condition(json!("tv-14"))));
        assert!(!match_content_ratings(Some(&ratings), &condition(json!("tv-ma"))));
        assert!(match_content_ratings(
            Some(&ratings),
            &condition(json!({ "exclude": "tv-ma" }))
        ));
    }

    #[test]
    fn missing_rating_container_never_matches() {
        assert!(!match_content_ratings(None, &condition(json!("tv-14"))));
        assert!(!match_content_ratings(
            Some(&Value::Null),
            &condition(json!({ "exclude": "tv-ma" }))
        ));
        let empty = json!({ "results": [] });
        assert!(!match_content_ratings(
            Some(&empty),
            &condition(json!({ "exclude": "tv-ma" }))
        ));
    }
}
