//! Organisation relationships parsed from Defra ID claims.
//!
//! Defra ID encodes each user/organisation association as a colon-delimited
//! string, `relationshipId:organisationId:organisationName`, with the name
//! optional. The claims also carry a `currentRelationshipId` naming which
//! association the user is acting under.

use serde::{Deserialize, Serialize};

/// A single association between the user and an organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Relationship identifier, unique per association.
    pub id: String,
    /// Defra ID organisation identifier.
    pub organisation_id: String,
    /// Organisation display name, trimmed; absent when the claim omits it.
    pub organisation_name: Option<String>,
    /// Whether this is the relationship the user currently acts under.
    pub is_current: bool,
}

impl Relationship {
    /// Parses one raw relationship string.
    ///
    /// Returns `None` when the string has fewer than two colon-delimited
    /// segments. Segments past the third are ignored. The organisation name
    /// is trimmed, and an empty name is treated as absent.
    #[must_use]
    pub fn parse(raw: &str, current_relationship_id: Option<&str>) -> Option<Self> {
        let mut segments = raw.split(':');
        let id = segments.next()?.to_string();
        let organisation_id = segments.next()?.to_string();
        let organisation_name = segments
            .next()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let is_current = current_relationship_id == Some(id.as_str());

        Some(Self {
            id,
            organisation_id,
            organisation_name,
            is_current,
        })
    }
}

/// Parses every raw relationship string, skipping malformed entries.
#[must_use]
pub fn parse_relationships(
    raw: &[String],
    current_relationship_id: Option<&str>,
) -> Vec<Relationship> {
    raw.iter()
        .filter_map(|entry| {
            let parsed = Relationship::parse(entry, current_relationship_id);
            if parsed.is_none() {
                tracing::warn!(entry = %entry, "Skipping malformed relationship string");
            }
            parsed
        })
        .collect()
}

/// Returns the relationship the user currently acts under.
///
/// When the source data marks none or several entries current, this is the
/// first match or `None`; ambiguity is not resolved further.
#[must_use]
pub fn current_relationship(relationships: &[Relationship]) -> Option<&Relationship> {
    relationships.iter().find(|relationship| relationship.is_current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_segment_string() {
        let relationship =
            Relationship::parse("rel-1:org-1:Acme Ltd", Some("rel-1")).expect("parse");

        assert_eq!(relationship.id, "rel-1");
        assert_eq!(relationship.organisation_id, "org-1");
        assert_eq!(relationship.organisation_name.as_deref(), Some("Acme Ltd"));
        assert!(relationship.is_current);
    }

    #[test]
    fn trims_organisation_name() {
        let relationship =
            Relationship::parse("rel-1:org-1:  Acme Ltd  ", None).expect("parse");

        assert_eq!(relationship.organisation_name.as_deref(), Some("Acme Ltd"));
    }

    #[test]
    fn absent_third_segment_means_no_name() {
        let relationship = Relationship::parse("rel-1:org-1", None).expect("parse");

        assert_eq!(relationship.organisation_name, None);
    }

    #[test]
    fn empty_third_segment_means_no_name() {
        let relationship = Relationship::parse("rel-1:org-1:  ", None).expect("parse");

        assert_eq!(relationship.organisation_name, None);
    }

    #[test]
    fn segments_past_the_third_are_ignored() {
        let relationship =
            Relationship::parse("rel-1:org-1:Acme Ltd:extra", None).expect("parse");

        assert_eq!(relationship.organisation_name.as_deref(), Some("Acme Ltd"));
    }

    #[test]
    fn not_current_when_ids_differ() {
        let relationship =
            Relationship::parse("rel-1:org-1:Acme Ltd", Some("rel-2")).expect("parse");

        assert!(!relationship.is_current);
    }

    #[test]
    fn not_current_when_no_current_id() {
        let relationship = Relationship::parse("rel-1:org-1:Acme Ltd", None).expect("parse");

        assert!(!relationship.is_current);
    }

    #[test]
    fn single_segment_string_is_malformed() {
        assert!(Relationship::parse("rel-1", None).is_none());
    }

    #[test]
    fn parse_relationships_skips_malformed_entries() {
        let raw = vec![
            "rel-1:org-1:Acme Ltd".to_string(),
            "malformed".to_string(),
            "rel-2:org-2".to_string(),
        ];

        let relationships = parse_relationships(&raw, Some("rel-2"));

        assert_eq!(relationships.len(), 2);
        assert_eq!(relationships[0].id, "rel-1");
        assert!(!relationships[0].is_current);
        assert_eq!(relationships[1].id, "rel-2");
        assert!(relationships[1].is_current);
    }

    #[test]
    fn current_relationship_is_first_match() {
        let relationships = parse_relationships(
            &[
                "rel-1:org-1:Acme Ltd".to_string(),
                "rel-2:org-2:Globex".to_string(),
            ],
            Some("rel-2"),
        );

        let current = current_relationship(&relationships).expect("current");
        assert_eq!(current.id, "rel-2");
        assert_eq!(current.organisation_name.as_deref(), Some("Globex"));
    }

    #[test]
    fn current_relationship_is_none_without_match() {
        let relationships = parse_relationships(
            &[
                "rel-1:org-1:Acme Ltd".to_string(),
                "rel-2:org-2:Globex".to_string(),
            ],
            Some("rel-9"),
        );

        assert!(current_relationship(&relationships).is_none());
    }
}
