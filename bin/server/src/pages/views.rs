//! Server-rendered page fragments.
//!
//! Pages are plain HTML strings: this service is a thin frontend over the
//! backend API and the provider journeys, so a template engine would carry
//! more weight than the markup it renders. Everything user- or
//! backend-sourced goes through [`escape`].

use axum::response::Html;
use epr_frontend_defra_id::SessionContext;

use crate::auth::fetch::{LinkOrganisationsPrompt, LinkingPresentation};

/// A registration listed on the organisation page.
pub struct RegistrationRow {
    pub id: String,
    pub material: String,
    pub status: String,
}

/// The registration detail page's content.
pub struct RegistrationDetails {
    pub material: Option<String>,
    pub status: Option<String>,
    pub accreditation_status: Option<String>,
}

/// Escapes text for interpolation into HTML.
pub(crate) fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Uppercases the first character and lowercases the rest.
pub(crate) fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n<main>\n{body}</main>\n</body>\n</html>\n",
        title = escape(title),
    ))
}

/// The home page, for signed-in and signed-out users alike.
#[must_use]
pub fn home_page(context: Option<&SessionContext>) -> Html<String> {
    let body = match context {
        Some(context) => {
            let mut body = format!(
                "<h1>Home</h1>\n<p>Signed in as {}</p>\n",
                escape(&context.user.name)
            );
            if let Some(current) = &context.current_relationship {
                let name = current.organisation_name.as_deref().unwrap_or("data missing");
                body.push_str(&format!(
                    "<p>Current organisation: {}</p>\n",
                    escape(name)
                ));
            }
            if !context.relationships.is_empty() {
                body.push_str("<ul>\n");
                for relationship in &context.relationships {
                    let name = relationship
                        .organisation_name
                        .as_deref()
                        .unwrap_or("data missing");
                    body.push_str(&format!("<li>{}</li>\n", escape(name)));
                }
                body.push_str("</ul>\n");
            }
            body.push_str("<p><a href=\"/logout\">Sign out</a></p>\n");
            body
        }
        None => "<h1>Home</h1>\n<p><a href=\"/login\">Sign in</a></p>\n".to_string(),
    };

    layout("Home", &body)
}

/// The link-organisations detour page.
#[must_use]
pub fn link_organisations_page(prompt: &LinkOrganisationsPrompt) -> Html<String> {
    let mut body = String::from("<h1>Link Organisation</h1>\n");

    if let Some(org_name) = &prompt.defra_id_org_name {
        body.push_str(&format!(
            "<p>You are acting for {} ({})</p>\n",
            escape(org_name),
            prompt.entity_name,
        ));
    }

    match &prompt.presentation {
        LinkingPresentation::UnlinkedTable { rows } => {
            body.push_str(
                "<table>\n<thead><tr><th>Name</th><th>Org ID</th><th>ID</th><th></th></tr></thead>\n<tbody>\n",
            );
            for row in rows {
                body.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td>\
                     <td><a href=\"{}\">Link</a></td></tr>\n",
                    escape(row.name.as_deref().unwrap_or("data missing")),
                    escape(row.org_id.as_deref().unwrap_or("data missing")),
                    escape(&row.id),
                    escape(&row.link_href),
                ));
            }
            body.push_str("</tbody>\n</table>\n");
        }
        LinkingPresentation::SingleOrganisation { organisation } => {
            body.push_str(&format!(
                "<p>{} ({})</p>\n\
                 <p><a href=\"{}\">Link</a></p>\n\
                 <p><a href=\"{}\">Add another organisation</a></p>\n",
                escape(organisation.name.as_deref().unwrap_or_default()),
                escape(organisation.org_id.as_deref().unwrap_or_default()),
                escape(&organisation.link_href),
                escape(&organisation.add_href),
            ));
        }
    }

    if !prompt.other_relationships.is_empty() {
        body.push_str("<h2>Your other organisations</h2>\n<table>\n<tbody>\n");
        for relationship in &prompt.other_relationships {
            body.push_str(&format!(
                "<tr><td>{}</td><td><a href=\"{}\">Switch</a></td></tr>\n",
                escape(relationship.organisation_name.as_deref().unwrap_or_default()),
                escape(&relationship.switch_href),
            ));
        }
        body.push_str("</tbody>\n</table>\n");
    }

    layout("Link Organisation", &body)
}

/// An organisation's registrations, one link per registration.
#[must_use]
pub fn organisation_page(
    name: &str,
    organisation_id: &str,
    registrations: &[RegistrationRow],
) -> Html<String> {
    let mut body = format!("<h1>{}</h1>\n", escape(name));

    body.push_str("<table>\n<tbody>\n");
    for registration in registrations {
        body.push_str(&format!(
            "<tr><td><a href=\"/organisations/{}/registrations/{}\">{}</a></td><td>{}</td></tr>\n",
            escape(organisation_id),
            escape(&registration.id),
            escape(&capitalize(&registration.material)),
            escape(&registration.status),
        ));
    }
    body.push_str("</tbody>\n</table>\n");

    layout(name, &body)
}

/// A single registration with its accreditation, if any.
#[must_use]
pub fn registration_page(details: &RegistrationDetails) -> Html<String> {
    let mut body = String::from("<h1>Registration</h1>\n<dl>\n");

    body.push_str(&format!(
        "<dt>Material</dt><dd>{}</dd>\n",
        escape(&capitalize(details.material.as_deref().unwrap_or_default())),
    ));
    body.push_str(&format!(
        "<dt>Status</dt><dd>{}</dd>\n",
        escape(details.status.as_deref().unwrap_or_default()),
    ));
    if let Some(accreditation_status) = &details.accreditation_status {
        body.push_str(&format!(
            "<dt>Accreditation</dt><dd>{}</dd>\n",
            escape(accreditation_status),
        ));
    }
    body.push_str("</dl>\n");

    layout("Registration", &body)
}

/// Shown when the backend refuses a call on the user's behalf.
#[must_use]
pub fn unauthorized_page() -> Html<String> {
    layout(
        "Unauthorized",
        "<h1>Unauthorized</h1>\n<p>You are not able to view this page.</p>\n\
         <p><a href=\"/\">Home</a></p>\n",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::fetch::{LinkingPresentation, OrganisationCard, OrganisationRow, SwitchAction};

    #[test]
    fn escape_covers_html_metacharacters() {
        assert_eq!(
            escape(r#"<a b="c">&'d'</a>"#),
            "&lt;a b=&quot;c&quot;&gt;&amp;&#39;d&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn capitalize_uppercases_only_the_first_letter() {
        assert_eq!(capitalize("plastic"), "Plastic");
        assert_eq!(capitalize("PLASTIC"), "Plastic");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn signed_out_home_offers_sign_in() {
        let Html(page) = home_page(None);

        assert!(page.contains("<a href=\"/login\">Sign in</a>"));
        assert!(!page.contains("Sign out"));
    }

    #[test]
    fn table_prompt_labels_missing_fields() {
        let prompt = LinkOrganisationsPrompt {
            defra_id_org_name: Some("Acme Ltd".to_string()),
            entity_name: "organisations",
            is_current_organisation_linked: false,
            other_relationships: vec![SwitchAction {
                organisation_name: Some("Globex".to_string()),
                switch_href: "http://stub/register/u/relationship/rel-9/current".to_string(),
            }],
            presentation: LinkingPresentation::UnlinkedTable {
                rows: vec![OrganisationRow {
                    name: None,
                    org_id: Some("500001".to_string()),
                    id: "cand-1".to_string(),
                    link_href: "/organisations/cand-1/link?redirectUrl=/".to_string(),
                }],
            },
        };

        let Html(page) = link_organisations_page(&prompt);

        assert!(page.contains("data missing"));
        assert!(page.contains("/organisations/cand-1/link?redirectUrl=/"));
        assert!(page.contains(">Switch</a>"));
    }

    #[test]
    fn card_prompt_offers_link_and_add() {
        let prompt = LinkOrganisationsPrompt {
            defra_id_org_name: None,
            entity_name: "organisation",
            is_current_organisation_linked: false,
            other_relationships: vec![],
            presentation: LinkingPresentation::SingleOrganisation {
                organisation: OrganisationCard {
                    name: Some("Acme Ltd".to_string()),
                    org_id: Some("500001".to_string()),
                    id: "cand-1".to_string(),
                    link_href: "/organisations/cand-1/link?redirectUrl=/".to_string(),
                    add_href: "http://stub/register/u/relationship".to_string(),
                },
            },
        };

        let Html(page) = link_organisations_page(&prompt);

        assert!(page.contains(">Link</a>"));
        assert!(page.contains(">Add another organisation</a>"));
    }

    #[test]
    fn organisation_page_links_each_registration() {
        let rows = vec![RegistrationRow {
            id: "reg-1".to_string(),
            material: "plastic".to_string(),
            status: "Granted".to_string(),
        }];

        let Html(page) = organisation_page("Acme Ltd", "org-1", &rows);

        assert!(page.contains("<a href=\"/organisations/org-1/registrations/reg-1\">Plastic</a>"));
        assert!(page.contains("Granted"));
    }

    #[test]
    fn markup_in_backend_data_is_escaped() {
        let rows = vec![RegistrationRow {
            id: "reg-1".to_string(),
            material: "<script>alert(1)</script>".to_string(),
            status: "Granted".to_string(),
        }];

        let Html(page) = organisation_page("Acme <b>Ltd</b>", "org-1", &rows);

        assert!(!page.contains("<script>"));
        assert!(!page.contains("<b>"));
    }
}
