use crate::api::handlers::{health, password, signup, tokens, users};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Handlers sharing a path must
/// be registered in the same `routes!` call.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(tokens::login))
        .routes(routes!(tokens::validate_token))
        .routes(routes!(tokens::revoke_token))
        .routes(routes!(tokens::revoke_session))
        .routes(routes!(tokens::revoke_all))
        .routes(routes!(tokens::history))
        .routes(routes!(signup::signup_token))
        .routes(routes!(signup::signup))
        .routes(routes!(password::reset_password))
        .routes(routes!(password::change_password))
        .routes(routes!(password::reset_token))
        .routes(routes!(users::me))
        .routes(routes!(users::list_users, users::create_user))
        .routes(routes!(users::get_user, users::delete_user))
        .routes(routes!(users::get_user_by_email))
        .routes(routes!(users::update_allowances))
        .routes(routes!(users::update_blocked));

    router.get_openapi_mut().tags = Some(vec![
        tag("auth", "Login, token validation and revocation"),
        tag("users", "Principal management"),
        tag("health", "Service health"),
    ]);

    router
}

fn tag(name: &str, description: &str) -> Tag {
    let mut tag = Tag::new(name);
    tag.description = Some(description.to_string());
    tag
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(value: &str) -> Option<&str> {
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    }

    match author.find('<') {
        Some(start) => (
            non_empty(&author[..start]),
            non_empty(author[start + 1..].trim().trim_end_matches('>')),
        ),
        None => (non_empty(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = openapi();
        for path in [
            "/health",
            "/v1/auth/login",
            "/v1/auth/validate",
            "/v1/auth/revoke",
            "/v1/auth/revoke/{session_id}",
            "/v1/auth/revoke-all",
            "/v1/auth/history",
            "/v1/auth/signup-token",
            "/v1/auth/signup",
            "/v1/auth/reset-password",
            "/v1/me",
            "/v1/me/password",
            "/v1/users",
            "/v1/users/{id}",
            "/v1/users/by-email/{email}",
            "/v1/users/{id}/allowances",
            "/v1/users/{id}/blocked",
            "/v1/users/{id}/reset-token",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn document_uses_cargo_metadata() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
        let names: Vec<_> = doc
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        assert_eq!(names, ["auth", "users", "health"]);
    }

    #[test]
    fn author_is_split_into_name_and_email() {
        assert_eq!(
            parse_author("Team Warden <team@warden.dev>"),
            (Some("Team Warden"), Some("team@warden.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("  "), (None, None));
        assert_eq!(parse_author(" <ops@warden.dev> "), (None, Some("ops@warden.dev")));
    }
}
