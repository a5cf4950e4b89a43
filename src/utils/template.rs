//! Config template placeholders.
//!
//! Deployable config files carry angle-bracket tokens (`<site>`, `<usr>`)
//! that are substituted in place on the server.

pub struct TemplateVars;

impl TemplateVars {
    pub const USER: &'static str = "usr";
    pub const HOST: &'static str = "host";
    pub const SITE: &'static str = "site";
    pub const PROJECT: &'static str = "project";
}

/// Wrap a variable name as a template token: `site` -> `<site>`.
pub fn placeholder(key: &str) -> String {
    if key.starts_with('<') && key.ends_with('>') {
        return key.to_string();
    }
    format!("<{}>", key)
}

/// Build the token -> value list, base variables first, then extras.
///
/// An extra with the same token as a base variable replaces it in place.
pub fn mappings(base: &[(&str, &str)], extra: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = base
        .iter()
        .map(|(k, v)| (placeholder(k), v.to_string()))
        .collect();

    for (key, value) in extra {
        let token = placeholder(key);
        match result.iter_mut().find(|(k, _)| *k == token) {
            Some(existing) => existing.1 = value.to_string(),
            None => result.push((token, value.to_string())),
        }
    }

    result
}
