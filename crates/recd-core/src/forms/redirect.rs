use tracing::debug;

/// Application root; where users land when no redirect was requested.
pub const ROOT_PATH: &str = "/";

/// Query parameter that carries the post-auth destination.
pub const REDIRECT_PARAM: &str = "redirect";

/// Moves the application to another page.
pub trait Navigator {
    fn navigate(&mut self, path: &str);
}

/// Where to send the user after they authenticate.
///
/// Only in-app paths are kept: a target must start with a single `/`.
/// Anything else (absolute URLs, `//host`, garbage) becomes the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget(String);

impl Default for RedirectTarget {
    fn default() -> Self {
        Self::root()
    }
}

impl RedirectTarget {
    pub fn root() -> Self {
        Self(ROOT_PATH.to_string())
    }

    /// Accept `path` if it is a same-application path.
    pub fn parse(path: &str) -> Self {
        let path = path.trim();
        let is_local = path.starts_with('/')
            && !path.starts_with("//")
            && !path.starts_with("/\\")
            && !path.chars().any(char::is_control);

        if is_local {
            Self(path.to_string())
        } else {
            if !path.is_empty() {
                debug!(redirect = path, "Ignoring off-site redirect target");
            }
            Self::root()
        }
    }

    /// Read the target from the `redirect` parameter of a path or query string.
    pub fn from_query(path_or_query: &str) -> Self {
        query_param(path_or_query, REDIRECT_PARAM)
            .map(|target| Self::parse(&target))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_PATH
    }

    /// Login page URL that will come back to `current` afterwards.
    pub fn login_path_for(current: &str) -> String {
        Self::auth_path("/login", current)
    }

    /// Signup page URL that will come back to `current` afterwards.
    pub fn signup_path_for(current: &str) -> String {
        Self::auth_path("/signup", current)
    }

    fn auth_path(page: &str, current: &str) -> String {
        let target = Self::parse(current);
        if target.is_root() {
            page.to_string()
        } else {
            format!(
                "{}?{}={}",
                page,
                REDIRECT_PARAM,
                urlencoding::encode(target.as_str())
            )
        }
    }
}

/// Split a path into its route and query parts.
pub fn split_path(path: &str) -> (&str, &str) {
    path.split_once('?').unwrap_or((path, ""))
}

/// Decoded value of the first `name` parameter in a path or query string.
pub fn query_param(path_or_query: &str, name: &str) -> Option<String> {
    let query = match path_or_query.split_once('?') {
        Some((_, query)) => query,
        None if path_or_query.starts_with('/') => return None,
        None => path_or_query,
    };

    query
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| {
            urlencoding::decode(&value.replace('+', " "))
                .ok()
                .map(|decoded| decoded.into_owned())
        })
}
