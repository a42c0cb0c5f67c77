//! Path arithmetic shared by the stages.

use portico_core::{join_path, RoleNamespace};

/// Removes the application base path from `path`.
///
/// Matches on segment boundaries only; a path outside the base is returned
/// unchanged.
///
/// ```
/// use portico_middleware::paths::strip_base;
///
/// assert_eq!(strip_base("/administration", "/administration/operations"), "/operations");
/// assert_eq!(strip_base("/administration", "/administration"), "");
/// assert_eq!(strip_base("/administration", "/administrationx"), "/administrationx");
/// ```
#[must_use]
pub fn strip_base<'p>(base: &str, path: &'p str) -> &'p str {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return path;
    }
    match path.strip_prefix(base) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Computes the role-specific internal path: `{base}/{namespace}{rest}`.
///
/// Idempotent: a path whose app-relative part already starts with the
/// namespace is returned as is.
///
/// ```
/// use portico_core::{AppRole, IdentityProvider, RoleNamespace};
/// use portico_middleware::paths::role_rewrite;
///
/// let ns = RoleNamespace::resolve(IdentityProvider::Idir, AppRole::CasAdmin).unwrap();
/// let once = role_rewrite("/administration", "/administration/operators", ns);
/// assert_eq!(once, "/administration/idir/cas_admin/operators");
/// assert_eq!(role_rewrite("/administration", &once, ns), once);
/// ```
#[must_use]
pub fn role_rewrite(base: &str, path: &str, namespace: RoleNamespace) -> String {
    let rest = strip_base(base, path);
    if has_namespace(rest, namespace) {
        return join_path(base, rest);
    }
    join_path(base, &format!("{}{rest}", namespace.as_str()))
}

/// True when `rest` starts with the namespace's segments.
#[must_use]
pub fn has_namespace(rest: &str, namespace: RoleNamespace) -> bool {
    let ns = namespace.as_str();
    let rest = rest.trim_start_matches('/');
    rest.strip_prefix(ns)
        .is_some_and(|tail| tail.is_empty() || tail.starts_with('/'))
}
