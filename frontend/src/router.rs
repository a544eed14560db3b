use crate::state::session::{ExecutionContext, SessionStore};

pub const ROOT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";

/// Reachable without a session. The empty path is how the root arrives from
/// some navigations.
pub const PUBLIC_ROUTE_PATHS: &[&str] = &["", ROOT_PATH, LOGIN_PATH, REGISTER_PATH];

/// Pages that make no sense while signed in.
pub const GUEST_ONLY_ROUTE_PATHS: &[&str] = &[LOGIN_PATH, REGISTER_PATH];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Proceed,
    Redirect(String),
}

impl NavigationOutcome {
    fn redirect(path: &str) -> Self {
        Self::Redirect(path.to_string())
    }
}

/// Decides, per navigation, whether the target route may be entered with the
/// current session. Guards never retry: a hydration failure counts as having
/// no session.
#[derive(Clone)]
pub struct RouteGuard {
    store: SessionStore,
}

impl RouteGuard {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    /// Runs the global guards and, for routes that need a user, the user-id
    /// guard. The first redirect wins.
    pub fn navigate(&self, path: &str, requires_user: bool) -> NavigationOutcome {
        let outcome = self.check_auth(path);
        if outcome != NavigationOutcome::Proceed {
            return outcome;
        }
        let outcome = self.check_guest(path);
        if outcome != NavigationOutcome::Proceed || !requires_user {
            return outcome;
        }
        self.require_user(path)
    }

    /// Global guard: anonymous users only reach public entry points.
    pub fn check_auth(&self, path: &str) -> NavigationOutcome {
        if self.is_server() {
            return NavigationOutcome::Proceed;
        }
        self.hydrate();
        let path = route_path(path);
        if !self.store.is_authenticated() && !PUBLIC_ROUTE_PATHS.contains(&path) {
            log::debug!("No session for {}, redirecting to login", path);
            return NavigationOutcome::redirect(LOGIN_PATH);
        }
        NavigationOutcome::Proceed
    }

    /// Global guard: signed-in users are sent away from login and register.
    pub fn check_guest(&self, path: &str) -> NavigationOutcome {
        if self.is_server() {
            return NavigationOutcome::Proceed;
        }
        self.hydrate();
        if self.store.is_authenticated() && GUEST_ONLY_ROUTE_PATHS.contains(&route_path(path)) {
            return NavigationOutcome::redirect(ROOT_PATH);
        }
        NavigationOutcome::Proceed
    }

    /// Route-scoped guard for pages that act on behalf of a user.
    pub fn require_user(&self, path: &str) -> NavigationOutcome {
        if self.is_server() {
            return NavigationOutcome::Proceed;
        }
        self.hydrate();
        if self.store.user_id().is_none() {
            log::debug!("No user id for {}, redirecting to login", route_path(path));
            return NavigationOutcome::redirect(LOGIN_PATH);
        }
        NavigationOutcome::Proceed
    }

    fn is_server(&self) -> bool {
        self.store.context() == ExecutionContext::Server
    }

    fn hydrate(&self) {
        if self.store.is_authenticated() {
            return;
        }
        if let Err(err) = self.store.restore() {
            log::warn!("Failed to restore session: {}", err);
        }
    }
}

/// Drops query string and fragment.
fn route_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}
