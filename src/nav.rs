//! Navigation between the application's pages.

use std::{
    fmt::{self, Display, Formatter},
    sync::Mutex,
};

/// A page in the application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// The login/registration entry point.
    Login,
    /// `/`, which only ever forwards somewhere else.
    Root,
    /// The main protected entry point.
    Dashboard,
    Profile,
    Data,
    NotFound,
}

impl Route {
    pub fn from_path(path: &str) -> Route {
        let trimmed = path.trim_end_matches('/');

        match trimmed {
            "" => Route::Root,
            "/login" => Route::Login,
            "/dashboard" => Route::Dashboard,
            "/profile" => Route::Profile,
            "/data" => Route::Data,
            _ => Route::NotFound,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Root => "/",
            Route::Dashboard => "/dashboard",
            Route::Profile => "/profile",
            Route::Data => "/data",
            Route::NotFound => "/404",
        }
    }

    /// Does this page require an authenticated session?
    pub fn is_protected(self) -> bool {
        match self {
            Route::Root | Route::Dashboard | Route::Profile | Route::Data => {
                true
            },
            Route::Login | Route::NotFound => false,
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Something which can move the user to another page.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// A [`Navigator`] which remembers every page it was sent to.
#[derive(Debug)]
pub struct History {
    entries: Mutex<Vec<Route>>,
}

impl History {
    pub fn new(start: Route) -> Self {
        History {
            entries: Mutex::new(vec![start]),
        }
    }

    pub fn current(&self) -> Route {
        self.lock().last().copied().unwrap_or(Route::Root)
    }

    pub fn entries(&self) -> Vec<Route> { self.lock().clone() }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Route>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for History {
    fn default() -> Self { History::new(Route::Root) }
}

impl Navigator for History {
    fn navigate(&self, route: Route) {
        log::debug!("Navigating to {}", route);
        self.lock().push(route);
    }
}
