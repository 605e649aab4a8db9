//! Deciding what to show for a page given the current session.

use crate::{nav::Route, session::SessionState};

/// What should happen when the user asks for a page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The initial verification hasn't finished, show a neutral placeholder.
    Loading,
    Render(Route),
    Redirect(Route),
}

/// Resolve a requested page against the session.
///
/// The login page and the protected pages redirect on opposite values of
/// `is_authenticated`, so the same state can never bounce between them.
pub fn resolve(state: &SessionState, requested: Route) -> Outcome {
    if state.is_loading {
        return Outcome::Loading;
    }

    match requested {
        Route::Login if state.is_authenticated => {
            Outcome::Redirect(Route::Dashboard)
        },
        Route::Root if state.is_authenticated => {
            Outcome::Redirect(Route::Dashboard)
        },
        route if route.is_protected() && !state.is_authenticated => {
            Outcome::Redirect(Route::Login)
        },
        route => Outcome::Render(route),
    }
}
