/// Router Module Index
///
/// Routes are split by the access they require, and the guard is applied per
/// module (see `create_router`), so a handler cannot be mounted without it by
/// accident.

/// Anonymous routes: health, login/registration, catalogue reads.
pub mod public;

/// Routes behind the authentication stage only (any role).
pub mod authenticated;

/// Routes behind authentication plus a per-route role policy.
pub mod admin;
