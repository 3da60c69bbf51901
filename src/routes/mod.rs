//! Router Module Index
//!
//! Splits the stateful routes by access level. Both groups run behind the session,
//! CSRF and authentication stages; only the `authenticated` group is guarded.

/// Routes open to anonymous visitors.
pub mod public;

/// Routes behind `require_authentication`. Anonymous requests are redirected to the login page.
pub mod authenticated;
