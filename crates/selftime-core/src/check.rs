//! Contract checks for caller obligations
//!
//! Measurement scopes trade safety for overhead: malformed usage (non-LIFO
//! leave, toggling a histogram mid-scope, a lazy scope without a target) is a
//! programming error, not a recoverable condition. These helpers panic when
//! checks are armed and vanish entirely when they are not.
//!
//! Checks are armed in builds with `debug_assertions`, or in any build with
//! the `strict-checks` feature.

/// Whether contract checks are compiled in
pub const ENABLED: bool = cfg!(any(debug_assertions, feature = "strict-checks"));

/// Assert a caller contract
#[inline(always)]
#[track_caller]
pub fn contract(condition: bool, what: &str) {
    if ENABLED && !condition {
        violation(what);
    }
}

/// Assert a caller contract whose evaluation has side effects
///
/// The closure only runs when checks are armed.
#[inline(always)]
#[track_caller]
pub fn contract_with(check: impl FnOnce() -> bool, what: &str) {
    if ENABLED && !check() {
        violation(what);
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn violation(what: &str) -> ! {
    panic!("contract violation: {}", what)
}
