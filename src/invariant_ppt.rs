//! Recorded invariants for zoom bookkeeping.
//!
//! `ZoomState` checks that its factor stays in bounds and that its stops
//! are sorted every time it changes. Each check is remembered per thread,
//! so a contract test can fail when a code path it relies on never ran the
//! check at all.
//!
//! # Usage
//!
//! ```rust,ignore
//! use photocamera::invariant_ppt::*;
//!
//! // Inside ZoomState
//! assert_invariant!(
//!     zoom.current >= zoom.min && zoom.current <= zoom.max,
//!     "Zoom factor stays within device bounds",
//!     "session::zoom"
//! );
//!
//! // In a test, after driving the session
//! #[test]
//! fn contract_zoom_bounds() {
//!     contract_test("zoom bounds", &[
//!         "Zoom factor stays within device bounds",
//!     ]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::BTreeSet;

thread_local! {
    /// Names of the invariants checked on this thread since the last clear
    static CHECKED: RefCell<BTreeSet<&'static str>> = const { RefCell::new(BTreeSet::new()) };
}

/// Check a zoom or session invariant, recording that it was evaluated.
///
/// Panics with the invariant name and the checking module when the
/// condition does not hold. A violated invariant is a bug in this crate,
/// never a hardware condition.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $name:expr) => {
        $crate::invariant_ppt::record_check($condition, $name, "unknown")
    };
    ($condition:expr, $name:expr, $module:expr) => {
        $crate::invariant_ppt::record_check($condition, $name, $module)
    };
}

#[doc(hidden)]
pub fn record_check(holds: bool, name: &'static str, module: &str) {
    CHECKED.with(|checked| checked.borrow_mut().insert(name));
    if !holds {
        panic!("INVARIANT VIOLATION [{}]: {}", module, name);
    }
}

/// Whether `name` has been checked on this thread since the last clear.
pub fn was_checked(name: &str) -> bool {
    CHECKED.with(|checked| checked.borrow().contains(name))
}

/// Fail `contract` unless every invariant in `required` was exercised.
pub fn contract_test(contract: &str, required: &[&str]) {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !was_checked(name))
        .collect();

    assert!(
        missing.is_empty(),
        "CONTRACT FAILURE [{}]: never checked:\n  - {}",
        contract,
        missing.join("\n  - ")
    );
}

/// Forget every recorded check on this thread.
pub fn clear_invariant_log() {
    CHECKED.with(|checked| checked.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_invariants_satisfy_contract() {
        clear_invariant_log();
        crate::assert_invariant!(true, "Sample invariant", "invariant_ppt");
        contract_test("sample", &["Sample invariant"]);
    }

    #[test]
    #[should_panic(expected = "CONTRACT FAILURE")]
    fn test_unchecked_invariant_fails_contract() {
        clear_invariant_log();
        contract_test("missing", &["Never checked"]);
    }

    #[test]
    fn test_clear_forgets_checks() {
        crate::assert_invariant!(true, "Forgotten invariant");
        assert!(was_checked("Forgotten invariant"));
        clear_invariant_log();
        assert!(!was_checked("Forgotten invariant"));
    }

    #[test]
    #[should_panic(expected = "INVARIANT VIOLATION [invariant_ppt]")]
    fn test_violation_panics() {
        crate::assert_invariant!(1 + 1 == 3, "Arithmetic holds", "invariant_ppt");
    }
}
