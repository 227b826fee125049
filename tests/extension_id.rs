//! Scenario 5 (spec §8, invariant 7): extension ID derivation is stable
//! for a given normalized path, and POSIX/Windows encodings of the "same"
//! logical path diverge (by design, spec §9).

use cdp_crypto::{PathEncoding, derive_from_path};

#[test]
fn posix_path_hashes_to_a_stable_id() {
    let a = derive_from_path("/opt/ext/foo", PathEncoding::Posix);
    let b = derive_from_path("/opt/ext/foo", PathEncoding::Posix);
    assert_eq!(a, b);
    assert_eq!(a.len(), 32);
    assert!(a.chars().all(|c| ('a'..='p').contains(&c)));
}

#[test]
fn windows_path_hashes_to_a_stable_but_different_id() {
    let posix = derive_from_path("/opt/ext/foo", PathEncoding::Posix);
    let windows = derive_from_path(r"C:\opt\ext\foo", PathEncoding::Windows);
    let windows_again = derive_from_path(r"C:\opt\ext\foo", PathEncoding::Windows);

    assert_eq!(windows, windows_again);
    assert_eq!(windows.len(), 32);
    assert_ne!(posix, windows);
}
