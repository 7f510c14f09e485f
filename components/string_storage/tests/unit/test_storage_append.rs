//! Append semantics: the move path and the re-offset path.

use string_storage::ConsecutiveStringStorage;

fn contents(storage: &ConsecutiveStringStorage) -> Vec<String> {
    let mut scratch = String::new();
    (0..storage.count())
        .map(|i| storage.string_at_index(i, &mut scratch).to_string())
        .collect()
}

/// Appending into a never-used storage adopts the right-hand side wholesale.
#[test]
fn test_append_move_path_preserves_lookup() {
    let rhs = ConsecutiveStringStorage::new(&["one", "two", "日本"], true);
    let before = contents(&rhs);
    let mut lhs = ConsecutiveStringStorage::default();
    lhs.append(rhs);
    assert_eq!(contents(&lhs), before);
}

/// Appending into a used storage re-offsets the incoming table; every string
/// that resolved in either side alone must resolve identically afterwards.
#[test]
fn test_append_reoffset_path_preserves_lookup() {
    let lhs_strings = ["alpha", "beta", "gamma"];
    let rhs_strings = ["delta", "", "日本語", "alphabet"];
    let mut lhs = ConsecutiveStringStorage::new(&lhs_strings, true);
    let rhs = ConsecutiveStringStorage::new(&rhs_strings, true);
    lhs.append(rhs);

    let combined = contents(&lhs);
    assert_eq!(&combined[..3], &lhs_strings);
    assert_eq!(&combined[3..], &rhs_strings);
}

/// Chained appends keep earlier batches' indices stable, which is what the
/// delta-compilation path relies on.
#[test]
fn test_chained_appends_keep_indices_stable() {
    let mut storage = ConsecutiveStringStorage::new(&["base"], false);
    storage.append(ConsecutiveStringStorage::new(&["delta1"], false));
    storage.append(ConsecutiveStringStorage::new(&["delta2", "delta3"], true));

    assert_eq!(contents(&storage), ["base", "delta1", "delta2", "delta3"]);
}

/// Entry hashes are computed over stored bytes, so they survive an append.
#[test]
fn test_entry_hash_stable_across_append() {
    let mut lhs = ConsecutiveStringStorage::new(&["ident"], false);
    let rhs = ConsecutiveStringStorage::new(&["other"], false);
    let before = lhs.entry_hash(0);
    lhs.append(rhs);
    assert_eq!(lhs.entry_hash(0), before);
    assert_ne!(lhs.entry_hash(0), lhs.entry_hash(1));
}
