//! String packing: deciding how to lay strings out in a linear buffer.
//!
//! Two strategies are provided. `fast_pack` appends strings in input order
//! with no sharing. `optimizing_pack` searches for two kinds of sharing:
//! a string wholly contained in another (its *parent*), and a string whose
//! prefix overlaps another string's suffix, in which case the two are laid
//! out in an overlapping chain. Finding candidates uses a generalized suffix
//! array over all input strings, restricted to suffixes whose first three
//! characters occur as some string's three-character prefix.
//!
//! Both strategies work on one character width at a time; ASCII and UTF-16
//! inputs are packed as independent sub-problems by the storage builder.

use std::collections::{HashMap, HashSet};

/// Longest string that participates in suffix analysis. Longer strings are
/// laid out with no sharing to bound the cost of the suffix array.
const MAX_PACKABLE_STRING_LEN: usize = 24 * 1024;

/// Number of characters in a prefix trigram.
const TRIGRAM_CHAR_COUNT: usize = 3;

/// A packable character: one code unit of either width.
pub(crate) trait PackChar: Copy + Eq + Ord + std::hash::Hash {
    /// Widens the unit for trigram packing and radix comparison.
    fn widen(self) -> u64;
}

impl PackChar for u8 {
    fn widen(self) -> u64 {
        self as u64
    }
}

impl PackChar for u16 {
    fn widen(self) -> u64 {
        self as u64
    }
}

/// A single string to be packed, with the layout state the packer computes.
///
/// Links between entries are indices into the entry slice, not references;
/// a chain of overlapping strings is a doubly linked list of indices.
pub(crate) struct StringEntry<'a, C> {
    /// Index of the string in the original array.
    pub string_id: u32,
    /// Text of the string.
    pub chars: &'a [C],
    /// Position of the string in the output storage, set by the packer.
    pub offset_in_storage: Option<usize>,

    // The remaining fields are used only by the optimizing packer.
    /// If set, this string is fully contained within its parent at
    /// `offset_in_parent`.
    parent: Option<usize>,
    offset_in_parent: usize,
    /// The string that must come after us, if any.
    next: Option<usize>,
    /// The string that must come before us, if any.
    prev: Option<usize>,
    /// How many characters our prefix overlaps with `prev`'s suffix.
    overlap_amount: usize,
    /// Entries that may not be set as our `next` because the edge would
    /// close a cycle in the chain.
    potential_cycles: HashSet<usize>,
}

impl<'a, C> StringEntry<'a, C> {
    pub fn new(string_id: u32, chars: &'a [C]) -> Self {
        StringEntry {
            string_id,
            chars,
            offset_in_storage: None,
            parent: None,
            offset_in_parent: 0,
            next: None,
            prev: None,
            overlap_amount: 0,
            potential_cycles: HashSet::new(),
        }
    }
}

/// Packs three leading characters into one comparison key.
fn make_trigram<C: PackChar>(chars: &[C]) -> u64 {
    (chars[0].widen() << 32) | (chars[1].widen() << 16) | chars[2].widen()
}

/// Collects the trigrams of every string's three-character prefix.
fn build_prefix_trigram_set<C: PackChar>(entries: &[StringEntry<'_, C>]) -> HashSet<u64> {
    let mut result = HashSet::with_capacity(entries.len());
    for entry in entries {
        if entry.chars.len() >= TRIGRAM_CHAR_COUNT {
            result.insert(make_trigram(entry.chars));
        }
    }
    result
}

/// An entry in the generalized suffix array: one distinct suffix and the
/// indices of every string that has it.
struct SuffixArrayEntry<'a, C> {
    suffix: &'a [C],
    entries: Vec<usize>,
}

impl<C: PackChar> SuffixArrayEntry<'_, C> {
    /// The character at `pos` widened, or -1 past the end of the suffix.
    fn ext_char_at(&self, pos: usize) -> i64 {
        if pos >= self.suffix.len() {
            -1
        } else {
            self.suffix[pos].widen() as i64
        }
    }
}

/// Multikey quicksort over `entries[lo..hi]`, comparing from `char_idx`.
///
/// Partitions with the Hoare scheme on the character at `char_idx`, recurses
/// on the strictly-smaller and strictly-greater partitions, and continues on
/// the equal partition at the next character position.
fn radix_quicksort<C: PackChar>(
    entries: &mut [SuffixArrayEntry<'_, C>],
    mut lo: usize,
    mut hi: usize,
    mut char_idx: usize,
) {
    loop {
        if hi - lo <= 1 {
            // Already sorted.
            return;
        }

        // Partition invariants:
        //  [lo, lower)    < pivot
        //  [upper, hi)    > pivot
        // and on completion [lower, upper) == pivot.
        let pivot_char = entries[lo].ext_char_at(char_idx);
        let mut lower = lo;
        let mut upper = hi;
        let mut cursor = lo + 1;
        while cursor < upper {
            let test_char = entries[cursor].ext_char_at(char_idx);
            if test_char < pivot_char {
                entries.swap(lower, cursor);
                lower += 1;
                cursor += 1;
            } else if test_char > pivot_char {
                upper -= 1;
                entries.swap(upper, cursor);
            } else {
                cursor += 1;
            }
        }

        radix_quicksort(entries, lo, lower, char_idx);
        radix_quicksort(entries, upper, hi, char_idx);

        // The equal range is sorted on the next character, unless the pivot
        // was exhausted. This loop is the tail call on [lower, upper).
        if pivot_char == -1 {
            return;
        }
        lo = lower;
        hi = upper;
        char_idx += 1;
    }
}

/// Builds the generalized suffix array over `entries`.
///
/// Only suffixes that begin with an element of `prefixes_of_interest`, or
/// that are shorter than a trigram, are included.
fn build_suffix_array<'a, C: PackChar>(
    entries: &[StringEntry<'a, C>],
    prefixes_of_interest: &HashSet<u64>,
) -> Vec<SuffixArrayEntry<'a, C>> {
    let mut suffix_map: HashMap<&'a [C], Vec<usize>> = HashMap::new();
    for (entry_index, entry) in entries.iter().enumerate() {
        let chars = entry.chars;
        // Skip excessively long strings.
        if chars.len() > MAX_PACKABLE_STRING_LEN {
            continue;
        }
        for i in (0..chars.len()).rev() {
            if i + TRIGRAM_CHAR_COUNT <= chars.len()
                && !prefixes_of_interest.contains(&make_trigram(&chars[i..]))
            {
                continue;
            }
            suffix_map.entry(&chars[i..]).or_default().push(entry_index);
        }
    }

    let mut result: Vec<SuffixArrayEntry<'a, C>> = suffix_map
        .into_iter()
        .map(|(suffix, entries)| SuffixArrayEntry { suffix, entries })
        .collect();
    let len = result.len();
    radix_quicksort(&mut result, 0, len, 0);
    result
}

/// A directed overlap relationship: some suffix of each string in the suffix
/// array entry at `suffix_index` equals a prefix of `dst`. The amount of
/// overlap is the index of the bucket holding this record.
struct Overlap {
    suffix_index: usize,
    dst: usize,
}

/// Overlap records bucketed by overlap amount.
type WeightIndexedOverlaps = Vec<Vec<Overlap>>;

/// For one string, finds every overlap that ends at it and the best parent
/// that contains it.
///
/// Walks the string's prefixes while narrowing a binary-search window over
/// the sorted suffix array. A window entry exactly equal to the current
/// prefix is an overlap source; on the final prefix (the whole string), any
/// remaining window entry's owners contain the string verbatim, and the
/// owner with the smallest original index is chosen as parent so that
/// parents tend to land early in the string table.
fn compute_overlaps_and_parent_for_entry<C: PackChar>(
    right: usize,
    entries: &mut [StringEntry<'_, C>],
    suffix_array: &[SuffixArrayEntry<'_, C>],
    overlaps: &mut WeightIndexedOverlaps,
) {
    let right_chars = entries[right].chars;
    let right_len = right_chars.len();
    let mut lo = 0usize;
    let mut hi = suffix_array.len();
    for index in 0..right_len {
        let test_char = right_chars[index].widen() as i64;
        // Narrow [lo, hi) to the suffixes that have test_char at index.
        lo += suffix_array[lo..hi].partition_point(|ent| ent.ext_char_at(index) < test_char);
        hi = lo + suffix_array[lo..hi].partition_point(|ent| ent.ext_char_at(index) == test_char);
        if lo == hi {
            // No suffixes remaining.
            break;
        }

        let overlap_amount = index + 1;
        if overlap_amount < right_len {
            // A suffix equal to this prefix is an overlap source; equality
            // holds exactly when the lengths match.
            if suffix_array[lo].suffix.len() == overlap_amount {
                if overlaps.len() <= overlap_amount {
                    overlaps.resize_with(overlap_amount + 1, Vec::new);
                }
                overlaps[overlap_amount].push(Overlap {
                    suffix_index: lo,
                    dst: right,
                });
            }
        } else {
            // Final prefix: every suffix in [lo, hi) has the whole string as
            // a prefix, so each owner contains it verbatim.
            for cursor in lo..hi {
                for &parent in &suffix_array[cursor].entries {
                    // Can't parent ourselves.
                    if parent == right {
                        continue;
                    }
                    // An equal-length owner is an exact duplicate. Only the
                    // earliest copy may represent the others; the one-way
                    // rule keeps parent links acyclic.
                    if entries[parent].chars.len() == right_len
                        && entries[parent].string_id >= entries[right].string_id
                    {
                        continue;
                    }
                    // Don't displace an existing parent with a lower ID.
                    if let Some(existing) = entries[right].parent {
                        if entries[existing].string_id < entries[parent].string_id {
                            continue;
                        }
                    }
                    entries[right].parent = Some(parent);
                    entries[right].offset_in_parent =
                        entries[parent].chars.len() - suffix_array[cursor].suffix.len();
                }
            }
        }
    }
}

fn compute_overlaps_and_parents<C: PackChar>(
    entries: &mut [StringEntry<'_, C>],
    suffix_array: &[SuffixArrayEntry<'_, C>],
) -> WeightIndexedOverlaps {
    let mut result = WeightIndexedOverlaps::new();
    for right in 0..entries.len() {
        compute_overlaps_and_parent_for_entry(right, entries, suffix_array, &mut result);
    }
    result
}

/// Whether laying `dst` directly after `src` (sharing the overlap) is legal.
fn can_overlap<C>(entries: &[StringEntry<'_, C>], src: usize, dst: usize) -> bool {
    // Are we trying to overlap ourself?
    if src == dst {
        return false;
    }
    // Is either string going to be a substring of another?
    if entries[src].parent.is_some() || entries[dst].parent.is_some() {
        return false;
    }
    // Did we already pick a string to come after src, or before dst?
    if entries[src].next.is_some() || entries[dst].prev.is_some() {
        return false;
    }
    // Would the edge close a cycle?
    if entries[src].potential_cycles.contains(&dst) {
        return false;
    }
    true
}

/// Plans the layout greedily: applies overlaps from the largest amount down,
/// linking `src -> dst` whenever the edge is legal. Equivalent to growing a
/// maximum-weight Hamiltonian path while refusing edges that would close a
/// cycle such as `a -> b -> c -> a`.
fn plan_layout<C: PackChar>(
    overlaps_by_weight: &WeightIndexedOverlaps,
    suffix_array: &[SuffixArrayEntry<'_, C>],
    entries: &mut [StringEntry<'_, C>],
) {
    for overlap_amount in (0..overlaps_by_weight.len()).rev() {
        for overlap in &overlaps_by_weight[overlap_amount] {
            let dst = overlap.dst;
            if entries[dst].prev.is_some() || entries[dst].parent.is_some() {
                // dst is already spoken for.
                continue;
            }
            for &src in &suffix_array[overlap.suffix_index].entries {
                if !can_overlap(entries, src, dst) {
                    continue;
                }
                // Apply the overlap.
                entries[src].next = Some(dst);
                entries[dst].prev = Some(src);
                entries[dst].overlap_amount = overlap_amount;

                // Mark end -> start of the merged chain as prohibited so a
                // later edge cannot close the loop.
                let mut end = dst;
                while let Some(n) = entries[end].next {
                    end = n;
                }
                let mut start = src;
                while let Some(p) = entries[start].prev {
                    start = p;
                }
                entries[end].potential_cycles.insert(start);
                break;
            }
        }
    }
}

/// Lays out the chain containing `index` (which must have no parent): walks
/// back to the head, then appends each link's non-overlapping suffix.
fn layout_chain<C: PackChar>(
    index: usize,
    entries: &mut [StringEntry<'_, C>],
    storage: &mut Vec<C>,
) {
    let mut head = index;
    while let Some(p) = entries[head].prev {
        head = p;
    }
    debug_assert!(
        entries[head].overlap_amount == 0,
        "chain head cannot overlap a predecessor"
    );
    let mut cursor = Some(head);
    while let Some(cur) = cursor {
        let chars = entries[cur].chars;
        let overlap = entries[cur].overlap_amount;
        debug_assert!(
            entries[cur].offset_in_storage.is_none(),
            "chain member laid out twice"
        );
        debug_assert!(
            overlap <= chars.len() && overlap <= storage.len(),
            "overlap exceeds string or storage laid out so far"
        );
        entries[cur].offset_in_storage = Some(storage.len() - overlap);
        storage.extend_from_slice(&chars[overlap..]);
        cursor = entries[cur].next;
    }
}

/// Positions `index` within the storage if it is not already positioned,
/// appending data as needed. A parented entry is positioned inside its
/// parent; anything else is laid out with its whole chain.
fn layout_if_needed<C: PackChar>(
    index: usize,
    entries: &mut [StringEntry<'_, C>],
    storage: &mut Vec<C>,
) {
    if entries[index].offset_in_storage.is_some() {
        return;
    }

    // The empty string is trivial.
    if entries[index].chars.is_empty() {
        entries[index].offset_in_storage = Some(0);
        return;
    }

    if let Some(parent) = entries[index].parent {
        debug_assert!(
            entries[index].prev.is_none() && entries[index].next.is_none(),
            "a parented string cannot be part of a chain"
        );
        // Collect the chain of unpositioned ancestors, topmost last.
        let mut pending = vec![index];
        let mut top = parent;
        while entries[top].offset_in_storage.is_none() {
            match entries[top].parent {
                Some(p) => {
                    pending.push(top);
                    top = p;
                }
                None => break,
            }
        }
        if entries[top].offset_in_storage.is_none() {
            layout_chain(top, entries, storage);
        }
        for &cur in pending.iter().rev() {
            let p = entries[cur].parent.unwrap();
            let base = entries[p].offset_in_storage.unwrap();
            entries[cur].offset_in_storage = Some(base + entries[cur].offset_in_parent);
        }
        return;
    }

    layout_chain(index, entries, storage);
}

/// Packs `entries` with substring and overlap sharing.
fn optimizing_pack<C: PackChar>(entries: &mut [StringEntry<'_, C>]) -> Vec<C> {
    let prefix_set = build_prefix_trigram_set(entries);
    let suffix_array = build_suffix_array(entries, &prefix_set);
    let overlaps = compute_overlaps_and_parents(entries, &suffix_array);
    plan_layout(&overlaps, &suffix_array, entries);
    let mut storage = Vec::new();
    for index in 0..entries.len() {
        layout_if_needed(index, entries, &mut storage);
    }
    storage
}

/// Packs `entries` naively, in their original order.
fn fast_pack<C: PackChar>(entries: &mut [StringEntry<'_, C>]) -> Vec<C> {
    let mut result = Vec::new();
    for entry in entries.iter_mut() {
        if entry.chars.is_empty() {
            entry.offset_in_storage = Some(0);
            continue;
        }
        entry.offset_in_storage = Some(result.len());
        result.extend_from_slice(entry.chars);
    }
    result
}

/// Packs `entries`, choosing the strategy, and returns the storage blob.
/// Each entry's claimed offset is validated against the blob in debug builds.
pub(crate) fn pack_strings<C: PackChar>(
    entries: &mut [StringEntry<'_, C>],
    optimize: bool,
) -> Vec<C> {
    let storage = if optimize {
        optimizing_pack(entries)
    } else {
        fast_pack(entries)
    };
    if cfg!(debug_assertions) {
        validate_string_packing(entries, &storage);
    }
    storage
}

/// Asserts that every string appears at its claimed offset in the storage.
fn validate_string_packing<C: PackChar>(entries: &[StringEntry<'_, C>], storage: &[C]) {
    for entry in entries {
        let offset = entry
            .offset_in_storage
            .expect("entry was never positioned in storage");
        let size = entry.chars.len();
        assert!(
            offset + size <= storage.len(),
            "invalid offset or size for string entry"
        );
        assert!(
            entry.chars == &storage[offset..offset + size],
            "string does not appear at claimed offset in storage"
        );
    }
}
