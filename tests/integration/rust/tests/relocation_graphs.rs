//! Relocation engine integration tests.
//!
//! These drive the serializer and deserializer primitives directly against
//! native node structures, the way per-kind cell routines do, to verify
//! graph identity, null preservation, and forward-reference resolution.

use core_types::{RuntimeConfig, TaggedValue};
use memory_manager::Heap;
use snapshot::{Deserializer, RelocationKind, Serializer};

/// A native list node carrying a value, a raw pointer chain, and a parallel
/// tagged-value chain.
#[repr(C)]
struct ListNode {
    value: f64,
    next: *mut ListNode,
    link: TaggedValue,
}

impl ListNode {
    fn new(value: f64) -> Box<ListNode> {
        Box::new(ListNode {
            value,
            next: std::ptr::null_mut(),
            link: TaggedValue::encode_native(0),
        })
    }
}

fn heap() -> Heap {
    Heap::new(RuntimeConfig::default())
}

fn serialize_node(s: &mut Serializer<'_>, node: &ListNode) {
    s.write_int::<u64>(node.value.to_bits());
    s.write_relocation(node.next as usize);
    s.write_tagged_value(node.link, true);
    s.end_object(node as *const ListNode as usize);
}

fn deserialize_node(d: &mut Deserializer<'_>, node: &mut ListNode) {
    node.value = f64::from_bits(d.read_int::<u64>());
    // SAFETY: the nodes are boxed by the callers and outlive the flush.
    unsafe {
        d.read_relocation(
            &mut node.next as *mut *mut ListNode as *mut u8,
            RelocationKind::NativePointer,
        );
        d.read_tagged_value(&mut node.link, true);
    }
    d.end_object(node as *const ListNode as usize);
}

/// The four-node scenario: values {0, 2, 1, 3}, native chain
/// n1 -> n2 -> n3 -> n1 with n0's pointer null, and a parallel tagged chain
/// with the identical structure.
#[test]
fn test_cyclic_list_roundtrip() {
    let mut nodes: Vec<Box<ListNode>> = [0.0, 2.0, 1.0, 3.0]
        .iter()
        .map(|&v| ListNode::new(v))
        .collect();
    let addr = |node: &ListNode| node as *const ListNode as usize;

    // n1 -> n2 -> n3 -> n1; n0 stays null.
    let n1 = &mut *nodes[1] as *mut ListNode;
    let n2 = &mut *nodes[2] as *mut ListNode;
    let n3 = &mut *nodes[3] as *mut ListNode;
    nodes[1].next = n2;
    nodes[2].next = n3;
    nodes[3].next = n1;
    for i in 0..4 {
        let next = nodes[i].next as u64;
        nodes[i].link = TaggedValue::encode_native(next);
    }

    let writer_heap = heap();
    let mut s = Serializer::new(&writer_heap);
    for node in &nodes {
        serialize_node(&mut s, node);
    }
    let bytes = s.write_epilogue();

    let mut restored: Vec<Box<ListNode>> = (0..4).map(|_| ListNode::new(0.0)).collect();
    let mut reader_heap = heap();
    let mut d = Deserializer::new(&bytes, &mut reader_heap);
    for node in restored.iter_mut() {
        deserialize_node(&mut d, node);
    }
    d.flush_relocation_queue();

    let values: Vec<f64> = restored.iter().map(|n| n.value).collect();
    assert_eq!(values, [0.0, 2.0, 1.0, 3.0]);

    assert!(restored[0].next.is_null());
    assert_eq!(restored[1].next as usize, addr(&restored[2]));
    assert_eq!(restored[2].next as usize, addr(&restored[3]));
    assert_eq!(restored[3].next as usize, addr(&restored[1]));

    // The tagged chain must match the native chain at every node.
    for node in &restored {
        assert!(node.link.is_native_value());
        assert_eq!(node.link.payload(), node.next as u64);
    }
}

/// A reference to an object serialized later resolves once that object's
/// own relocation is read, not before.
#[test]
fn test_forward_reference_resolves_at_flush() {
    let mut a = ListNode::new(1.0);
    let b = ListNode::new(2.0);
    a.next = &*b as *const ListNode as *mut ListNode;
    a.link = TaggedValue::encode_native(a.next as u64);

    let writer_heap = heap();
    let mut s = Serializer::new(&writer_heap);
    serialize_node(&mut s, &a);
    serialize_node(&mut s, &b);
    let bytes = s.write_epilogue();

    let mut new_a = ListNode::new(0.0);
    let mut new_b = ListNode::new(0.0);
    let mut reader_heap = heap();
    let mut d = Deserializer::new(&bytes, &mut reader_heap);
    deserialize_node(&mut d, &mut new_a);
    // a's pointer to b cannot be resolved yet.
    assert_eq!(d.pending_relocations(), 2);
    deserialize_node(&mut d, &mut new_b);
    d.flush_relocation_queue();

    assert_eq!(new_a.next as usize, &*new_b as *const ListNode as usize);
    assert_eq!(new_a.link.payload(), new_a.next as u64);
    assert!(new_b.next.is_null());
}

/// Nulls round-trip through the reserved ID 0 in both representations, and
/// never grow the relocation map.
#[test]
fn test_null_preservation() {
    let node = ListNode::new(5.0);

    let writer_heap = heap();
    let mut s = Serializer::new(&writer_heap);
    let map_before = s.relocation_map_size();
    serialize_node(&mut s, &node);
    // One ID for the node itself; none for its null links.
    assert_eq!(s.relocation_map_size(), map_before + 1);
    let bytes = s.write_epilogue();

    let mut restored = ListNode::new(0.0);
    restored.next = 0xDEAD_0000 as *mut ListNode; // must be overwritten
    let mut reader_heap = heap();
    let mut d = Deserializer::new(&bytes, &mut reader_heap);
    deserialize_node(&mut d, &mut restored);
    d.flush_relocation_queue();

    assert!(restored.next.is_null());
    assert!(restored.link.is_native_value());
    assert_eq!(restored.link.payload(), 0);
}

/// Serializing the same object through many fields reuses one ID.
#[test]
fn test_shared_target_gets_one_id() {
    let shared = ListNode::new(9.0);
    let mut holders: Vec<Box<ListNode>> = (0..3).map(|i| ListNode::new(i as f64)).collect();
    for holder in holders.iter_mut() {
        holder.next = &*shared as *const ListNode as *mut ListNode;
    }

    let writer_heap = heap();
    let mut s = Serializer::new(&writer_heap);
    for holder in &holders {
        serialize_node(&mut s, holder);
    }
    serialize_node(&mut s, &shared);
    // Null + three holders + one shared target.
    assert_eq!(s.relocation_map_size(), 5);
    let bytes = s.write_epilogue();

    let mut new_holders: Vec<Box<ListNode>> = (0..3).map(|_| ListNode::new(0.0)).collect();
    let mut new_shared = ListNode::new(0.0);
    let mut reader_heap = heap();
    let mut d = Deserializer::new(&bytes, &mut reader_heap);
    for holder in new_holders.iter_mut() {
        deserialize_node(&mut d, holder);
    }
    deserialize_node(&mut d, &mut new_shared);
    d.flush_relocation_queue();

    let shared_addr = &*new_shared as *const ListNode as usize;
    for holder in &new_holders {
        assert_eq!(holder.next as usize, shared_addr);
    }
}
