#![no_main]

use std::collections::BTreeSet;

use consistent_tree::{ConsistentTree, Cursor, Unsynchronized};
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Insert(u8),
    Erase(u8),
    Find(u8),
    EraseAt(u8),
    MoveNext(u8),
    MovePrev(u8),
    Drop(u8),
    Clear,
}

type Tree = ConsistentTree<u8, Unsynchronized>;

fn cursor<'a, 'b>(
    cursors: &'b mut [Cursor<'a, u8, Unsynchronized>],
    idx: u8,
) -> Option<&'b mut Cursor<'a, u8, Unsynchronized>> {
    let len = cursors.len();
    if len == 0 {
        None
    } else {
        cursors.get_mut(usize::from(idx) % len)
    }
}

fuzz_target!(|ops: Vec<Op>| {
    let tree = Tree::new();
    let mut reference = BTreeSet::new();
    let mut cursors = Vec::new();

    for op in ops {
        match op {
            Op::Insert(value) => assert_eq!(tree.insert(value), reference.insert(value)),
            Op::Erase(value) => assert_eq!(tree.erase(&value), reference.remove(&value)),
            Op::Find(value) => {
                let found = tree.find(&value);
                assert_eq!(found.is_end(), !reference.contains(&value));
                cursors.push(found);
            }
            Op::EraseAt(idx) => {
                if let Some(cursor) = cursor(&mut cursors, idx) {
                    let erased = tree.erase_at(cursor);
                    if erased {
                        assert!(reference.remove(&cursor.get().unwrap()));
                    }
                }
            }
            Op::MoveNext(idx) => {
                if let Some(cursor) = cursor(&mut cursors, idx) {
                    cursor.move_next();
                    if let Some(value) = cursor.get() {
                        assert!(reference.contains(&value));
                    }
                }
            }
            Op::MovePrev(idx) => {
                if let Some(cursor) = cursor(&mut cursors, idx) {
                    cursor.move_prev();
                    if let Some(value) = cursor.get() {
                        assert!(reference.contains(&value));
                    }
                }
            }
            Op::Drop(idx) => {
                if !cursors.is_empty() {
                    let idx = usize::from(idx) % cursors.len();
                    cursors.swap_remove(idx);
                }
            }
            Op::Clear => {
                tree.clear();
                reference.clear();
            }
        }

        tree.assert_valid();
        assert_eq!(tree.len(), reference.len());
    }

    assert_eq!(tree.to_vec(), reference.iter().copied().collect::<Vec<_>>());
    drop(cursors);
    tree.assert_valid();
});
