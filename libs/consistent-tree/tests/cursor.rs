mod common;

use std::collections::BTreeSet;

use common::{shuffled, sorted};
use consistent_tree::{ConsistentTree, Cursor, Unsynchronized};

type Tree = ConsistentTree<i32, Unsynchronized>;

/// One cursor per element, in ascending order, collected by walking from `begin`.
fn walk(tree: &Tree) -> Vec<Cursor<'_, i32, Unsynchronized>> {
    let mut cursors = Vec::new();
    let mut cursor = tree.begin();
    while !cursor.is_end() {
        cursors.push(cursor.clone());
        cursor.move_next();
    }
    cursors
}

#[test]
fn forward_walk_visits_elements_in_order() {
    let values = shuffled(0, 1000);
    let tree: Tree = values.iter().copied().collect();
    let reference: BTreeSet<_> = values.into_iter().collect();

    let visited: Vec<_> = walk(&tree).iter().map(|c| c.get().unwrap()).collect();
    assert_eq!(visited, sorted(&reference));
    assert_eq!(tree.iter().collect::<Vec<_>>(), visited);
}

#[test]
fn held_cursors_defer_reclamation() {
    let values = shuffled(0, 1000);
    let tree: Tree = values.iter().copied().collect();

    let cursors = walk(&tree);
    let mut last = cursors[0].clone();
    for cursor in &cursors[1..] {
        last.move_next();
        assert_eq!(*cursor, last);
    }

    for value in &values {
        tree.erase(value);
        assert_eq!(tree.reclaimed(), 0);
    }

    // `last` still holds the greatest element
    drop(cursors);
    assert_eq!(tree.reclaimed(), values.len() - 1);
    drop(last);
    assert_eq!(tree.reclaimed(), values.len());
    tree.assert_valid();
}

#[test]
fn erase_through_held_cursors() {
    let values = shuffled(0, 1000);
    let tree: Tree = values.iter().copied().collect();
    let mut reference: BTreeSet<_> = values.iter().copied().collect();

    let cursors: Vec<_> = values.iter().map(|v| tree.find(v)).collect();
    for (i, cursor) in cursors.iter().enumerate() {
        if i % 2 == 1 {
            assert!(tree.erase_at(cursor));
            reference.remove(&cursor.get().unwrap());
            assert_eq!(tree.find(&values[i]), tree.end());
        }
        assert_eq!(tree.to_vec(), sorted(&reference));
    }
}

#[test]
fn move_next_skips_erased_elements() {
    let tree: Tree = (1..=5).collect();
    let mut it1 = tree.find(&1);
    let mut it2 = tree.find(&2);
    let mut it3 = tree.find(&3);
    let mut it4 = tree.find(&4);
    let it5 = tree.find(&5);

    tree.erase_at(&it2);
    tree.erase_at(&it3);
    tree.erase_at(&it5);

    it1.move_next();
    assert_eq!(it1, it4);
    it2.move_next();
    assert_eq!(it2, it4);
    it3.move_next();
    assert_eq!(it3, it4);
    it4.move_next();
    assert_eq!(it4, tree.end());

    // 2 and 3 were released by moving away from them, 5 is still held
    assert_eq!(tree.reclaimed(), 2);
    drop(it5);
    assert_eq!(tree.reclaimed(), 3);
}

#[test]
fn move_prev_walks_back_from_end() {
    let tree: Tree = shuffled(0, 10).into_iter().collect();
    let cursors = walk(&tree);

    let mut cursor = tree.end();
    for expected in cursors.iter().rev() {
        cursor.move_prev();
        assert_eq!(*expected, cursor);
    }
    cursor.move_prev();
    assert!(cursor.is_end());
}

#[test]
fn move_prev_skips_erased_elements() {
    let tree: Tree = shuffled(0, 10).into_iter().collect();
    let old = walk(&tree);

    tree.clear();
    for value in 1..=5 {
        tree.insert(value);
    }

    let it1 = tree.find(&1);
    let mut it2 = tree.find(&2);
    let mut it3 = tree.find(&3);
    let mut it4 = tree.find(&4);
    let mut it5 = tree.find(&5);

    tree.erase_at(&it2);
    tree.erase_at(&it3);
    tree.erase_at(&it5);

    it2.move_prev();
    assert_eq!(it2, it1);
    it3.move_prev();
    assert_eq!(it3, it1);
    it5.move_prev();
    assert_eq!(it5, it4);
    it4.move_prev();
    assert_eq!(it4, it1);

    // the cursors from before the clear only ever reach the end
    for mut cursor in old {
        assert!(cursor.is_erased());
        cursor.move_prev();
        assert!(cursor.is_end());
    }
    assert_eq!(tree.to_vec(), [1, 4]);
    tree.assert_valid();
}

#[test]
fn cursors_of_different_trees_differ() {
    let a: Tree = (0..3).collect();
    let b: Tree = (0..3).collect();
    assert_ne!(a.end(), b.end());
    assert_ne!(a.find(&1), b.find(&1));
    assert_eq!(a.find(&1), a.find(&1));
}
