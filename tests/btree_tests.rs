// Memtable B-tree tests
// Point insert/lookup, upsert, degree clamp and ordering.

use lightdb::memtable::btree::BTree;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn insert_all(tree: &mut BTree, cases: &[(i64, &str)]) {
    for (key, value) in cases {
        tree.insert(*key, value.to_string()).unwrap();
    }
}

fn assert_all_found(tree: &BTree, cases: &[(i64, &str)]) {
    for (key, value) in cases {
        assert_eq!(
            tree.get(*key).map(String::as_str),
            Some(*value),
            "key {key} not found"
        );
    }
}

// =============================================================================
// Test 1: Smallest degree, keys out of order
// =============================================================================
#[test]
fn insert_small_degree() {
    let mut tree = BTree::new(2);
    let cases = [
        (10, "ten"),
        (20, "twenty"),
        (5, "five"),
        (6, "six"),
        (12, "twelve"),
        (30, "thirty"),
        (7, "seven"),
        (17, "seventeen"),
        (15, "fifteen"),
        (16, "sixteen"),
    ];
    insert_all(&mut tree, &cases);
    assert_all_found(&tree, &cases);

    let keys: Vec<i64> = tree.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![5, 6, 7, 10, 12, 15, 16, 17, 20, 30]);
    assert_eq!(tree.len(), 10);
}

// =============================================================================
// Test 2: Larger degree
// =============================================================================
#[test]
fn insert_large_degree() {
    let mut tree = BTree::new(4);
    let cases = [
        (10, "ten"),
        (20, "twenty"),
        (5, "five"),
        (6, "six"),
        (12, "twelve"),
        (30, "thirty"),
        (7, "seven"),
        (17, "seventeen"),
        (15, "fifteen"),
        (16, "sixteen"),
        (25, "twenty five"),
        (1, "one"),
        (50, "fifty"),
        (11, "eleven"),
    ];
    insert_all(&mut tree, &cases);
    assert_all_found(&tree, &cases);
}

// =============================================================================
// Test 3: Keys never inserted are not found
// =============================================================================
#[test]
fn search_non_existent_keys() {
    let mut tree = BTree::new(2);
    insert_all(&mut tree, &[(10, "ten"), (20, "twenty"), (5, "five"), (6, "six")]);

    for key in [0, 15, 100, -10] {
        assert!(tree.get(key).is_none(), "unexpectedly found {key}");
    }
}

// =============================================================================
// Test 4: Duplicate insert overwrites, size unchanged
// =============================================================================
#[test]
fn duplicate_overwrites() {
    let mut tree = BTree::new(2);
    assert_eq!(tree.insert(10, "ten".into()).unwrap(), None);
    assert_eq!(
        tree.insert(10, "new ten".into()).unwrap().as_deref(),
        Some("ten")
    );

    assert_eq!(tree.get(10).map(String::as_str), Some("new ten"));
    assert_eq!(tree.len(), 1);
}

// =============================================================================
// Test 5: Extreme keys next to zero
// =============================================================================
#[test]
fn boundary_keys() {
    let mut tree = BTree::new(3);
    let cases = [(0, "zero"), (i64::MAX, "maxInt"), (i64::MIN, "minInt")];
    insert_all(&mut tree, &cases);
    assert_all_found(&tree, &cases);

    let keys: Vec<i64> = tree.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![i64::MIN, 0, i64::MAX]);
}

// =============================================================================
// Test 6: Degree 0 and 1 behave like degree 2
// =============================================================================
#[test]
fn degree_is_clamped() {
    let mut shapes = Vec::new();
    for degree in [0, 1, 2] {
        let mut tree = BTree::new(degree);
        assert_eq!(tree.degree(), 2);
        for k in 0..100 {
            tree.insert(k, k.to_string()).unwrap();
        }
        shapes.push((tree.len(), tree.height()));
    }
    assert!(shapes.windows(2).all(|w| w[0] == w[1]));
}

// =============================================================================
// Test 7: Empty value is an invalid argument
// =============================================================================
#[test]
fn empty_value_rejected() {
    let mut tree = BTree::new(2);
    let err = tree.insert(1, String::new()).unwrap_err();
    assert!(matches!(err, lightdb::Error::InvalidArgument(_)));
    assert!(tree.is_empty());
}

// =============================================================================
// Test 8: Random order in, sorted order out
// =============================================================================
#[test]
fn shuffled_inserts_iterate_in_order() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut keys: Vec<i64> = (-5_000..5_000).map(|k| k * 3).collect();
    keys.shuffle(&mut rng);

    let mut tree = BTree::new(3);
    for k in &keys {
        tree.insert(*k, format!("v{k}")).unwrap();
    }

    let collected: Vec<(i64, String)> = tree.iter().map(|(k, v)| (k, v.clone())).collect();
    keys.sort_unstable();
    assert_eq!(collected.len(), keys.len());
    for ((k, v), expected) in collected.iter().zip(&keys) {
        assert_eq!(k, expected);
        assert_eq!(*v, format!("v{expected}"));
    }
}

// =============================================================================
// Test 9: Sequential stress
// =============================================================================
#[test]
fn sequential_stress() {
    let mut tree = BTree::new(3);
    for k in 0..100_000 {
        tree.insert(k, format!("{k:x}")).unwrap();
    }
    for k in 0..100_000 {
        assert_eq!(tree.get(k), Some(&format!("{k:x}")));
    }
    assert!(tree.get(100_000).is_none());
    assert_eq!(tree.len(), 100_000);
}
