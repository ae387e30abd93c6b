use std::collections::BTreeMap;

use crate::partial::Partial;
use crate::value::Value;

impl Partial {
    /// Deep-merge `overlay` into `self`.
    ///
    /// Keys only in `overlay` are copied over. When both sides hold a tree for
    /// the same key the merge recurses; otherwise `overlay`'s value wins.
    pub fn merge(&mut self, overlay: Partial) {
        deep_merge(self.entries_mut(), overlay.into_entries());
    }
}

fn deep_merge(base: &mut BTreeMap<String, Value>, overlay: BTreeMap<String, Value>) {
    for (key, overlay_val) in overlay {
        match (base.remove(&key), overlay_val) {
            (Some(Value::Partial(mut base_tree)), Value::Partial(overlay_tree)) => {
                deep_merge(base_tree.entries_mut(), overlay_tree.into_entries());
                base.insert(key, Value::Partial(base_tree));
            }
            (_, overlay_val) => {
                base.insert(key, overlay_val);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::partial::{ConfigRead, Partial};
    use crate::value::Value;

    fn tree(json: &str) -> Partial {
        serde_json::from_str(json).unwrap()
    }

    fn merged(base: &str, overlay: &str) -> Partial {
        let mut base = tree(base);
        base.merge(tree(overlay));
        base
    }

    #[test]
    fn disjoint_keys_merge() {
        let m = merged(r#"{"host": "localhost"}"#, r#"{"port": 3000}"#);
        assert_eq!(m.string("host").unwrap(), "localhost");
        assert_eq!(m.int("port").unwrap(), 3000);
    }

    #[test]
    fn same_scalar_key_overlay_wins() {
        let m = merged(r#"{"port": 8080}"#, r#"{"port": 3000}"#);
        assert_eq!(m.int("port").unwrap(), 3000);
    }

    #[test]
    fn nested_trees_recurse() {
        let m = merged(
            r#"{"database": {"url": "postgres://old", "pool_size": 5}}"#,
            r#"{"database": {"pool_size": 20}}"#,
        );
        assert_eq!(m.string("database.url").unwrap(), "postgres://old");
        assert_eq!(m.int("database.pool_size").unwrap(), 20);
    }

    #[test]
    fn overlay_scalar_replaces_tree() {
        let m = merged(r#"{"database": {"url": "x"}}"#, r#"{"database": "flat"}"#);
        assert_eq!(m.string("database").unwrap(), "flat");
    }

    #[test]
    fn overlay_tree_replaces_scalar() {
        let m = merged(r#"{"database": "flat"}"#, r#"{"database": {"url": "x"}}"#);
        assert_eq!(m.string("database.url").unwrap(), "x");
    }

    #[test]
    fn lists_are_replaced_not_concatenated() {
        let m = merged(r#"{"tags": ["a", "b"]}"#, r#"{"tags": ["c"]}"#);
        assert_eq!(m.list("tags").unwrap(), vec![Value::from("c")]);
    }

    #[test]
    fn empty_overlay_returns_base() {
        let base = tree(r#"{"port": 8080}"#);
        let mut m = base.clone();
        m.merge(Partial::new());
        assert_eq!(m, base);
    }

    #[test]
    fn empty_base_returns_overlay() {
        let overlay = tree(r#"{"port": 3000}"#);
        let mut m = Partial::new();
        m.merge(overlay.clone());
        assert_eq!(m, overlay);
    }

    #[test]
    fn deeply_nested_three_levels() {
        let m = merged(
            r#"{"a": {"b": {"c": {"val": 1, "other": "keep"}}}}"#,
            r#"{"a": {"b": {"c": {"val": 99}}}}"#,
        );
        assert_eq!(m.int("a.b.c.val").unwrap(), 99);
        assert_eq!(m.string("a.b.c.other").unwrap(), "keep");
    }

    #[test]
    fn multiple_sequential_merges() {
        let mut m = tree(r#"{"host": "a"}"#);
        m.merge(tree(r#"{"port": 1000}"#));
        m.merge(tree(r#"{"host": "c"}"#));
        assert_eq!(m.string("host").unwrap(), "c");
        assert_eq!(m.int("port").unwrap(), 1000);
    }
}
