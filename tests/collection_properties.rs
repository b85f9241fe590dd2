//! Property-based tests for the indexed collection and record identity.
//!
//! These use proptest to verify invariants hold across randomly generated
//! inputs: key uniqueness, filter/intersection equivalence, index
//! consistency under mutation, id determinism, and parse/serialize round
//! trips of generated files.

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;

use nagdata::core::collection::Collection;
use nagdata::core::record::Record;
use nagdata::core::registry::Registry;
use nagdata::core::types::{ObjectId, Value};
use nagdata::parse::parse_objects;

fn host_record(registry: &Registry, name: &str, address: &str) -> Record {
    let mut record = registry.new_record("host").unwrap();
    record.set("host_name", name);
    record.set("address", address);
    record
}

fn ids(records: Vec<&Record>) -> BTreeSet<ObjectId> {
    records.into_iter().map(|r| r.id().clone()).collect()
}

proptest! {
    /// Adds succeed exactly once per distinct key; rejected adds leave the
    /// collection unchanged; no observable state ever holds two members
    /// with one key.
    #[test]
    fn uniqueness_holds_across_add_sequences(
        names in prop::collection::vec("[a-z]{1,6}", 1..40),
    ) {
        let registry = Registry::builtin();
        let mut coll = Collection::new();
        let mut seen = BTreeSet::new();
        for name in &names {
            let result = coll.add(host_record(&registry, name, "10.0.0.1"));
            if seen.insert(name.clone()) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(result.is_err());
            }
            prop_assert_eq!(coll.len(), seen.len());
        }

        let mut keys = BTreeSet::new();
        for record in coll.all() {
            prop_assert!(keys.insert(record.get("host_name").unwrap().render()));
        }
    }

    /// filter(a, b) is exactly filter(a) ∩ filter(b).
    #[test]
    fn filter_is_set_intersection(
        hosts in prop::collection::vec(("[a-z]{1,6}", 0u8..3, 0u8..3), 1..30),
    ) {
        let registry = Registry::builtin();
        let mut coll = Collection::new();
        for (name, addr, alias) in &hosts {
            let mut record = registry.new_record("host").unwrap();
            record.set("host_name", name.as_str());
            record.set("address", format!("10.0.0.{addr}"));
            record.set("alias", format!("alias{alias}"));
            // Duplicate names are rejected; that's fine here.
            let _ = coll.add(record);
        }

        for addr in 0..3u8 {
            for alias in 0..3u8 {
                let a = Value::text(format!("10.0.0.{addr}"));
                let b = Value::text(format!("alias{alias}"));
                let both = ids(coll.filter(&[
                    ("address", a.clone()),
                    ("alias", b.clone()),
                ]));
                let left = ids(coll.filter(&[("address", a)]));
                let right = ids(coll.filter(&[("alias", b)]));
                let manual: BTreeSet<ObjectId> =
                    left.intersection(&right).cloned().collect();
                prop_assert_eq!(both, manual);
            }
        }
    }

    /// After any sequence of mutations, every index bucket contains exactly
    /// the records whose current value matches.
    #[test]
    fn index_tracks_mutations(
        ops in prop::collection::vec((0usize..5, 0u8..4), 0..40),
    ) {
        let registry = Registry::builtin();
        let names = ["alpha", "bravo", "charlie", "delta", "echo"];
        let mut coll = Collection::new();
        let mut member_ids = Vec::new();
        let mut model: HashMap<usize, String> = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            let id = coll.add(host_record(&registry, name, "10.0.0.0")).unwrap();
            member_ids.push(id);
            model.insert(i, "10.0.0.0".to_string());
        }

        for (index, octet) in ops {
            let address = format!("10.0.0.{octet}");
            coll.set(&member_ids[index], "address", address.as_str()).unwrap();
            model.insert(index, address);
        }

        for octet in 0..4u8 {
            let address = format!("10.0.0.{octet}");
            let found: BTreeSet<String> = coll
                .filter(&[("address", Value::text(address.clone()))])
                .iter()
                .map(|r| r.get("host_name").unwrap().render())
                .collect();
            let expected: BTreeSet<String> = model
                .iter()
                .filter(|(_, a)| **a == address)
                .map(|(i, _)| names[*i].to_string())
                .collect();
            prop_assert_eq!(found, expected);
        }
    }

    /// A record's keyed id depends only on kind and key values.
    #[test]
    fn keyed_id_is_deterministic(name in "[a-z]{1,8}", other in "[a-z]{1,8}") {
        let registry = Registry::builtin();
        let a = host_record(&registry, &name, "10.0.0.1");
        let b = host_record(&registry, &name, "10.0.0.2");
        prop_assert_eq!(a.id(), b.id());

        let c = host_record(&registry, &other, "10.0.0.1");
        if name != other {
            prop_assert_ne!(a.id(), c.id());
        } else {
            prop_assert_eq!(a.id(), c.id());
        }
    }

    /// serialize(parse(text)) == text for generated well-formed files.
    #[test]
    fn generated_object_files_roundtrip(
        hosts in prop::collection::vec(("[a-z]{1,8}", 0u16..256), 1..10),
    ) {
        let mut text = String::from("# generated fleet\n\n");
        for (name, octet) in &hosts {
            text.push_str(&format!(
                "define host {{\n\thost_name\t{}\n\taddress\t\t10.0.0.{}\n\t}}\n\n",
                name, octet
            ));
        }

        let registry = Registry::builtin();
        let batch = parse_objects(&registry, &text).unwrap();
        let out: String = batch.iter().map(|r| r.render()).collect();
        prop_assert_eq!(out, text);
    }
}
