/// Unit tests for TypeTag and RuleKey

use instantiator::{tag_of, Mode, RuleKey, TypeTag};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};

struct DatabaseFactory;
struct CacheFactory;

#[test]
fn test_type_tag_equality_uses_type_id() {
    let a = TypeTag::of::<DatabaseFactory>();
    let b = tag_of::<DatabaseFactory>();
    let c = TypeTag::of::<CacheFactory>();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.type_id(), TypeId::of::<DatabaseFactory>());

    // Names are informational only.
    let renamed = TypeTag::new(TypeId::of::<DatabaseFactory>(), "renamed");
    assert_eq!(a, renamed);
}

#[test]
fn test_type_tag_hash_consistency() {
    let mut set = HashSet::new();
    set.insert(TypeTag::of::<DatabaseFactory>());
    set.insert(TypeTag::new(TypeId::of::<DatabaseFactory>(), "other"));
    set.insert(TypeTag::of::<CacheFactory>());
    assert_eq!(set.len(), 2);
}

#[test]
fn test_type_tag_display() {
    let tag = TypeTag::of::<DatabaseFactory>();
    assert_eq!(tag.to_string(), tag.display_name());
    assert!(tag.display_name().ends_with("DatabaseFactory"));
    assert_eq!(TypeTag::of::<String>().display_name(), "alloc::string::String");
}

#[test]
fn test_rule_key_identity() {
    let tag = TypeTag::of::<DatabaseFactory>();
    let test = RuleKey::new(tag, Mode::from("test"));
    let default = RuleKey::new(tag, Mode::DEFAULT);
    let other = RuleKey::new(TypeTag::of::<CacheFactory>(), Mode::from("test"));

    assert_ne!(test, default);
    assert_ne!(test, other);
    assert_eq!(test, RuleKey::new(tag, Mode::from(String::from("test"))));

    let mut slots = HashMap::new();
    slots.insert(test.clone(), 1);
    slots.insert(default.clone(), 2);
    slots.insert(other.clone(), 3);
    assert_eq!(slots[&test], 1);
    assert_eq!(slots.len(), 3);
}

#[test]
fn test_rule_key_accessors_and_display() {
    let key = RuleKey::new(TypeTag::of::<CacheFactory>(), Mode::from("staging"));

    assert_eq!(key.declaring(), TypeTag::of::<CacheFactory>());
    assert_eq!(key.mode(), "staging");
    assert!(key.display_name().ends_with("CacheFactory"));
    assert_eq!(key.to_string(), format!("{}[staging]", key.display_name()));
}
