//! Integration tests for tap map loading.
//!
//! These go through the public API only: parse and resolve a document,
//! inspect the resolved modes, and round-trip entries through their
//! symbolic form.

use std::sync::Arc;

use tapkey::keys::mods;
use tapkey::output::vk;
use tapkey::tapmap::{
    annotation, load_map_file, parse_annotation, HotkeyEntry, MapError, ModeAction, ModeSwitch,
    ResolvedMap, MAP_FILE_NAME, SLOT_COUNT,
};
use tapkey::KeyAction;

const FULL_MAP: &str = r#"
abstract-common:
  "....." : { mode: { type: reset } }
  "-...." : { mode: { type: pop } }

nav:
  :extends: abstract-common
  :in-stack: false
  :enter: { action: vibrate, vibrate: [30] }
  :exit: { action: notify, message: leaving nav, duration: 800 }
  "----.": Left
  "---.-": Right
  "---..": [Up, PageUp]

symbols:
  :extends: abstract-common
  "----.": "!"
  "---.-": { sequence: [Ctrl+A, { delay: 50 }, Ctrl+C] }

base:
  :extends: abstract-common
  :default: true
  "----.": [e, { mode: { type: once, to: symbols } }]
  "---.-": hello
  "---..": { mode: { type: push, to: nav } }
  "--.--": { modifier: [Ctrl, Shift] }
  "--.-.": { toggle: Alt, send: true }
"#;

fn full() -> ResolvedMap {
    FULL_MAP.parse().unwrap()
}

// ── Default placement and ordering ──

#[test]
fn default_mode_is_index_zero() {
    let map = full();
    assert_eq!(map.default_mode().name, "base");
    assert_eq!(map.modes()[0].name, "base");
    assert!(map.modes()[0].is_default);
    assert!(map.modes()[1..].iter().all(|m| !m.is_default));
    assert_eq!(map.index_of(""), Some(0));
}

#[test]
fn abstract_parent_is_not_a_mode() {
    let map = full();
    assert_eq!(map.len(), 3);
    assert_eq!(map.index_of("abstract-common"), None);
    for mode in map.modes() {
        assert_eq!(
            mode.slots[31],
            HotkeyEntry::ModeSwitch(ModeSwitch::Reset),
            "{} inherits reset",
            mode.name
        );
    }
}

// ── Inheritance merge ──

#[test]
fn child_slots_are_union_of_own_and_inherited() {
    let map = full();
    let nav = map.mode(map.index_of("nav").unwrap()).unwrap();
    let bound: Vec<usize> = (1..SLOT_COUNT).filter(|&s| !nav.slots[s].is_empty()).collect();
    assert_eq!(bound, vec![1, 2, 3, 15, 31]);
    assert!(!nav.keep_in_stack);
    assert_eq!(nav.enter, vec![ModeAction::Vibrate(vec![30])]);
}

#[test]
fn inheritance_chain_three_deep() {
    let map: ResolvedMap = r#"
leaf:
  :extends: middle
  :default: true
  "----.": l
middle:
  :extends: root
  "---.-": m
root:
  "---..": r
"#
    .parse()
    .unwrap();
    let leaf = map.default_mode();
    assert_eq!(leaf.slots[1], HotkeyEntry::KeySequence(KeyAction::text("l")));
    assert_eq!(leaf.slots[2], HotkeyEntry::KeySequence(KeyAction::text("m")));
    assert_eq!(leaf.slots[3], HotkeyEntry::KeySequence(KeyAction::text("r")));
}

#[test]
fn conflict_anywhere_in_chain_is_reported() {
    let err = r#"
root:
  "----.": r
middle:
  :extends: root
leaf:
  :extends: middle
  :default: true
  "----.": l
"#
    .parse::<ResolvedMap>()
    .unwrap_err();
    assert!(matches!(
        err,
        MapError::ConflictingHotkey { mode, parent, slot: 1 } if mode == "leaf" && parent == "middle"
    ));
}

// ── Cycle detection ──

#[test]
fn extends_cycle_is_rejected() {
    let err = r#"
a:
  :default: true
  :extends: c
b:
  :extends: a
c:
  :extends: b
"#
    .parse::<ResolvedMap>()
    .unwrap_err();
    match err {
        MapError::CircularExtends { chain } => {
            assert_eq!(chain.first(), chain.last());
            assert_eq!(chain.len(), 4);
        }
        other => panic!("expected cycle, got {other}"),
    }
}

// ── Entry shapes ──

#[test]
fn entry_kinds_resolve() {
    let map = full();
    let base = map.default_mode();
    let symbols = map.index_of("symbols").unwrap();
    let nav = map.index_of("nav").unwrap();

    assert_eq!(
        base.slots[1],
        HotkeyEntry::MultiTap(vec![
            HotkeyEntry::KeySequence(KeyAction::text("e")),
            HotkeyEntry::ModeSwitch(ModeSwitch::Once(symbols)),
        ])
    );
    assert_eq!(base.slots[3], HotkeyEntry::ModeSwitch(ModeSwitch::Push(nav)));
    // One action per list item
    assert_eq!(
        base.slots[4],
        HotkeyEntry::KeySequence(vec![
            Arc::new(KeyAction::add_modifiers(mods::LCTRL, true)),
            Arc::new(KeyAction::add_modifiers(mods::LSHIFT, true)),
        ])
    );

    let HotkeyEntry::KeySequence(actions) = &map.mode(symbols).unwrap().slots[2] else {
        panic!("sequence slot");
    };
    assert_eq!(actions.len(), 1);
    assert!(actions[0].is_sequence());
    assert_eq!(
        actions[0].to_string(),
        "sequence[Ctrl+A@0ms, Ctrl+C@50ms]"
    );
}

#[test]
fn modifier_combo_is_one_action() {
    let map: ResolvedMap = r#"
base:
  :default: true
  "----.": { modifier: Ctrl+Shift }
"#
    .parse()
    .unwrap();
    assert_eq!(
        map.default_mode().slots[1],
        HotkeyEntry::KeySequence(vec![Arc::new(KeyAction::add_modifiers(
            mods::LCTRL | mods::LSHIFT,
            true
        ))])
    );
}

#[test]
fn multitap_pending_depends_on_chain_length() {
    let map = full();
    let nav = map.mode(map.index_of("nav").unwrap()).unwrap();
    let chain = &nav.slots[3];
    assert!(chain.should_stay_pending(0));
    assert!(!chain.should_stay_pending(1));
    assert_eq!(
        chain.select(1),
        &HotkeyEntry::KeySequence(vec![Arc::new(KeyAction::key(vk::PRIOR, 0))])
    );
    // Wraps around
    assert_eq!(chain.select(2), chain.select(0));
    assert!(!nav.slots[1].should_stay_pending(0));
}

// ── Round-trip resolution ──

#[test]
fn symbolic_entries_resolve_back() {
    let map = full();
    for mode in 0..map.len() {
        for slot in 1..SLOT_COUNT {
            let symbolic = map.symbolic_entry(mode, slot).unwrap();
            let resolved = map.resolve_entry(&symbolic).unwrap();
            assert_eq!(resolved, map.modes()[mode].slots[slot], "mode {mode} slot {slot}");
        }
    }
    assert_eq!(map.symbolic_entry(0, SLOT_COUNT), None);
    assert_eq!(map.symbolic_entry(map.len(), 1), None);
}

#[test]
fn symbolic_entry_names_targets() {
    let map = full();
    assert_eq!(
        map.symbolic_entry(0, 3),
        Some(HotkeyEntry::ModeSwitch(ModeSwitch::Push("nav".to_string())))
    );
    let unknown = HotkeyEntry::ModeSwitch(ModeSwitch::Push("gone".to_string()));
    assert!(matches!(
        map.resolve_entry(&unknown),
        Err(MapError::UnknownModeTarget { target, .. }) if target == "gone"
    ));
}

// ── Annotations, dump, fallback ──

#[test]
fn annotation_roundtrip_all_masks() {
    for mask in 0u8..32 {
        assert_eq!(parse_annotation(&annotation(mask)), Some(mask));
    }
    assert_eq!(annotation(1), "----.");
    assert_eq!(parse_annotation(".----"), Some(16));
}

#[test]
fn dump_lists_modes_and_slots() {
    let dump = full().to_string();
    assert!(dump.starts_with("Mode 0: base\n"));
    assert!(dump.contains("ModeSwitch(push, nav)"));
    assert!(dump.contains("Text(\"hello\")"));
    assert!(!dump.contains("abstract-common"));
}

#[test]
fn fallback_map_types_question_marks() {
    let map = ResolvedMap::default();
    assert_eq!(map.len(), 1);
    for slot in 1..SLOT_COUNT {
        assert_eq!(
            map.default_mode().slots[slot],
            HotkeyEntry::KeySequence(KeyAction::text("?"))
        );
    }
}

#[test]
fn failed_load_reports_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(MAP_FILE_NAME);
    std::fs::write(&path, "a: {}\n").unwrap();
    assert!(matches!(load_map_file(&path), Err(MapError::NoDefaultMap)));

    std::fs::write(&path, "a: [unclosed\n").unwrap();
    assert!(matches!(load_map_file(&path), Err(MapError::Parse { .. })));

    std::fs::write(&path, FULL_MAP).unwrap();
    assert_eq!(load_map_file(&path).unwrap().len(), 3);
}
