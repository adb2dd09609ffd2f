//! YAML document to raw (unresolved) modes.
//!
//! Mode bodies are read as ordered entry lists rather than maps so that a
//! repeated mode name or slot annotation is reported as such, not silently
//! collapsed by the YAML layer.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_yaml::{Mapping, Value};

use super::{parse_annotation, HotkeyEntry, MapError, ModeAction, ModeSwitch, SLOT_COUNT};
use crate::key_action::{KeyAction, SequenceStep};
use crate::keys::parse_combo;

/// A mode as written, before inheritance and target resolution.
#[derive(Debug, Clone)]
pub(crate) struct RawMode {
    pub name: String,
    pub extends: Option<String>,
    pub is_default: bool,
    pub keep_in_stack: bool,
    pub enter: Vec<ModeAction>,
    pub exit: Vec<ModeAction>,
    /// `None` = not defined here (may inherit); `Some(Empty)` = explicit null
    pub slots: [Option<HotkeyEntry<String>>; SLOT_COUNT],
}

/// Mapping entries in document order, duplicates kept.
struct Ordered<V>(Vec<(Value, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Ordered<V> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = Ordered<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(Ordered(Vec::new()))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<Value, V>()? {
                    entries.push(entry);
                }
                Ok(Ordered(entries))
            }
        }

        d.deserialize_any(OrderedVisitor(PhantomData))
    }
}

/// Parse a document into raw modes, in document order.
pub(crate) fn parse_document(yaml: &str) -> Result<Vec<RawMode>, MapError> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: Ordered<Ordered<Value>> = serde_yaml::from_str(yaml)?;
    document
        .0
        .into_iter()
        .map(|(key, body)| {
            let name = scalar_string(&key).ok_or_else(|| {
                MapError::InvalidDocument("mode names must be strings".to_string())
            })?;
            if name.is_empty() {
                return Err(MapError::InvalidDocument("empty mode name".to_string()));
            }
            parse_mode(name, body.0)
        })
        .collect()
}

fn parse_mode(name: String, body: Vec<(Value, Value)>) -> Result<RawMode, MapError> {
    let mut mode = RawMode {
        name,
        extends: None,
        is_default: false,
        keep_in_stack: true,
        enter: Vec::new(),
        exit: Vec::new(),
        slots: std::array::from_fn(|_| None),
    };

    for (key, value) in body {
        let context = format!("mode '{}'", mode.name);
        let key = scalar_string(&key).ok_or_else(|| MapError::InvalidValue {
            context: context.clone(),
            expected: "string keys",
        })?;
        match key.as_str() {
            ":extends" => {
                mode.extends = Some(scalar_string(&value).ok_or(MapError::InvalidValue {
                    context: format!("{context} :extends"),
                    expected: "a mode name",
                })?);
            }
            ":default" => mode.is_default = bool_value(&value, &context, ":default")?,
            ":in-stack" => mode.keep_in_stack = bool_value(&value, &context, ":in-stack")?,
            ":enter" => mode.enter = parse_actions(&value, &format!("{context} :enter"))?,
            ":exit" => mode.exit = parse_actions(&value, &format!("{context} :exit"))?,
            directive if directive.starts_with(':') => {
                return Err(MapError::UnexpectedField {
                    context,
                    field: directive.to_string(),
                });
            }
            annotation => {
                let slot = parse_annotation(annotation).ok_or_else(|| {
                    MapError::InvalidAnnotation {
                        mode: mode.name.clone(),
                        annotation: annotation.to_string(),
                    }
                })? as usize;
                if slot == 0 {
                    return Err(MapError::InvalidSlot {
                        mode: mode.name.clone(),
                        annotation: annotation.to_string(),
                    });
                }
                if mode.slots[slot].is_some() {
                    return Err(MapError::DuplicateSlot {
                        mode: mode.name.clone(),
                        slot,
                    });
                }
                let context = format!("mode '{}' slot '{annotation}'", mode.name);
                mode.slots[slot] = Some(parse_hotkey(&value, &context, true)?);
            }
        }
    }
    Ok(mode)
}

/// Strings, numbers and booleans are all read as text.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn bool_value(value: &Value, context: &str, field: &str) -> Result<bool, MapError> {
    value.as_bool().ok_or_else(|| MapError::InvalidValue {
        context: format!("{context} {field}"),
        expected: "true or false",
    })
}

fn u32_value(value: &Value, context: &str) -> Result<u32, MapError> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| MapError::InvalidValue {
            context: context.to_string(),
            expected: "a non-negative integer",
        })
}

/// A name or list of names.
fn name_list(value: &Value, context: &str) -> Result<Vec<String>, MapError> {
    let invalid = || MapError::InvalidValue {
        context: context.to_string(),
        expected: "a key name or list of key names",
    };
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| scalar_string(item).ok_or_else(invalid))
            .collect(),
        other => scalar_string(other).map(|s| vec![s]).ok_or_else(invalid),
    }
}

fn text_entry(text: &str) -> HotkeyEntry<String> {
    if text.is_empty() {
        HotkeyEntry::Empty
    } else {
        HotkeyEntry::KeySequence(KeyAction::text(text))
    }
}

/// A bare scalar is a key when the whole string names one (`Enter`,
/// `Ctrl+C`, `VK_0D`) and is longer than one character; otherwise it is
/// literal text.
fn scalar_hotkey(text: &str) -> HotkeyEntry<String> {
    if text.chars().count() > 1 {
        if let Ok(combo) = parse_combo(text) {
            if let Some(vk) = combo.key {
                return HotkeyEntry::KeySequence(vec![Arc::new(KeyAction::key(
                    vk,
                    combo.modifiers,
                ))]);
            }
        }
    }
    text_entry(text)
}

const HOTKEY_KINDS: [&str; 6] = ["text", "key", "modifier", "toggle", "sequence", "mode"];

fn parse_hotkey(
    value: &Value,
    context: &str,
    allow_list: bool,
) -> Result<HotkeyEntry<String>, MapError> {
    match value {
        Value::Null => Ok(HotkeyEntry::Empty),
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            let text = scalar_string(value).unwrap_or_default();
            Ok(scalar_hotkey(&text))
        }
        Value::Sequence(items) => {
            if !allow_list {
                return Err(MapError::InvalidHotkey {
                    context: context.to_string(),
                    reason: "multi-tap variants cannot be lists".to_string(),
                });
            }
            if items.is_empty() {
                return Err(MapError::EmptyMultiTap {
                    context: context.to_string(),
                });
            }
            let variants = items
                .iter()
                .enumerate()
                .map(|(i, item)| parse_hotkey(item, &format!("{context} variant {i}"), false))
                .collect::<Result<_, _>>()?;
            Ok(HotkeyEntry::MultiTap(variants))
        }
        Value::Mapping(map) => parse_hotkey_mapping(map, context),
        Value::Tagged(_) => Err(MapError::InvalidValue {
            context: context.to_string(),
            expected: "a hotkey (untagged)",
        }),
    }
}

fn parse_hotkey_mapping(map: &Mapping, context: &str) -> Result<HotkeyEntry<String>, MapError> {
    let kinds: Vec<&str> = HOTKEY_KINDS
        .iter()
        .copied()
        .filter(|kind| map.contains_key(*kind))
        .collect();
    let [kind] = kinds.as_slice() else {
        return Err(MapError::InvalidHotkey {
            context: context.to_string(),
            reason: format!("expected exactly one of {}", HOTKEY_KINDS.join(", ")),
        });
    };
    let kind = *kind;

    for key in map.keys() {
        let name = scalar_string(key).unwrap_or_default();
        if name != kind && !(kind == "toggle" && name == "send") {
            return Err(MapError::UnexpectedField {
                context: context.to_string(),
                field: name,
            });
        }
    }

    let value = map.get(kind).ok_or_else(|| MapError::MissingField {
        context: context.to_string(),
        field: "hotkey kind",
    })?;
    match kind {
        "text" => {
            let text = scalar_string(value).ok_or_else(|| MapError::InvalidValue {
                context: format!("{context} text"),
                expected: "a string",
            })?;
            Ok(text_entry(&text))
        }
        "key" => {
            let actions = name_list(value, context)?
                .iter()
                .map(|name| {
                    let combo = parse_combo(name).map_err(|_| MapError::UnknownKey {
                        context: context.to_string(),
                        name: name.clone(),
                    })?;
                    let vk = combo.key.ok_or_else(|| MapError::InvalidHotkey {
                        context: context.to_string(),
                        reason: format!("'{name}' needs a non-modifier key"),
                    })?;
                    Ok(Arc::new(KeyAction::key(vk, combo.modifiers)))
                })
                .collect::<Result<_, MapError>>()?;
            Ok(HotkeyEntry::KeySequence(actions))
        }
        "modifier" | "toggle" => {
            let send = match map.get("send") {
                Some(v) => bool_value(v, context, "send")?,
                None => false,
            };
            let actions = name_list(value, context)?
                .iter()
                .map(|name| {
                    let combo = parse_combo(name).map_err(|_| MapError::UnknownKey {
                        context: context.to_string(),
                        name: name.clone(),
                    })?;
                    if combo.key.is_some() {
                        return Err(MapError::InvalidHotkey {
                            context: context.to_string(),
                            reason: format!("'{name}' is not a modifier"),
                        });
                    }
                    let action = if kind == "modifier" {
                        KeyAction::add_modifiers(combo.modifiers, true)
                    } else {
                        KeyAction::toggle_modifiers(combo.modifiers, send)
                    };
                    Ok(Arc::new(action))
                })
                .collect::<Result<_, MapError>>()?;
            Ok(HotkeyEntry::KeySequence(actions))
        }
        "sequence" => parse_sequence(value, context),
        _ => parse_mode_switch(value, &format!("{context} mode")),
    }
}

fn parse_sequence(value: &Value, context: &str) -> Result<HotkeyEntry<String>, MapError> {
    let Value::Sequence(items) = value else {
        return Err(MapError::InvalidValue {
            context: format!("{context} sequence"),
            expected: "a list of steps",
        });
    };

    let mut offset = 0u32;
    let mut steps = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let step_context = format!("{context} step {i}");
        if let Some(delay) = item.as_mapping().and_then(|m| m.get("delay")) {
            if item.as_mapping().is_some_and(|m| m.len() > 1) {
                return Err(MapError::InvalidHotkey {
                    context: step_context,
                    reason: "a delay step takes no other fields".to_string(),
                });
            }
            offset = offset.saturating_add(u32_value(delay, &format!("{step_context} delay"))?);
            continue;
        }
        match parse_hotkey(item, &step_context, false)? {
            HotkeyEntry::KeySequence(actions) => {
                steps.extend(actions.into_iter().map(|action| SequenceStep {
                    delay_ms: offset,
                    action,
                }));
            }
            HotkeyEntry::Empty => {}
            HotkeyEntry::ModeSwitch(_) | HotkeyEntry::MultiTap(_) => {
                return Err(MapError::InvalidHotkey {
                    context: step_context,
                    reason: "sequence steps must be keys, text or delays".to_string(),
                });
            }
        }
    }
    Ok(HotkeyEntry::KeySequence(vec![Arc::new(KeyAction::Sequence(
        steps,
    ))]))
}

fn parse_mode_switch(value: &Value, context: &str) -> Result<HotkeyEntry<String>, MapError> {
    let map = value.as_mapping().ok_or_else(|| MapError::InvalidValue {
        context: context.to_string(),
        expected: "a mapping with 'type' and 'to'",
    })?;
    for key in map.keys() {
        let name = scalar_string(key).unwrap_or_default();
        if name != "type" && name != "to" {
            return Err(MapError::UnexpectedField {
                context: context.to_string(),
                field: name,
            });
        }
    }

    let kind = map
        .get("type")
        .ok_or_else(|| MapError::MissingField {
            context: context.to_string(),
            field: "type",
        })?
        .as_str()
        .ok_or_else(|| MapError::InvalidValue {
            context: format!("{context} type"),
            expected: "reset, push, pop or once",
        })?;
    let target = map.get("to").map(|to| {
        scalar_string(to).ok_or_else(|| MapError::InvalidValue {
            context: format!("{context} to"),
            expected: "a mode name",
        })
    });

    let switch = match (kind, target) {
        ("reset" | "pop", Some(_)) => {
            return Err(MapError::UnexpectedField {
                context: format!("{context} ({kind})"),
                field: "to".to_string(),
            });
        }
        ("reset", None) => ModeSwitch::Reset,
        ("pop", None) => ModeSwitch::Pop,
        ("push" | "once", None) => {
            return Err(MapError::MissingField {
                context: format!("{context} ({kind})"),
                field: "to",
            });
        }
        ("push", Some(to)) => ModeSwitch::Push(to?),
        ("once", Some(to)) => ModeSwitch::Once(to?),
        _ => {
            return Err(MapError::InvalidValue {
                context: format!("{context} type"),
                expected: "reset, push, pop or once",
            });
        }
    };
    Ok(HotkeyEntry::ModeSwitch(switch))
}

/// One action mapping or a list of them.
fn parse_actions(value: &Value, context: &str) -> Result<Vec<ModeAction>, MapError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_action(item, &format!("{context} action {i}")))
            .collect(),
        single => Ok(vec![parse_action(single, context)?]),
    }
}

fn parse_action(value: &Value, context: &str) -> Result<ModeAction, MapError> {
    let map = value.as_mapping().ok_or_else(|| MapError::InvalidValue {
        context: context.to_string(),
        expected: "an action mapping",
    })?;
    for key in map.keys() {
        let name = scalar_string(key).unwrap_or_default();
        if !matches!(name.as_str(), "action" | "vibrate" | "message" | "duration") {
            return Err(MapError::UnexpectedField {
                context: context.to_string(),
                field: name,
            });
        }
    }
    let field = |field: &'static str| {
        map.get(field).ok_or_else(|| MapError::MissingField {
            context: context.to_string(),
            field,
        })
    };

    match field("action")?.as_str() {
        Some("vibrate") => {
            let Value::Sequence(pattern) = field("vibrate")? else {
                return Err(MapError::InvalidValue {
                    context: format!("{context} vibrate"),
                    expected: "a list of durations",
                });
            };
            let pattern = pattern
                .iter()
                .map(|v| u32_value(v, &format!("{context} vibrate")))
                .collect::<Result<_, _>>()?;
            Ok(ModeAction::Vibrate(pattern))
        }
        Some("notify") => {
            let message =
                scalar_string(field("message")?).ok_or_else(|| MapError::InvalidValue {
                    context: format!("{context} message"),
                    expected: "a string",
                })?;
            let duration_ms = u32_value(field("duration")?, &format!("{context} duration"))?;
            Ok(ModeAction::Notify {
                message,
                duration_ms,
            })
        }
        _ => Err(MapError::InvalidValue {
            context: format!("{context} action"),
            expected: "vibrate or notify",
        }),
    }
}
