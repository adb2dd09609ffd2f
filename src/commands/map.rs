//! Tap map inspection commands

use std::path::PathBuf;

use tapkey::tapmap::{annotation, HotkeyEntry, SLOT_COUNT};
use tapkey::Settings;

/// Validate a map and print one line per mode
pub fn check(settings: &Settings, map: Option<PathBuf>) -> anyhow::Result<()> {
    let map = super::load_map(settings, map)?;
    println!(
        "OK: {} mode(s), default '{}'",
        map.len(),
        map.default_mode().name
    );
    for (i, mode) in map.modes().iter().enumerate() {
        let bound = mode.slots.iter().filter(|e| !e.is_empty()).count();
        let multitap = mode
            .slots
            .iter()
            .filter(|e| matches!(e, HotkeyEntry::MultiTap(_)))
            .count();
        let mut flags = Vec::new();
        if !mode.keep_in_stack {
            flags.push("transient");
        }
        if !mode.enter.is_empty() {
            flags.push("enter");
        }
        if !mode.exit.is_empty() {
            flags.push("exit");
        }
        println!(
            "  {i:2} {:<20} {bound:2}/{} bound, {multitap} multi-tap {}",
            mode.name,
            SLOT_COUNT - 1,
            if flags.is_empty() {
                String::new()
            } else {
                format!("[{}]", flags.join(", "))
            }
        );
    }

    let unbound: Vec<String> = (1..SLOT_COUNT)
        .filter(|&slot| map.default_mode().slots[slot].is_empty())
        .map(|slot| annotation(slot as u8))
        .collect();
    if !unbound.is_empty() {
        println!("Unbound in default mode: {}", unbound.join(" "));
    }
    Ok(())
}

/// Print the full mode/slot dump
pub fn dump(settings: &Settings, map: Option<PathBuf>) -> anyhow::Result<()> {
    let map = super::load_map(settings, map)?;
    print!("{map}");
    Ok(())
}
