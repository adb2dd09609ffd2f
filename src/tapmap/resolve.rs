//! Inheritance merge and target resolution.
//!
//! Raw modes arrive in document order. Resolution orders parents before
//! children, merges inherited slots, drops abstract modes, moves the default
//! mode to index 0 and finally rewrites every symbolic mode-switch target.

use std::collections::HashMap;

use tracing::debug;

use super::document::RawMode;
use super::{HotkeyEntry, MapError, Mode, ResolvedMap, ABSTRACT_PREFIX, SLOT_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Parent-before-child order over `parent` edges.
///
/// Every mode has at most one parent, so each walk is a single chain: it
/// follows parents until it reaches a finished node or a root, then emits
/// the chain root-first.
fn resolve_order(parent: &[Option<usize>], names: &[String]) -> Result<Vec<usize>, MapError> {
    let mut marks = vec![Mark::Unvisited; parent.len()];
    let mut order = Vec::with_capacity(parent.len());

    for start in 0..parent.len() {
        let mut path: Vec<usize> = Vec::new();
        let mut cur = Some(start);
        while let Some(node) = cur {
            match marks[node] {
                Mark::Done => break,
                Mark::InProgress => {
                    let from = path.iter().position(|&n| n == node).unwrap_or(0);
                    let mut chain: Vec<String> =
                        path[from..].iter().map(|&n| names[n].clone()).collect();
                    chain.push(names[node].clone());
                    return Err(MapError::CircularExtends { chain });
                }
                Mark::Unvisited => {
                    marks[node] = Mark::InProgress;
                    path.push(node);
                    cur = parent[node];
                }
            }
        }
        for &node in path.iter().rev() {
            marks[node] = Mark::Done;
            order.push(node);
        }
    }
    Ok(order)
}

/// Rewrite the mode-switch targets of one entry through `index`.
pub(super) fn resolve_targets(
    entry: &HotkeyEntry<String>,
    index: &HashMap<String, usize>,
    mode: &str,
) -> Result<HotkeyEntry, MapError> {
    entry.map_targets(&mut |target: &String| {
        index
            .get(target)
            .copied()
            .ok_or_else(|| MapError::UnknownModeTarget {
                mode: mode.to_string(),
                target: target.clone(),
            })
    })
}

pub(crate) fn resolve(mut raw: Vec<RawMode>) -> Result<ResolvedMap, MapError> {
    // 1. Provisional indices
    let mut provisional = HashMap::with_capacity(raw.len());
    for (i, mode) in raw.iter().enumerate() {
        if provisional.insert(mode.name.clone(), i).is_some() {
            return Err(MapError::DuplicateModeName(mode.name.clone()));
        }
    }
    let names: Vec<String> = raw.iter().map(|m| m.name.clone()).collect();

    // 2. child -> parent edges
    let parent = raw
        .iter()
        .map(|mode| match &mode.extends {
            None => Ok(None),
            Some(p) => provisional
                .get(p)
                .copied()
                .map(Some)
                .ok_or_else(|| MapError::UnknownExtends {
                    mode: mode.name.clone(),
                    parent: p.clone(),
                }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    // 3. Parents first
    let order = resolve_order(&parent, &names)?;

    // 4. Merge inherited slots
    for &child in &order {
        let Some(p) = parent[child] else {
            continue;
        };
        let inherited = raw[p].slots.clone();
        let mode = &mut raw[child];
        for slot in 1..SLOT_COUNT {
            match (&mode.slots[slot], &inherited[slot]) {
                (Some(_), Some(_)) => {
                    return Err(MapError::ConflictingHotkey {
                        mode: mode.name.clone(),
                        parent: names[p].clone(),
                        slot,
                    });
                }
                (None, Some(entry)) => mode.slots[slot] = Some(entry.clone()),
                _ => {}
            }
        }
    }

    // 5. Drop abstract modes, default first
    let concrete: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&i| !names[i].starts_with(ABSTRACT_PREFIX))
        .collect();
    let defaults: Vec<usize> = concrete
        .iter()
        .copied()
        .filter(|&i| raw[i].is_default)
        .collect();
    let default = match defaults.as_slice() {
        [] => return Err(MapError::NoDefaultMap),
        [only] => *only,
        many => {
            return Err(MapError::MultipleDefaultMaps(
                many.iter().map(|&i| names[i].clone()).collect(),
            ))
        }
    };
    let final_order: Vec<usize> = std::iter::once(default)
        .chain(concrete.iter().copied().filter(|&i| i != default))
        .collect();

    let mut index: HashMap<String, usize> = final_order
        .iter()
        .enumerate()
        .map(|(final_idx, &i)| (names[i].clone(), final_idx))
        .collect();
    index.insert(String::new(), 0);

    // 6. Symbolic targets to indices
    let modes = final_order
        .iter()
        .map(|&i| {
            let raw_mode = &raw[i];
            let mut slots: [HotkeyEntry; SLOT_COUNT] = std::array::from_fn(|_| HotkeyEntry::Empty);
            for (slot, entry) in raw_mode.slots.iter().enumerate().skip(1) {
                if let Some(entry) = entry {
                    slots[slot] = resolve_targets(entry, &index, &raw_mode.name)?;
                }
            }
            Ok(Mode {
                name: raw_mode.name.clone(),
                slots,
                is_default: raw_mode.is_default,
                keep_in_stack: raw_mode.keep_in_stack,
                enter: raw_mode.enter.clone(),
                exit: raw_mode.exit.clone(),
            })
        })
        .collect::<Result<Vec<_>, MapError>>()?;

    debug!(
        "resolved {} mode(s) from {} definition(s), default '{}'",
        modes.len(),
        raw.len(),
        names[default]
    );
    Ok(ResolvedMap::new(modes))
}
