//! Property checks for set bookkeeping and set naming.

use std::fs;

use fontlink_core::discovery::InstalledFonts;
use fontlink_core::font_set::{FontEnv, FontSet};
use fontlink_core::link::LinkEngine;
use fontlink_core::naming::unique_name;
use proptest::prelude::*;

const NAMES: [&str; 6] = ["A.ttf", "B.otf", "C.pfb", "D.woff", "Sys.ttf", "Gone.ttf"];

#[derive(Debug, Clone)]
enum Op {
    Add(Vec<(usize, bool)>),
    Remove(Vec<usize>),
    RemoveAll,
    Toggle(usize),
    SetAll(bool),
    ToggleAll,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec((0..NAMES.len(), any::<bool>()), 0..4).prop_map(Op::Add),
        prop::collection::vec(0usize..8, 0..4).prop_map(Op::Remove),
        Just(Op::RemoveAll),
        (0usize..8).prop_map(Op::Toggle),
        any::<bool>().prop_map(Op::SetAll),
        Just(Op::ToggleAll),
    ]
}

proptest! {
    #[test]
    fn active_count_matches_enabled_entries(ops in prop::collection::vec(op(), 1..24)) {
        let temp = tempfile::tempdir().expect("tempdir");
        for name in &NAMES[..5] {
            fs::write(temp.path().join(name), b"").unwrap();
        }
        let installed: InstalledFonts = ["/usr/share/fonts/Sys.ttf"].into_iter().collect();
        let env = FontEnv::new(temp.path().join("fonts"), installed);
        let mut engine = LinkEngine::detached();
        let mut set = FontSet::new();

        for op in ops {
            match op {
                Op::Add(items) => {
                    let items = items
                        .into_iter()
                        .map(|(i, enabled)| (temp.path().join(NAMES[i]), enabled));
                    set.add(items, &env, &mut engine);
                }
                Op::Remove(indices) => set.remove(Some(indices.as_slice()), &mut engine),
                Op::RemoveAll => set.remove(None, &mut engine),
                Op::Toggle(index) => {
                    set.toggle(index, &mut engine);
                }
                Op::SetAll(enabled) => set.set_all(enabled, &mut engine),
                Op::ToggleAll => set.toggle_all(&mut engine),
            }

            let enabled = set.entries().iter().filter(|e| e.is_enabled()).count();
            prop_assert_eq!(set.active_count(), enabled);

            let holding = set
                .entries()
                .iter()
                .filter(|e| e.is_enabled() && e.is_linkable())
                .count();
            prop_assert_eq!(engine.len(), holding);

            for entry in set.entries() {
                prop_assert!(entry.is_linkable() || entry.is_enabled());
            }
        }
    }

    #[test]
    fn unique_name_avoids_existing(
        candidate in "[A-Za-z]{1,6}( #[0-9]{1,2})?",
        existing in prop::collection::vec("[A-Za-z]{1,6}( #[0-9]{1,2})?", 0..8),
    ) {
        let name = unique_name(&candidate, &existing);

        prop_assert!(!existing.contains(&name));
        if !existing.contains(&candidate) {
            prop_assert_eq!(name, candidate);
        }
    }
}
