//! Link engine behaviour against real symlinks on disk.
#![cfg(unix)]

use std::fs;
use std::path::Path;

use fontlink_core::link::{LinkEngine, LinkGroup, LinkPair};
use proptest::prelude::*;

fn group(src: &Path, fonts: &Path, name: &str) -> LinkGroup {
    LinkGroup::new(LinkPair::new(src.join(name), fonts.join(name)))
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

#[test]
fn creates_and_removes_real_symlinks() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("src");
    let fonts = temp.path().join("fonts");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&fonts).unwrap();
    fs::write(src.join("A.ttf"), b"font").unwrap();

    let g = group(&src, &fonts, "A.ttf");
    let mut engine = LinkEngine::new();

    engine.create(&g);
    let target = fonts.join("A.ttf");
    assert!(is_symlink(&target));
    assert_eq!(fs::read_link(&target).unwrap(), src.join("A.ttf"));

    engine.remove(&g);
    assert!(!target.exists());
    assert!(src.join("A.ttf").exists(), "source untouched");
}

#[test]
fn never_deletes_regular_files_at_the_target() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("src");
    let fonts = temp.path().join("fonts");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&fonts).unwrap();
    fs::write(src.join("A.ttf"), b"font").unwrap();
    fs::write(fonts.join("A.ttf"), b"user copy").unwrap();

    let g = group(&src, &fonts, "A.ttf");
    let mut engine = LinkEngine::new();
    engine.create(&g);
    assert_eq!(engine.ref_count(&g), 1, "collision still counts");
    engine.remove(&g);

    assert_eq!(fs::read(fonts.join("A.ttf")).unwrap(), b"user copy");
}

#[test]
fn removing_unknown_group_does_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fonts = temp.path().join("fonts");
    fs::create_dir_all(&fonts).unwrap();
    std::os::unix::fs::symlink("/nonexistent/B.ttf", fonts.join("B.ttf")).unwrap();

    let mut engine = LinkEngine::new();
    engine.remove(&group(Path::new("/nonexistent"), &fonts, "B.ttf"));

    assert!(is_symlink(&fonts.join("B.ttf")), "foreign link survives");
}

#[test]
fn dropping_the_engine_sweeps_links() {
    let temp = tempfile::tempdir().expect("tempdir");
    let src = temp.path().join("src");
    let fonts = temp.path().join("fonts");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&fonts).unwrap();

    {
        let mut engine = LinkEngine::new();
        for name in ["A.ttf", "B.otf"] {
            fs::write(src.join(name), b"").unwrap();
            engine.create(&group(&src, &fonts, name));
        }
        assert_eq!(fs::read_dir(&fonts).unwrap().count(), 2);
    }

    assert_eq!(fs::read_dir(&fonts).unwrap().count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn balanced_create_remove_leaves_no_trace(n in 1usize..6) {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let fonts = temp.path().join("fonts");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&fonts).unwrap();
        fs::write(src.join("A.pfb"), b"").unwrap();
        fs::write(src.join("A.afm"), b"").unwrap();
        let g = group(&src, &fonts, "A.pfb")
            .with(LinkPair::new(src.join("A.afm"), fonts.join("A.afm")));

        let mut engine = LinkEngine::new();
        for _ in 0..n {
            engine.create(&g);
        }
        prop_assert!(is_symlink(&fonts.join("A.afm")));
        for _ in 0..n {
            engine.remove(&g);
        }

        prop_assert_eq!(fs::read_dir(&fonts).unwrap().count(), 0);
        prop_assert!(engine.is_empty());
    }
}
