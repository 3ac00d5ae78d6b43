mod common;

use std::sync::Arc;

use alice_ar::{
    error::Result,
    nested::{open_nested, Nested},
    open_shared, Archive, ArchiveFormat, LoadedEntry,
};
use alice_ex::{ExBlock, ExFile};
use encoding_rs::SHIFT_JIS;
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn nested_archive_outlives_outer_release() -> Result<()> {
    let inner = common::flat(&[("inner.txt", b"nested data")]);
    let mut outer = open_shared(common::afa(&[("pack.flat", &inner)])?.into())?.0;

    let shared = outer.load(0)?;
    let (mut nested, format) = open_shared(shared.clone())?;
    assert_eq!(format, ArchiveFormat::Flat);
    // the outer descriptor, the nested archive and this test
    assert_eq!(Arc::strong_count(&shared), 3);

    outer.release(0);
    outer.release(0);
    assert!(!outer.by_index(0)?.is_loaded());
    assert_eq!(Arc::strong_count(&shared), 2);

    drop(shared);
    assert_eq!(&*nested.load(0)?, b"nested data");

    outer.close();
    assert_eq!(&*nested.load(0)?, b"nested data");

    Ok(())
}

#[traced_test]
#[test]
fn guard_releases_the_outer_entry() -> Result<()> {
    let inner = common::flat(&[("a", b"1"), ("b", b"2")]);
    let mut outer = open_shared(common::afa(&[("pack.flat", &inner)])?.into())?.0;

    let nested = {
        let entry = LoadedEntry::acquire(outer.as_mut(), 0)?;
        assert_eq!(entry.descriptor().name(), "pack.flat");
        open_nested(entry.shared(), SHIFT_JIS)?
    };
    assert!(!outer.by_index(0)?.is_loaded());

    let Some(Nested::Archive(mut nested, ArchiveFormat::Flat)) = nested else {
        panic!("expected a nested FLAT archive");
    };
    assert_eq!(nested.len(), 2);
    assert_eq!(&*nested.load(1)?, b"2");

    Ok(())
}

#[traced_test]
#[test]
fn nested_documents_are_parsed() -> Result<()> {
    let document = ExFile::new(vec![ExBlock::named("speed", 3)]);
    let bytes = document.to_bytes(SHIFT_JIS)?;
    let mut outer = open_shared(common::flat(&[("config.ex", &bytes), ("x.txt", b"text")]).into())?.0;

    match open_nested(outer.load(0)?, SHIFT_JIS)? {
        Some(Nested::Document(parsed)) => assert_eq!(parsed, document),
        _ => panic!("expected an EX document"),
    }
    assert!(open_nested(outer.load(1)?, SHIFT_JIS)?.is_none());

    Ok(())
}
