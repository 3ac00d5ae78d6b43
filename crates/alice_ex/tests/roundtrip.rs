use alice_ex::{
    error::{Error, Result},
    CompressionMethod, ExBlock, ExField, ExFile, ExList, ExTable, ExTree, ExType, ExValue,
};
use encoding_rs::SHIFT_JIS;
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

/// A document using every value kind, with tables and trees nested three levels deep
fn sample_document() -> Result<ExFile> {
    let level3 = ExTable::new(
        vec![
            ExField::new(ExType::Int, "x"),
            ExField::new(ExType::Float, "y"),
        ],
        vec![vec![1.into(), 0.25f32.into()], vec![2.into(), (-8.5f32).into()]],
    )?;
    let level2 = ExTable::new(
        vec![
            ExField::new(ExType::String, "label"),
            ExField::table(
                "points",
                vec![
                    ExField::new(ExType::Int, "x"),
                    ExField::new(ExType::Float, "y"),
                ],
            ),
        ],
        vec![vec!["線".into(), level3.into()]],
    )?;
    let level1 = ExTable::new(
        vec![
            ExField::new(ExType::Int, "id"),
            ExField::table(
                "shapes",
                vec![
                    ExField::new(ExType::String, "label"),
                    ExField::table(
                        "points",
                        vec![
                            ExField::new(ExType::Int, "x"),
                            ExField::new(ExType::Float, "y"),
                        ],
                    ),
                ],
            ),
            ExField::new(ExType::List, "extra"),
        ],
        vec![vec![
            7.into(),
            level2.into(),
            [ExValue::Int(1), "two".into()].into_iter().collect::<ExList>().into(),
        ]],
    )?;

    let tree = ExTree::Interior(vec![
        ExBlock::named(
            "menu",
            ExTree::Interior(vec![
                ExBlock::named("start", ExTree::leaf("label", "はじめる")),
                ExBlock::named(
                    "options",
                    ExTree::Interior(vec![ExBlock::named("volume", 80)]),
                ),
            ]),
        ),
        ExBlock::named("version", 3),
    ]);

    let list: ExList = [
        ExValue::Int(-1),
        ExValue::Float(1.5),
        ExValue::String(String::new()),
        [ExValue::Int(5)].into_iter().collect::<ExList>().into(),
        ExTree::leaf("inner", 9).into(),
    ]
    .into_iter()
    .collect();

    Ok(ExFile::new(vec![
        ExBlock::named("count", i32::MIN),
        ExBlock::named("ratio", 0.125f32),
        ExBlock::named("title", "ゲーム"),
        ExBlock::named("shapes", level1),
        ExBlock::named("misc", list),
        ExBlock::named("ui", tree),
    ]))
}

#[traced_test]
#[test]
fn bytes_round_trip() -> Result<()> {
    for compression in [CompressionMethod::None, CompressionMethod::Zlib] {
        let mut ex = sample_document()?;
        ex.set_compression(compression);

        let bytes = ex.to_bytes(SHIFT_JIS)?;
        let parsed = ExFile::parse(&bytes, SHIFT_JIS)?;

        assert_eq!(parsed, ex);
        assert!(parsed.warnings().is_empty());
        assert_eq!(parsed.to_bytes(SHIFT_JIS)?, bytes);
    }

    Ok(())
}

#[test]
fn nested_values_are_reachable() -> Result<()> {
    let bytes = sample_document()?.to_bytes(SHIFT_JIS)?;
    let ex = ExFile::parse(&bytes, SHIFT_JIS)?;

    let shapes = ex.get("shapes").and_then(ExValue::as_table).unwrap();
    let inner = shapes.row(0).unwrap()[1].as_table().unwrap();
    let points = inner.row(0).unwrap()[1].as_table().unwrap();
    assert_eq!(points.row(1).unwrap()[1], ExValue::Float(-8.5));
    assert_eq!(points.fields()[0].name, "x");

    let ui = ex.get("ui").and_then(ExValue::as_tree).unwrap();
    let menu = ui.child("menu").and_then(ExValue::as_tree).unwrap();
    let start = menu.child("start").and_then(ExValue::as_tree).unwrap();
    assert!(start.is_leaf());
    assert_eq!(
        start,
        &ExTree::leaf("label", "はじめる"),
    );

    Ok(())
}

#[rustfmt::skip]
fn stored_document(body: &[u8], blocks: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(b"HEAD"); out.extend(12u32.to_le_bytes());
    out.extend(b"EXTF"); out.extend(1u32.to_le_bytes()); out.extend(blocks.to_le_bytes());
    out.extend(b"DATA"); out.extend(0u32.to_le_bytes());
    out.extend((body.len() as u32).to_le_bytes()); out.extend((body.len() as u32).to_le_bytes());
    out.extend(body);
    out
}

#[traced_test]
#[test]
fn wide_rows_are_trimmed_with_a_warning() -> Result<()> {
    #[rustfmt::skip]
    let body = [
        1, 0, 0, 0, b't',
        4, 0, 0, 0,
        // one field: int "a"
        1, 0, 0, 0,
        1, 0, 0, 0, 1, 0, 0, 0, b'a', 0, 0, 0, 0,
        // one row of two columns
        1, 0, 0, 0, 2, 0, 0, 0,
        1, 0, 0, 0, 10, 0, 0, 0,
        1, 0, 0, 0, 20, 0, 0, 0,
    ];
    let bytes = stored_document(&body, 1);

    let ex = ExFile::parse(&bytes, SHIFT_JIS)?;
    assert_eq!(ex.warnings().len(), 1);
    assert_eq!(ex.warnings()[0].mismatch.width(), 1);
    assert!(logs_contain("1 fields, 2 columns"));

    let table = ex.get("t").and_then(ExValue::as_table).unwrap();
    let view = table.view(None);
    assert_eq!(view.width, 1);
    assert_eq!(view.rows().collect::<Vec<_>>(), vec![&[ExValue::Int(10)][..]]);

    // the mismatch survives a write back
    assert_eq!(ex.to_bytes(SHIFT_JIS)?, bytes);

    Ok(())
}

#[test]
fn ambiguous_tree_is_rejected() {
    #[rustfmt::skip]
    let body = [
        1, 0, 0, 0, b't',
        6, 0, 0, 0,
        1, 0, 0, 0, 1, 0, 0, 0,
        1, 0, 0, 0, b'n',
        1, 0, 0, 0, 1, 0, 0, 0,
    ];
    let bytes = stored_document(&body, 1);

    assert!(matches!(
        ExFile::parse(&bytes, SHIFT_JIS),
        Err(Error::AmbiguousTree { children: 1, offset: 9 })
    ));
}

#[test]
fn read_and_write_paths() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sample.ex");

    let ex = sample_document()?;
    ex.write_path(&path, SHIFT_JIS)?;
    assert_eq!(ExFile::read_path(&path, SHIFT_JIS)?, ex);

    Ok(())
}
