//! End-to-end layout tests: anchoring, deduplication, side choice,
//! fallbacks and user overrides through the public page/document API.

use marginalia_core::api::{layout_page, layout_page_with_metrics};
use marginalia_core::font::FixedPitch;
use marginalia_core::layout::{FallbackZone, LayoutParams, SidePreference};
use marginalia_core::model::{
    AnnotationInput, ColumnLayout, DiagnosticKind, LayoutOverrides, MatchKind, Page, PageLayout,
    RawAnnotation, Side, TextFragment,
};
use marginalia_core::utils::{Rect, rect_center, rects_overlap};

fn inputs(pairs: &[(&str, &str)]) -> Vec<AnnotationInput> {
    AnnotationInput::resolve_all(pairs.iter().map(|(q, e)| RawAnnotation::new(*q, *e)))
}

fn fixed_layout(page: &Page, annotations: &[AnnotationInput], params: &LayoutParams) -> PageLayout {
    layout_page_with_metrics(
        page,
        annotations,
        params,
        &FixedPitch::courier(),
        &LayoutOverrides::default(),
    )
    .unwrap()
}

fn assert_no_overlaps(layout: &PageLayout) {
    let rects: Vec<Rect> = layout.placed().filter_map(|p| p.note_rect).collect();
    for (i, a) in rects.iter().enumerate() {
        for b in &rects[i + 1..] {
            assert!(!rects_overlap(*a, *b), "{a:?} overlaps {b:?}");
        }
    }
}

/// Two lines of words: "The quick brown" / "fox jumps over".
fn fox_page() -> Page {
    Page::from_fragments(
        0,
        612.0,
        792.0,
        vec![
            TextFragment::new("The", (200.0, 300.0, 228.0, 310.0), 0),
            TextFragment::new("quick", (232.0, 300.0, 268.0, 310.0), 0),
            TextFragment::new("brown", (272.0, 300.0, 314.0, 310.0), 0),
            TextFragment::new("fox", (200.0, 314.0, 224.0, 324.0), 1),
            TextFragment::new("jumps", (228.0, 314.0, 268.0, 324.0), 1),
            TextFragment::new("over", (272.0, 314.0, 304.0, 324.0), 1),
        ],
    )
}

/// Full-width rows `row0 filler`, `row1 filler`... from `top`, 14pt apart.
fn wall_page(top: f64, rows: usize) -> Page {
    let frags = (0..rows)
        .map(|i| {
            let y = top + i as f64 * 14.0;
            TextFragment::new(format!("row{i} filler"), (10.0, y, 602.0, y + 10.0), i as u32)
        })
        .collect();
    Page::from_fragments(0, 612.0, 792.0, frags)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_quote_across_two_lines_gets_two_hit_rects() {
    let page = fox_page();
    let layout = fixed_layout(
        &page,
        &inputs(&[("brown fox", "crosses a line")]),
        &LayoutParams::default(),
    );

    let p = &layout.placements[0];
    assert!(p.is_placed());
    assert_eq!(
        p.hit_rects.as_slice(),
        &[(272.0, 300.0, 314.0, 310.0), (200.0, 314.0, 224.0, 324.0)]
    );
    assert_eq!(p.anchor_rect, (200.0, 300.0, 314.0, 324.0));
}

#[test]
fn test_identical_quotes_on_a_page_are_deduplicated() {
    let page = fox_page();
    let layout = fixed_layout(
        &page,
        &inputs(&[("quick", "first"), ("quick", "second")]),
        &LayoutParams::default(),
    );

    assert_eq!(layout.placements.len(), 1);
    assert_eq!(layout.placements[0].explanation, "first");
    assert_eq!(layout.diagnostics.len(), 1);
    assert_eq!(layout.diagnostics[0].annotation_index, 1);
    assert_eq!(layout.diagnostics[0].kind, DiagnosticKind::Duplicate { kept: 0 });
    assert_eq!(layout.diagnostics[0].input.explanation.as_deref(), Some("second"));
}

#[test]
fn test_wrapped_quote_does_not_swallow_words_inside_its_union_box() {
    let page = fox_page();
    let layout = fixed_layout(
        &page,
        &inputs(&[("brown fox", "wraps"), ("jumps", "same line as fox"), ("fox", "repeat")]),
        &LayoutParams::default(),
    );

    // "jumps" lies inside the union box of "brown fox" but in neither hit rect
    assert_eq!(layout.placements.len(), 2);
    assert!(layout.placements.iter().all(|p| p.is_placed()));
    assert_eq!(layout.placements[1].quote, "jumps");
    assert_eq!(layout.diagnostics.len(), 1);
    assert_eq!(layout.diagnostics[0].annotation_index, 2);
    assert_eq!(layout.diagnostics[0].kind, DiagnosticKind::Duplicate { kept: 0 });
    assert_no_overlaps(&layout);
}

#[test]
fn test_crowded_band_leaves_unplaceable_notes_without_overlaps() {
    // 7 rows of 8 words in a 100pt band
    let mut frags = Vec::new();
    for row in 0..7u32 {
        let y = 300.0 + f64::from(row) * 14.0;
        for col in 0..8u32 {
            let x0 = 72.0 + f64::from(col) * 58.5;
            frags.push(TextFragment::new(
                format!("w{row}{col}"),
                (x0, y, x0 + 50.0, y + 10.0),
                row,
            ));
        }
    }
    let page = Page::from_fragments(0, 612.0, 792.0, frags.clone());
    let quotes: Vec<String> = (0..50).map(|i| format!("w{}{}", i / 8, i % 8)).collect();
    let annotations =
        AnnotationInput::resolve_all(quotes.iter().map(|q| RawAnnotation::new(q, "n")));
    let params = LayoutParams {
        max_scan: 10,
        max_vertical_offset: 200.0,
        ..Default::default()
    };
    let layout = fixed_layout(&page, &annotations, &params);

    assert_eq!(layout.placements.len(), 50);
    let unplaceable = layout.placements.iter().filter(|p| !p.is_placed()).count();
    assert!(unplaceable >= 1);
    assert_eq!(
        layout
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Unplaceable)
            .count(),
        unplaceable
    );
    assert_no_overlaps(&layout);
    for note in layout.placed().filter_map(|p| p.note_rect) {
        assert!(frags.iter().all(|f| !rects_overlap(note, f.rect)));
    }
    for p in layout.placements.iter().filter(|p| !p.is_placed()) {
        assert!(p.note_rect.is_none());
        assert!(p.leader_points.is_empty());
    }
}

#[test]
fn test_absent_quote_reports_not_found() {
    let page = fox_page();
    let layout = fixed_layout(&page, &inputs(&[("lazy dog", "absent")]), &LayoutParams::default());

    assert!(layout.placements.is_empty());
    assert_eq!(layout.diagnostics.len(), 1);
    assert_eq!(layout.diagnostics[0].kind, DiagnosticKind::QuoteNotFound);
    assert_eq!(layout.diagnostics[0].page_index, Some(0));
}

#[test]
fn test_malformed_annotation_is_reported_and_skipped() {
    let page = fox_page();
    let annotations = AnnotationInput::resolve_all([
        RawAnnotation {
            explanation: Some("no quote".to_string()),
            ..Default::default()
        },
        RawAnnotation {
            query: Some("jumps".to_string()),
            ..Default::default()
        },
    ]);
    let layout = fixed_layout(&page, &annotations, &LayoutParams::default());

    assert_eq!(layout.placements.len(), 1);
    assert_eq!(layout.placements[0].quote, "jumps");
    assert_eq!(layout.placements[0].explanation, "Note: jumps");
    assert!(matches!(
        &layout.diagnostics[0].kind,
        DiagnosticKind::MalformedAnnotation { reason } if reason.contains("missing quote")
    ));
    assert_eq!(layout.diagnostics[0].page_index, None);
}

// ============================================================================
// Locating
// ============================================================================

#[test]
fn test_dehyphenated_quote_spans_the_break() {
    let page = Page::from_fragments(
        0,
        612.0,
        792.0,
        vec![
            TextFragment::new("an", (200.0, 300.0, 216.0, 310.0), 0),
            TextFragment::new("extra-", (220.0, 300.0, 262.0, 310.0), 0),
            TextFragment::new("ordinary", (200.0, 314.0, 256.0, 324.0), 1),
            TextFragment::new("claim", (260.0, 314.0, 296.0, 324.0), 1),
        ],
    );
    let layout = fixed_layout(
        &page,
        &inputs(&[("extraordinary claim", "x")]),
        &LayoutParams::default(),
    );

    let p = &layout.placements[0];
    assert_eq!(p.hit_rects.len(), 2);
    assert_eq!(p.anchor_rect, (200.0, 300.0, 296.0, 324.0));
}

#[test]
fn test_exact_match_is_preferred_over_normalized() {
    let page = Page::new(
        0,
        612.0,
        792.0,
        "ﬁne print\nfine print",
        vec![
            TextFragment::new("ﬁne print", (200.0, 300.0, 260.0, 310.0), 0),
            TextFragment::new("fine print", (200.0, 400.0, 260.0, 410.0), 1),
        ],
    );
    let span = marginalia_core::locate::locate("fine print", &page.text).unwrap();
    assert_eq!(span.kind, MatchKind::Exact);

    let layout = fixed_layout(&page, &inputs(&[("fine print", "x")]), &LayoutParams::default());
    assert_eq!(layout.placements[0].anchor_rect.1, 400.0);
}

// ============================================================================
// Side choice and fallbacks
// ============================================================================

#[test]
fn test_forced_side_is_respected() {
    let page = fox_page();
    for (pref, side) in [(SidePreference::Left, Side::Left), (SidePreference::Right, Side::Right)] {
        let params = LayoutParams {
            side_preference: pref,
            ..Default::default()
        };
        let layout = fixed_layout(&page, &inputs(&[("quick", "x")]), &params);
        assert_eq!(layout.placements[0].side, side);
    }
}

#[test]
fn test_nearest_side_follows_anchor_position() {
    let page = fox_page();
    // the text block sits left of the page center
    let layout = fixed_layout(&page, &inputs(&[("quick", "x")]), &LayoutParams::default());
    let p = &layout.placements[0];
    assert_eq!(p.side, Side::Left);
    let note = p.note_rect.unwrap();
    assert_eq!(note.0, 6.0);
    assert!((rect_center(note).1 - rect_center(p.anchor_rect).1).abs() < 1e-9);
}

#[test]
fn test_gutter_note_between_columns() {
    let mut frags = Vec::new();
    for i in 0..40u32 {
        let y = 72.0 + f64::from(i) * 14.0;
        let edge = if i == 20 { "pivot" } else { "edge" };
        frags.push(TextFragment::new("text", (72.0, y, 210.0, y + 10.0), i * 2));
        frags.push(TextFragment::new(edge, (220.0, y, 260.0, y + 10.0), i * 2));
        frags.push(TextFragment::new("right", (352.0, y, 540.0, y + 10.0), i * 2 + 1));
    }
    let page = Page::from_fragments(0, 612.0, 792.0, frags);
    let params = LayoutParams {
        allow_center_gutter: true,
        ..Default::default()
    };
    let layout = fixed_layout(&page, &inputs(&[("pivot", "gutter note")]), &params);

    let ColumnLayout::TwoColumn { gutter_x, .. } = layout.column_layout else {
        panic!("expected two columns, got {:?}", layout.column_layout);
    };
    assert!((gutter_x - 306.0).abs() < 1.0);
    let p = &layout.placements[0];
    assert_eq!(p.side, Side::Gutter);
    let note = p.note_rect.unwrap();
    assert!(note.0 > 260.0 && note.2 < 352.0);
    assert!((rect_center(note).0 - gutter_x).abs() < 1e-6);
    assert_eq!(p.wrapped_lines, vec!["gutter note"]);
}

#[test]
fn test_column_footer_when_margins_are_full() {
    let page = wall_page(100.0, 10);
    let layout = fixed_layout(&page, &inputs(&[("row9", "footer")]), &LayoutParams::default());

    let p = &layout.placements[0];
    assert!(p.is_placed());
    assert_eq!(p.side, Side::Footer);
    let note = p.note_rect.unwrap();
    assert!(note.1 >= p.block_rect.3);
    assert!(note.0 >= p.block_rect.0 && note.2 <= p.block_rect.2);
}

/// 48 rows of body text at x 72..540, 14pt apart from y 90; the last row
/// ends at y 758.
fn deep_page() -> Page {
    let frags = (0..48)
        .map(|i| {
            let y = 90.0 + i as f64 * 14.0;
            TextFragment::new(format!("l{i} body"), (72.0, y, 540.0, y + 10.0), i as u32)
        })
        .collect();
    Page::from_fragments(0, 612.0, 792.0, frags)
}

#[test]
fn test_margin_notes_stay_out_of_the_footer_band() {
    let page = deep_page();
    let params = LayoutParams::default();
    let band_top = 792.0 - params.column_footer_max_offset;

    // anchor just below the band edge: the note is pushed up, not into it
    let layout = fixed_layout(&page, &inputs(&[("l40", "x")]), &params);
    let p = &layout.placements[0];
    assert!(matches!(p.side, Side::Left | Side::Right), "{:?}", p.side);
    assert!(p.note_rect.unwrap().3 <= band_top);

    // anchor deep in the band: only the column footer slot may take it
    let layout = fixed_layout(&page, &inputs(&[("l46", "x")]), &params);
    let p = &layout.placements[0];
    assert_eq!(p.side, Side::Footer);
    assert!(p.note_rect.unwrap().1 >= p.block_rect.3);

    let no_footer = LayoutParams {
        allow_column_footer: false,
        ..Default::default()
    };
    let layout = fixed_layout(&page, &inputs(&[("l46", "x")]), &no_footer);
    assert!(!layout.placements[0].is_placed());
    assert_eq!(layout.diagnostics[0].kind, DiagnosticKind::Unplaceable);
}

#[test]
fn test_page_band_fallback() {
    let page = wall_page(300.0, 10);
    let base = LayoutParams {
        allow_column_footer: false,
        ..Default::default()
    };

    let layout = fixed_layout(&page, &inputs(&[("row4", "nowhere to go")]), &base);
    assert!(!layout.placements[0].is_placed());
    assert_eq!(layout.diagnostics[0].kind, DiagnosticKind::Unplaceable);

    let params = LayoutParams {
        page_band_fallback: Some(FallbackZone::Top),
        ..base
    };
    let layout = fixed_layout(&page, &inputs(&[("row4", "above the text")]), &params);
    let p = &layout.placements[0];
    assert_eq!(p.side, Side::PageBand);
    assert!(p.note_rect.unwrap().3 < 300.0);
}

#[test]
fn test_exclusion_band_is_avoided() {
    let page = fox_page();
    let params = LayoutParams {
        side_preference: SidePreference::Left,
        exclusion_bands: vec![(0.0, 290.0, 150.0, 310.0)],
        ..Default::default()
    };
    let layout = fixed_layout(&page, &inputs(&[("quick", "x")]), &params);
    let p = &layout.placements[0];
    assert_eq!(p.side, Side::Left);
    let note = p.note_rect.unwrap();
    assert!(!rects_overlap(note, (0.0, 290.0, 150.0, 310.0)));
    assert!(rect_center(note).1 > rect_center(p.anchor_rect).1);
}

// ============================================================================
// Identity and overrides
// ============================================================================

#[test]
fn test_uids_are_stable_and_unique() {
    let page = fox_page();
    let annotations = inputs(&[("quick", "a"), ("jumps", "b"), ("over", "c")]);
    let first = fixed_layout(&page, &annotations, &LayoutParams::default());
    let second = fixed_layout(&page, &annotations, &LayoutParams::default());

    assert_eq!(first, second);
    let uids: Vec<&str> = first.placements.iter().map(|p| p.uid.as_str()).collect();
    assert!(uids.iter().all(|u| u.len() == 12 && u.chars().all(|c| c.is_ascii_hexdigit())));
    let mut unique = uids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), uids.len());
}

#[test]
fn test_fixed_rect_and_rotation_overrides() {
    let page = fox_page();
    let annotations = inputs(&[("quick", "moved by hand")]);
    let auto = fixed_layout(&page, &annotations, &LayoutParams::default());
    let uid = auto.placements[0].uid.clone();

    let mut overrides = LayoutOverrides::default();
    overrides.fixed_note_rects.insert(uid.clone(), (450.0, 280.0, 560.0, 320.0));
    overrides.rotations.insert(uid.clone(), 15.0);
    let edited = layout_page_with_metrics(
        &page,
        &annotations,
        &LayoutParams::default(),
        &FixedPitch::courier(),
        &overrides,
    )
    .unwrap();

    let p = &edited.placements[0];
    assert_eq!(p.uid, uid);
    assert!(p.overridden);
    assert_eq!(p.note_rect, Some((450.0, 280.0, 560.0, 320.0)));
    assert_eq!(p.side, Side::Right);
    assert_eq!(p.rotation, 15.0);
    assert_eq!(p.leader_points.len(), 2);
}

#[test]
fn test_conflicting_fixed_rect_falls_back_to_planning() {
    let page = fox_page();
    let annotations = inputs(&[("quick", "a"), ("jumps", "b")]);
    let auto = fixed_layout(&page, &annotations, &LayoutParams::default());

    let spot = (450.0, 280.0, 560.0, 320.0);
    let mut overrides = LayoutOverrides::default();
    for p in &auto.placements {
        overrides.fixed_note_rects.insert(p.uid.clone(), spot);
    }
    let edited = layout_page_with_metrics(
        &page,
        &annotations,
        &LayoutParams::default(),
        &FixedPitch::courier(),
        &overrides,
    )
    .unwrap();

    assert!(edited.placements[0].overridden);
    assert!(!edited.placements[1].overridden);
    assert!(edited.placements[1].is_placed());
    assert_no_overlaps(&edited);
}

#[test]
fn test_leaders_can_be_disabled() {
    let page = fox_page();
    let params = LayoutParams {
        draw_leader: false,
        ..Default::default()
    };
    let layout =
        layout_page(&page, &inputs(&[("quick", "x")]), &params, &LayoutOverrides::default())
            .unwrap();
    assert!(layout.placements[0].is_placed());
    assert!(layout.placements[0].leader_points.is_empty());
}
