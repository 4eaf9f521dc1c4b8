//! Packing properties of rendered reports across channel kinds and budgets

mod common;

use common::{base_time, config, large_snapshot, snapshot};
use trendr_common::config::ChannelKind;
use trendr_engine::batch::{
    BatchSplitter, FragmentKind, FragmentPlan, MarkupTemplate, MessageBatch,
};
use trendr_engine::new_items::Baseline;
use trendr_engine::{Diagnostics, Pipeline, ReportData, RunInput};

fn report(titles: Vec<trendr_engine::RawTitle>) -> ReportData {
    let config = config();
    let input = RunInput {
        titles,
        failed_ids: vec!["toutiao".to_string(), "baidu".to_string()],
        now: base_time(),
    };
    let mut diagnostics = Diagnostics::new();
    Pipeline::new(&config)
        .analyze(&input, &Baseline::new(), false, &mut diagnostics)
        .report
}

fn template(kind: ChannelKind) -> MarkupTemplate {
    MarkupTemplate::new(
        "test",
        kind,
        base_time(),
        config().display_offset(),
    )
}

fn contents<'a>(splitter: &BatchSplitter, batches: &'a [MessageBatch]) -> Vec<&'a str> {
    batches.iter().map(|b| splitter.content(b)).collect()
}

/// Walk the plan over the joined batch contents; separators may be absent
fn assert_reassembles(plan: &FragmentPlan, joined: &str) {
    let mut rest = joined;
    for fragment in plan.iter() {
        if fragment.kind.is_optional() {
            if let Some(after) = rest.strip_prefix(fragment.text.as_str()) {
                rest = after;
            }
            continue;
        }
        rest = rest
            .strip_prefix(fragment.text.as_str())
            .unwrap_or_else(|| panic!("fragment missing or out of order: {:?}", fragment.text));
    }
    assert!(rest.is_empty(), "unexpected trailing content: {:?}", rest);
}

#[test]
fn test_properties_hold_for_all_channels_and_budgets() {
    let report = report(large_snapshot(40));

    for kind in [
        ChannelKind::Wework,
        ChannelKind::Telegram,
        ChannelKind::Dingtalk,
        ChannelKind::Feishu,
    ] {
        let template = template(kind);
        let plan = FragmentPlan::build(&report, &template);

        for max_bytes in [400, 700, 1500, 4000, kind.default_max_bytes()] {
            let splitter = BatchSplitter::for_channel(&template, &report, max_bytes);
            let batches = splitter.split(&plan);

            for batch in &batches {
                assert!(
                    batch.byte_len() <= max_bytes || batch.oversized,
                    "{:?} batch of {} bytes over budget {}",
                    kind,
                    batch.byte_len(),
                    max_bytes
                );
                assert!(batch.body.starts_with(splitter.header()));
                assert!(batch.body.ends_with(splitter.footer()));
            }

            let parts = contents(&splitter, &batches);
            assert_reassembles(&plan, &parts.concat());

            // Leads are never split across batches
            for lead in plan.iter().filter(|f| f.kind == FragmentKind::Lead) {
                assert!(
                    parts.iter().any(|p| p.contains(lead.text.as_str())),
                    "{:?} split lead at budget {}",
                    kind,
                    max_bytes
                );
            }
        }
    }
}

#[test]
fn test_small_budget_produces_several_batches() {
    let report = report(large_snapshot(40));
    let template = template(ChannelKind::Wework);
    let plan = FragmentPlan::build(&report, &template);
    let splitter = BatchSplitter::for_channel(&template, &report, 1000);

    let batches = splitter.split(&plan);

    assert!(batches.len() > 3);
    assert!(batches.iter().all(|b| !b.oversized));
    // Continuation batches do not repeat the group heading
    let headings = batches
        .iter()
        .filter(|b| b.body.contains("[1/1]"))
        .count();
    assert_eq!(headings, 1);
}

#[test]
fn test_plan_order_follows_report() {
    let report = report(snapshot());
    let template = template(ChannelKind::Wework);
    let plan = FragmentPlan::build(&report, &template);
    let text = plan.required_text();

    let stats = text.find("Hot keyword stats").unwrap();
    let new_section = text.find("New this run").unwrap();
    let failed = text.find("Failed sources").unwrap();
    assert!(stats < new_section && new_section < failed);

    let toutiao = text.find("toutiao").unwrap();
    let baidu = text.find("baidu").unwrap();
    assert!(toutiao < baidu);

    // One lead per group, per new-title source and for failed sources
    let leads = plan.iter().filter(|f| f.kind == FragmentKind::Lead).count();
    assert_eq!(leads, report.stats.len() + report.new_titles.len() + 1);
}

#[test]
fn test_lead_carries_heading_and_first_title() {
    let report = report(snapshot());
    let template = template(ChannelKind::Telegram);
    let plan = FragmentPlan::build(&report, &template);

    let first = plan.iter().next().unwrap();
    assert_eq!(first.kind, FragmentKind::Lead);
    assert!(first.text.starts_with("📊 Hot keyword stats"));
    assert!(first.text.contains("[1/3]"));
    assert!(first.text.contains("  1. "));
}

#[test]
fn test_oversized_lead_flagged() {
    let report = report(snapshot());
    let template = template(ChannelKind::Wework);
    let plan = FragmentPlan::build(&report, &template);
    let mut diagnostics = Diagnostics::new();

    let batches = trendr_engine::batch::render_batches(&report, &template, 120, &mut diagnostics);

    assert!(batches.iter().any(|b| b.oversized));
    assert_eq!(
        diagnostics.len(),
        batches.iter().filter(|b| b.oversized).count()
    );
    assert!(diagnostics.iter().all(|d| d.is_informational()));
    assert!(!plan.is_empty());
}
