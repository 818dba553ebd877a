//! Tests for the output pump.

use std::sync::Arc;

use proptest::prelude::*;
use tokio::sync::mpsc::UnboundedReceiver;

use lucia_launcher::log::{Category, LineClassifier};
use lucia_launcher::process::{OutputPump, PumpExit};
use lucia_launcher::supervisor::{CancellationSignal, ChannelSink, SupervisorEvent};

fn texts(rx: &mut UnboundedReceiver<SupervisorEvent>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SupervisorEvent::Line(line) = event {
            out.push(line.text().to_string());
        }
    }
    out
}

/// Split `data` into chunks whose sizes cycle through `cuts`.
fn chunked(data: &[u8], cuts: &[usize]) -> tokio_test::io::Mock {
    let mut builder = tokio_test::io::Builder::new();
    if cuts.is_empty() {
        if !data.is_empty() {
            builder.read(data);
        }
        return builder.build();
    }

    let mut rest = data;
    for cut in cuts.iter().cycle() {
        if rest.is_empty() {
            break;
        }
        let (chunk, tail) = rest.split_at((*cut).min(rest.len()));
        builder.read(chunk);
        rest = tail;
    }
    builder.build()
}

#[tokio::test]
async fn pump_emits_categories_in_order() {
    let input: &[u8] = b"[API] login ok\nplain\n[USER] ping\n[ERROR] oops\n";
    let (sink, mut rx) = ChannelSink::new();
    let pump = OutputPump::new(
        input,
        Arc::new(LineClassifier::default()),
        Arc::new(sink),
        CancellationSignal::new(),
    );

    let report = pump.run().await;
    assert!(matches!(report.exit, PumpExit::EndOfStream));

    let mut categories = Vec::new();
    while let Ok(SupervisorEvent::Line(line)) = rx.try_recv() {
        categories.push(line.category());
    }
    assert_eq!(
        categories,
        [Category::Api, Category::Plain, Category::User, Category::Error]
    );
}

#[tokio::test]
async fn pump_handles_chunk_per_byte() {
    let data = b"[USER] a\n\nb\n";
    let cuts = [1];
    let (sink, mut rx) = ChannelSink::new();
    let pump = OutputPump::new(
        chunked(data, &cuts),
        Arc::new(LineClassifier::default()),
        Arc::new(sink),
        CancellationSignal::new(),
    );

    pump.run().await;
    assert_eq!(texts(&mut rx), ["[USER] a", "b"]);
}

proptest! {
    #[test]
    fn pump_reconstructs_line_sequence_across_split_reads(
        lines in prop::collection::vec("[a-zA-Z0-9 \\[\\]]{0,24}", 0..24),
        cuts in prop::collection::vec(1usize..32, 0..16),
    ) {
        let mut data = Vec::new();
        for line in &lines {
            data.extend_from_slice(line.as_bytes());
            data.push(b'\n');
        }

        let (sink, mut rx) = ChannelSink::new();
        let pump = OutputPump::new(
            chunked(&data, &cuts),
            Arc::new(LineClassifier::default()),
            Arc::new(sink),
            CancellationSignal::new(),
        );
        let report = tokio_test::block_on(pump.run());

        let expected: Vec<String> = lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .cloned()
            .collect();
        prop_assert!(matches!(report.exit, PumpExit::EndOfStream));
        prop_assert_eq!(report.lines, expected.len() as u64);
        prop_assert_eq!(texts(&mut rx), expected);
    }
}
