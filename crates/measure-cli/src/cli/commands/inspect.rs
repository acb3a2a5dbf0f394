//! `measure-config inspect` - decode and replay an event log.

use std::fs;

use anyhow::{Context as _, Result};
use measure_core::{DigestMap, HashAlgorithm};
use measure_engine::eventlog::{EventType, LogEvent, SpecIdEvent};
use measure_engine::{replay, EventLog};
use serde::Serialize;

use super::Context;
use crate::cli::args::InspectArgs;

#[derive(Serialize)]
struct EventReport<'a> {
    index: usize,
    pcr_index: u32,
    event_type: EventType,
    payload: String,
    digests: &'a DigestMap,
}

#[derive(Serialize)]
struct InspectReport<'a> {
    spec_id: &'a SpecIdEvent,
    events: Vec<EventReport<'a>>,
    replayed: DigestMap,
}

pub fn execute(ctx: &Context, args: &InspectArgs) -> Result<()> {
    let bytes =
        fs::read(&args.log).with_context(|| format!("reading {}", args.log.display()))?;
    let log = EventLog::parse(&bytes)
        .with_context(|| format!("decoding {}", args.log.display()))?;
    let replayed = replay(&log, ctx.config.max_event_size)
        .with_context(|| format!("replaying {}", args.log.display()))?;

    let report = InspectReport {
        spec_id: log.spec_id(),
        events: log
            .events()
            .iter()
            .enumerate()
            .map(|(i, e)| event_report(i + 1, e))
            .collect(),
        replayed,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }
    Ok(())
}

fn event_report(index: usize, event: &LogEvent) -> EventReport<'_> {
    EventReport {
        index,
        pcr_index: event.pcr_index,
        event_type: event.event_type,
        payload: String::from_utf8_lossy(event.payload_bytes()).into_owned(),
        digests: &event.digests,
    }
}

fn algorithm_name(id: u16) -> String {
    HashAlgorithm::from_id(id).map_or_else(|| format!("{id:#06x}"), |a| a.to_string())
}

fn event_type_name(event_type: EventType) -> String {
    match event_type {
        EventType::NoAction => "EV_NO_ACTION".to_string(),
        EventType::Ipl => "EV_IPL".to_string(),
        EventType::Other(v) => format!("{v:#010x}"),
    }
}

fn print_text(report: &InspectReport<'_>) {
    let spec = report.spec_id;
    println!(
        "header: platform class {} spec {}.{} errata {} uintn size {}",
        spec.platform_class,
        spec.spec_version_major,
        spec.spec_version_minor,
        spec.spec_errata,
        spec.uintn_size
    );
    for size in &spec.digest_sizes {
        println!(
            "  bank {} ({} bytes)",
            algorithm_name(size.algorithm_id),
            size.digest_size
        );
    }

    for event in &report.events {
        println!();
        println!(
            "event {} pcr {} {}",
            event.index,
            event.pcr_index,
            event_type_name(event.event_type)
        );
        println!("  {}", event.payload);
        for digest in event.digests {
            println!("  {:<8} {}", digest.algorithm.to_string(), hex::encode(&digest.value));
        }
    }

    println!();
    println!("replayed:");
    for digest in &report.replayed {
        println!("  {:<8} {}", digest.algorithm.to_string(), hex::encode(&digest.value));
    }
}
