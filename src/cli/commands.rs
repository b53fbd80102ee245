//! CLI command implementations.

use serde::Serialize;

use super::{CliContext, CommandStatus};
use crate::engine::{
    DecayReport, DeleteReport, KarmaEngine, LinkOutcome, ModifyOutcome, RankedTerm, ScoreReport,
};
use crate::store::{MemoryStore, ScoreStore};
use crate::types::{keys, KarmaError, KarmaResult};
use crate::upgrade::{MigrationReport, UpgradeStatus};

/// Increment a term on behalf of `user`.
pub fn cmd_inc(ctx: &CliContext, term: &str, user: &str) -> KarmaResult<CommandStatus> {
    modify(ctx, term, user, true)
}

/// Decrement a term on behalf of `user`.
pub fn cmd_dec(ctx: &CliContext, term: &str, user: &str) -> KarmaResult<CommandStatus> {
    modify(ctx, term, user, false)
}

fn modify(ctx: &CliContext, term: &str, user: &str, up: bool) -> KarmaResult<CommandStatus> {
    let engine = ctx.open()?;
    let outcome = if up {
        engine.increment(term, user)?
    } else {
        engine.decrement(term, user)?
    };
    ctx.save(&engine)?;

    match outcome {
        ModifyOutcome::Applied(report) => {
            print_report(ctx, &report);
            Ok(CommandStatus::Done)
        }
        ModifyOutcome::CoolingDown {
            term,
            remaining_secs,
        } => {
            let message = KarmaError::CooldownActive {
                term: term.clone(),
                remaining_secs,
            }
            .to_string();
            if ctx.json() {
                print_json(&serde_json::json!({
                    "status": "cooling_down",
                    "term": term,
                    "remaining_secs": remaining_secs,
                    "message": message,
                }));
            } else {
                println!("{}", message);
            }
            Ok(CommandStatus::Refused)
        }
    }
}

/// Show a term's score.
pub fn cmd_check(ctx: &CliContext, term: &str) -> KarmaResult<CommandStatus> {
    let engine = ctx.open()?;
    let report = engine.check(term)?;
    ctx.save(&engine)?;
    print_report(ctx, &report);
    Ok(CommandStatus::Done)
}

/// Link `from -> to`.
pub fn cmd_link(ctx: &CliContext, from: &str, to: &str) -> KarmaResult<CommandStatus> {
    let engine = ctx.open()?;
    let outcome = engine.link(from, to)?;
    ctx.save(&engine)?;

    let (from, to) = (engine.term(from), engine.term(to));
    let (status, message, code) = match outcome {
        LinkOutcome::Linked => (
            "linked",
            format!("Linked '{}' -> '{}'", from, to),
            CommandStatus::Done,
        ),
        LinkOutcome::AlreadyLinked => (
            "already_linked",
            format!("'{}' is already linked to '{}'", from, to),
            CommandStatus::Done,
        ),
        LinkOutcome::ThresholdNotMet { threshold } => (
            "threshold_not_met",
            KarmaError::ThresholdNotMet { threshold }.to_string(),
            CommandStatus::Refused,
        ),
    };
    if ctx.json() {
        print_json(&serde_json::json!({
            "status": status,
            "from": from.name(),
            "to": to.name(),
            "message": message,
        }));
    } else {
        println!("{}", message);
    }
    Ok(code)
}

/// Remove the link `from -> to`.
pub fn cmd_unlink(ctx: &CliContext, from: &str, to: &str) -> KarmaResult<CommandStatus> {
    let engine = ctx.open()?;
    let existed = engine.unlink(from, to)?;
    ctx.save(&engine)?;

    let (from, to) = (engine.term(from), engine.term(to));
    if ctx.json() {
        print_json(&serde_json::json!({
            "from": from.name(),
            "to": to.name(),
            "unlinked": existed,
        }));
    } else if existed {
        println!("Unlinked '{}' -> '{}'", from, to);
    } else {
        println!("'{}' is not linked to '{}'", from, to);
    }
    Ok(CommandStatus::Done)
}

/// List the highest scores.
pub fn cmd_best(ctx: &CliContext, n: Option<usize>) -> KarmaResult<CommandStatus> {
    let engine = ctx.open()?;
    let rows = engine.list_best(n)?;
    ctx.save(&engine)?;
    print_listing(ctx, "Best", &rows);
    Ok(CommandStatus::Done)
}

/// List the lowest scores.
pub fn cmd_worst(ctx: &CliContext, n: Option<usize>) -> KarmaResult<CommandStatus> {
    let engine = ctx.open()?;
    let rows = engine.list_worst(n)?;
    ctx.save(&engine)?;
    print_listing(ctx, "Worst", &rows);
    Ok(CommandStatus::Done)
}

/// Show who changed a term and how often.
pub fn cmd_modified(ctx: &CliContext, term: &str) -> KarmaResult<CommandStatus> {
    let engine = ctx.open()?;
    let modifiers = engine.modified_names(term, &ctx.directory())?;
    ctx.save(&engine)?;

    if ctx.json() {
        print_json(&modifiers);
    } else if modifiers.is_empty() {
        println!("Nobody has modified '{}'", engine.term(term));
    } else {
        println!("Modified '{}':", engine.term(term));
        for m in &modifiers {
            println!("  {}: {}", m.name, m.count);
        }
    }
    Ok(CommandStatus::Done)
}

/// Delete a term by its exact stored name.
pub fn cmd_delete(ctx: &CliContext, term: &str) -> KarmaResult<CommandStatus> {
    let engine = ctx.open()?;
    let result = engine.delete(term);
    ctx.save(&engine)?;

    match result {
        Ok(report) => {
            print_delete(ctx, &report);
            Ok(CommandStatus::Done)
        }
        Err(KarmaError::TermNotFound(name)) => {
            let message = KarmaError::TermNotFound(name.clone()).to_string();
            if ctx.json() {
                print_json(&serde_json::json!({
                    "status": "not_found",
                    "term": name,
                    "message": message,
                }));
            } else {
                println!("{}", message);
            }
            Ok(CommandStatus::Refused)
        }
        Err(e) => Err(e),
    }
}

/// Expire old contributions now.
pub fn cmd_decay(ctx: &CliContext) -> KarmaResult<CommandStatus> {
    let engine = ctx.open()?;
    let report = engine.run_decay()?;
    ctx.save(&engine)?;
    print_decay(ctx, engine.config().decay_enabled(), &report);
    Ok(CommandStatus::Done)
}

/// Apply pending data upgrades.
pub fn cmd_migrate(ctx: &CliContext) -> KarmaResult<CommandStatus> {
    let engine = ctx.open()?;
    let report = engine.run_migrations()?;
    ctx.save(&engine)?;
    print_migrations(ctx, &report);
    Ok(CommandStatus::Done)
}

#[derive(Serialize)]
struct StoreInfo {
    file: String,
    file_size: u64,
    keys: usize,
    terms: usize,
    actions: usize,
    decay: bool,
    decay_interval: u64,
    cooldown: Option<u64>,
    link_threshold: Option<i64>,
    reverse_links_upgraded: bool,
    modified_counts_upgraded: bool,
    decay_backfilled: bool,
}

/// Describe the store file and active settings. Does not write.
pub fn cmd_info(ctx: &CliContext) -> KarmaResult<CommandStatus> {
    let engine = ctx.open()?;
    let info = store_info(ctx, &engine)?;

    if ctx.json() {
        print_json(&info);
    } else {
        println!("File: {}", info.file);
        println!("File size: {}", format_size(info.file_size));
        println!("Keys: {}", info.keys);
        println!("Terms: {}", info.terms);
        println!("Actions: {}", info.actions);
        if info.decay {
            println!("Decay: on ({})", format_duration(info.decay_interval));
        } else {
            println!("Decay: off");
        }
        match info.cooldown {
            Some(secs) => println!("Cooldown: {}", format_duration(secs)),
            None => println!("Cooldown: off"),
        }
        match info.link_threshold {
            Some(t) => println!("Link threshold: {}", t),
            None => println!("Link threshold: off"),
        }
        println!("Upgrades:");
        println!("  reverse links: {}", yes_no(info.reverse_links_upgraded));
        println!("  modified counts: {}", yes_no(info.modified_counts_upgraded));
        println!("  decay backfill: {}", yes_no(info.decay_backfilled));
    }
    Ok(CommandStatus::Done)
}

fn store_info(ctx: &CliContext, engine: &KarmaEngine<MemoryStore>) -> KarmaResult<StoreInfo> {
    let store = engine.store();
    let file_size = std::fs::metadata(ctx.store_path())
        .map(|m| m.len())
        .unwrap_or(0);
    let config = engine.config();
    Ok(StoreInfo {
        file: ctx.store_path().display().to_string(),
        file_size,
        keys: store.key_count(),
        terms: engine.term_count()?,
        actions: store.ranked_len(keys::ACTIONS)?,
        decay: config.decay_enabled(),
        decay_interval: config.decay_interval(),
        cooldown: config.cooldown(),
        link_threshold: config.link_threshold(),
        reverse_links_upgraded: store.exists(keys::SUPPORT_REVERSE_LINKS)?,
        modified_counts_upgraded: store.exists(keys::SUPPORT_MODIFIED_COUNTS)?,
        decay_backfilled: store.exists(keys::SUPPORT_DECAY)?,
    })
}

fn print_report(ctx: &CliContext, report: &ScoreReport) {
    if ctx.json() {
        print_json(report);
        return;
    }
    if report.links.is_empty() {
        println!("{}: {}", report.term, report.total);
    } else {
        let links: Vec<String> = report
            .links
            .iter()
            .map(|l| format!("{}: {}", l.term, l.score))
            .collect();
        println!(
            "{}: {} ({} on its own, linked {})",
            report.term,
            report.total,
            report.own,
            links.join(", ")
        );
    }
}

fn print_listing(ctx: &CliContext, title: &str, rows: &[RankedTerm]) {
    if ctx.json() {
        print_json(&rows);
        return;
    }
    if rows.is_empty() {
        println!("No terms yet");
        return;
    }
    println!("{}:", title);
    for (i, row) in rows.iter().enumerate() {
        println!("  {}. {} ({})", i + 1, row.term, row.score);
    }
}

fn print_delete(ctx: &CliContext, report: &DeleteReport) {
    if ctx.json() {
        print_json(report);
    } else {
        println!(
            "Deleted '{}' ({} action(s), {} link(s), {} backlink(s))",
            report.term,
            report.actions_purged,
            report.outgoing.len(),
            report.incoming.len()
        );
    }
}

fn print_decay(ctx: &CliContext, enabled: bool, report: &DecayReport) {
    if ctx.json() {
        print_json(&serde_json::json!({
            "enabled": enabled,
            "actions_expired": report.actions_expired,
            "terms_touched": report.terms_touched,
            "modifiers_cleared": report.modifiers_cleared,
        }));
    } else if !enabled {
        println!("Decay is disabled");
    } else {
        println!(
            "Expired {} action(s) across {} term(s)",
            report.actions_expired,
            report.terms_touched.len()
        );
    }
}

fn print_migrations(ctx: &CliContext, report: &MigrationReport) {
    if ctx.json() {
        print_json(report);
        return;
    }
    for (name, status) in [
        ("reverse links", &report.reverse_links),
        ("modified counts", &report.modified_counts),
        ("decay backfill", &report.decay),
    ] {
        let text = match status {
            UpgradeStatus::Applied { items } => format!("applied ({} item(s))", items),
            UpgradeStatus::AlreadyApplied => "already applied".to_string(),
            UpgradeStatus::Skipped { reason } => format!("skipped: {}", reason),
        };
        println!("{}: {}", name, text);
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn format_duration(secs: u64) -> String {
    const DAY: u64 = 24 * 60 * 60;
    if secs >= DAY && secs % DAY == 0 {
        format!("{} day(s)", secs / DAY)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{} minute(s)", secs / 60)
    } else {
        format!("{} second(s)", secs)
    }
}
