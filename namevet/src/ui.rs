//! Terminal display logic for the namevet CLI.
//!
//! Colored verdict lines, grouped `--pretty` sections, the spinner,
//! summaries and listings. Uses only the `console` crate.

use console::{pad_str, style, Alignment, Term};
use namevet_lib::{
    Availability, HealthReport, HealthStatus, PlatformSpec, ProbeStrategy, RdapService,
    SimilarMatch, TldProfile, Verdict, VerdictSource, VettingReport,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TARGET_WIDTH: usize = 30;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// Start a new spinner with the given message.
    pub fn start(message: String) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Single verdict line ──────────────────────────────────────────────────────

/// Print one verdict as a colored, aligned line.
pub fn print_verdict(verdict: &Verdict, debug: bool) {
    let target = verdict.target.to_string();
    let padded = pad_str(&target, TARGET_WIDTH, Alignment::Left, Some(".."));
    println!("  {}  {}", style(&padded).white(), status_and_note(verdict));
    if debug {
        print_provenance(verdict, "    ");
    }
}

fn status_and_note(verdict: &Verdict) -> String {
    match (verdict.status, verdict.source) {
        (Availability::Available, _) if verdict.is_provisional() => format!(
            "{}  {}",
            style("AVAILABLE").green().bold(),
            style(format!("(provisional, via {})", verdict.source)).dim()
        ),
        (Availability::Available, _) => style("AVAILABLE").green().bold().to_string(),
        (Availability::Taken, _) => {
            let note = verdict
                .detail
                .as_deref()
                .map(|d| format!("  {}", style(d).dim()))
                .unwrap_or_default();
            format!("{}{}", style("TAKEN").red().bold(), note)
        }
        (Availability::Unknown, VerdictSource::ManualFallback) => format!(
            "{}  {}",
            style("CHECK MANUALLY").cyan(),
            style(verdict.detail.as_deref().unwrap_or("")).dim()
        ),
        (Availability::Unknown, _) => format!(
            "{}  {}",
            style("UNKNOWN").yellow(),
            style(brief_reason(verdict)).dim()
        ),
    }
}

fn print_provenance(verdict: &Verdict, indent: &str) {
    let detail = match (verdict.status, verdict.detail.as_deref()) {
        (Availability::Unknown, Some(detail)) => format!(": {}", detail),
        _ => String::new(),
    };
    println!(
        "{}{} via {} ({:?} confidence){}",
        indent,
        style("└─").dim(),
        verdict.source,
        verdict.confidence,
        detail,
    );
}

// ── Full report ──────────────────────────────────────────────────────────────

/// Print a vetting report, flat or grouped by status.
pub fn print_report(report: &VettingReport, pretty: bool, debug: bool) {
    if pretty {
        print_header(report);
    }

    if !report.domains.is_empty() {
        print_section_title("Domains", pretty);
        print_verdicts(&report.domains, pretty, debug);
    }
    if !report.social.is_empty() {
        print_section_title("Social handles", pretty);
        print_verdicts(&report.social, pretty, debug);
    }

    print_section_title("Similar registered names", pretty);
    print_similar(&report.similar);

    println!();
    print_summary(report);
}

/// Print a styled header at the start of a pretty run.
fn print_header(report: &VettingReport) {
    println!(
        "{} {} {}",
        style("namevet").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!("· {} (handle @{})", report.name, report.handle)).dim(),
    );
    println!();
}

fn print_section_title(title: &str, pretty: bool) {
    if pretty {
        println!("{}", style(title).bold().underlined());
    } else {
        println!("{}:", title);
    }
}

fn print_verdicts(verdicts: &[Verdict], pretty: bool, debug: bool) {
    if !pretty {
        for verdict in verdicts {
            print_verdict(verdict, debug);
        }
        println!();
        return;
    }

    let groups = [
        ("Available", Availability::Available),
        ("Taken", Availability::Taken),
        ("Unknown", Availability::Unknown),
    ];
    for (label, status) in groups {
        let members: Vec<&Verdict> = verdicts.iter().filter(|v| v.status == status).collect();
        if members.is_empty() {
            continue;
        }
        let heading = format!("── {} ({}) ", label, members.len());
        let rule = "─".repeat(44usize.saturating_sub(heading.chars().count()));
        let line = match status {
            Availability::Available => format!("{} {}", style(heading).green().bold(), style(rule).green().dim()),
            Availability::Taken => format!("{} {}", style(heading).red().bold(), style(rule).red().dim()),
            Availability::Unknown => format!("{} {}", style(heading).yellow().bold(), style(rule).yellow().dim()),
        };
        println!("  {}", line);
        for verdict in members {
            print_grouped_line(verdict, debug);
        }
        println!();
    }
}

/// Print a single line inside a grouped section.
fn print_grouped_line(verdict: &Verdict, debug: bool) {
    let target = verdict.target.to_string();
    let padded = pad_str(&target, TARGET_WIDTH, Alignment::Left, Some(".."));
    let note = match verdict.status {
        Availability::Available if verdict.is_provisional() => {
            format!("(provisional, via {})", verdict.source)
        }
        Availability::Available => String::new(),
        Availability::Taken => verdict.detail.clone().unwrap_or_default(),
        Availability::Unknown if verdict.source == VerdictSource::ManualFallback => format!(
            "check manually: {}",
            verdict.detail.as_deref().unwrap_or("")
        ),
        Availability::Unknown => brief_reason(verdict).to_string(),
    };
    println!("    {}  {}", style(&padded).white(), style(note).dim());
    if debug {
        print_provenance(verdict, "      ");
    }
}

fn print_similar(similar: &[SimilarMatch]) {
    if similar.is_empty() {
        println!("  {}", style("none found").dim());
        return;
    }
    for m in similar {
        let padded = pad_str(&m.domain, TARGET_WIDTH, Alignment::Left, Some(".."));
        println!(
            "  {}  {}",
            style(&padded).white(),
            style(format!("distance {}", m.distance)).dim()
        );
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Counts of available, taken and unknown verdicts.
pub fn tally<'a, I: IntoIterator<Item = &'a Verdict>>(verdicts: I) -> (usize, usize, usize) {
    verdicts
        .into_iter()
        .fold((0, 0, 0), |(a, t, u), v| match v.status {
            Availability::Available => (a + 1, t, u),
            Availability::Taken => (a, t + 1, u),
            Availability::Unknown => (a, t, u + 1),
        })
}

/// Print the final summary bar with colored counts.
fn print_summary(report: &VettingReport) {
    let (available, taken, unknown) = tally(report.verdicts());
    let total = available + taken + unknown;

    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} check{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "s" },
        report.elapsed.as_secs_f64(),
        style("|").dim(),
        style(format!("{} available", available)).green(),
        style("|").dim(),
        style(format!("{} taken", taken)).red(),
        style("|").dim(),
        style(format!("{} unknown", unknown)).yellow(),
    );
    if !report.completeness {
        println!(
            "  {}",
            style("Some checks could not be completed; unknown results are not evidence either way.")
                .yellow()
        );
    }
}

// ── Health ───────────────────────────────────────────────────────────────────

pub fn print_health(report: &HealthReport) {
    let status = match report.status {
        HealthStatus::Ok => style("OK").green().bold(),
        HealthStatus::Degraded => style("DEGRADED").yellow().bold(),
        HealthStatus::Down => style("DOWN").red().bold(),
    };
    println!("{} {}", style("namevet health:").bold(), status);
    println!("  outbound network     {}", yes_no(report.outbound));
    println!("  rate limiter         {}", yes_no(report.rate_limiter));
    println!("  unreachable streak   {}", report.consecutive_unreachable);
    if !report.throttled_upstreams.is_empty() {
        println!("  throttled upstreams  {}", report.throttled_upstreams.join(", "));
    }
    println!("  cached verdicts      {}", report.cached_verdicts);
    println!("  version              {}", report.version);
}

fn yes_no(ok: bool) -> console::StyledObject<&'static str> {
    if ok {
        style("ok").green()
    } else {
        style("failing").red()
    }
}

// ── Listings ─────────────────────────────────────────────────────────────────

/// Print the supported platforms, or their table as JSON.
pub fn print_platforms(platforms: &[PlatformSpec], json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(platforms)?);
        return Ok(());
    }

    println!();
    println!("{}", style("Supported platforms:").yellow().bold());
    println!();
    for platform in platforms {
        let strategy = match &platform.strategy {
            ProbeStrategy::StatusCode => "status code",
            ProbeStrategy::ContentAware { .. } => "page content",
            ProbeStrategy::ManualFallback => "manual check",
        };
        let aliases = if platform.aliases.is_empty() {
            String::new()
        } else {
            format!("  (also: {})", platform.aliases.join(", "))
        };
        println!(
            "  {} {}  {}{}",
            style(format!("{:<10}", platform.name)).green().bold(),
            style(format!("{:<13}", strategy)).cyan(),
            platform.url_template,
            style(aliases).dim(),
        );
    }
    println!();
    Ok(())
}

/// Print the built-in TLD profiles, or the table as JSON.
pub fn print_tld_profiles(profiles: &[TldProfile], json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(profiles)?);
        return Ok(());
    }

    println!();
    println!("{}", style("Built-in TLD profiles:").yellow().bold());
    println!();
    for profile in profiles {
        let rdap = match profile.rdap {
            RdapService::Endpoint(url) => url,
            RdapService::Unsupported => "(no RDAP, WHOIS/DNS only)",
        };
        println!(
            "  {} {}  {}",
            style(format!(".{:<8}", profile.tld)).green().bold(),
            style(format!("{:<34}", profile.whois_server.unwrap_or("(IANA referral)"))).cyan(),
            rdap,
        );
    }
    println!();
    println!("Other TLDs are checked through rdap.org and IANA WHOIS referral.");
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Short reason for an unknown verdict, from its detail text.
fn brief_reason(verdict: &Verdict) -> &'static str {
    match &verdict.detail {
        Some(detail) => {
            let d = detail.to_lowercase();
            if d.contains("budget") {
                "(out of time)"
            } else if d.contains("rate limited") {
                "(rate limited)"
            } else if d.contains("timeout") {
                "(timeout)"
            } else if d.contains("unreachable") {
                "(network error)"
            } else if d.contains("malformed") {
                "(unexpected response)"
            } else if d.contains("unsupported platform") {
                "(unsupported platform)"
            } else if d.contains("invalid") {
                "(invalid input)"
            } else {
                "(error)"
            }
        }
        None => "(unknown status)",
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
