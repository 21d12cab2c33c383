//! Text-mode display logic for domain-lookup CLI.
//!
//! Renders one [`LookupRecord`] as a labelled block: hostname split, method
//! badge, registrar, dates, status, nameservers and contacts. Uses only the
//! `console` crate for styling.

use chrono::{DateTime, Utc};
use console::{pad_str, style, Alignment};
use domain_lookup_lib::{split, LookupRecord, ParsedEntity};

const LABEL_WIDTH: usize = 14;

/// Print a record to stdout.
pub fn print_record(record: &LookupRecord, raw: bool) {
    for line in format_record(record, raw, Utc::now()) {
        println!("{}", line);
    }
}

/// Render a record as styled lines relative to `now`.
pub fn format_record(record: &LookupRecord, raw: bool, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(format!(
        "{}  {}",
        style(&record.domain).white().bold(),
        method_badge(record)
    ));

    if let Some(parts) = split(&record.domain) {
        if let Some(subdomain) = &parts.subdomain {
            lines.push(field("Subdomain", subdomain.clone()));
            lines.push(field("Root domain", parts.root_domain.clone()));
        }
    }

    if !record.found {
        let message = record
            .message
            .as_deref()
            .unwrap_or("Domain not found in registry");
        lines.push(field("Result", style(message).yellow().to_string()));
        return append_raw(lines, record, raw);
    }

    if let Some(registrar) = &record.registrar {
        lines.push(field("Registrar", registrar.clone()));
    }
    if let Some(registered) = &record.registration_date {
        lines.push(field("Registered", registered.clone()));
    }
    if let Some(expires) = &record.expiration_date {
        let value = match format_expiry(record, now) {
            Some(countdown) => format!("{}  {}", expires, countdown),
            None => expires.clone(),
        };
        lines.push(field("Expires", value));
    }
    if let Some(changed) = &record.last_changed_date {
        lines.push(field("Last changed", changed.clone()));
    }

    push_list(&mut lines, "Status", &record.status);
    push_list(&mut lines, "Nameservers", &record.nameservers);

    let contacts: Vec<String> = record.entities.iter().filter_map(format_contact).collect();
    push_list(&mut lines, "Contacts", &contacts);

    append_raw(lines, record, raw)
}

/// `RDAP` or `WHOIS`, with a `FALLBACK` marker when WHOIS stood in for RDAP.
fn method_badge(record: &LookupRecord) -> String {
    let badge = format!("[{}]", record.method);
    if record.fallback_used {
        format!(
            "{} {}",
            style(badge).cyan(),
            style("FALLBACK").yellow().bold()
        )
    } else {
        style(badge).cyan().to_string()
    }
}

/// Days until expiry, colored by urgency.
fn format_expiry(record: &LookupRecord, now: DateTime<Utc>) -> Option<String> {
    let days = record.days_until_expiration(now)?;

    let text = match days {
        d if d < 0 => style(format!("(expired {} days ago)", -d)).red().bold(),
        0 => style("(expires today)".to_string()).red().bold(),
        1 => style("(1 day left)".to_string()).red(),
        d if d <= 30 => style(format!("({} days left)", d)).yellow(),
        d => style(format!("({} days left)", d)).dim(),
    };
    Some(text.to_string())
}

/// One line per entity with a contact card: `roles: name (org) email phone`.
fn format_contact(entity: &ParsedEntity) -> Option<String> {
    let contact = entity.contact.as_ref()?;

    let mut parts: Vec<String> = Vec::new();
    match (&contact.name, &contact.organization) {
        (Some(name), Some(org)) if name != org => parts.push(format!("{} ({})", name, org)),
        (Some(name), _) => parts.push(name.clone()),
        (None, Some(org)) => parts.push(org.clone()),
        (None, None) => {}
    }
    parts.extend(contact.emails.iter().cloned());
    parts.extend(contact.phones.iter().cloned());

    if parts.is_empty() {
        return None;
    }

    let roles = if entity.roles.is_empty() {
        "contact".to_string()
    } else {
        entity.roles.join(", ")
    };
    Some(format!("{}: {}", style(roles).dim(), parts.join("  ")))
}

fn field(label: &str, value: String) -> String {
    format!(
        "  {} {}",
        style(pad_str(label, LABEL_WIDTH, Alignment::Left, None)).dim(),
        value
    )
}

/// First item beside the label, the rest aligned underneath.
fn push_list(lines: &mut Vec<String>, label: &str, items: &[String]) {
    for (i, item) in items.iter().enumerate() {
        let label = if i == 0 { label } else { "" };
        lines.push(field(label, item.clone()));
    }
}

fn append_raw(mut lines: Vec<String>, record: &LookupRecord, raw: bool) -> Vec<String> {
    if raw && !record.raw_data.is_null() {
        let pretty = serde_json::to_string_pretty(&record.raw_data)
            .unwrap_or_else(|_| record.raw_data.to_string());
        lines.push(format!("  {}", style("Raw data").dim()));
        lines.extend(pretty.lines().map(|l| format!("    {}", l)));
    }
    lines
}

// ── Tests ────────────────────────────────────────────────────────────────────
