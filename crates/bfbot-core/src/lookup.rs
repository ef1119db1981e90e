//! Multi-store lookup and report rendering.

use crate::{
    domain::UserId,
    formatting::{escape_html, format_nullable_timestamp, format_timestamp},
    store::{MembershipRecord, StoreMap},
    Result,
};

/// Look `id` up in every store and render the aggregate report.
///
/// Stores are visited in lexicographic name order; that order is reflected
/// verbatim in the output.
pub fn lookup(stores: &StoreMap, id: UserId) -> Result<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut placeholder: Vec<&str> = Vec::new();
    // Buckets keyed by ban signature, in order of first occurrence. Stores
    // that recorded an identical ban event share one detail block.
    let mut banned: Vec<(String, Vec<(&str, MembershipRecord)>)> = Vec::new();

    for (name, store) in stores {
        let Some(record) = store.get_user(id)? else {
            continue;
        };
        if !record.is_placeholder() {
            seen.push(name.as_str());
        }
        if record.rank < 0 {
            if record.is_placeholder() {
                placeholder.push(name.as_str());
            } else {
                let key = ban_signature(&record);
                match banned.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, entries)) => entries.push((name.as_str(), record)),
                    None => banned.push((key, vec![(name.as_str(), record)])),
                }
            }
        }
    }

    Ok(render(id, &seen, &banned, &placeholder))
}

/// Bans sharing a leave date and reason are one event recorded by several
/// communities.
fn ban_signature(record: &MembershipRecord) -> String {
    let date = record
        .left
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    format!("{date}{}", record.blacklist_reason.as_deref().unwrap_or(""))
}

fn render(
    id: UserId,
    seen: &[&str],
    banned: &[(String, Vec<(&str, MembershipRecord)>)],
    placeholder: &[&str],
) -> String {
    let mut out = format!("User ID: <code>{id}</code>\n");

    if seen.is_empty() {
        out.push_str("Haven't seen this guy anywhere");
        return out;
    }

    let mut body = String::new();
    for (_, entries) in banned {
        let names = entries
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        body.push_str(&format!("<u>In {names}:</u>\n"));

        let (_, record) = &entries[0];
        let lines = describe_record(record)
            .into_iter()
            .map(|line| format!("– {}", escape_html(&line)))
            .collect::<Vec<_>>();
        body.push_str(&lines.join("\n"));
        body.push('\n');
    }
    if !placeholder.is_empty() {
        body.push_str(&format!("<u>In {}:</u>\n", placeholder.join(", ")));
        body.push_str("– (placeholder)\n");
    }
    if body.is_empty() {
        body.push_str("Not banned anywhere");
    }

    out.push_str(&format!("Seen in: {}\n\n{body}", seen.join(", ")));
    out
}

/// One `column: value` line per displayed field, in column-name order.
/// `rank` and `realname` drive classification and are not shown.
fn describe_record(record: &MembershipRecord) -> Vec<String> {
    vec![
        format!(
            "blacklistReason: {}",
            record.blacklist_reason.as_deref().unwrap_or("NULL")
        ),
        format!(
            "cooldownUntil: {}",
            format_nullable_timestamp(record.cooldown_until)
        ),
        format!("joined: {}", format_timestamp(record.joined)),
        format!(
            "lastActive: {}",
            format_nullable_timestamp(record.last_active)
        ),
        format!("left: {}", format_nullable_timestamp(record.left)),
    ]
}
