//! User-facing message texts: command replies and outgoing direct messages.

use brewbot_core::domain::participant::Participant;
use brewbot_core::domain::reminder::Reminder;
use brewbot_core::errors::InterfaceError;

/// A plain-text reply to a slash command. Ephemeral replies are visible only
/// to the invoking user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub ephemeral: bool,
}

impl Reply {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self { content: content.into(), ephemeral: true }
    }

    pub fn public(content: impl Into<String>) -> Self {
        Self { content: content.into(), ephemeral: false }
    }
}

pub fn help_message() -> Reply {
    Reply::ephemeral(
        [
            "**Available commands**",
            "`/remindme <time> <message>`: set a reminder, e.g. `/remindme 2 days call mom`",
            "`/cancelreminder <id|all>`: cancel one of your reminders, or all of them",
            "`/listreminders`: DM yourself your pending reminders",
            "`/coffee-pair`: run a coffee pairing now (admin only)",
            "`/coffee-list`: show who currently has the coffee role (admin only)",
            "`/help`: show this message",
        ]
        .join("\n"),
    )
}

pub fn usage_hint(command: &str, usage: &str) -> Reply {
    Reply::ephemeral(format!("Usage: `/{command} {usage}`"))
}

/// Refusals and failures are shown with their user-safe text only.
pub fn interface_error(error: &InterfaceError) -> Reply {
    Reply::ephemeral(error.user_message())
}

pub fn invalid_time_format() -> Reply {
    Reply::ephemeral("Invalid time format.")
}

pub fn empty_reminder_message() -> Reply {
    Reply::ephemeral("Reminder message must not be empty.")
}

pub fn reminder_failed() -> Reply {
    Reply::ephemeral("❌ Failed to schedule reminder.")
}

pub fn reminder_set(time_text: &str, reminder_id: &str) -> Reply {
    Reply::ephemeral(format!("⏰ Reminder set! I'll remind you in {time_text}. (ID: {reminder_id})"))
}

pub fn duplicate_reminder(existing_id: &str) -> Reply {
    Reply::ephemeral(format!("⚠️ A similar reminder already exists (ID: {existing_id})."))
}

pub fn canceled_all(count: usize) -> Reply {
    Reply::ephemeral(format!("✅ Canceled {count} reminders."))
}

pub fn reminder_not_found(reminder_id: &str) -> Reply {
    Reply::ephemeral(format!("❌ No reminder found with ID `{reminder_id}`."))
}

pub fn reminder_canceled(reminder_id: &str) -> Reply {
    Reply::ephemeral(format!("✅ Reminder with ID `{reminder_id}` has been canceled."))
}

pub fn cancel_failed() -> Reply {
    Reply::ephemeral("❌ Failed to cancel reminder. Please try again.")
}

pub fn no_pending_reminders() -> Reply {
    Reply::ephemeral("You don't have any pending reminders")
}

pub fn reminder_list_sent() -> Reply {
    Reply::ephemeral("✅ I sent your reminder list to your DMs.")
}

pub fn reminder_list_dm_failed() -> Reply {
    Reply::ephemeral("❌ Couldn't DM you. Please enable DMs.")
}

/// DM body listing `reminders` with the minutes left until each fires.
pub fn reminder_list_text(reminders: &[Reminder], now_ms: i64) -> String {
    let mut lines = vec!["**Your reminders**".to_owned()];
    for reminder in reminders {
        let minutes = (reminder.remaining_ms(now_ms) as f64 / 60_000.0).round() as u64;
        lines.push(format!("ID: {}: {} (in ~{minutes} min)", reminder.id, reminder.msg));
    }
    lines.join("\n")
}

pub fn no_pairings() -> Reply {
    Reply::ephemeral(
        "⚠️ No pairings created — not enough eligible members or member fetch timed out.",
    )
}

pub fn pairing_level_lookup_failed() -> Reply {
    Reply::ephemeral("⚠️ No pairings created — member levels could not be checked.")
}

pub fn guild_only() -> Reply {
    Reply::ephemeral("❌ This command can only be used inside a server.")
}

pub fn pairing_already_running() -> Reply {
    Reply::ephemeral("⚠️ A coffee pairing run is already in progress. Try again shortly.")
}

pub fn paired_groups(groups: usize, failed_notifications: usize) -> Reply {
    let mut content = format!("✅ Paired {groups} groups for coffee.");
    if failed_notifications > 0 {
        content.push_str(&format!(" {failed_notifications} DMs could not be delivered."));
    }
    Reply::ephemeral(content)
}

pub fn coffee_list(role: &str, participants: &[Participant]) -> Reply {
    let names = if participants.is_empty() {
        "(No members found)".to_owned()
    } else {
        participants
            .iter()
            .map(|participant| format!("{} ({})", participant.display_name, participant.id))
            .collect::<Vec<_>>()
            .join("\n")
    };

    Reply::ephemeral(format!(
        "**☕ Coffee Role Member Detection Debug**\n\n**Role Name:** {role}\n**Total Members Found:** {}\n\n**Member List:**\n{names}",
        participants.len()
    ))
}

pub fn reminder_notification(message: &str) -> String {
    format!("🔔 Reminder: {message}")
}

pub fn coffee_pairing_dm(recipient: &Participant, partners: &[&Participant], source: &str) -> String {
    let others = partners
        .iter()
        .map(|partner| format!("{} ({})", partner.display_name, partner.id))
        .collect::<Vec<_>>()
        .join(" and ");
    format!(
        "☕ Hi {}! You were paired for a coffee chat with {others}. Please DM them to set up a time. ({source})",
        recipient.display_name
    )
}

pub fn admin_notification(text: &str) -> String {
    format!("📣 Admin Notification: {text}")
}

#[cfg(test)]
mod tests {
    use brewbot_core::domain::participant::Participant;
    use brewbot_core::domain::reminder::{Reminder, ReminderId};

    use super::{coffee_list, coffee_pairing_dm, paired_groups, reminder_list_text, reminder_set};

    #[test]
    fn coffee_dm_names_every_partner_with_id_and_source() {
        let ada = Participant::new("1", "ada");
        let bea = Participant::new("2", "bea");
        let cy = Participant::new("3", "cy");

        let text = coffee_pairing_dm(&ada, &[&bea, &cy], "manual");
        assert_eq!(
            text,
            "☕ Hi ada! You were paired for a coffee chat with bea (2) and cy (3). Please DM them to set up a time. (manual)"
        );
    }

    #[test]
    fn reminder_set_echoes_time_and_id() {
        let reply = reminder_set("2 days", "1700000000000");
        assert!(reply.ephemeral);
        assert_eq!(reply.content, "⏰ Reminder set! I'll remind you in 2 days. (ID: 1700000000000)");
    }

    #[test]
    fn reminder_list_rounds_to_minutes() {
        let reminders = vec![Reminder {
            id: ReminderId("9".to_owned()),
            user_id: "U1".to_owned(),
            msg: "stretch".to_owned(),
            time: 10 * 60_000 + 20_000,
        }];

        let text = reminder_list_text(&reminders, 0);
        assert!(text.ends_with("ID: 9: stretch (in ~10 min)"), "{text}");
    }

    #[test]
    fn paired_groups_mentions_failed_dms_only_when_present() {
        assert_eq!(paired_groups(2, 0).content, "✅ Paired 2 groups for coffee.");
        assert!(paired_groups(2, 1).content.contains("1 DMs could not be delivered"));
    }

    #[test]
    fn coffee_list_handles_empty_role() {
        let reply = coffee_list("coffee chat", &[]);
        assert!(reply.content.contains("**Total Members Found:** 0"));
        assert!(reply.content.contains("(No members found)"));
    }
}
