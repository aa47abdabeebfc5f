//! Operator chat commands
//!
//! `/verify ban <member>`, `/verify unban <member>`, `/verify clean [-y]`.

use crate::gateway::MemberId;

/// Prefix every operator command starts with
pub const COMMAND_PREFIX: &str = "/verify";

/// Operator command types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Quarantine a member in the current group
    Ban { member: MemberId },

    /// Lift quarantine in the current group
    Unban { member: MemberId },

    /// Sweep overdue members (dry run unless confirmed)
    Clean { confirm: bool },

    /// Show help
    Help,

    /// Unknown or malformed subcommand
    Unknown(String),
}

impl Command {
    /// (syntax, description) pairs for the help text
    pub fn all_commands() -> Vec<(&'static str, &'static str)> {
        vec![
            ("/verify ban <member>", "Mute a member until they unlock"),
            ("/verify unban <member>", "Lift a member's mute"),
            (
                "/verify clean [-y]",
                "List members past the grace period; -y removes them",
            ),
            ("/verify help", "Show this help message"),
        ]
    }

    pub fn help_text() -> String {
        let mut text = String::from("Verification commands:");
        for (syntax, description) in Self::all_commands() {
            text.push_str(&format!("\n{} - {}", syntax, description));
        }
        text
    }
}

/// Parse a chat line. Returns `None` when it is not a `/verify` command.
pub fn parse_command(text: &str) -> Option<Command> {
    let mut parts = text.split_whitespace();
    if parts.next()? != COMMAND_PREFIX {
        return None;
    }

    let command = match parts.next() {
        None | Some("help") => Command::Help,
        Some(sub @ ("ban" | "unban")) => {
            let Some(member) = parts.next().and_then(parse_member_arg) else {
                return Some(Command::Unknown(text.trim().to_string()));
            };
            if sub == "ban" {
                Command::Ban { member }
            } else {
                Command::Unban { member }
            }
        }
        Some("clean") => Command::Clean {
            confirm: parts.any(|flag| flag == "-y" || flag == "--yes"),
        },
        Some(_) => Command::Unknown(text.trim().to_string()),
    };

    Some(command)
}

/// Accepts `123456`, `@123456`, `platform:123456` and `[CQ:at,qq=123456]`.
pub fn parse_member_arg(arg: &str) -> Option<MemberId> {
    let arg = arg.trim();
    let id = if let Some(rest) = arg.strip_prefix("[CQ:at,qq=") {
        let end = rest.find([',', ']'])?;
        &rest[..end]
    } else if let Some(rest) = arg.strip_prefix('@') {
        rest
    } else {
        arg.rsplit(':').next()?
    };

    id.parse::<u64>().ok().map(MemberId)
}
