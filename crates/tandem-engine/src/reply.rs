//! Model reply parsing.
//!
//! The textual action-marker convention lives here, outside the reasoning
//! state machine, as a single pure function: a reply either carries a
//! recognized `ACTION: <tool> <argument>` directive or it is the final
//! answer.

use std::sync::OnceLock;

use regex::Regex;

/// A parsed model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReply {
    /// No action marker: the reply is the agent's final answer.
    Final(String),
    /// The first recognized action directive in the reply.
    Action { name: String, argument: String },
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*ACTION:\s*([A-Za-z0-9_-]+)[ \t]+(.+?)\s*$").expect("valid regex")
    })
}

/// Parse a reply. The marker is matched at line starts, case-insensitively;
/// only the first directive counts.
pub fn parse(reply: &str) -> AgentReply {
    match action_re().captures(reply) {
        Some(caps) => AgentReply::Action {
            name: caps[1].to_ascii_lowercase(),
            argument: caps[2].trim().to_string(),
        },
        None => AgentReply::Final(reply.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_reply_is_final() {
        assert_eq!(
            parse("The answer is 42.\n"),
            AgentReply::Final("The answer is 42.".to_string())
        );
    }

    #[test]
    fn test_action_line() {
        assert_eq!(
            parse("ACTION: calculator 2+2"),
            AgentReply::Action {
                name: "calculator".to_string(),
                argument: "2+2".to_string(),
            }
        );
    }

    #[test]
    fn test_action_embedded_in_free_text() {
        let reply = "I need to compute this first.\nACTION: calculator 125 * 45\nThen I will summarize.";
        assert_eq!(
            parse(reply),
            AgentReply::Action {
                name: "calculator".to_string(),
                argument: "125 * 45".to_string(),
            }
        );
    }

    #[test]
    fn test_marker_is_case_insensitive() {
        assert!(matches!(
            parse("action: Calculator 1+1"),
            AgentReply::Action { name, .. } if name == "calculator"
        ));
    }

    #[test]
    fn test_first_directive_wins() {
        let reply = "ACTION: calculator 1+1\nACTION: search rust";
        assert_eq!(
            parse(reply),
            AgentReply::Action {
                name: "calculator".to_string(),
                argument: "1+1".to_string(),
            }
        );
    }

    #[test]
    fn test_marker_mid_line_is_not_a_directive() {
        let reply = "Use the syntax ACTION: calculator 2+2 when you need math.";
        // The marker only counts at a line start; this line starts with prose.
        assert!(matches!(parse(reply), AgentReply::Final(_)));
    }

    #[test]
    fn test_action_without_argument_is_final() {
        assert!(matches!(parse("ACTION: calculator"), AgentReply::Final(_)));
    }
}
