//! Admin bot command parsing.

/// A parsed admin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Help,
    List,
    Get(i64),
    Add {
        category: String,
        topic: String,
        content: String,
    },
    /// `None` fields keep the current value.
    Edit {
        id: i64,
        category: Option<String>,
        topic: Option<String>,
        content: Option<String>,
    },
    Append {
        id: i64,
        text: String,
    },
    Search(String),
    Delete(i64),
    Stats,
    Ask(String),
    Blacklist,
    Block(String),
    Unblock(String),
    Users,
    History(i64),
    Forget(i64),
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command")]
    Unknown,

    #[error("Usage: {0}")]
    Usage(&'static str),
}

pub const HELP_TEXT: &str = "\
Knowledge base admin

/list - all entries, newest first
/get <id> - show one entry
/add <category> | <topic> | <content> - add an entry
/edit <id> <category> | <topic> | <content> - replace an entry (- keeps a field)
/append <id> <text> - append text to an entry's content
/search <text> - find entries by topic or content
/delete <id> - delete an entry
/stats - knowledge base statistics
/ask <question> - preview the responder's answer

/blacklist - show ignored usernames
/block <username> - stop answering a user
/unblock <username> - answer a user again

/users - people with a conversation history
/history <user_id> - conversation statistics for a user
/forget <user_id> - clear a user's conversation history

/restart - restart the responder process";

const USAGE_GET: &str = "/get <id>";
const USAGE_ADD: &str = "/add <category> | <topic> | <content>";
const USAGE_EDIT: &str = "/edit <id> <category> | <topic> | <content>";
const USAGE_APPEND: &str = "/append <id> <text>";
const USAGE_SEARCH: &str = "/search <text>";
const USAGE_DELETE: &str = "/delete <id>";
const USAGE_ASK: &str = "/ask <question>";
const USAGE_BLOCK: &str = "/block <username>";
const USAGE_UNBLOCK: &str = "/unblock <username>";
const USAGE_HISTORY: &str = "/history <user_id>";
const USAGE_FORGET: &str = "/forget <user_id>";

impl AdminCommand {
    /// Parse a message like `/edit 3 Shop | Hours | 9 to 18`.
    ///
    /// A `@botname` suffix on the command word is ignored.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let text = text.trim();
        let (word, rest) = match text.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (text, ""),
        };
        let name = word
            .strip_prefix('/')
            .ok_or(CommandError::Unknown)?
            .split('@')
            .next()
            .unwrap_or_default()
            .to_lowercase();

        match name.as_str() {
            "start" | "help" => Ok(Self::Help),
            "list" => Ok(Self::List),
            "get" => parse_id(rest, USAGE_GET).map(Self::Get),
            "add" => {
                let [category, topic, content] =
                    split_fields(rest).ok_or(CommandError::Usage(USAGE_ADD))?;
                Ok(Self::Add {
                    category,
                    topic,
                    content,
                })
            }
            "edit" => {
                let (id, fields) = split_id(rest, USAGE_EDIT)?;
                let [category, topic, content] =
                    split_fields(fields).ok_or(CommandError::Usage(USAGE_EDIT))?;
                Ok(Self::Edit {
                    id,
                    category: keep_or_replace(category),
                    topic: keep_or_replace(topic),
                    content: keep_or_replace(content),
                })
            }
            "append" => {
                let (id, text) = split_id(rest, USAGE_APPEND)?;
                if text.is_empty() {
                    return Err(CommandError::Usage(USAGE_APPEND));
                }
                Ok(Self::Append {
                    id,
                    text: text.to_string(),
                })
            }
            "search" => non_empty(rest, USAGE_SEARCH).map(Self::Search),
            "delete" => parse_id(rest, USAGE_DELETE).map(Self::Delete),
            "stats" => Ok(Self::Stats),
            "ask" => non_empty(rest, USAGE_ASK).map(Self::Ask),
            "blacklist" => Ok(Self::Blacklist),
            "block" => non_empty(rest, USAGE_BLOCK).map(Self::Block),
            "unblock" => non_empty(rest, USAGE_UNBLOCK).map(Self::Unblock),
            "users" => Ok(Self::Users),
            "history" => parse_id(rest, USAGE_HISTORY).map(Self::History),
            "forget" => parse_id(rest, USAGE_FORGET).map(Self::Forget),
            "restart" => Ok(Self::Restart),
            _ => Err(CommandError::Unknown),
        }
    }
}

fn parse_id(rest: &str, usage: &'static str) -> Result<i64, CommandError> {
    rest.trim()
        .trim_start_matches('#')
        .parse()
        .map_err(|_| CommandError::Usage(usage))
}

fn split_id<'a>(rest: &'a str, usage: &'static str) -> Result<(i64, &'a str), CommandError> {
    let (id, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Ok((parse_id(id, usage)?, tail.trim()))
}

fn non_empty(rest: &str, usage: &'static str) -> Result<String, CommandError> {
    if rest.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(rest.to_string())
    }
}

/// Split `a | b | c`. Content may itself contain `|` after the second one.
fn split_fields(rest: &str) -> Option<[String; 3]> {
    let mut parts = rest.splitn(3, '|').map(|part| part.trim().to_string());
    let fields = [parts.next()?, parts.next()?, parts.next()?];
    Some(fields)
}

fn keep_or_replace(field: String) -> Option<String> {
    if field == "-" { None } else { Some(field) }
}
