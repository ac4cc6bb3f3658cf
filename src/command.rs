//! Command types and parsing for the line-oriented browser

use chrono::{Days, Local, Months, NaiveDate};

use crate::preference::ViewMode;
use crate::query::{DATE_FORMAT, Intent, Ordering, QueryState};

/// Help information for a command
#[derive(Debug, Clone)]
pub struct CommandHelp {
    pub name: &'static str,
    pub description: &'static str,
}

/// Date range ending today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecentRange {
    Today,
    /// The last 7 days
    Week,
    /// Since the same day last month
    Month,
}

impl RecentRange {
    /// `(from, to)` for a range ending on `today`
    pub fn bounds(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let from = match self {
            Self::Today => Some(today),
            Self::Week => today.checked_sub_days(Days::new(7)),
            Self::Month => today.checked_sub_months(Months::new(1)),
        };
        (from.unwrap_or(NaiveDate::MIN), today)
    }
}

/// Parsed command from user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Search(String),
    Sort(Ordering),
    Page(u32),
    Next,
    Prev,
    Dates(Option<NaiveDate>, Option<NaiveDate>),
    Recent(RecentRange),
    Owner(Option<String>),
    Reset,
    Back,
    Forward,
    Retry,
    ClearSearch,
    View(ViewMode),
    /// 1-based position in the current page
    Show(usize),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse_command(input: &str) -> Result<Option<ParsedCommand>, CommandError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (trimmed, ""),
    };

    let command = match name {
        "search" | "s" | "/" => ParsedCommand::Search(rest.to_string()),
        "sort" | "o" => {
            let slug = required("sort", rest)?;
            ParsedCommand::Sort(
                slug.parse()
                    .map_err(|e| CommandError::InvalidArgument(format!("{e}")))?,
            )
        }
        "page" | "p" => {
            let page = required("page", rest)?;
            ParsedCommand::Page(page.parse().map_err(|_| {
                CommandError::InvalidArgument(format!("'{page}' is not a page number"))
            })?)
        }
        "next" | "n" => ParsedCommand::Next,
        "prev" | "previous" => ParsedCommand::Prev,
        "dates" | "d" => match rest {
            "today" => ParsedCommand::Recent(RecentRange::Today),
            "week" => ParsedCommand::Recent(RecentRange::Week),
            "month" => ParsedCommand::Recent(RecentRange::Month),
            "clear" => ParsedCommand::Dates(None, None),
            _ => {
                let mut parts = rest.split_whitespace();
                let from = optional_date(parts.next())?;
                let to = optional_date(parts.next())?;
                ParsedCommand::Dates(from, to)
            }
        },
        "owner" => ParsedCommand::Owner(
            Some(rest)
                .filter(|r| !r.is_empty() && *r != "-")
                .map(str::to_string),
        ),
        "reset" => ParsedCommand::Reset,
        "back" | "b" => ParsedCommand::Back,
        "forward" | "f" => ParsedCommand::Forward,
        "retry" | "r" => ParsedCommand::Retry,
        "clear" => ParsedCommand::ClearSearch,
        "view" | "v" => {
            let mode = required("view", rest)?;
            ParsedCommand::View(
                mode.parse()
                    .map_err(|e| CommandError::InvalidArgument(format!("{e}")))?,
            )
        }
        "show" => {
            let index = required("show", rest)?;
            match index.parse::<usize>() {
                Ok(n) if n >= 1 => ParsedCommand::Show(n),
                _ => {
                    return Err(CommandError::InvalidArgument(format!(
                        "'{index}' is not an item number"
                    )));
                }
            }
        }
        "help" | "h" | "?" => ParsedCommand::Help,
        "q" | "quit" | "exit" => ParsedCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn required<'a>(command: &'static str, rest: &'a str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(rest)
    }
}

/// `-` or a missing value means an open end
fn optional_date(value: Option<&str>) -> Result<Option<NaiveDate>, CommandError> {
    match value {
        None | Some("-") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map(Some)
            .map_err(|_| CommandError::InvalidArgument(format!("'{value}' is not a YYYY-MM-DD date"))),
    }
}

impl ParsedCommand {
    /// The query change this command asks for, if it is one
    pub fn intent(&self, query: &QueryState) -> Option<Intent> {
        self.intent_on(query, Local::now().date_naive())
    }

    fn intent_on(&self, query: &QueryState, today: NaiveDate) -> Option<Intent> {
        Some(match self {
            Self::Search(text) => Intent::SetSearch(text.clone()),
            Self::Sort(ordering) => Intent::SetOrdering(*ordering),
            Self::Page(page) => Intent::SetPage(*page),
            Self::Next => Intent::SetPage(query.page.saturating_add(1)),
            Self::Prev => Intent::SetPage(query.page.saturating_sub(1)),
            Self::Dates(from, to) => Intent::SetDateRange(*from, *to),
            Self::Recent(range) => {
                let (from, to) = range.bounds(today);
                Intent::SetDateRange(Some(from), Some(to))
            }
            Self::Owner(owner) => Intent::SetOwner(owner.clone()),
            Self::Reset => Intent::Reset,
            _ => return None,
        })
    }
}

/// Get all available commands for help display
pub fn available_commands() -> Vec<CommandHelp> {
    vec![
        CommandHelp {
            name: "search <text>",
            description: "Search (empty text clears the search)",
        },
        CommandHelp {
            name: "sort <order>",
            description: "Sort by newest, oldest, upload-newest or upload-oldest",
        },
        CommandHelp {
            name: "page <n>",
            description: "Jump to a page",
        },
        CommandHelp {
            name: "next / prev",
            description: "Move one page forward or back",
        },
        CommandHelp {
            name: "dates <from> <to>",
            description: "Limit to a date range (YYYY-MM-DD, '-' for open)",
        },
        CommandHelp {
            name: "dates today|week|month|clear",
            description: "Quick date ranges ending today, or no range",
        },
        CommandHelp {
            name: "owner <uuid>",
            description: "Only show stories of one profile ('-' to clear)",
        },
        CommandHelp {
            name: "reset",
            description: "Clear every filter and go to page 1",
        },
        CommandHelp {
            name: "back / forward",
            description: "Walk the address history",
        },
        CommandHelp {
            name: "retry",
            description: "Retry a failed request",
        },
        CommandHelp {
            name: "clear",
            description: "Clear the search when nothing matched",
        },
        CommandHelp {
            name: "view <mode>",
            description: "Story layout: grid, compact or list",
        },
        CommandHelp {
            name: "show <n>",
            description: "Show details of the n-th item",
        },
        CommandHelp {
            name: "help",
            description: "Show this help message",
        },
        CommandHelp {
            name: "quit",
            description: "Exit",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> ParsedCommand {
        parse_command(input).unwrap().unwrap()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse("next"), ParsedCommand::Next);
        assert_eq!(parse("  quit "), ParsedCommand::Quit);
        assert_eq!(parse("search  jane doe "), ParsedCommand::Search("jane doe".into()));
        assert_eq!(parse("search"), ParsedCommand::Search(String::new()));
        assert_eq!(parse("sort oldest"), ParsedCommand::Sort(Ordering::OldestFirst));
        assert_eq!(parse("page 3"), ParsedCommand::Page(3));
        assert_eq!(parse("view compact"), ParsedCommand::View(ViewMode::Compact));
        assert_eq!(parse_command("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_dates_and_owner() {
        assert_eq!(
            parse("dates 2024-01-01 -"),
            ParsedCommand::Dates(NaiveDate::from_ymd_opt(2024, 1, 1), None)
        );
        assert_eq!(parse("dates"), ParsedCommand::Dates(None, None));
        assert_eq!(parse("owner u1"), ParsedCommand::Owner(Some("u1".into())));
        assert_eq!(parse("owner -"), ParsedCommand::Owner(None));
        assert_eq!(parse("dates week"), ParsedCommand::Recent(RecentRange::Week));
        assert_eq!(parse("d today"), ParsedCommand::Recent(RecentRange::Today));
        assert_eq!(parse("dates clear"), ParsedCommand::Dates(None, None));
    }

    #[test]
    fn test_recent_ranges_end_today() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let today = day(2024, 3, 31);
        assert_eq!(RecentRange::Today.bounds(today), (today, today));
        assert_eq!(RecentRange::Week.bounds(today), (day(2024, 3, 24), today));
        // Clamped to the end of a shorter month
        assert_eq!(RecentRange::Month.bounds(today), (day(2024, 2, 29), today));

        let query = QueryState::default().with_page(4);
        assert_eq!(
            ParsedCommand::Recent(RecentRange::Week).intent_on(&query, today),
            Some(Intent::SetDateRange(Some(day(2024, 3, 24)), Some(today)))
        );
        assert_eq!(
            parse("dates clear").intent_on(&query, today),
            Some(Intent::SetDateRange(None, None))
        );
        assert!(ParsedCommand::Recent(RecentRange::Month).intent(&query).is_some());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_command("frobnicate"),
            Err(CommandError::Unknown("frobnicate".into()))
        );
        assert_eq!(parse_command("page"), Err(CommandError::MissingArgument("page")));
        assert!(matches!(
            parse_command("page two"),
            Err(CommandError::InvalidArgument(_))
        ));
        assert!(parse_command("dates 2024-13-01").is_err());
        assert!(parse_command("show 0").is_err());
        assert!(parse_command("sort sideways").is_err());
    }

    #[test]
    fn test_intents() {
        let query = QueryState::default().with_page(3);
        assert_eq!(ParsedCommand::Next.intent(&query), Some(Intent::SetPage(4)));
        assert_eq!(ParsedCommand::Prev.intent(&query), Some(Intent::SetPage(2)));
        assert_eq!(ParsedCommand::Reset.intent(&query), Some(Intent::Reset));
        assert_eq!(ParsedCommand::Back.intent(&query), None);
        assert_eq!(ParsedCommand::Show(1).intent(&query), None);
    }
}
