use crate::error::SplitError;

pub const STATEMENT_SEPARATOR: char = ';';

/// Split SQL text on `;`, dropping empty and whitespace-only fragments.
///
/// There is no awareness of string literals or comments: a `;` inside a
/// literal splits it too.
pub fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(STATEMENT_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether a fragment holds nothing but `--` and `/* */` comments
pub fn is_comment_only(statement: &str) -> bool {
    let mut rest = statement.trim_start();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |i| &after[i + 1..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |i| &after[i + 2..]);
        } else {
            return false;
        }
        rest = rest.trim_start();
    }
    true
}

/// Statements of one query: setup statements run for side effects, then the
/// statement whose rows become the frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementPlan<'a> {
    pub setup: Vec<&'a str>,
    pub result: &'a str,
}

impl<'a> StatementPlan<'a> {
    pub fn parse(sql: &'a str) -> Result<Self, SplitError> {
        let mut statements = split_statements(sql);
        let result = statements.pop().ok_or(SplitError::EmptyQuery)?;
        Ok(Self { setup: statements, result })
    }

    pub fn statement_count(&self) -> usize {
        self.setup.len() + 1
    }
}
