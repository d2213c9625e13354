//! Parser for the output of `navencrypt acl --list`.
//!
//! The listing is a fixed-size header followed by one rule per line: the
//! tool-assigned ordinal, then the rule text in whitespace-separated columns.
//!
//! ```text
//! # - Type  Category  Path  Profile  Process
//! ------------------------------------------
//! 1   ALLOW @mysql    *     *        /usr/sbin/mysqld
//! 2   ALLOW @log      *     *        /usr/sbin/rsyslogd
//! ```

/// Number of header lines preceding the rules.
pub const HEADER_LINES: usize = 2;

/// One listed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRow {
    /// Ordinal the tool assigned, used to delete the rule.
    pub ordinal: String,
    /// Rule text, whitespace collapsed to single spaces.
    pub rule: String,
}

/// A parsed rule listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleList {
    rows: Vec<RuleRow>,
}

impl RuleList {
    /// Parse a listing with the standard header.
    #[must_use]
    pub fn parse(output: &str) -> Self {
        Self::parse_with_header(output, HEADER_LINES)
    }

    /// Parse a listing whose header is `header_lines` long.
    ///
    /// Leading blank lines are skipped before the header is discarded. Blank
    /// lines among the rules are ignored, as are lines carrying an ordinal
    /// but no rule text. `\r\n` line endings are accepted.
    #[must_use]
    pub fn parse_with_header(output: &str, header_lines: usize) -> Self {
        let rows = output
            .lines()
            .skip_while(|line| line.trim().is_empty())
            .skip(header_lines)
            .filter_map(parse_row)
            .collect();
        Self { rows }
    }

    /// The rules, in listing order.
    #[must_use]
    pub fn rows(&self) -> &[RuleRow] {
        &self.rows
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the listing has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the rules.
    pub fn iter(&self) -> impl Iterator<Item = &RuleRow> {
        self.rows.iter()
    }

    /// Find the row whose rule text equals `rule` after whitespace
    /// normalization. The first such row wins.
    ///
    /// Interior runs of whitespace in `rule` collapse to one space, as they
    /// do in the listed rows: the listing separates columns with padding, so
    /// the original spacing of a rule cannot be recovered from it.
    #[must_use]
    pub fn resolve(&self, rule: &str) -> Option<&RuleRow> {
        let wanted = normalize_rule(rule);
        self.rows.iter().find(|row| row.rule == wanted)
    }
}

impl<'a> IntoIterator for &'a RuleList {
    type Item = &'a RuleRow;
    type IntoIter = std::slice::Iter<'a, RuleRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Collapse runs of whitespace to single spaces and trim the ends.
#[must_use]
pub fn normalize_rule(rule: &str) -> String {
    rule.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_row(line: &str) -> Option<RuleRow> {
    let mut tokens = line.split_whitespace();
    let ordinal = tokens.next()?;
    let rule = tokens.collect::<Vec<_>>().join(" ");
    if rule.is_empty() {
        return None;
    }
    Some(RuleRow {
        ordinal: ordinal.to_string(),
        rule,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LISTING: &str = "\
# - Type  Category  Path  Profile  Process
-----------------------------------------
1   ALLOW @mysql    *     *        /usr/sbin/mysqld
2   ALLOW @log      *     *        /usr/sbin/rsyslogd

";

    #[test]
    fn parses_rows_after_header() {
        let list = RuleList::parse(LISTING);
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.rows()[0],
            RuleRow {
                ordinal: "1".into(),
                rule: "ALLOW @mysql * * /usr/sbin/mysqld".into(),
            }
        );
        assert_eq!(list.rows()[1].ordinal, "2");
    }

    #[test]
    fn single_row_with_trailing_space() {
        let list = RuleList::parse("NUM  RULE\n---  ----\n3   ALLOW @m * /usr/bin/ls \n\n");
        assert_eq!(list.resolve("ALLOW @m * /usr/bin/ls").unwrap().ordinal, "3");
        assert!(list.resolve("ALLOW @m * /usr/bin/cat").is_none());
    }

    #[test]
    fn tolerates_crlf_and_leading_blank_lines() {
        let listing = format!(" \r\n\r\n{}", LISTING.replace('\n', "\r\n"));
        let list = RuleList::parse(&listing);
        assert_eq!(list.len(), 2);
        assert_eq!(list.rows()[1].rule, "ALLOW @log * * /usr/sbin/rsyslogd");
    }

    #[test]
    fn header_then_blank_is_empty() {
        let list = RuleList::parse("# - Type Category Path Profile Process\n------\n\n");
        assert!(list.is_empty());
        assert!(RuleList::parse("").is_empty());
    }

    #[test]
    fn trailing_non_blank_line_is_kept() {
        let list = RuleList::parse("h1\nh2\n1 ALLOW @a * * /bin/a\n2 ALLOW @b * * /bin/b");
        assert_eq!(list.len(), 2);
        assert_eq!(list.rows()[1].rule, "ALLOW @b * * /bin/b");
    }

    #[test]
    fn resolve_normalizes_whitespace() {
        let list = RuleList::parse(LISTING);
        let row = list.resolve("  ALLOW   @log * *\t/usr/sbin/rsyslogd ").unwrap();
        assert_eq!(row.ordinal, "2");
        assert!(list.resolve("ALLOW @log * * /usr/sbin/syslogd").is_none());
    }

    #[test]
    fn custom_header_size() {
        let list = RuleList::parse_with_header("only header\n7 DENY @x * * /bin/x\n", 1);
        assert_eq!(list.rows()[0].ordinal, "7");
        assert_eq!((&list).into_iter().count(), 1);
    }

    fn token() -> impl Strategy<Value = String> {
        "[A-Za-z0-9@*/._-]{1,12}"
    }

    fn rule_text() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(token(), 1..6)
    }

    fn spacing() -> impl Strategy<Value = String> {
        "[ \t]{1,4}"
    }

    proptest! {
        #[test]
        fn every_listed_rule_resolves_to_its_ordinal(
            rules in prop::collection::vec(rule_text(), 0..12),
            sep in spacing(),
            crlf in any::<bool>(),
            leading_blanks in 0usize..3,
        ) {
            let eol = if crlf { "\r\n" } else { "\n" };
            let mut listing = eol.repeat(leading_blanks);
            listing.push_str(&format!("# - Type Category{eol}-----{eol}"));
            for (i, rule) in rules.iter().enumerate() {
                listing.push_str(&format!("{}{sep}{}{eol}", i + 1, rule.join(sep.as_str())));
            }
            listing.push_str(eol);

            let list = RuleList::parse(&listing);
            prop_assert_eq!(list.len(), rules.len());

            for (i, rule) in rules.iter().enumerate() {
                let wanted = rule.join("   ");
                let row = list.resolve(&wanted).unwrap();
                // Duplicate rule texts resolve to the first occurrence.
                let first = rules.iter().position(|r| r == rule).unwrap();
                prop_assert_eq!(&row.ordinal, &(first + 1).to_string());
                prop_assert_eq!(&list.rows()[i].rule, &rule.join(" "));
            }
        }

        #[test]
        fn normalize_is_idempotent(text in "[ \ta-z@*/]{0,40}") {
            let once = normalize_rule(&text);
            prop_assert_eq!(normalize_rule(&once), once.clone());
            prop_assert!(!once.starts_with(' ') && !once.ends_with(' '));
            prop_assert!(!once.contains("  "));
        }
    }
}
