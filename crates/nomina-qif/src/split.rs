//! The QIF split-target mini-grammar.
//!
//! An `S` field value may combine three markers:
//!
//! - `[Name]` - a bracketed transfer account reference
//! - `|` - separates a category from an account override
//! - `/` - separates a category/account token from a trailing class token
//!
//! Extraction order matters for inputs combining all three: the bracketed
//! account is extracted first, the pipe is stripped second, the first slash
//! splits off the class third, and whatever non-empty text remains is the
//! category.

/// A parsed QIF split target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitCategory {
    /// The original QIF markup
    pub markup: String,
    /// Category name, possibly colon-joined
    pub category: Option<String>,
    /// Transfer account referenced as `[Name]`
    pub account: Option<String>,
    /// Class token following the first `/`
    pub split_class: Option<String>,
    /// Whether the markup contained a `|`
    pub has_pipe: bool,
    /// Whether the markup contained a `/`
    pub has_slash: bool,
}

/// Find the first `[name]` group with a non-empty name.
///
/// Returns the name and the markup with the bracketed group removed.
fn extract_bracketed(markup: &str) -> Option<(String, String)> {
    let mut search_from = 0;
    while let Some(open_offset) = markup[search_from..].find('[') {
        let open = search_from + open_offset;
        let Some(close_offset) = markup[open + 1..].find(']') else {
            return None;
        };
        if close_offset > 0 {
            let account = markup[open + 1..open + 1 + close_offset].to_string();
            let mut remaining = String::with_capacity(markup.len());
            remaining.push_str(&markup[..open]);
            remaining.push_str(&markup[open + close_offset + 2..]);
            return Some((account, remaining));
        }
        // empty brackets: keep scanning
        search_from = open + 1;
    }
    None
}

impl SplitCategory {
    /// Parse a raw `S` field value.
    #[must_use]
    pub fn parse(markup: &str) -> Self {
        let has_pipe = markup.contains('|');
        let has_slash = markup.contains('/');

        let (account, mut qif) = match extract_bracketed(markup) {
            Some((account, remaining)) => (Some(account), remaining),
            None => (None, markup.to_string()),
        };

        if has_pipe {
            qif = qif.replace('|', "");
        }

        let mut split_class = None;
        if has_slash {
            if let Some((head, tail)) = qif.split_once('/') {
                if !tail.is_empty() {
                    split_class = Some(tail.to_string());
                }
                qif = head.to_string();
            }
        }

        let category = if qif.is_empty() { None } else { Some(qif) };

        Self {
            markup: markup.to_string(),
            category,
            account,
            split_class,
            has_pipe,
            has_slash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(markup: &str, category: Option<&str>, account: Option<&str>, class: Option<&str>) {
        let sc = SplitCategory::parse(markup);
        assert_eq!(sc.category.as_deref(), category, "category of {markup:?}");
        assert_eq!(sc.account.as_deref(), account, "account of {markup:?}");
        assert_eq!(sc.split_class.as_deref(), class, "class of {markup:?}");
    }

    #[test]
    fn test_split_category_grammar() {
        check("[Savings]", None, Some("Savings"), None);
        check("Checking", Some("Checking"), None, None);
        check("Expenses:Groceries", Some("Expenses:Groceries"), None, None);
        check(
            "Kursgewinne:Realisierte Gewinne|[PrivatGiro]",
            Some("Kursgewinne:Realisierte Gewinne"),
            Some("PrivatGiro"),
            None,
        );
        check(
            "[Mehrwertsteuer]/_VATCode_N1_I",
            None,
            Some("Mehrwertsteuer"),
            Some("_VATCode_N1_I"),
        );
        check("/_VATCode_B_I", None, None, Some("_VATCode_B_I"));
    }

    #[test]
    fn test_all_three_markers() {
        check(
            "Cat|[Account]/Class",
            Some("Cat"),
            Some("Account"),
            Some("Class"),
        );
    }

    #[test]
    fn test_empty_and_degenerate_markup() {
        check("", None, None, None);
        // empty brackets are not an account reference
        check("[]", Some("[]"), None, None);
        // trailing slash without a class token
        check("Cat/", Some("Cat"), None, None);
    }

    #[test]
    fn test_flags() {
        let sc = SplitCategory::parse("A|[B]/C");
        assert!(sc.has_pipe);
        assert!(sc.has_slash);
        let sc = SplitCategory::parse("Plain");
        assert!(!sc.has_pipe);
        assert!(!sc.has_slash);
    }
}
