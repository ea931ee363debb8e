//! Boolean keyword query parser.
//!
//! Turns queries like `crash "stack trace" | panic -wontfix` into a
//! [`QueryNode`] tree that is evaluated against a thread's opening message.

/// Parsed form of a keyword query.
///
/// Built once per query string and evaluated once per candidate thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    /// Matches everything.
    Empty,
    /// Lowercase substring that must occur in the content.
    Term(String),
    And(Vec<QueryNode>),
    Or(Vec<QueryNode>),
    Not(Box<QueryNode>),
    /// Query could not be interpreted; matches nothing.
    Error(String),
}

impl QueryNode {
    /// Evaluate against content that has already been lowercased.
    fn matches_lowered(&self, content: &str) -> bool {
        match self {
            QueryNode::Empty => true,
            QueryNode::Term(term) => content.contains(term.as_str()),
            QueryNode::And(children) => children.iter().all(|c| c.matches_lowered(content)),
            QueryNode::Or(children) => children.iter().any(|c| c.matches_lowered(content)),
            QueryNode::Not(child) => !child.matches_lowered(content),
            QueryNode::Error(message) => {
                tracing::warn!(%message, "Ignoring content for malformed search query");
                false
            }
        }
    }
}

/// Syntax guide shown to users.
pub const SYNTAX_HELP: &str = "\
Keywords: space-separated words must all appear (AND).
  example: crash login
OR: `OR` or `|` matches either side.
  example: crash OR panic
  example: title | body | subject
NOT: a leading `NOT` or `-` excludes everything that follows.
  example: -resolved
  example: NOT \"works for me\"
Phrases: wrap text in double quotes to match it as one unit.
  example: \"stack trace\"
Combined: crash \"stack trace\" | panic";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Term(String),
    Phrase(String),
    Or,
    And,
    Not,
    OpenParen,
    CloseParen,
}

impl Token {
    fn text(&self) -> Option<&str> {
        match self {
            Token::Term(value) | Token::Phrase(value) => Some(value),
            _ => None,
        }
    }
}

/// Parse a keyword query. Never fails: malformed input yields
/// [`QueryNode::Error`] or a best-effort AND of the recognisable terms.
///
/// # Examples
///
/// ```
/// use forum_search::domain::search::{evaluate, parse_query};
///
/// let tree = parse_query("a OR c");
/// assert!(evaluate(&tree, "b c"));
/// assert!(!evaluate(&tree, "b d"));
/// ```
pub fn parse_query(query: &str) -> QueryNode {
    let query = query.trim();
    if query.is_empty() {
        return QueryNode::Empty;
    }

    if !has_operator_syntax(query) {
        return QueryNode::And(
            query
                .split_whitespace()
                .map(|word| QueryNode::Term(word.to_lowercase()))
                .collect(),
        );
    }

    build_tree(&tokenize(query))
}

/// Evaluate a parsed query against raw (not yet lowercased) content.
pub fn evaluate(tree: &QueryNode, content: &str) -> bool {
    let lowered = content.to_lowercase();
    tree.matches_lowered(&lowered)
}

fn has_operator_syntax(query: &str) -> bool {
    if query.contains(['|', '&', '-', '"']) {
        return true;
    }
    let upper = query.to_uppercase();
    ["OR", "AND", "NOT"].iter().any(|op| upper.contains(op))
}

fn is_operator_char(c: char) -> bool {
    matches!(c, '|' | '&' | '-' | '(' | ')')
}

fn tokenize(query: &str) -> Vec<Token> {
    let chars: Vec<char> = query.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '"' {
            let start = i + 1;
            let mut end = start;
            while end < len && chars[end] != '"' {
                end += 1;
            }

            if end < len {
                let phrase: String = chars[start..end].iter().collect();
                tokens.push(Token::Phrase(phrase.trim().to_lowercase()));
                i = end + 1;
            } else {
                // Unterminated quote: the rest of the query, quote included, is one term
                let rest: String = chars[i..].iter().collect();
                tokens.push(Token::Term(rest.trim().to_lowercase()));
                i = len;
            }
            continue;
        }

        let symbol = match c {
            '|' => Some(Token::Or),
            '&' => Some(Token::And),
            '-' => Some(Token::Not),
            '(' => Some(Token::OpenParen),
            ')' => Some(Token::CloseParen),
            _ => None,
        };
        if let Some(token) = symbol {
            tokens.push(token);
            i += 1;
            continue;
        }

        if i + 2 < len {
            let word: String = chars[i..i + 3].iter().collect::<String>().to_uppercase();
            let at_boundary = i + 3 >= len || chars[i + 3].is_whitespace();

            if word == "OR " {
                tokens.push(Token::Or);
                i += 3;
                continue;
            }
            if word == "AND" && at_boundary {
                tokens.push(Token::And);
                i += 3;
                continue;
            }
            if word == "NOT" && at_boundary {
                tokens.push(Token::Not);
                i += 3;
                continue;
            }
        }

        let start = i;
        while i < len && !(chars[i].is_whitespace() || is_operator_char(chars[i])) {
            i += 1;
        }

        if i > start {
            let term: String = chars[start..i].iter().collect();
            tokens.push(Token::Term(term.trim().to_lowercase()));
            continue;
        }

        i += 1;
    }

    tokens
}

fn terms_of(tokens: &[Token]) -> Vec<QueryNode> {
    tokens
        .iter()
        .filter_map(Token::text)
        .map(|value| QueryNode::Term(value.to_string()))
        .collect()
}

fn build_tree(tokens: &[Token]) -> QueryNode {
    match tokens {
        [] => return QueryNode::Empty,
        [single] => {
            return match single.text() {
                Some(value) => QueryNode::Term(value.to_string()),
                None => QueryNode::Error("Invalid single token".to_string()),
            };
        }
        _ => {}
    }

    if tokens.iter().all(|t| t.text().is_some()) {
        return QueryNode::And(terms_of(tokens));
    }

    // OR binds loosest: each run between OR tokens becomes one alternative
    if tokens.contains(&Token::Or) {
        let children = tokens
            .split(|t| *t == Token::Or)
            .filter(|chunk| !chunk.is_empty())
            .map(build_tree)
            .collect();
        return QueryNode::Or(children);
    }

    if tokens[0] == Token::Not {
        return QueryNode::Not(Box::new(build_tree(&tokens[1..])));
    }

    let terms = terms_of(tokens);
    if terms.is_empty() {
        return QueryNode::Error("Unable to parse query".to_string());
    }
    QueryNode::And(terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(value: &str) -> QueryNode {
        QueryNode::Term(value.to_string())
    }

    #[test]
    fn parse_empty_query() {
        assert_eq!(parse_query(""), QueryNode::Empty);
        assert_eq!(parse_query("   "), QueryNode::Empty);
        assert!(evaluate(&parse_query(""), "anything at all"));
        assert!(evaluate(&parse_query(""), ""));
    }

    #[test]
    fn parse_is_idempotent() {
        for query in ["a b", "a OR c", "\"exact phrase\" -x", "NOT (a | b)", "\"open"] {
            assert_eq!(parse_query(query), parse_query(query));
        }
    }

    #[test]
    fn parse_simple_terms_fast_path() {
        assert_eq!(
            parse_query("Login Crash"),
            QueryNode::And(vec![term("login"), term("crash")])
        );
    }

    #[test]
    fn implicit_and() {
        let tree = parse_query("a b");
        assert!(evaluate(&tree, "a b c"));
        assert!(!evaluate(&tree, "a c"));
    }

    #[test]
    fn or_alternatives() {
        let tree = parse_query("a OR c");
        assert!(evaluate(&tree, "b c"));
        assert!(!evaluate(&tree, "b d"));

        let tree = parse_query("a | c");
        assert_eq!(tree, QueryNode::Or(vec![term("a"), term("c")]));
    }

    #[test]
    fn lowercase_or_is_an_operator() {
        let tree = parse_query("cats or dogs");
        assert_eq!(tree, QueryNode::Or(vec![term("cats"), term("dogs")]));
    }

    #[test]
    fn or_chunks_left_to_right() {
        // `A B OR C` is `(A AND B) OR C`, not `A AND (B OR C)`
        let tree = parse_query("a b OR c");
        assert_eq!(
            tree,
            QueryNode::Or(vec![QueryNode::And(vec![term("a"), term("b")]), term("c")])
        );
        assert!(evaluate(&tree, "only c here"));
        assert!(!evaluate(&tree, "only a here"));
    }

    #[test]
    fn quoted_phrase() {
        let tree = parse_query("\"exact phrase\"");
        assert_eq!(tree, term("exact phrase"));
        assert!(evaluate(&tree, "this is an exact phrase here"));
        assert!(!evaluate(&tree, "exact and phrase apart"));
    }

    #[test]
    fn leading_minus_negates() {
        let tree = parse_query("-bad");
        assert_eq!(tree, QueryNode::Not(Box::new(term("bad"))));
        assert!(evaluate(&tree, "this is good"));
        assert!(!evaluate(&tree, "this is bad"));
    }

    #[test]
    fn leading_not_negates_the_whole_remainder() {
        let tree = parse_query("NOT spam eggs");
        assert_eq!(
            tree,
            QueryNode::Not(Box::new(QueryNode::And(vec![term("spam"), term("eggs")])))
        );
        assert!(evaluate(&tree, "spam only"));
        assert!(!evaluate(&tree, "spam and eggs"));
    }

    #[test]
    fn inner_minus_falls_back_to_and() {
        let tree = parse_query("a -b");
        assert_eq!(tree, QueryNode::And(vec![term("a"), term("b")]));
    }

    #[test]
    fn unterminated_quote_degrades_to_term() {
        let tree = parse_query("foo \"bar baz");
        assert_eq!(tree, QueryNode::And(vec![term("foo"), term("\"bar baz")]));
    }

    #[test]
    fn words_containing_keywords_are_terms() {
        let tree = parse_query("android nothing orange");
        assert_eq!(
            tree,
            QueryNode::And(vec![term("android"), term("nothing"), term("orange")])
        );
    }

    #[test]
    fn parentheses_are_dropped() {
        let tree = parse_query("NOT (a b)");
        assert_eq!(
            tree,
            QueryNode::Not(Box::new(QueryNode::And(vec![term("a"), term("b")])))
        );
    }

    #[test]
    fn lone_operator_is_an_error() {
        let tree = parse_query("|");
        assert!(matches!(tree, QueryNode::Error(_)));
        assert!(!evaluate(&tree, "anything"));

        let tree = parse_query("- -");
        assert!(matches!(tree, QueryNode::Not(_)));
    }

    #[test]
    fn evaluation_is_case_insensitive() {
        let tree = parse_query("\"Stack Trace\" | PANIC");
        assert!(evaluate(&tree, "got a STACK TRACE today"));
        assert!(evaluate(&tree, "kernel panic"));
    }

    #[test]
    fn unicode_terms() {
        let tree = parse_query("问题 -已解决");
        assert!(evaluate(&tree, "这个问题已解决"));
        let tree = parse_query("-已解决");
        assert!(evaluate(&tree, "这个问题还在"));
        assert!(!evaluate(&tree, "这个问题已解决"));
    }
}
