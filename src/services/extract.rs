/// Pull the JSON document out of CLI output that mixes status lines with data.
///
/// Returns the text from the first `{` through the last `}`. This is a
/// heuristic: braces in trailing status text after the document will be
/// swallowed into the result.
pub fn extract_json(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&output[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_before_document() {
        assert_eq!(extract_json("status: ok\n{\"a\":1}\n"), Some("{\"a\":1}"));
    }

    #[test]
    fn test_no_braces() {
        assert_eq!(extract_json("Scanning S3 buckets...\ndone\n"), None);
        assert_eq!(extract_json(""), None);
    }

    #[test]
    fn test_unclosed_document() {
        assert_eq!(extract_json("{incomplete"), None);
    }

    #[test]
    fn test_closing_brace_before_opening() {
        assert_eq!(extract_json("} then {"), None);
    }

    #[test]
    fn test_nested_document_kept_whole() {
        let out = "Loading plan...\n{\"drift\":{\"count\":2}}\nDone.";
        assert_eq!(extract_json(out), Some("{\"drift\":{\"count\":2}}"));
    }

    #[test]
    fn test_trailing_brace_in_status_text_is_swallowed() {
        let out = "{\"a\":1}\nsummary {ok}";
        assert_eq!(extract_json(out), Some("{\"a\":1}\nsummary {ok}"));
    }
}
