use crate::config::FilterConfig;

impl FilterConfig {
    /// Whether a message qualifies for forwarding.
    ///
    /// The text must start with the start keyword and contain every required
    /// substring, all compared case-insensitively. An empty substring list is
    /// trivially satisfied.
    pub fn should_forward(&self, text: &str) -> bool {
        let text = text.to_lowercase();

        if !text.starts_with(&self.start_keyword.to_lowercase()) {
            return false;
        }

        self.required_substrings
            .iter()
            .all(|needle| text.contains(&needle.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cashier_filter() -> FilterConfig {
        FilterConfig {
            start_keyword: "【Cashier Notifier】".to_string(),
            required_substrings: vec!["錯誤碼：".to_string(), "video:".to_string()],
        }
    }

    #[test]
    fn test_matching_message_with_different_case() {
        let filter = cashier_filter();
        assert!(filter.should_forward("【cashier notifier】XXX錯誤碼：500 video:abc"));
        assert!(filter.should_forward("【CASHIER NOTIFIER】VIDEO:abc 錯誤碼：404"));
    }

    #[test]
    fn test_missing_substrings_rejected() {
        let filter = cashier_filter();
        assert!(!filter.should_forward("【Cashier Notifier】no error code"));
        assert!(!filter.should_forward("【Cashier Notifier】錯誤碼：500 only"));
        assert!(!filter.should_forward("【Cashier Notifier】video:abc only"));
    }

    #[test]
    fn test_keyword_must_be_at_start() {
        let filter = cashier_filter();
        assert!(!filter.should_forward("FYI 【Cashier Notifier】錯誤碼：500 video:abc"));
        assert!(!filter.should_forward(""));
    }

    #[test]
    fn test_empty_substring_set_only_checks_keyword() {
        let filter = FilterConfig {
            start_keyword: "[Alert]".to_string(),
            required_substrings: Vec::new(),
        };
        assert!(filter.should_forward("[ALERT] anything"));
        assert!(!filter.should_forward("anything [alert]"));
    }

    fn random_case(s: &str, flips: &[bool]) -> String {
        s.chars()
            .zip(flips.iter().cycle())
            .map(|(c, &upper)| {
                if upper {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect()
    }

    proptest! {
        #[test]
        fn property_forwards_any_casing_and_order(
            keyword in "[a-z]{1,8}",
            needles in prop::collection::vec("[a-z:]{1,6}", 0..4),
            filler in "[0-9 ]{0,10}",
            flips in prop::collection::vec(any::<bool>(), 1..16),
            rotate in 0usize..4,
        ) {
            let filter = FilterConfig {
                start_keyword: keyword.clone(),
                required_substrings: needles.clone(),
            };

            let mut body = needles.clone();
            if !body.is_empty() {
                let shift = rotate % body.len();
                body.rotate_left(shift);
            }
            let text = format!(
                "{}{}{}",
                random_case(&keyword, &flips),
                filler,
                random_case(&body.join(" "), &flips),
            );

            prop_assert!(filter.should_forward(&text));
        }

        #[test]
        fn property_rejects_when_a_substring_is_missing(
            keyword in "[a-z]{1,8}",
            needles in prop::collection::btree_set("[a-z]{1,6}", 1..4),
            filler in "[0-9 ]{0,10}",
            missing in 0usize..4,
        ) {
            let needles: Vec<String> = needles.into_iter().collect();
            let missing = missing % needles.len();
            let filter = FilterConfig {
                start_keyword: format!("#{keyword}"),
                required_substrings: needles.iter().map(|n| format!("<{n}>")).collect(),
            };

            let present: Vec<String> = needles
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != missing)
                .map(|(_, n)| format!("<{n}>"))
                .collect();
            let text = format!("#{keyword}{filler}{}", present.join(" "));

            prop_assert!(!filter.should_forward(&text));
        }

        #[test]
        fn property_rejects_without_keyword_prefix(
            keyword in "[a-z]{1,8}",
            prefix in "[0-9]{1,4}",
        ) {
            let filter = FilterConfig {
                start_keyword: keyword.clone(),
                required_substrings: Vec::new(),
            };
            let text = format!("{prefix}{keyword}");
            prop_assert!(!filter.should_forward(&text));
        }
    }
}
