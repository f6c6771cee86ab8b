use std::str::FromStr;

use crate::constants::TRUTHY_VALUES;

pub type FormData = Vec<(String, String)>;

/// Raw query parameters in arrival order. Keys may repeat (`tags=a&tags=b`).
///
/// Every getter is lenient: a missing or unparsable value reads as `None`
/// so that malformed filters never turn into server errors.
#[derive(Debug, Default, Clone)]
pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_number<T>(&self, key: &str) -> Option<T>
    where
        T: FromStr,
    {
        self.get_str(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    pub fn get_flag(&self, key: &str) -> bool {
        self.get_str(key)
            .map(|v| TRUTHY_VALUES.contains(&v.trim()))
            .unwrap_or(false)
    }
}

impl From<FormData> for Form {
    fn from(value: FormData) -> Self {
        Self::from_data(value)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::Form;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[rstest]
    fn collects_repeated_keys() {
        let form = form(&[("tags", "breakfast"), ("page", "2"), ("tags", "lunch"), ("tags", "")]);
        assert_eq!(form.get_all("tags"), vec!["breakfast", "lunch"]);
    }

    #[rstest]
    #[case("7", Some(7))]
    #[case(" 7 ", Some(7))]
    #[case("seven", None)]
    #[case("", None)]
    fn parses_numbers_leniently(#[case] raw: &str, #[case] expected: Option<i32>) {
        assert_eq!(form(&[("author", raw)]).get_number::<i32>("author"), expected);
    }

    #[rstest]
    #[case("1", true)]
    #[case("true", true)]
    #[case("0", false)]
    #[case("false", false)]
    #[case("yes please", false)]
    fn reads_flags(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(form(&[("is_favorited", raw)]).get_flag("is_favorited"), expected);
    }

    #[rstest]
    fn missing_flag_is_false() {
        assert!(!form(&[]).get_flag("is_in_shopping_cart"));
    }
}
