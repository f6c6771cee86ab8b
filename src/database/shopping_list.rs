use std::collections::BTreeMap;

use warp::{
    http::header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE},
    hyper::Body,
    reply::{Reply, Response},
};

use crate::{
    constants::{SHOPPING_LIST_EMPTY, SHOPPING_LIST_FILENAME, SHOPPING_LIST_MEDIA_TYPE},
    schema::{CartIngredient, ShoppingListEntry},
};

/// Groups cart lines by `(name, unit)` and sums their amounts.
///
/// Groups come out ordered by name then unit using ordinal (byte-wise)
/// string comparison, so the result does not depend on input order.
pub fn aggregate<I>(lines: I) -> Vec<ShoppingListEntry>
where
    I: IntoIterator<Item = CartIngredient>,
{
    let mut groups: BTreeMap<(String, String), i64> = BTreeMap::new();

    for line in lines {
        *groups
            .entry((line.name, line.measurement_unit))
            .or_insert(0) += line.amount;
    }

    groups
        .into_iter()
        .map(|((name, measurement_unit), total_amount)| ShoppingListEntry {
            name,
            measurement_unit,
            total_amount,
        })
        .collect()
}

/// Renders grouped entries one per line. An empty list renders as a single
/// sentinel line.
pub fn render(entries: &[ShoppingListEntry]) -> String {
    if entries.is_empty() {
        return SHOPPING_LIST_EMPTY.to_string();
    }

    entries
        .iter()
        .map(|entry| {
            format!(
                "{} ({}) — {}",
                entry.name, entry.measurement_unit, entry.total_amount
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// The downloadable shopping list attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListFile {
    pub content: Vec<u8>,
    pub media_type: &'static str,
    pub filename: &'static str,
}

impl ShoppingListFile {
    pub fn from_entries(entries: &[ShoppingListEntry]) -> Self {
        Self {
            content: render(entries).into_bytes(),
            media_type: SHOPPING_LIST_MEDIA_TYPE,
            filename: SHOPPING_LIST_FILENAME,
        }
    }

    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

impl Reply for ShoppingListFile {
    fn into_response(self) -> Response {
        let disposition = self.content_disposition();
        let mut response = Response::new(Body::from(self.content));
        let headers = response.headers_mut();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.media_type));
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(CONTENT_DISPOSITION, value);
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    fn line(name: &str, unit: &str, amount: i64) -> CartIngredient {
        CartIngredient {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[fixture]
    fn cart() -> Vec<CartIngredient> {
        vec![
            line("sugar", "g", 50),
            line("flour", "g", 200),
            line("egg", "pcs", 2),
            line("flour", "g", 100),
            line("flour", "cup", 1),
            line("egg", "pcs", 3),
        ]
    }

    #[rstest]
    fn groups_by_name_and_unit(cart: Vec<CartIngredient>) {
        let entries = aggregate(cart);
        let flat: Vec<(&str, &str, i64)> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.measurement_unit.as_str(), e.total_amount))
            .collect();

        assert_eq!(
            flat,
            vec![
                ("egg", "pcs", 5),
                ("flour", "cup", 1),
                ("flour", "g", 300),
                ("sugar", "g", 50),
            ]
        );
    }

    #[rstest]
    fn order_of_cart_does_not_matter(cart: Vec<CartIngredient>) {
        let mut reversed = cart.clone();
        reversed.reverse();
        let mut rotated = cart.clone();
        rotated.rotate_left(2);

        let expected = aggregate(cart);
        assert_eq!(aggregate(reversed), expected);
        assert_eq!(aggregate(rotated), expected);
    }

    #[rstest]
    fn renders_one_line_per_group() {
        let entries = aggregate(vec![line("flour", "g", 200), line("egg", "pcs", 2)]);
        assert_eq!(render(&entries), "egg (pcs) — 2\nflour (g) — 200");
    }

    #[rstest]
    fn empty_list_renders_sentinel() {
        assert_eq!(render(&[]), SHOPPING_LIST_EMPTY);
        assert_eq!(
            ShoppingListFile::from_entries(&[]).content,
            SHOPPING_LIST_EMPTY.as_bytes()
        );
    }

    #[rstest]
    fn sorts_case_sensitively() {
        let entries = aggregate(vec![line("apple", "pcs", 1), line("Banana", "pcs", 1)]);
        assert_eq!(entries[0].name, "Banana");
    }

    #[rstest]
    fn reply_carries_attachment_headers() {
        let response = ShoppingListFile::from_entries(&[]).into_response();
        let headers = response.headers();

        assert_eq!(headers[CONTENT_TYPE], SHOPPING_LIST_MEDIA_TYPE);
        assert_eq!(
            headers[CONTENT_DISPOSITION],
            "attachment; filename=\"shopping-list.txt\""
        );
    }
}
