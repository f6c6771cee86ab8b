use std::collections::HashSet;

use serde::Deserialize;

use crate::{
    constants::{
        EMAIL_MAX_LENGTH, INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH,
        MIN_COOKING_TIME_MINUTES, MIN_INGREDIENT_AMOUNT, RECIPE_NAME_MAX_LENGTH, RESERVED_USERNAME,
        USER_FIELD_MAX_LENGTH,
    },
    error::ActionError,
    schema::Id,
};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i32,
}

/// Fields submitted when creating or replacing a recipe. The image arrives
/// already decoded; `None` on replace keeps the stored one.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Id>,
    pub ingredients: Vec<IngredientAmount>,
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-')
}

pub fn validate_username(username: &str) -> Result<(), ActionError> {
    if username.is_empty() {
        return Err(ActionError::validation("username", "This field is required"));
    }
    if username.chars().count() > USER_FIELD_MAX_LENGTH {
        return Err(ActionError::validation("username", "Username is too long"));
    }
    if !username.chars().all(is_username_char) {
        return Err(ActionError::validation(
            "username",
            "Username may only contain letters, digits and @/./+/-/_",
        ));
    }
    if username.eq_ignore_ascii_case(RESERVED_USERNAME) {
        return Err(ActionError::validation(
            "username",
            "This username is reserved",
        ));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ActionError> {
    let invalid = || ActionError::validation("email", "Enter a valid email address");

    if email.len() > EMAIL_MAX_LENGTH || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.') =>
        {
            Ok(())
        }
        _ => Err(invalid()),
    }
}

/// Required free-text field of at most `max_length` characters.
pub fn validate_text_field(field: &'static str, value: &str, max_length: usize) -> Result<(), ActionError> {
    if value.trim().is_empty() {
        return Err(ActionError::validation(field, "This field is required"));
    }
    if value.chars().count() > max_length {
        return Err(ActionError::Validation {
            field,
            info: format!("Ensure this field has no more than {max_length} characters"),
        });
    }
    Ok(())
}

pub fn validate_person_name(first_name: &str, last_name: &str) -> Result<(), ActionError> {
    validate_text_field("first_name", first_name, USER_FIELD_MAX_LENGTH)?;
    validate_text_field("last_name", last_name, USER_FIELD_MAX_LENGTH)
}

pub fn validate_ingredient(name: &str, measurement_unit: &str) -> Result<(), ActionError> {
    validate_text_field("name", name, INGREDIENT_NAME_MAX_LENGTH)?;
    validate_text_field("measurement_unit", measurement_unit, MEASUREMENT_UNIT_MAX_LENGTH)
}

pub fn validate_password(password: &str) -> Result<(), ActionError> {
    if password.trim().is_empty() {
        return Err(ActionError::validation("password", "This field is required"));
    }
    Ok(())
}

/// Checks everything about a draft that can be checked without touching
/// storage. Nothing is written when this fails.
pub fn validate_recipe(draft: &RecipeDraft, require_image: bool) -> Result<(), ActionError> {
    if draft.name.trim().is_empty() {
        return Err(ActionError::validation("name", "This field is required"));
    }
    if draft.name.chars().count() > RECIPE_NAME_MAX_LENGTH {
        return Err(ActionError::validation("name", "Name is too long"));
    }
    if draft.text.trim().is_empty() {
        return Err(ActionError::validation("text", "This field is required"));
    }
    if draft.cooking_time < MIN_COOKING_TIME_MINUTES {
        return Err(ActionError::validation(
            "cooking_time",
            &format!("Ensure this value is greater than or equal to {MIN_COOKING_TIME_MINUTES}"),
        ));
    }

    if draft.ingredients.is_empty() {
        return Err(ActionError::validation("ingredients", "This field is required"));
    }
    let mut seen = HashSet::with_capacity(draft.ingredients.len());
    for part in draft.ingredients.iter() {
        if !seen.insert(part.id) {
            return Err(ActionError::validation(
                "ingredients",
                "Ingredient must not repeat",
            ));
        }
        if part.amount < MIN_INGREDIENT_AMOUNT {
            return Err(ActionError::validation(
                "ingredients",
                &format!("Amount must be greater than or equal to {MIN_INGREDIENT_AMOUNT}"),
            ));
        }
    }

    if draft.tags.is_empty() {
        return Err(ActionError::validation("tags", "This field is required"));
    }
    let unique_tags: HashSet<&Id> = draft.tags.iter().collect();
    if unique_tags.len() != draft.tags.len() {
        return Err(ActionError::validation("tags", "Tags must not repeat"));
    }

    match &draft.image {
        Some(image) if image.is_empty() => {
            Err(ActionError::validation("image", "This field is required"))
        }
        None if require_image => Err(ActionError::validation("image", "This field is required")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn draft() -> RecipeDraft {
        RecipeDraft {
            name: String::from("Pancakes"),
            text: String::from("Mix and fry."),
            cooking_time: 20,
            tags: vec![1, 2],
            ingredients: vec![
                IngredientAmount { id: 1, amount: 200 },
                IngredientAmount { id: 2, amount: 2 },
            ],
            image: Some(vec![0x89, 0x50, 0x4e, 0x47]),
        }
    }

    fn field_of(result: Result<(), ActionError>) -> Option<&'static str> {
        match result {
            Err(ActionError::Validation { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[rstest]
    #[case("chef")]
    #[case("chef.bob@home+1-2_3")]
    #[case("Пётр")]
    #[case("mE2")]
    fn accepts_valid_usernames(#[case] username: &str) {
        assert!(validate_username(username).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("me")]
    #[case("ME")]
    #[case("Me")]
    #[case("chef bob")]
    #[case("chef!")]
    #[case("a/b")]
    fn rejects_invalid_usernames(#[case] username: &str) {
        assert_eq!(field_of(validate_username(username)), Some("username"));
    }

    #[rstest]
    fn rejects_overlong_username() {
        let username = "a".repeat(USER_FIELD_MAX_LENGTH + 1);
        assert!(validate_username(&username).is_err());
    }

    #[rstest]
    #[case("Jamie", "Cook", None)]
    #[case("", "Cook", Some("first_name"))]
    #[case("Jamie", "  ", Some("last_name"))]
    fn checks_person_names(
        #[case] first_name: &str,
        #[case] last_name: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(field_of(validate_person_name(first_name, last_name)), expected);
    }

    #[rstest]
    fn rejects_overlong_person_name() {
        let long = "j".repeat(USER_FIELD_MAX_LENGTH + 1);
        assert_eq!(field_of(validate_person_name(&long, "Cook")), Some("first_name"));
        assert!(validate_person_name(&"j".repeat(USER_FIELD_MAX_LENGTH), "Cook").is_ok());
    }

    #[rstest]
    #[case(INGREDIENT_NAME_MAX_LENGTH + 1, 1, Some("name"))]
    #[case(1, MEASUREMENT_UNIT_MAX_LENGTH + 1, Some("measurement_unit"))]
    #[case(INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH, None)]
    fn limits_ingredient_fields(
        #[case] name_length: usize,
        #[case] unit_length: usize,
        #[case] expected: Option<&str>,
    ) {
        let result = validate_ingredient(&"f".repeat(name_length), &"g".repeat(unit_length));
        assert_eq!(field_of(result), expected);
    }

    #[rstest]
    #[case("cook@example.com", true)]
    #[case("cook@example", false)]
    #[case("@example.com", false)]
    #[case("cook@@example.com", false)]
    #[case("cook @example.com", false)]
    #[case("cook@.com", false)]
    fn checks_email_shape(#[case] email: &str, #[case] valid: bool) {
        assert_eq!(validate_email(email).is_ok(), valid);
    }

    #[rstest]
    fn accepts_complete_draft(draft: RecipeDraft) {
        assert!(validate_recipe(&draft, true).is_ok());
    }

    #[rstest]
    fn rejects_duplicate_ingredient(mut draft: RecipeDraft) {
        draft.ingredients = vec![
            IngredientAmount { id: 5, amount: 1 },
            IngredientAmount { id: 5, amount: 2 },
        ];
        assert_eq!(field_of(validate_recipe(&draft, true)), Some("ingredients"));
    }

    #[rstest]
    #[case(0)]
    #[case(-3)]
    fn rejects_amount_below_minimum(mut draft: RecipeDraft, #[case] amount: i32) {
        draft.ingredients = vec![IngredientAmount { id: 1, amount }];
        assert_eq!(field_of(validate_recipe(&draft, true)), Some("ingredients"));
    }

    #[rstest]
    fn rejects_cooking_time_below_minimum(mut draft: RecipeDraft) {
        draft.cooking_time = 0;
        assert_eq!(field_of(validate_recipe(&draft, true)), Some("cooking_time"));
    }

    #[rstest]
    fn rejects_duplicate_tag(mut draft: RecipeDraft) {
        draft.tags = vec![3, 3];
        assert_eq!(field_of(validate_recipe(&draft, true)), Some("tags"));
    }

    #[rstest]
    fn rejects_empty_collections(mut draft: RecipeDraft) {
        draft.tags.clear();
        assert_eq!(field_of(validate_recipe(&draft, true)), Some("tags"));

        draft.ingredients.clear();
        assert_eq!(field_of(validate_recipe(&draft, true)), Some("ingredients"));
    }

    #[rstest]
    fn image_is_required_only_on_create(mut draft: RecipeDraft) {
        draft.image = None;
        assert_eq!(field_of(validate_recipe(&draft, true)), Some("image"));
        assert!(validate_recipe(&draft, false).is_ok());

        draft.image = Some(vec![]);
        assert_eq!(field_of(validate_recipe(&draft, false)), Some("image"));
    }

    #[rstest]
    fn rejects_blank_text(mut draft: RecipeDraft) {
        draft.text = String::from("   ");
        assert_eq!(field_of(validate_recipe(&draft, true)), Some("text"));
    }
}
