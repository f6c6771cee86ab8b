pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const USER_FIELD_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const RECIPE_NAME_MAX_LENGTH: usize = 256;
pub const TAG_FIELD_MAX_LENGTH: usize = 32;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 128;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 64;

pub const RESERVED_USERNAME: &str = "me";

pub const MIN_COOKING_TIME_MINUTES: i32 = 1;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;

pub const SHOPPING_LIST_FILENAME: &str = "shopping-list.txt";
pub const SHOPPING_LIST_MEDIA_TYPE: &str = "text/plain; charset=utf-8";
pub const SHOPPING_LIST_EMPTY: &str = "Shopping list is empty.";

pub const SESSION_COOKIE: &str = "session";
pub const TOKEN_PREFIX: &str = "Token ";

pub const TRUTHY_VALUES: &[&str] = &["1", "true", "True"];
